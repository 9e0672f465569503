//! Content fingerprints used to decide which messages are duplicates.
//!
//! Both strategies produce a lowercase hex SHA-256 digest and are pure
//! functions of the message bytes.

use mailparse::{MailHeaderMap, ParsedMail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FingerprintError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Hash of the complete raw message as delivered.
    Raw,
    /// Hash of Subject, Date and the decoded text/attachment parts, so that
    /// re-encoding or a different MIME boundary does not hide a duplicate.
    #[default]
    Canonical,
}

#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    strategy: Strategy,
}

impl Fingerprinter {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn fingerprint(&self, raw: &[u8]) -> Result<String, FingerprintError> {
        match self.strategy {
            Strategy::Raw => Ok(raw_fingerprint(raw)),
            Strategy::Canonical => canonical_fingerprint(raw),
        }
    }
}

pub fn raw_fingerprint(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    format!("{:x}", hasher.finalize())
}

pub fn canonical_fingerprint(raw: &[u8]) -> Result<String, FingerprintError> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| FingerprintError::Parse(e.to_string()))?;

    let mut hasher = Sha256::new();
    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
    let date = parsed.headers.get_first_value("Date").unwrap_or_default();
    update_component(&mut hasher, subject.as_bytes());
    update_component(&mut hasher, date.as_bytes());

    for part in leaf_parts(&parsed) {
        if !is_hashed_type(&part.ctype.mimetype) {
            continue;
        }
        // undecodable parts are left out of the hash
        if let Ok(content) = part.get_body_raw() {
            update_component(&mut hasher, &content);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

// Length prefix keeps "ab" + "c" distinct from "a" + "bc".
fn update_component(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn is_hashed_type(mimetype: &str) -> bool {
    let m = mimetype.to_ascii_lowercase();
    m == "text/plain" || m == "text/html" || m.starts_with("application/")
}

/// Non-multipart parts in document order.
pub fn leaf_parts<'a>(p: &'a ParsedMail<'a>) -> Vec<&'a ParsedMail<'a>> {
    let mut out = Vec::new();
    collect_leaves(p, &mut out);
    out
}

fn collect_leaves<'a>(p: &'a ParsedMail<'a>, out: &mut Vec<&'a ParsedMail<'a>>) {
    if p.subparts.is_empty() {
        out.push(p);
        return;
    }
    for sp in &p.subparts {
        collect_leaves(sp, out);
    }
}
