use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote folder as reported by LIST.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailboxRef {
    pub name: String,
    /// Hierarchy delimiter; `None` on flat namespaces.
    pub delimiter: Option<String>,
}

impl MailboxRef {
    pub fn new(name: impl Into<String>, delimiter: Option<&str>) -> Self {
        Self {
            name: name.into(),
            delimiter: delimiter.filter(|d| !d.is_empty()).map(str::to_string),
        }
    }

    /// Number of delimiter occurrences in the name.
    pub fn depth(&self) -> usize {
        match &self.delimiter {
            Some(d) => self.name.matches(d.as_str()).count(),
            None => 0,
        }
    }

    /// True for `root` itself and for folders below it. `Projects` does not
    /// contain `ProjectsArchive`.
    pub fn is_within(&self, root: &str) -> bool {
        if self.name == root {
            return true;
        }
        match &self.delimiter {
            Some(d) => self
                .name
                .strip_prefix(root)
                .is_some_and(|rest| rest.starts_with(d.as_str())),
            None => false,
        }
    }

    pub fn segments(&self) -> Vec<&str> {
        match &self.delimiter {
            Some(d) => self.name.split(d.as_str()).collect(),
            None => vec![self.name.as_str()],
        }
    }
}

impl AsRef<MailboxRef> for MailboxRef {
    fn as_ref(&self) -> &MailboxRef {
        self
    }
}

impl fmt::Display for MailboxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Result of SELECT/EXAMINE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxStatus {
    pub exists: u32,
}
