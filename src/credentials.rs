use anyhow::{Context, Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "mailsweep";
pub const PASSWORD_ENV: &str = "IMAP_PASSWORD";

fn keyring_entry(user: &str) -> Result<Entry> {
    Entry::new(SERVICE, user).with_context(|| format!("opening keyring entry for {}", user))
}

/// Used by `set-password`; later runs read it back through [`password_for`].
pub fn store_password(user: &str, password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(anyhow!("refusing to store an empty password for {}", user));
    }
    keyring_entry(user)?
        .set_password(password)
        .with_context(|| format!("storing password for {}", user))
}

/// `IMAP_PASSWORD` wins over the keyring; an empty variable counts as unset.
/// `keyring` answers `None` when it holds nothing for the user.
pub fn resolve_password<F>(user: &str, env: Option<String>, keyring: F) -> Result<String>
where
    F: FnOnce(&str) -> Result<Option<String>>,
{
    if let Some(p) = env.filter(|p| !p.is_empty()) {
        return Ok(p);
    }
    keyring(user)?.ok_or_else(|| {
        anyhow!(
            "no password for {}: set {} or run `mailsweep set-password --user {}`",
            user,
            PASSWORD_ENV,
            user
        )
    })
}

pub fn password_for(user: &str) -> Result<String> {
    resolve_password(user, std::env::var(PASSWORD_ENV).ok(), |user| {
        match keyring_entry(user)?.get_password() {
            Ok(p) => Ok(Some(p)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading password for {} from the keyring", user)),
        }
    })
}
