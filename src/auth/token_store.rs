use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

use crate::config::APP_DIR;

/// Secrets kept in the OS keyring under the app's service name.
#[derive(Debug, Clone, Copy)]
pub enum Secret<'a> {
    /// Refresh token for a mailbox account.
    RefreshToken(&'a str),
    /// OAuth client secret for a client id.
    ClientSecret(&'a str),
}

impl Secret<'_> {
    fn account(&self) -> String {
        match self {
            Secret::RefreshToken(user) => format!("refresh-token:{user}"),
            Secret::ClientSecret(client_id) => format!("client-secret:{client_id}"),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(APP_DIR, &self.account()).map_err(|e| anyhow!("keyring: {e}"))
    }

    pub fn save(&self, value: &str) -> Result<()> {
        self.entry()?
            .set_password(value)
            .map_err(|e| anyhow!("keyring: {e}"))
    }

    pub fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(v) => Ok(Some(v)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(e) => Err(anyhow!("keyring: {e}")),
        }
    }
}

/// Client secret from the keyring, else from `OAUTH_CLIENT_SECRET`.
pub fn client_secret(client_id: &str) -> Result<Option<String>> {
    Ok(Secret::ClientSecret(client_id)
        .load()?
        .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok()))
}
