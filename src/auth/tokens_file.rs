use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config;

/// Seconds before expiry at which a cached token is no longer handed out.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Last access token and its expiry, kept next to the config file.
/// The refresh token never lands here; it lives in the keyring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at_epoch: i64,
}

impl CachedToken {
    pub fn is_fresh(&self, now_epoch: i64) -> bool {
        now_epoch + EXPIRY_MARGIN_SECS < self.expires_at_epoch
    }
}

pub fn tokens_path() -> Result<PathBuf> {
    Ok(config::config_dir()?.join("tokens.json"))
}

pub fn save_token(path: &Path, token: &CachedToken) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(token)?)?;
    Ok(())
}

/// `None` when nothing was cached yet or the cache is unreadable.
pub fn load_token(path: &Path) -> Result<Option<CachedToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path)?;
    match serde_json::from_str(&s) {
        Ok(t) => Ok(Some(t)),
        Err(e) => {
            log::warn!("Ignoring unreadable token cache {}: {e}", path.display());
            Ok(None)
        }
    }
}
