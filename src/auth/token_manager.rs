use anyhow::Result;
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::TokenSource;
use crate::auth::oauth::{OAuthApp, Tokens};
use crate::auth::token_store::{self, Secret};
use crate::auth::tokens_file::{self, CachedToken};
use crate::config::Config;

/// Lifetime assumed when the provider omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3500;

pub struct TokenManager {
    app: OAuthApp,
    account: String,
    cache_path: PathBuf,
    current: RefCell<Option<CachedToken>>,
}

impl TokenManager {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self {
            app: OAuthApp {
                client_id: cfg.client_id.clone(),
                client_secret: token_store::client_secret(&cfg.client_id)?,
                redirect_uri: cfg.redirect_uri().to_string(),
            },
            account: cfg.account().to_string(),
            cache_path: tokens_file::tokens_path()?,
            current: RefCell::new(None),
        })
    }

    fn remember(&self, t: Tokens, now: i64) -> String {
        if let Some(rt) = &t.refresh_token
            && let Err(e) = Secret::RefreshToken(&self.account).save(rt)
        {
            log::warn!("couldn't save refresh token to keyring: {e}");
        }

        let cached = CachedToken {
            access_token: t.access_token,
            expires_at_epoch: t
                .expires_in
                .map(|s| now + s as i64)
                .unwrap_or(now + DEFAULT_LIFETIME_SECS),
        };
        if let Err(e) = tokens_file::save_token(&self.cache_path, &cached) {
            log::warn!("couldn't save token cache: {e}");
        }

        let access = cached.access_token.clone();
        *self.current.borrow_mut() = Some(cached);
        access
    }
}

impl TokenSource for TokenManager {
    /// Returns a valid access token; refreshes or runs the browser flow if needed.
    fn access_token(&self) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        if let Some(t) = self.current.borrow().as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(t.access_token.clone());
        }

        if let Some(t) = tokens_file::load_token(&self.cache_path)?.filter(|t| t.is_fresh(now)) {
            let access = t.access_token.clone();
            *self.current.borrow_mut() = Some(t);
            return Ok(access);
        }

        if let Some(rt) = Secret::RefreshToken(&self.account).load()? {
            match self.app.refresh(&rt) {
                Ok(t) => {
                    log::info!("Refreshed access token for {}", self.account);
                    return Ok(self.remember(t, now));
                }
                Err(e) => log::warn!("Refresh failed: {e}; falling back to interactive auth"),
            }
        }

        let t = self.app.authorize_interactive()?;
        Ok(self.remember(t, now))
    }
}
