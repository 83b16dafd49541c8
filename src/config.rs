use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const APP_DIR: &str = "gmail_senders";
pub const DEFAULT_QUERY: &str = "label:inbox";
pub const DEFAULT_DB_FILE: &str = "gmail.db";
pub const DEFAULT_REPORT_FILE: &str = "report-output.html";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub client_id: String,
    pub user_email: Option<String>,
    pub redirect_uri: Option<String>,
    pub db_path: Option<String>,
    pub query: Option<String>,
    pub report_path: Option<String>,
}

impl Config {
    /// Keyring account the refresh token is stored under.
    pub fn account(&self) -> &str {
        self.user_email.as_deref().unwrap_or("me")
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI)
    }

    pub fn query(&self) -> &str {
        self.query.as_deref().unwrap_or(DEFAULT_QUERY)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(self.db_path.as_deref().unwrap_or(DEFAULT_DB_FILE))
    }

    pub fn report_path(&self) -> PathBuf {
        PathBuf::from(self.report_path.as_deref().unwrap_or(DEFAULT_REPORT_FILE))
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let p = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join(APP_DIR);
    fs::create_dir_all(&p)?;
    Ok(p)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            user_email: Some("you@example.com".to_string()),
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            query: Some(DEFAULT_QUERY.to_string()),
            ..Config::default()
        };
        fs::write(&path, toml::to_string_pretty(&sample)?)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}; edit it and run again",
            path.display()
        ));
    }
    parse_config(&fs::read_to_string(path)?)
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(toml::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_falls_back_to_defaults() {
        let cfg = parse_config(r#"client_id = "abc.apps.googleusercontent.com""#).unwrap();

        assert_eq!(cfg.account(), "me");
        assert_eq!(cfg.query(), "label:inbox");
        assert_eq!(cfg.db_path(), PathBuf::from("gmail.db"));
        assert_eq!(cfg.report_path(), PathBuf::from("report-output.html"));
        assert_eq!(cfg.redirect_uri(), DEFAULT_REDIRECT_URI);
    }

    #[test]
    fn explicit_values_win() {
        let cfg = parse_config(
            r#"
            client_id = "abc"
            user_email = "me@example.com"
            query = "from:billing newer_than:1y"
            db_path = "/var/lib/senders/mail.db"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.account(), "me@example.com");
        assert_eq!(cfg.query(), "from:billing newer_than:1y");
        assert_eq!(cfg.db_path(), PathBuf::from("/var/lib/senders/mail.db"));
    }

    #[test]
    fn client_id_is_required() {
        assert!(parse_config(r#"query = "label:inbox""#).is_err());
    }
}
