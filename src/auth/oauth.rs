use anyhow::{Result, anyhow};
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Tokens returned by a grant (in-memory)
#[derive(Debug)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// Installed-app OAuth client registered with Google.
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

impl OAuthApp {
    fn client(&self) -> Result<BasicClient> {
        Ok(BasicClient::new(
            ClientId::new(self.client_id.clone()),
            self.client_secret.clone().map(ClientSecret::new),
            AuthUrl::new(AUTH_URL.to_string())?,
            Some(TokenUrl::new(TOKEN_URL.to_string())?),
        ))
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        let token = self
            .client()?
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request(http_client)
            .map_err(|e| anyhow!("refresh grant failed: {e}"))?;

        Ok(Tokens {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
            expires_in: token.expires_in().map(|d| d.as_secs()),
        })
    }

    /// Authorization Code + PKCE: opens the browser and catches the redirect
    /// on a loopback listener bound to the redirect URI's port.
    pub fn authorize_interactive(&self) -> Result<Tokens> {
        let redirect = Url::parse(&self.redirect_uri)
            .map_err(|e| anyhow!("Invalid redirect_uri '{}': {e}", self.redirect_uri))?;
        let bind_addr = loopback_addr(&redirect)?;

        // listen before the browser can hit the redirect
        let server = Server::http(bind_addr)
            .map_err(|e| anyhow!("Failed to bind OAuth callback server on {bind_addr}: {e:?}"))?;

        let client = self
            .client()?
            .set_redirect_uri(RedirectUrl::new(self.redirect_uri.clone())?);
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(GMAIL_READONLY_SCOPE.to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        println!("Open this URL in your browser:\n{auth_url}");
        if let Err(e) = open::that(auth_url.as_str()) {
            log::warn!("could not open browser automatically: {e}");
        }

        let code = wait_for_code(&server, &redirect, csrf.secret())?;

        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request(http_client)
            .map_err(|e| anyhow!("Token exchange failed: {e:?}"))?;

        Ok(Tokens {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
            expires_in: token.expires_in().map(|d| d.as_secs()),
        })
    }
}

fn loopback_addr(redirect: &Url) -> Result<SocketAddr> {
    let host = redirect
        .host_str()
        .ok_or_else(|| anyhow!("redirect_uri missing host: {redirect}"))?;
    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect_uri missing/unknown port: {redirect}"))?;

    let ip: IpAddr = match host {
        "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .parse()
            .map_err(|_| anyhow!("redirect_uri host must be localhost or an IP: {other}"))?,
    };
    Ok(SocketAddr::new(ip, port))
}

/// Pulls `code` out of a callback path like `/callback?code=..&state=..`,
/// rejecting a mismatched `state`.
fn code_from_callback(redirect: &Url, request_path: &str, expected_state: &str) -> Option<String> {
    let full = redirect.join(request_path).ok()?;
    let mut code = None;
    let mut state = None;
    for (k, v) in full.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            _ => {}
        }
    }
    match state {
        Some(s) if s == expected_state => code,
        _ => None,
    }
}

fn wait_for_code(server: &Server, redirect: &Url, expected_state: &str) -> Result<String> {
    let deadline = Instant::now() + CALLBACK_TIMEOUT;

    while Instant::now() < deadline {
        let Ok(Some(request)) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };

        if let Some(code) = code_from_callback(redirect, request.url(), expected_state) {
            let _ = request.respond(Response::from_string(
                "Authorization received. You can close this tab.",
            ));
            return Ok(code);
        }
        let _ = request.respond(Response::from_string(
            "No authorization code in redirect. You can close this tab.",
        ));
    }

    Err(anyhow!("No authorization code received within timeout"))
}
