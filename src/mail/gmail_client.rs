use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::auth::TokenSource;
use crate::error::TransportError;
use crate::mail::service::{MailService, MessageHeader, MessageListPage};

pub const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

#[derive(Debug, Deserialize)]
struct MessageMetadata {
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<MessageHeader>,
}

/// Gmail REST client for the authorized user's mailbox ("me").
pub struct GmailClient<T: TokenSource> {
    http: Client,
    api_base: Url,
    tokens: T,
}

impl<T: TokenSource> GmailClient<T> {
    pub fn new(tokens: T) -> Result<Self, TransportError> {
        Self::with_api_base(tokens, DEFAULT_API_BASE)
    }

    pub fn with_api_base(tokens: T, api_base: &str) -> Result<Self, TransportError> {
        let api_base = Url::parse(api_base)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{api_base}: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(TransportError::InvalidEndpoint(api_base.to_string()));
        }
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            api_base,
            tokens,
        })
    }

    /// API base plus `segments`, each percent-encoded as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidEndpoint(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, TransportError> {
        let token = self
            .tokens
            .access_token()
            .map_err(|e| TransportError::Auth(format!("{e:#}")))?;
        Ok(req.bearer_auth(token).header("accept", "application/json"))
    }

    fn send_json<R: DeserializeOwned>(&self, req: RequestBuilder) -> Result<R, TransportError> {
        let resp = self.authorized(req)?.send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl<T: TokenSource> MailService for GmailClient<T> {
    fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<MessageListPage, TransportError> {
        let url = self.endpoint(&["users", "me", "messages"])?;
        let mut req = self.http.get(url).query(&[("q", query)]);
        if let Some(tok) = page_token {
            req = req.query(&[("pageToken", tok)]);
        }
        self.send_json(req)
    }

    fn message_headers(&self, message_id: &str) -> Result<Vec<MessageHeader>, TransportError> {
        let url = self.endpoint(&["users", "me", "messages", message_id])?;
        let req = self
            .http
            .get(url)
            .query(&[("format", "metadata"), ("metadataHeaders", "From")]);
        let meta: MessageMetadata = self.send_json(req)?;
        Ok(meta.payload.map(|p| p.headers).unwrap_or_default())
    }
}

/// Google error bodies look like `{"error": {"code": .., "message": .., "errors": [..]}}`;
/// keep the message and reasons, fall back to the raw (truncated) body.
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ErrorBody,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        #[serde(default)]
        errors: Vec<ErrorItem>,
    }
    #[derive(Deserialize)]
    struct ErrorItem {
        reason: Option<String>,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(env) => {
            let reasons: Vec<String> = env
                .error
                .errors
                .into_iter()
                .filter_map(|e| e.reason)
                .collect();
            match (env.error.message, reasons.is_empty()) {
                (Some(m), true) => m,
                (Some(m), false) => format!("{m} ({})", reasons.join(", ")),
                (None, _) => reasons.join(", "),
            }
        }
        Err(_) => body.chars().take(300).collect(),
    }
}
