use serde::Deserialize;

use crate::error::TransportError;

/// One page of the remote message listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListPage {
    /// Absent when the query matched nothing on this page.
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The remote mail service as seen by the sync pipeline.
pub trait MailService {
    /// Lists message ids matching `query`, resuming at `page_token` when given.
    fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<MessageListPage, TransportError>;

    /// Header-level metadata of a single message; never the body.
    fn message_headers(&self, message_id: &str) -> Result<Vec<MessageHeader>, TransportError>;
}
