use log::{debug, warn};
use std::collections::HashSet;

use crate::domain::message::MessageId;
use crate::error::TransportError;
use crate::mail::service::MailService;

/// Ids gathered by a listing run.
///
/// A failed follow-up page does not discard earlier pages: `ids` holds
/// everything gathered before the failure and `error` says why it stopped.
#[derive(Debug, Default)]
pub struct Harvest {
    pub ids: Vec<MessageId>,
    pub error: Option<TransportError>,
}

impl Harvest {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Lists every message id matching `query`, following continuation tokens.
pub fn list_message_ids(service: &dyn MailService, query: &str) -> Harvest {
    let mut harvest = Harvest::default();
    let mut seen_tokens: HashSet<String> = HashSet::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = match service.list_messages(query, page_token.as_deref()) {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    "Listing {query:?} failed after {pages} page(s), keeping {} id(s): {e}",
                    harvest.ids.len()
                );
                harvest.error = Some(e);
                break;
            }
        };
        pages += 1;
        harvest
            .ids
            .extend(page.messages.into_iter().map(|m| m.id));

        match page.next_page_token {
            None => break,
            Some(tok) if !seen_tokens.insert(tok.clone()) => {
                warn!("Listing {query:?} returned token {tok:?} twice; stopping");
                harvest.error = Some(TransportError::RepeatedPageToken(tok));
                break;
            }
            Some(tok) => {
                debug!("Listing {query:?}: page {pages} done, continuing");
                page_token = Some(tok);
            }
        }
    }

    harvest
}
