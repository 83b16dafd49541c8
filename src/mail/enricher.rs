use log::{debug, warn};
use std::thread;
use std::time::Duration;

use crate::error::{EnrichmentError, EnrichmentFailure, TransportError};
use crate::mail::decoders::{extract_sender_address, find_from_header};
use crate::mail::service::{MailService, MessageHeader};

pub const MAX_ATTEMPTS: u32 = 5;

/// Resolves the sender address of single messages.
pub struct Enricher<'a> {
    service: &'a dyn MailService,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<'a> Enricher<'a> {
    pub fn new(service: &'a dyn MailService) -> Self {
        Self {
            service,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Base delay before the first retry; doubles after each further failure.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Normalized From address of `message_id`.
    pub fn fetch_sender(&self, message_id: &str) -> Result<String, EnrichmentError> {
        let headers = self
            .headers_with_retry(message_id)
            .map_err(|e| EnrichmentError::new(message_id, e))?;

        let raw = find_from_header(&headers)
            .ok_or_else(|| EnrichmentError::new(message_id, EnrichmentFailure::MissingFrom))?;

        extract_sender_address(raw).map_err(|e| EnrichmentError::new(message_id, e))
    }

    fn headers_with_retry(&self, message_id: &str) -> Result<Vec<MessageHeader>, TransportError> {
        let mut delay = self.retry_delay;
        let mut attempt = 1;

        loop {
            match self.service.message_headers(message_id) {
                Ok(headers) => return Ok(headers),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    debug!(
                        "Message {message_id}: attempt {attempt}/{} failed ({e}); retrying in {delay:?}",
                        self.max_attempts
                    );
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!("Message {message_id}: giving up after {attempt} attempts");
                    }
                    return Err(e);
                }
            }
        }
    }
}
