use regex::Regex;
use std::sync::LazyLock;

use crate::error::EnrichmentFailure;
use crate::mail::service::MessageHeader;

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^<>]*)>").expect("static regex"));

/// Value of the first header named `From`, compared case-insensitively.
pub fn find_from_header(headers: &[MessageHeader]) -> Option<&str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("from"))
        .map(|h| h.value.as_str())
}

/// Reduces a From header value to a bare address.
///
/// `"John Doe <john@x.com>"` becomes `"john@x.com"`. When several bracketed
/// segments are present the first one wins. A value without brackets is
/// returned unchanged.
pub fn extract_sender_address(raw: &str) -> Result<String, EnrichmentFailure> {
    if raw.trim().is_empty() {
        return Err(EnrichmentFailure::Malformed(raw.to_string()));
    }

    if !raw.contains('<') {
        return Ok(raw.to_string());
    }

    let inner = BRACKETED
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EnrichmentFailure::Malformed(raw.to_string()))?;

    Ok(inner.to_string())
}
