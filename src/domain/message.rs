pub type MessageId = String;

/// One row of the local message table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub message_id: MessageId,
    /// `None` until the enrich step resolves the From header.
    pub sender_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderCount {
    pub count: u64,
    pub sender_address: Option<String>,
}

impl SenderCount {
    pub fn new(count: u64, sender_address: Option<&str>) -> Self {
        Self {
            count,
            sender_address: sender_address.map(str::to_string),
        }
    }
}
