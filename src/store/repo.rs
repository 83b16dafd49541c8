use crate::domain::message::{MessageRecord, SenderCount};
use crate::error::StorageError;

/// Durable table of messages keyed by remote message id.
///
/// Every write commits on its own; nothing spans a batch.
pub trait MessageRepository {
    /// Creates the message table if absent. Safe to call repeatedly.
    fn ensure_schema(&self) -> Result<(), StorageError>;

    /// Inserts one pending row per id, ignoring ids already present.
    /// Returns how many rows were actually added.
    fn insert_pending(&self, ids: &[String]) -> Result<usize, StorageError>;

    /// Rows whose sender is still unset, in insertion order.
    fn list_pending(&self) -> Result<Vec<MessageRecord>, StorageError>;

    /// Sets the sender of `message_id`; unknown ids are a no-op.
    fn set_sender(&self, message_id: &str, sender_address: &str) -> Result<(), StorageError>;

    /// Message count per sender (unset senders grouped under `None`),
    /// highest count first.
    fn aggregate_by_sender(&self) -> Result<Vec<SenderCount>, StorageError>;
}
