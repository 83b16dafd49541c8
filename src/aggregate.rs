use crate::domain::message::SenderCount;
use crate::error::StorageError;
use crate::store::repo::MessageRepository;

/// Senders by volume, as handed to a `Reporter`.
pub fn sender_summary(repo: &dyn MessageRepository) -> Result<Vec<SenderCount>, StorageError> {
    repo.aggregate_by_sender()
}
