use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message is {len} characters long, the limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("No conversation is open")]
    NoFocus,

    #[error("Sync session is closed")]
    Closed,
}
