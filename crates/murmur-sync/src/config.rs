use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long a notification toast stays up.
    pub toast_duration: Duration,
    /// Longest message the composer accepts, in characters.
    pub max_message_chars: usize,
    /// Pending user actions buffered between handles and the session task.
    pub action_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            toast_duration: Duration::from_secs(4),
            max_message_chars: 2000,
            action_capacity: 64,
        }
    }
}
