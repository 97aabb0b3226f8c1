/// Real-time message and notification synchronization.
///
/// - `engine`: the synchronous reducer. Events, user actions and request
///   completions go in, the requests they make necessary come out
/// - `reconciler`: ordered conversation list and the focused transcript
/// - `read_state`: per-conversation unread counters and mark-read debouncing
/// - `notifications`: badge, toast and notification feed
/// - `projector`: render-ready snapshots of the merged state
/// - `session`: the task that drives the reducer from a gateway connection
///   and runs its requests

pub mod config;
pub mod engine;
pub mod error;
mod inflight;
pub mod notifications;
pub mod projector;
pub mod read_state;
pub mod reconciler;
pub mod session;
pub mod transcript;

pub use config::SyncConfig;
pub use engine::{Action, Completion, Effect, SyncState};
pub use error::SyncError;
pub use projector::{ConversationRow, FeedView, ToastView, TranscriptLine, TranscriptView, ViewSnapshot};
pub use session::{SessionHandle, SyncSession};
pub use transcript::Delivery;
