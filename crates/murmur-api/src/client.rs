use std::future::Future;

use murmur_types::{ChatMessage, ChatSummary, ChatTarget, Notification, UserItem};

use crate::error::ApiError;

/// Which slice of the notification feed to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedScope {
    /// Only notifications the user has not seen yet.
    #[default]
    New,
    /// The full history ("show previous").
    All,
}

/// Everything the sync core asks of the request/response layer.
///
/// Futures are `Send` so a session can run each request as its own task.
pub trait ChatApi {
    /// Conversation list, newest first, each row carrying only its preview message.
    fn fetch_conversations(&self) -> impl Future<Output = Result<Vec<ChatSummary>, ApiError>> + Send;

    /// Users the local user may start a conversation with.
    fn fetch_new_contacts(&self) -> impl Future<Output = Result<Vec<UserItem>, ApiError>> + Send;

    /// Full history of one conversation.
    fn fetch_transcript(
        &self,
        target: &ChatTarget,
    ) -> impl Future<Output = Result<Vec<ChatMessage>, ApiError>> + Send;

    /// Returns the message as stored by the server (with its id).
    fn send_message(
        &self,
        message: &ChatMessage,
    ) -> impl Future<Output = Result<ChatMessage, ApiError>> + Send;

    fn mark_read(&self, target: &ChatTarget) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn unread_count(&self) -> impl Future<Output = Result<u32, ApiError>> + Send;

    fn fetch_notifications(
        &self,
        scope: FeedScope,
    ) -> impl Future<Output = Result<Vec<Notification>, ApiError>> + Send;

    fn mark_notifications_read(&self) -> impl Future<Output = Result<(), ApiError>> + Send;
}
