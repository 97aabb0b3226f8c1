/// Wire and domain types shared by the murmur crates.
///
/// - `models`: users, groups, chat messages, notifications and the canonical
///   conversation key
/// - `events`: the closed set of events delivered over the gateway
/// - `api`: request/response shapes of the chat and notification endpoints

pub mod api;
pub mod events;
pub mod models;

pub use api::{ChatSummary, ChatTarget, UnreadCountResponse};
pub use events::GatewayEvent;
pub use models::{
    ChatMessage, ConversationKey, GroupId, GroupInfo, Notification, NotificationKind, Peer,
    UserId, UserItem,
};
