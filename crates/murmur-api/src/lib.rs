/// Request/response collaborator of the sync core.
///
/// - `client`: the [`ChatApi`] contract the core depends on
/// - `http`: its reqwest implementation against the social-network routes

pub mod client;
pub mod error;
pub mod http;

pub use client::{ChatApi, FeedScope};
pub use error::ApiError;
pub use http::{ApiConfig, HttpChatApi};
