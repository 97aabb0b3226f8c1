use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use murmur_types::{ChatMessage, ChatSummary, ChatTarget, Notification, UnreadCountResponse, UserItem};

use crate::client::{ChatApi, FeedScope};
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL without trailing slash, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            token: None,
            timeout: Duration::from_secs(15),
        }
    }
}

/// [`ChatApi`] over the social-network HTTP routes.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpChatApi {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send and fail on any non-2xx status. Returns the raw body.
    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let resp = request.send().await?;
        let status = resp.status();
        debug!("{} {}", resp.url().path(), status);
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.execute(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Lists come back as `null` when the server has nothing to return.
    async fn fetch_list<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>, ApiError> {
        let list: Option<Vec<T>> = self.fetch(request).await?;
        Ok(list.unwrap_or_default())
    }
}

impl ChatApi for HttpChatApi {
    async fn fetch_conversations(&self) -> Result<Vec<ChatSummary>, ApiError> {
        self.fetch_list(self.get("/api/chats")).await
    }

    async fn fetch_new_contacts(&self) -> Result<Vec<UserItem>, ApiError> {
        self.fetch_list(self.get("/api/chat/newusers")).await
    }

    async fn fetch_transcript(&self, target: &ChatTarget) -> Result<Vec<ChatMessage>, ApiError> {
        let request = match target {
            ChatTarget::Direct { username } => {
                self.get("/api/chat").query(&[("userBName", username.as_str())])
            }
            ChatTarget::Group { id } => self.get("/api/chat-group").query(&[("groupId", id.0)]),
        };
        let chat: ChatSummary = self.fetch(request).await?;
        Ok(chat.messages)
    }

    async fn send_message(&self, message: &ChatMessage) -> Result<ChatMessage, ApiError> {
        self.fetch(self.post("/api/chat/send").json(message)).await
    }

    async fn mark_read(&self, target: &ChatTarget) -> Result<(), ApiError> {
        let request = match target {
            ChatTarget::Direct { username } => self
                .get("/api/chat/mark-read")
                .query(&[("userBName", username.as_str())]),
            ChatTarget::Group { id } => self.get("/api/chat/mark-read").query(&[("groupId", id.0)]),
        };
        self.execute(request).await?;
        Ok(())
    }

    async fn unread_count(&self) -> Result<u32, ApiError> {
        let resp: UnreadCountResponse = self.fetch(self.get("/api/notifications/unread-count")).await?;
        Ok(resp.unread_count)
    }

    async fn fetch_notifications(&self, scope: FeedScope) -> Result<Vec<Notification>, ApiError> {
        let path = match scope {
            FeedScope::New => "/api/new-notifications",
            FeedScope::All => "/api/notifications",
        };
        self.fetch_list(self.get(path)).await
    }

    async fn mark_notifications_read(&self) -> Result<(), ApiError> {
        self.execute(self.post("/api/notification/read")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use chrono::Utc;
    use murmur_types::{GroupId, UserId};
    use uuid::Uuid;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Seen {
        method: Method,
        path_and_query: String,
        auth: Option<String>,
        body: String,
    }

    /// Canned responses by path; every request is recorded.
    #[derive(Clone, Default)]
    struct FakeApi {
        routes: Arc<HashMap<&'static str, (StatusCode, String)>>,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    async fn respond(
        State(fake): State<FakeApi>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, String) {
        fake.seen.lock().unwrap().push(Seen {
            method,
            path_and_query: uri.path_and_query().map(|p| p.to_string()).unwrap_or_default(),
            auth: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
        fake.routes
            .get(uri.path())
            .cloned()
            .unwrap_or((StatusCode::NOT_FOUND, String::new()))
    }

    async fn spawn(routes: &[(&'static str, StatusCode, &str)], token: Option<&str>) -> (HttpChatApi, FakeApi) {
        let fake = FakeApi {
            routes: Arc::new(
                routes
                    .iter()
                    .map(|(path, status, body)| (*path, (*status, body.to_string())))
                    .collect(),
            ),
            seen: Arc::default(),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(respond).with_state(fake.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let api = HttpChatApi::new(ApiConfig {
            base_url: format!("http://{}/", addr),
            token: token.map(str::to_string),
            ..Default::default()
        })
        .unwrap();
        (api, fake)
    }

    fn seen(fake: &FakeApi) -> Vec<Seen> {
        fake.seen.lock().unwrap().clone()
    }

    const CHATS: &str = r#"[
        {"messages": [{"id": 7, "senderId": 2, "receiverId": 1, "groupId": 0,
                       "content": "hi", "createdAt": "2024-09-14T18:03:11Z"}],
         "userA": {"id": 1, "username": "me"}, "userB": {"id": 2, "username": "bob"},
         "group": {"id": 0}, "notification": 1, "allowChat": true},
        {"messages": null, "userA": {"id": 1, "username": "me"}, "userB": {"id": 0},
         "group": {"id": 4, "title": "hikers", "members": null}, "notification": 0, "allowChat": true}
    ]"#;

    #[tokio::test]
    async fn fetches_conversation_list() {
        let (api, fake) = spawn(&[("/api/chats", StatusCode::OK, CHATS)], Some("tok")).await;

        let chats = api.fetch_conversations().await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].user_b.username, "bob");
        assert_eq!(chats[0].notification, 1);
        assert!(chats[1].messages.is_empty());
        assert_eq!(chats[1].group.id, GroupId(4));

        let requests = seen(&fake);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].path_and_query, "/api/chats");
        assert_eq!(requests[0].auth.as_deref(), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn null_lists_are_empty() {
        let (api, _) = spawn(
            &[
                ("/api/chats", StatusCode::OK, "null"),
                ("/api/chat/newusers", StatusCode::OK, "null"),
                ("/api/new-notifications", StatusCode::OK, "null\n"),
            ],
            None,
        )
        .await;

        assert!(api.fetch_conversations().await.unwrap().is_empty());
        assert!(api.fetch_new_contacts().await.unwrap().is_empty());
        assert!(api.fetch_notifications(FeedScope::New).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transcript_routes_by_target() {
        let body = r#"{"messages": [
            {"id": 1, "senderId": 1, "receiverId": 2, "groupId": 0, "content": "a", "createdAt": "2024-09-14T18:00:00Z"},
            {"id": 2, "senderId": 2, "receiverId": 1, "groupId": 0, "content": "b", "createdAt": "2024-09-14T18:01:00Z"}
        ], "userA": {"id": 1}, "userB": {"id": 2}, "group": {"id": 0}}"#;
        let (api, fake) = spawn(
            &[
                ("/api/chat", StatusCode::OK, body),
                ("/api/chat-group", StatusCode::OK, r#"{"messages": null}"#),
            ],
            None,
        )
        .await;

        let direct = api
            .fetch_transcript(&ChatTarget::Direct { username: "bob".into() })
            .await
            .unwrap();
        assert_eq!(direct.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);

        let group = api
            .fetch_transcript(&ChatTarget::Group { id: GroupId(4) })
            .await
            .unwrap();
        assert!(group.is_empty());

        let paths: Vec<_> = seen(&fake).into_iter().map(|s| s.path_and_query).collect();
        assert_eq!(paths, vec!["/api/chat?userBName=bob", "/api/chat-group?groupId=4"]);
        assert!(seen(&fake).iter().all(|s| s.auth.is_none()));
    }

    #[tokio::test]
    async fn send_posts_message_and_returns_stored_copy() {
        let stored = r#"{"id": 99, "senderId": 1, "receiverId": 2, "groupId": 0,
                         "content": "yo", "createdAt": "2024-09-14T18:03:11Z"}"#;
        let (api, fake) = spawn(&[("/api/chat/send", StatusCode::CREATED, stored)], None).await;

        let client_id = Uuid::new_v4();
        let outgoing = ChatMessage {
            id: 0,
            sender_id: UserId(1),
            receiver_id: UserId(2),
            group_id: GroupId(0),
            content: "yo".into(),
            created_at: Utc::now(),
            client_id: Some(client_id),
        };
        let reply = api.send_message(&outgoing).await.unwrap();
        assert_eq!(reply.id, 99);
        assert_eq!(reply.content, "yo");

        let requests = seen(&fake);
        assert_eq!(requests[0].method, Method::POST);
        let posted: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(posted["senderId"], 1);
        assert_eq!(posted["receiverId"], 2);
        assert_eq!(posted["content"], "yo");
        assert_eq!(posted["clientId"], client_id.to_string());
    }

    #[tokio::test]
    async fn mark_read_addresses_user_or_group() {
        let (api, fake) = spawn(&[("/api/chat/mark-read", StatusCode::OK, "")], None).await;

        api.mark_read(&ChatTarget::Direct { username: "bob smith".into() })
            .await
            .unwrap();
        api.mark_read(&ChatTarget::Group { id: GroupId(12) }).await.unwrap();

        let paths: Vec<_> = seen(&fake).into_iter().map(|s| s.path_and_query).collect();
        assert_eq!(
            paths,
            vec!["/api/chat/mark-read?userBName=bob+smith", "/api/chat/mark-read?groupId=12"]
        );
    }

    #[tokio::test]
    async fn notification_endpoints() {
        let feed = r#"[{"id": 3, "type": "follow", "notifiedUserId": 1, "notifyingUserId": 2,
                        "content": "bob followed you", "createdAt": "2024-09-14T18:03:11Z"}]"#;
        let (api, fake) = spawn(
            &[
                ("/api/notifications/unread-count", StatusCode::OK, r#"{"unread_count": 5}"#),
                ("/api/new-notifications", StatusCode::OK, feed),
                ("/api/notifications", StatusCode::OK, "[]"),
                ("/api/notification/read", StatusCode::OK, ""),
            ],
            None,
        )
        .await;

        assert_eq!(api.unread_count().await.unwrap(), 5);
        let fresh = api.fetch_notifications(FeedScope::New).await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, 3);
        assert!(api.fetch_notifications(FeedScope::All).await.unwrap().is_empty());
        api.mark_notifications_read().await.unwrap();

        let requests = seen(&fake);
        let last = requests.last().unwrap();
        assert_eq!(last.method, Method::POST);
        assert_eq!(last.path_and_query, "/api/notification/read");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (api, _) = spawn(&[("/api/chats", StatusCode::INTERNAL_SERVER_ERROR, "boom")], None).await;
        assert!(matches!(api.fetch_conversations().await, Err(ApiError::Status(500))));
        assert!(matches!(api.unread_count().await, Err(ApiError::Status(404))));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let (api, _) = spawn(
            &[("/api/notifications/unread-count", StatusCode::OK, r#"{"count": "x"}"#)],
            None,
        )
        .await;
        assert!(matches!(api.unread_count().await, Err(ApiError::Decode(_))));
    }
}
