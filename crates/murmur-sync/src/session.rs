use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use murmur_api::ChatApi;
use murmur_gateway::{Connection, Inbound};
use murmur_types::{Peer, UserId};

use crate::config::SyncConfig;
use crate::engine::{Action, Completion, Effect, SyncState, validate_message};
use crate::error::SyncError;
use crate::projector::ViewSnapshot;

/// Cheap, cloneable entry point for user actions.
#[derive(Clone)]
pub struct SessionHandle {
    actions: mpsc::Sender<Action>,
    view: watch::Receiver<ViewSnapshot>,
    max_message_chars: usize,
}

impl SessionHandle {
    async fn dispatch(&self, action: Action) -> Result<(), SyncError> {
        self.actions.send(action).await.map_err(|_| SyncError::Closed)
    }

    pub async fn focus(&self, peer: Peer) -> Result<(), SyncError> {
        self.dispatch(Action::Focus(peer)).await
    }

    pub async fn unfocus(&self) -> Result<(), SyncError> {
        self.dispatch(Action::Unfocus).await
    }

    /// Send to the focused conversation. Rejects blank and over-long text.
    pub async fn send_message(&self, content: impl Into<String>) -> Result<(), SyncError> {
        let content = content.into();
        validate_message(&content, self.max_message_chars)?;
        if self.view.borrow().transcript.is_none() {
            return Err(SyncError::NoFocus);
        }
        self.dispatch(Action::Send(content)).await
    }

    pub async fn open_notifications(&self) -> Result<(), SyncError> {
        self.dispatch(Action::OpenNotifications).await
    }

    pub async fn show_previous_notifications(&self) -> Result<(), SyncError> {
        self.dispatch(Action::ShowPreviousNotifications).await
    }

    /// Close the feed; marks every notification read.
    pub async fn close_notifications(&self) -> Result<(), SyncError> {
        self.dispatch(Action::CloseNotifications).await
    }

    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.dispatch(Action::Refresh).await
    }
}

/// A running sync session: one task owning the connection and the state.
pub struct SyncSession {
    handle: SessionHandle,
    view: watch::Receiver<ViewSnapshot>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SyncSession {
    pub fn start<A>(api: A, connection: Connection, local_user: UserId, config: SyncConfig) -> Self
    where
        A: ChatApi + Send + Sync + 'static,
    {
        let (action_tx, action_rx) = mpsc::channel(config.action_capacity.max(1));
        let (view_tx, view_rx) = watch::channel(ViewSnapshot::default());
        let cancel = CancellationToken::new();

        let handle = SessionHandle {
            actions: action_tx,
            view: view_rx.clone(),
            max_message_chars: config.max_message_chars,
        };
        let driver = Driver {
            api: Arc::new(api),
            state: SyncState::new(local_user, config),
            tasks: JoinSet::new(),
            view: view_tx,
        };
        let task = tokio::spawn(driver.run(connection, action_rx, cancel.clone()));
        info!("Sync session started for user {}", local_user);

        Self {
            handle,
            view: view_rx,
            cancel,
            task,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Receiver of the latest view; changes only when the view changed.
    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.view.clone()
    }

    /// Stop the session: in-flight requests and timers are aborted and the
    /// connection is closed before this returns.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Sync session task failed: {}", e);
        }
    }
}

struct Driver<A> {
    api: Arc<A>,
    state: SyncState,
    tasks: JoinSet<Completion>,
    view: watch::Sender<ViewSnapshot>,
}

impl<A> Driver<A>
where
    A: ChatApi + Send + Sync + 'static,
{
    async fn run(
        mut self,
        mut connection: Connection,
        mut actions: mpsc::Receiver<Action>,
        cancel: CancellationToken,
    ) {
        let effects = self.state.start();
        self.execute(effects);
        self.publish();

        let mut connected = true;
        loop {
            let effects = tokio::select! {
                _ = cancel.cancelled() => break,

                inbound = connection.recv(), if connected => match inbound {
                    Some(Inbound::Payload(payload)) => self.state.handle_payload(&payload),
                    Some(Inbound::Resumed) => self.state.handle_resumed(),
                    Some(Inbound::Closed) | None => {
                        info!("Gateway connection gone, continuing without live events");
                        connected = false;
                        Vec::new()
                    }
                },

                action = actions.recv() => match action {
                    Some(action) => self.state.handle_action(action),
                    None => break,
                },

                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(completion) => self.state.handle_completion(completion),
                    Err(e) => {
                        if !e.is_cancelled() {
                            warn!("Effect task failed: {}", e);
                        }
                        Vec::new()
                    }
                },
            };
            self.execute(effects);
            self.publish();
        }

        self.tasks.shutdown().await;
        self.state.teardown();
        self.publish();
        connection.disconnect().await;
        info!("Sync session stopped");
    }

    fn publish(&self) {
        let snapshot = self.state.snapshot();
        self.view.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Run every effect as its own task; completions come back through the
    /// `JoinSet`.
    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            debug!("Executing {:?}", effect);
            let api = Arc::clone(&self.api);
            match effect {
                Effect::FetchConversations { issued } => {
                    self.tasks.spawn(async move {
                        Completion::Conversations {
                            issued,
                            result: api.fetch_conversations().await,
                        }
                    });
                }
                Effect::FetchNewContacts { issued } => {
                    self.tasks.spawn(async move {
                        Completion::NewContacts {
                            issued,
                            result: api.fetch_new_contacts().await,
                        }
                    });
                }
                Effect::FetchTranscript { key, generation, target } => {
                    self.tasks.spawn(async move {
                        Completion::Transcript {
                            key,
                            generation,
                            result: api.fetch_transcript(&target).await,
                        }
                    });
                }
                Effect::MarkRead { key, target, issued } => {
                    self.tasks.spawn(async move {
                        Completion::MarkRead {
                            key,
                            issued,
                            result: api.mark_read(&target).await,
                        }
                    });
                }
                Effect::SendMessage { key, message } => {
                    let Some(client_id) = message.client_id else {
                        warn!("Outgoing message for {} has no correlation id, dropping", key);
                        continue;
                    };
                    self.tasks.spawn(async move {
                        Completion::Sent {
                            client_id,
                            result: api.send_message(&message).await,
                        }
                    });
                }
                Effect::RecountNotifications { issued } => {
                    self.tasks.spawn(async move {
                        Completion::Recount {
                            issued,
                            result: api.unread_count().await,
                        }
                    });
                }
                Effect::FetchFeed { scope, issued } => {
                    self.tasks.spawn(async move {
                        Completion::Feed {
                            scope,
                            issued,
                            result: api.fetch_notifications(scope).await,
                        }
                    });
                }
                Effect::MarkNotificationsRead { issued } => {
                    self.tasks.spawn(async move {
                        Completion::NotificationsMarked {
                            issued,
                            result: api.mark_notifications_read().await,
                        }
                    });
                }
                Effect::ExpireToast { generation, after } => {
                    self.tasks.spawn(async move {
                        tokio::time::sleep(after).await;
                        Completion::ToastExpired { generation }
                    });
                }
            }
        }
    }
}
