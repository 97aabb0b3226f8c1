use tracing::{debug, trace};

use murmur_api::FeedScope;
use murmur_types::Notification;

/// Transient popup for the latest notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub notification: Notification,
    pub generation: u64,
}

/// The notification list while it is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub scope: FeedScope,
    pub items: Vec<Notification>,
    /// Sequence of the request the items came from.
    pub as_of: u64,
}

/// Unread notification badge, toast and feed.
///
/// The badge is owned by the server. Locally it only takes a provisional `+1`
/// per notification, and every notification-class event asks for a recount.
#[derive(Debug, Default)]
pub struct NotificationAggregator {
    badge: u32,
    badge_as_of: u64,
    toast: Option<Toast>,
    toast_generation: u64,
    feed: Option<Feed>,
}

impl NotificationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisional `+1` and a toast replacing any current one. Returns the
    /// toast generation to expire later.
    pub fn on_notification_event(&mut self, notification: Notification, seq: u64) -> u64 {
        self.badge = self.badge.saturating_add(1);
        self.badge_as_of = seq;
        self.toast_generation += 1;
        trace!("Showing toast {} for notification {}", self.toast_generation, notification.id);
        self.toast = Some(Toast {
            notification,
            generation: self.toast_generation,
        });
        self.toast_generation
    }

    /// Apply a recount issued at `issued`. Returns `false` if a newer local
    /// change or recount already landed.
    pub fn on_recount_complete(&mut self, issued: u64, count: u32) -> bool {
        if issued < self.badge_as_of {
            debug!("Discarding stale recount {} (issued {}, badge as of {})", count, issued, self.badge_as_of);
            return false;
        }
        self.badge = count;
        self.badge_as_of = issued;
        true
    }

    /// Returns `true` if the toast was still the one showing.
    pub fn expire_toast(&mut self, generation: u64) -> bool {
        match &self.toast {
            Some(toast) if toast.generation == generation => {
                self.toast = None;
                true
            }
            _ => false,
        }
    }

    /// Open the feed (or switch its scope). Returns the scope to fetch.
    pub fn open_feed(&mut self, scope: FeedScope) -> FeedScope {
        match &mut self.feed {
            Some(feed) => feed.scope = scope,
            None => {
                self.feed = Some(Feed {
                    scope,
                    items: Vec::new(),
                    as_of: 0,
                })
            }
        }
        scope
    }

    /// Widen the feed to every notification, read ones included.
    pub fn show_previous(&mut self) -> FeedScope {
        self.open_feed(FeedScope::All)
    }

    /// Returns `true` if the feed was open.
    pub fn close_feed(&mut self) -> bool {
        self.feed.take().is_some()
    }

    /// Scope to refresh after a notification-class event, if the feed is open.
    pub fn refresh_scope(&self) -> Option<FeedScope> {
        self.feed.as_ref().map(|feed| feed.scope)
    }

    /// Apply a feed response. Ignored if the feed closed, switched scope or
    /// already shows a newer response.
    pub fn feed_loaded(&mut self, scope: FeedScope, issued: u64, items: Vec<Notification>) -> bool {
        match &mut self.feed {
            Some(feed) if feed.scope == scope && issued >= feed.as_of => {
                feed.items = items;
                feed.as_of = issued;
                true
            }
            _ => false,
        }
    }

    pub fn badge(&self) -> u32 {
        self.badge
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    pub fn feed(&self) -> Option<&Feed> {
        self.feed.as_ref()
    }
}
