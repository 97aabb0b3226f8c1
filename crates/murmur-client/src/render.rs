use std::fmt::Write;

use murmur_api::FeedScope;
use murmur_sync::{Delivery, ViewSnapshot};

/// Transcript lines shown below the list.
const TRANSCRIPT_TAIL: usize = 20;

/// Plain-text rendering of one snapshot.
pub fn render(view: &ViewSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "== chats ==  [notifications: {}]", view.badge);
    if let Some(toast) = &view.toast {
        let _ = writeln!(out, "  ** {} **", toast.content);
    }
    for row in &view.conversations {
        let marker = if row.focused { '>' } else { ' ' };
        let unread = if row.unread > 0 {
            format!(" ({})", row.unread)
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "{} {}{}  {}",
            marker,
            row.name,
            unread,
            row.preview.as_deref().unwrap_or("")
        );
    }
    if !view.new_contacts.is_empty() {
        let names: Vec<&str> = view.new_contacts.iter().map(|u| u.username.as_str()).collect();
        let _ = writeln!(out, "  new: {}", names.join(", "));
    }

    if let Some(transcript) = &view.transcript {
        let _ = writeln!(out, "== {} ==", transcript.title);
        if !transcript.loaded {
            let _ = writeln!(out, "  (loading history)");
        }
        let skip = transcript.lines.len().saturating_sub(TRANSCRIPT_TAIL);
        for line in &transcript.lines[skip..] {
            let state = match line.delivery {
                Delivery::Confirmed => "",
                Delivery::Pending => " …",
                Delivery::Failed => " (not sent)",
            };
            let _ = writeln!(
                out,
                "  [{}] {}: {}{}",
                line.created_at.format("%H:%M"),
                line.sender,
                line.content,
                state
            );
        }
    }

    if let Some(feed) = &view.feed {
        let title = match feed.scope {
            FeedScope::New => "new notifications",
            FeedScope::All => "all notifications",
        };
        let _ = writeln!(out, "== {} ==", title);
        if feed.items.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for item in &feed.items {
            let _ = writeln!(
                out,
                "  {} {}{}",
                if item.is_read { ' ' } else { '*' },
                item.content,
                item.link().map(|l| format!("  {}", l)).unwrap_or_default()
            );
        }
    }
    out
}
