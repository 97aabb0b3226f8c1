use tracing::{debug, trace, warn};

use murmur_types::GatewayEvent;

/// Longest slice of a bad fragment that ends up in the logs.
const LOG_PREVIEW_CHARS: usize = 200;

/// Decode one raw payload into events.
///
/// The server may coalesce several envelopes into one frame, separated by
/// newlines. Each fragment is decoded on its own: a malformed fragment is
/// logged and skipped, its siblings are still yielded, in payload order.
pub fn decode_payload(payload: &str) -> impl Iterator<Item = GatewayEvent> + '_ {
    payload
        .split('\n')
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .filter_map(decode_fragment)
}

fn decode_fragment(fragment: &str) -> Option<GatewayEvent> {
    match GatewayEvent::from_json(fragment) {
        Ok(Some(event)) => {
            trace!("Decoded {} event", event.kind());
            Some(event)
        }
        Ok(None) => {
            debug!("Skipping gateway event of unknown type -- raw: {}", preview(fragment));
            None
        }
        Err(e) => {
            warn!("Dropping malformed gateway fragment: {} -- raw: {}", e, preview(fragment));
            None
        }
    }
}

fn preview(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(LOG_PREVIEW_CHARS)
        .map_or(text.len(), |(idx, _)| idx);
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: &str = r#"{"type":"chat","payload":{"id":1,"senderId":2,"receiverId":1,"groupId":0,"content":"a","createdAt":"2024-09-14T18:03:11Z"}}"#;
    const NOTIFICATION: &str = r#"{"type":"notification","payload":{"id":9,"type":"follow","content":"bob followed you","createdAt":"2024-09-14T18:03:11Z"}}"#;
    const DENOTIFICATION: &str = r#"{"type":"denotification"}"#;

    #[test]
    fn single_envelope() {
        let events: Vec<_> = decode_payload(CHAT).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "chat");
    }

    #[test]
    fn batched_payload_keeps_fragment_order() {
        let payload = format!("{}\n{}\n{}\n", NOTIFICATION, CHAT, DENOTIFICATION);
        let kinds: Vec<_> = decode_payload(&payload).map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["notification", "chat", "denotification"]);
    }

    #[test]
    fn one_malformed_fragment_drops_only_itself() {
        let good = [CHAT, NOTIFICATION, DENOTIFICATION, CHAT];
        for bad_at in 0..=good.len() {
            let mut fragments: Vec<&str> = good.to_vec();
            fragments.insert(bad_at, r#"{"type":"chat","payload":{"id":"#);
            let payload = fragments.join("\n");
            assert_eq!(decode_payload(&payload).count(), good.len(), "bad fragment at {}", bad_at);
        }
    }

    #[test]
    fn wrong_payload_shape_is_malformed() {
        let payload = format!(
            "{}\n{}",
            r#"{"type":"notification","payload":{"id":"nine"}}"#, CHAT
        );
        assert_eq!(decode_payload(&payload).count(), 1);
    }

    #[test]
    fn empty_and_blank_fragments_are_ignored() {
        let payload = format!("\n\n  {}\r\n\t\n{}\n", CHAT, DENOTIFICATION);
        assert_eq!(decode_payload(&payload).count(), 2);
        assert_eq!(decode_payload("").count(), 0);
        assert_eq!(decode_payload("\n \n").count(), 0);
    }

    #[test]
    fn unknown_types_are_skipped() {
        let payload = format!("{}\n{}", r#"{"type":"presence","payload":{}}"#, DENOTIFICATION);
        let events: Vec<_> = decode_payload(&payload).collect();
        assert_eq!(events, vec![GatewayEvent::DeNotification { id: None }]);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let text = "é".repeat(LOG_PREVIEW_CHARS + 10);
        assert_eq!(preview(&text).chars().count(), LOG_PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }
}
