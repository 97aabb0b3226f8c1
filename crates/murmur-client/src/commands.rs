use murmur_sync::ViewSnapshot;
use murmur_types::{ConversationKey, GroupId, Peer};

pub const HELP: &str = "\
/open <username|#group-id>  open a conversation
/close                      close the open conversation
/send <text>                send (plain text works too)
/notifications              show new notifications
/previous                   show all notifications
/done                       close notifications, marking them read
/refresh                    reload everything
/quit                       exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    Close,
    Send(String),
    Notifications,
    Previous,
    Done,
    Refresh,
    Quit,
    Help,
}

impl Command {
    /// `None` for blank input and unknown commands.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Send(line.to_string()));
        };
        let (name, arg) = match rest.split_once(' ') {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "open" if !arg.is_empty() => Some(Self::Open(arg.to_string())),
            "close" => Some(Self::Close),
            "send" if !arg.is_empty() => Some(Self::Send(arg.to_string())),
            "notifications" => Some(Self::Notifications),
            "previous" => Some(Self::Previous),
            "done" => Some(Self::Done),
            "refresh" => Some(Self::Refresh),
            "quit" | "exit" => Some(Self::Quit),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Find the peer an `/open` argument names: `#<id>` for a group, otherwise a
/// username from the conversation list or the new contacts.
pub fn resolve_peer(view: &ViewSnapshot, target: &str) -> Option<Peer> {
    if let Some(id) = target.strip_prefix('#') {
        let key = ConversationKey::group(GroupId(id.parse().ok()?));
        return view
            .conversations
            .iter()
            .find(|row| row.key == key)
            .map(|row| row.peer.clone());
    }
    view.conversations
        .iter()
        .filter(|row| !row.key.is_group())
        .find(|row| row.name.eq_ignore_ascii_case(target))
        .map(|row| row.peer.clone())
        .or_else(|| {
            view.new_contacts
                .iter()
                .find(|user| user.username.eq_ignore_ascii_case(target))
                .map(|user| Peer::User(user.clone()))
        })
}
