//! Conversion of Telegram messages into [`InboundMessage`].

use repostbot_core::gateway::{
    ChatKind, InboundMessage, Sender, SenderKind, ANONYMOUS_ADMIN_ID, CHANNEL_BOT_ID,
};
use repostbot_core::keys::MessageContent;
use repostbot_core::{GroupId, MessageId};
use teloxide::types::{Chat, Message, MessageEntityKind, MessageOrigin};

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

fn chat_title(chat: &Chat) -> String {
    chat.title().unwrap_or("Unknown").to_string()
}

/// Resolves who sent a message. Anonymous admins post as the group itself,
/// channels as the channel.
#[must_use]
pub fn sender_of(msg: &Message) -> Sender {
    if let Some(sender_chat) = &msg.sender_chat {
        let kind = if sender_chat.id == msg.chat.id {
            SenderKind::AnonymousAdmin
        } else if sender_chat.is_channel() {
            SenderKind::Channel
        } else {
            SenderKind::User
        };
        return Sender {
            id: sender_chat.id.0,
            name: chat_title(sender_chat),
            kind,
        };
    }
    match &msg.from {
        Some(user) if user.id.0.cast_signed() == ANONYMOUS_ADMIN_ID => Sender {
            id: msg.chat.id.0,
            name: chat_title(&msg.chat),
            kind: SenderKind::AnonymousAdmin,
        },
        Some(user) if user.id.0.cast_signed() == CHANNEL_BOT_ID => Sender {
            id: msg.chat.id.0,
            name: chat_title(&msg.chat),
            kind: SenderKind::Channel,
        },
        Some(user) => Sender::user(user.id.0.cast_signed(), user.first_name.clone()),
        None => Sender {
            id: msg.chat.id.0,
            name: chat_title(&msg.chat),
            kind: if msg.chat.is_channel() {
                SenderKind::Channel
            } else {
                SenderKind::User
            },
        },
    }
}

/// Substrings of URL and text-link entities in the text or caption, in
/// message order.
#[must_use]
pub fn url_entities(msg: &Message) -> Vec<String> {
    msg.parse_entities()
        .into_iter()
        .chain(msg.parse_caption_entities())
        .flatten()
        .filter(|entity| {
            matches!(
                entity.kind(),
                MessageEntityKind::Url | MessageEntityKind::TextLink { .. }
            )
        })
        .map(|entity| entity.text().to_string())
        .collect()
}

/// Title of the channel a message was forwarded from.
#[must_use]
pub fn forwarded_channel_title(msg: &Message) -> Option<String> {
    match msg.forward_origin()? {
        MessageOrigin::Channel { chat, .. } => Some(chat_title(chat)),
        _ => None,
    }
}

/// Whether the message should go through repost detection: group content
/// with a photo or a URL, not forwarded unless it comes from a channel.
#[must_use]
pub fn is_repost_candidate(msg: &Message) -> bool {
    if msg.chat.is_private() {
        return false;
    }
    let has_content = msg.photo().is_some() || !url_entities(msg).is_empty();
    let from_channel = msg
        .sender_chat
        .as_ref()
        .is_some_and(Chat::is_channel)
        || forwarded_channel_title(msg).is_some();
    has_content && (msg.forward_origin().is_none() || from_channel)
}

/// Builds the platform-neutral view of a message.
#[must_use]
pub fn to_inbound(msg: &Message) -> InboundMessage {
    InboundMessage {
        chat_id: GroupId(msg.chat.id.0),
        chat_kind: chat_kind(&msg.chat),
        message_id: MessageId(msg.id.0),
        sender: sender_of(msg),
        text: msg.text().or_else(|| msg.caption()).map(ToString::to_string),
        content: MessageContent {
            photo_file_id: msg
                .photo()
                .and_then(|sizes| sizes.last())
                .map(|size| size.file.id.0.clone()),
            urls: url_entities(msg),
        },
        forwarded_from_channel: forwarded_channel_title(msg),
        reply_to: msg
            .reply_to_message()
            .map(|reply| Box::new(to_inbound(reply))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Message {
        match serde_json::from_value(value) {
            Ok(msg) => msg,
            Err(e) => panic!("invalid test message: {e}"),
        }
    }

    fn group() -> serde_json::Value {
        json!({"id": -100_123, "type": "supergroup", "title": "Memes"})
    }

    #[test]
    fn test_text_urls_become_content() {
        let msg = parse(json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": group(),
            "from": {"id": 7, "is_bot": false, "first_name": "Alice"},
            "text": "see https://x.com and docs",
            "entities": [
                {"type": "url", "offset": 4, "length": 13},
                {"type": "text_link", "offset": 22, "length": 4, "url": "https://docs.example"}
            ]
        }));

        let inbound = to_inbound(&msg);

        assert_eq!(inbound.chat_id, GroupId(-100_123));
        assert_eq!(inbound.chat_kind, ChatKind::Group);
        assert_eq!(inbound.message_id, MessageId(10));
        assert_eq!(inbound.sender, Sender::user(7, "Alice"));
        assert_eq!(inbound.content.urls, vec!["https://x.com", "docs"]);
        assert!(is_repost_candidate(&msg));
    }

    #[test]
    fn test_largest_photo_is_used() {
        let msg = parse(json!({
            "message_id": 11,
            "date": 1_700_000_000,
            "chat": group(),
            "from": {"id": 7, "is_bot": false, "first_name": "Alice"},
            "photo": [
                {"file_id": "small", "file_unique_id": "s", "width": 90, "height": 90},
                {"file_id": "large", "file_unique_id": "l", "width": 1280, "height": 1280}
            ],
            "caption": "look"
        }));

        let inbound = to_inbound(&msg);

        assert_eq!(inbound.content.photo_file_id.as_deref(), Some("large"));
        assert_eq!(inbound.text.as_deref(), Some("look"));
        assert!(is_repost_candidate(&msg));
    }

    #[test]
    fn test_anonymous_admin_is_detected() {
        let msg = parse(json!({
            "message_id": 12,
            "date": 1_700_000_000,
            "chat": group(),
            "from": {"id": ANONYMOUS_ADMIN_ID, "is_bot": true, "first_name": "Group"},
            "sender_chat": group(),
            "text": "/reset"
        }));

        let sender = sender_of(&msg);

        assert_eq!(sender.kind, SenderKind::AnonymousAdmin);
        assert_eq!(sender.id, -100_123);
    }

    #[test]
    fn test_private_and_plain_text_are_skipped() {
        let private = parse(json!({
            "message_id": 1,
            "date": 1_700_000_000,
            "chat": {"id": 7, "type": "private", "first_name": "Alice"},
            "from": {"id": 7, "is_bot": false, "first_name": "Alice"},
            "text": "https://x.com",
            "entities": [{"type": "url", "offset": 0, "length": 13}]
        }));
        let plain = parse(json!({
            "message_id": 2,
            "date": 1_700_000_000,
            "chat": group(),
            "from": {"id": 7, "is_bot": false, "first_name": "Alice"},
            "text": "no links here"
        }));

        assert!(!is_repost_candidate(&private));
        assert!(!is_repost_candidate(&plain));
        assert_eq!(to_inbound(&private).chat_kind, ChatKind::Private);
    }
}
