#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use repostbot_core::config::RepostSettings;
use repostbot_core::gateway::{
    ChatGateway, ChatKind, GatewayError, InboundMessage, OutboundMessage, Sender,
};
use repostbot_core::keys::MessageContent;
use repostbot_core::service::RepostService;
use repostbot_core::state_store::GroupStateStore;
use repostbot_core::storage::MemoryGroupStore;
use repostbot_core::strings::BotStrings;
use repostbot_core::{GroupId, MessageId};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

pub const GROUP: GroupId = GroupId(42);
pub const ALICE: i64 = 7;
pub const ADMIN: i64 = 99;

/// Gateway double that records every outbound call
#[derive(Default)]
pub struct RecordingGateway {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub admins: Mutex<HashSet<i64>>,
    pub undeletable: Mutex<HashSet<MessageId>>,
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub deleted: Mutex<Vec<MessageId>>,
}

impl RecordingGateway {
    pub fn add_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.files
            .lock()
            .expect("files lock")
            .insert(file_id.to_string(), bytes);
    }

    pub fn add_admin(&self, user_id: i64) {
        self.admins.lock().expect("admins lock").insert(user_id);
    }

    pub fn refuse_delete(&self, message_id: MessageId) {
        self.undeletable
            .lock()
            .expect("undeletable lock")
            .insert(message_id);
    }

    /// Drains the messages sent so far.
    pub fn take_sent(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock().expect("sent lock"))
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().expect("deleted lock").clone()
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, GatewayError> {
        self.files
            .lock()
            .expect("files lock")
            .get(file_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(file_id.to_string()))
    }

    async fn send(&self, _chat: GroupId, message: OutboundMessage) -> Result<(), GatewayError> {
        self.sent.lock().expect("sent lock").push(message);
        Ok(())
    }

    async fn send_typing(&self, _chat: GroupId) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn delete_message(
        &self,
        _chat: GroupId,
        message_id: MessageId,
    ) -> Result<(), GatewayError> {
        if self
            .undeletable
            .lock()
            .expect("undeletable lock")
            .contains(&message_id)
        {
            return Err(GatewayError::Forbidden("message can't be deleted".to_string()));
        }
        self.deleted.lock().expect("deleted lock").push(message_id);
        Ok(())
    }

    async fn is_group_admin(&self, _chat: GroupId, user_id: i64) -> Result<bool, GatewayError> {
        Ok(self.admins.lock().expect("admins lock").contains(&user_id))
    }
}

pub struct Harness {
    pub gateway: Arc<RecordingGateway>,
    pub service: RepostService,
}

pub fn harness(settings: RepostSettings) -> Harness {
    let gateway = Arc::new(RecordingGateway::default());
    let states = Arc::new(GroupStateStore::new(
        Arc::new(MemoryGroupStore::new()),
        settings.default_toggles,
    ));
    let service = RepostService::new(gateway.clone(), states, &settings, BotStrings::default())
        .expect("valid settings");
    Harness { gateway, service }
}

pub fn message(id: i32, sender: i64) -> InboundMessage {
    InboundMessage {
        chat_id: GROUP,
        chat_kind: ChatKind::Group,
        message_id: MessageId(id),
        sender: Sender::user(sender, format!("user{sender}")),
        text: None,
        content: MessageContent::default(),
        forwarded_from_channel: None,
        reply_to: None,
    }
}

pub fn url_message(id: i32, sender: i64, url: &str) -> InboundMessage {
    let mut msg = message(id, sender);
    msg.text = Some(format!("look {url}"));
    msg.content.urls = vec![url.to_string()];
    msg
}

pub fn photo_message(id: i32, sender: i64, file_id: &str) -> InboundMessage {
    let mut msg = message(id, sender);
    msg.content.photo_file_id = Some(file_id.to_string());
    msg
}

pub fn text_message(id: i32, sender: i64, text: &str) -> InboundMessage {
    let mut msg = message(id, sender);
    msg.text = Some(text.to_string());
    msg
}

pub fn reply_to(mut msg: InboundMessage, target: InboundMessage) -> InboundMessage {
    msg.reply_to = Some(Box::new(target));
    msg
}

/// PNG bytes of a horizontal gradient.
pub fn gradient_png() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, _| {
        let v = u8::try_from(x * 4).unwrap_or(u8::MAX);
        image::Rgb([v, v, v])
    }));
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}
