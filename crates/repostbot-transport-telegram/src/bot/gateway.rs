//! [`ChatGateway`] over the Telegram Bot API.

use crate::bot::admin_cache::AdminCache;
use crate::bot::resilient::{retry_request, retry_telegram_operation};
use async_trait::async_trait;
use repostbot_core::gateway::{ChatGateway, GatewayError, OutboundMessage, ReplyKeyboard};
use repostbot_core::{GroupId, MessageId};
use std::collections::HashSet;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, FileId, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup,
    ReplyParameters,
};
use teloxide::{ApiError, RequestError};
use tracing::debug;

/// Outbound Telegram calls with retry and a cached admin lookup
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
    admins: AdminCache,
}

impl TelegramGateway {
    /// Gateway sending through `bot`.
    #[must_use]
    pub const fn new(bot: Bot, admins: AdminCache) -> Self {
        Self { bot, admins }
    }

    async fn load_admins(&self, chat: GroupId) -> Result<HashSet<i64>, GatewayError> {
        let members = retry_request(|| self.bot.get_chat_administrators(ChatId(chat.0)).send())
            .await
            .map_err(map_request_error)?;
        Ok(members
            .into_iter()
            .map(|member| member.user.id.0.cast_signed())
            .collect())
    }
}

/// Classifies a Telegram error for the engine.
#[must_use]
pub fn map_request_error(error: RequestError) -> GatewayError {
    match &error {
        RequestError::Api(ApiError::MessageToDeleteNotFound | ApiError::ChatNotFound) => {
            GatewayError::NotFound(error.to_string())
        }
        RequestError::Api(
            ApiError::MessageCantBeDeleted | ApiError::BotKicked | ApiError::BotBlocked,
        ) => GatewayError::Forbidden(error.to_string()),
        _ => GatewayError::Request(error.to_string()),
    }
}

/// Telegram markup for a reply keyboard. Both forms are selective, so only
/// the addressed user sees them.
#[must_use]
pub fn reply_markup(keyboard: &ReplyKeyboard) -> ReplyMarkup {
    match keyboard {
        ReplyKeyboard::Choices(choices) => {
            let row = choices.iter().map(KeyboardButton::new).collect::<Vec<_>>();
            ReplyMarkup::Keyboard(
                KeyboardMarkup::new(vec![row])
                    .one_time_keyboard()
                    .resize_keyboard()
                    .selective(),
            )
        }
        ReplyKeyboard::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new().selective()),
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, GatewayError> {
        retry_telegram_operation(|| async {
            let file = self.bot.get_file(FileId(file_id.to_string())).await?;
            let mut buf = Vec::new();
            self.bot.download_file(&file.path, &mut buf).await?;
            Ok(buf)
        })
        .await
        .map_err(|e| GatewayError::Request(e.to_string()))
    }

    async fn send(&self, chat: GroupId, message: OutboundMessage) -> Result<(), GatewayError> {
        retry_request(|| {
            let mut request = self.bot.send_message(ChatId(chat.0), message.text.clone());
            if let Some(MessageId(id)) = message.reply_to {
                request = request.reply_parameters(
                    ReplyParameters::new(teloxide::types::MessageId(id))
                        .allow_sending_without_reply(),
                );
            }
            if let Some(keyboard) = &message.keyboard {
                request = request.reply_markup(reply_markup(keyboard));
            }
            async move { request.await.map(|_| ()) }
        })
        .await
        .map_err(map_request_error)
    }

    async fn send_typing(&self, chat: GroupId) -> Result<(), GatewayError> {
        retry_request(|| {
            self.bot
                .send_chat_action(ChatId(chat.0), ChatAction::Typing)
                .send()
        })
        .await
        .map(|_| ())
        .map_err(map_request_error)
    }

    async fn delete_message(
        &self,
        chat: GroupId,
        message_id: MessageId,
    ) -> Result<(), GatewayError> {
        retry_request(|| {
            self.bot
                .delete_message(ChatId(chat.0), teloxide::types::MessageId(message_id.0))
                .send()
        })
        .await
        .map(|_| ())
        .map_err(map_request_error)
    }

    async fn is_group_admin(&self, chat: GroupId, user_id: i64) -> Result<bool, GatewayError> {
        let result = self
            .admins
            .is_admin(chat, user_id, || self.load_admins(chat))
            .await;
        debug!(chat = %chat, user_id, ?result, "Admin check");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            map_request_error(RequestError::Api(ApiError::MessageToDeleteNotFound)),
            GatewayError::NotFound(_)
        ));
        assert!(matches!(
            map_request_error(RequestError::Api(ApiError::MessageCantBeDeleted)),
            GatewayError::Forbidden(_)
        ));
        assert!(matches!(
            map_request_error(RequestError::Io(Arc::new(std::io::Error::other("reset")))),
            GatewayError::Request(_)
        ));
    }

    #[test]
    fn test_choice_keyboard_is_selective_one_time() {
        let markup = reply_markup(&ReplyKeyboard::Choices(vec![
            "Yes".to_string(),
            "No".to_string(),
        ]));
        let ReplyMarkup::Keyboard(keyboard) = markup else {
            panic!("expected a keyboard");
        };
        assert!(keyboard.one_time_keyboard);
        assert!(keyboard.selective);
        assert_eq!(keyboard.keyboard.len(), 1);
        assert_eq!(keyboard.keyboard[0][1].text, "No");
    }

    #[test]
    fn test_remove_keyboard_is_selective() {
        let ReplyMarkup::KeyboardRemove(remove) = reply_markup(&ReplyKeyboard::Remove) else {
            panic!("expected keyboard removal");
        };
        assert!(remove.selective);
    }
}
