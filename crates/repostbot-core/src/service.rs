//! Message and command handling.
//!
//! [`RepostService`] ties extraction, dedup, callouts, auto-delete and the
//! group commands together. It only talks to the platform through
//! [`ChatGateway`].

use crate::callout::CalloutStrategy;
use crate::config::{RepostSettings, SettingsError};
use crate::dedup::{reposts_only, DedupEngine};
use crate::flood::FloodGovernor;
use crate::gateway::{
    ChatGateway, GatewayError, InboundMessage, OutboundMessage, ReplyKeyboard, SenderKind,
};
use crate::group::{deletion_candidates, GroupId, RepostMap, WhitelistStatus};
use crate::keys::{ContentFetchError, ContentKey, ContentKeyExtractor};
use crate::reset::ResetConversations;
use crate::state_store::GroupStateStore;
use crate::storage::StorageError;
use crate::strings::{fill, BotStrings};
use crate::toggles::Toggle;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Flood key of the automatic callout.
pub const CALLOUT_ACTION: &str = "call_out_reposts";

/// Errors surfaced by service handlers
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Group record could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// Platform call failed
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
    /// Message content could not be fetched or hashed
    #[error("Content error: {0}")]
    Fetch(#[from] ContentFetchError),
}

/// Repost bot behaviour behind a platform transport
pub struct RepostService {
    gateway: Arc<dyn ChatGateway>,
    extractor: ContentKeyExtractor,
    states: Arc<GroupStateStore>,
    engine: DedupEngine,
    flood: FloodGovernor,
    strategy: CalloutStrategy,
    strings: BotStrings,
    resets: ResetConversations,
    bot_admin_id: Option<i64>,
    flood_window: Duration,
}

impl RepostService {
    /// Builds the service from validated settings and loaded strings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the callout style is unknown or `strings`
    /// lacks text the style needs.
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        states: Arc<GroupStateStore>,
        settings: &RepostSettings,
        strings: BotStrings,
    ) -> Result<Self, SettingsError> {
        let strategy = settings.callout_strategy()?;
        strings.validate_for(strategy)?;
        Ok(Self {
            gateway,
            extractor: ContentKeyExtractor::new(settings.hash_size),
            engine: DedupEngine::new(states.clone()),
            states,
            flood: FloodGovernor::default(),
            strategy,
            strings,
            resets: ResetConversations::new(settings.reset_timeout()),
            bot_admin_id: settings.bot_admin_id,
            flood_window: settings.flood_window(),
        })
    }

    /// Replaces the flood governor, e.g. with one on a manual clock.
    #[must_use]
    pub fn with_flood_governor(mut self, flood: FloodGovernor) -> Self {
        self.flood = flood;
        self
    }

    /// Group state store used by the service.
    #[must_use]
    pub fn states(&self) -> &Arc<GroupStateStore> {
        &self.states
    }

    /// Message strings.
    #[must_use]
    pub const fn strings(&self) -> &BotStrings {
        &self.strings
    }

    fn allow(&self, msg: &InboundMessage, action: &str) -> bool {
        self.flood.allow(msg.sender.id, action, self.flood_window)
    }

    async fn reply(&self, msg: &InboundMessage, text: impl Into<String>) -> Result<(), GatewayError> {
        self.gateway
            .send(msg.chat_id, OutboundMessage::reply(text, msg.message_id))
            .await
    }

    /// Records the message's content and reacts to reposts according to the
    /// group's toggles. A picture that cannot be fetched is skipped; its URLs
    /// are still processed.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on storage failures or failed callout sends.
    pub async fn check_message(&self, msg: &InboundMessage) -> Result<(), ServiceError> {
        if msg.is_private() || msg.content.is_empty() {
            return Ok(());
        }
        let chat = msg.chat_id;
        let toggles = self.states.toggles(chat).await?;

        let mut keys: Vec<ContentKey> = Vec::new();
        if toggles.picture {
            match self
                .extractor
                .picture_key(self.gateway.as_ref(), &msg.content)
                .await
            {
                Ok(picture) => keys.extend(picture),
                Err(e) => warn!(
                    group_id = %chat,
                    message_id = %msg.message_id,
                    "Skipping picture: {e}"
                ),
            }
        }
        if toggles.url {
            keys.extend(ContentKeyExtractor::url_keys(&msg.content));
        }
        if keys.is_empty() {
            return Ok(());
        }

        let reposts = reposts_only(self.engine.process(chat, msg.message_id, &keys).await?);
        if reposts.is_empty() {
            return Ok(());
        }
        info!(group_id = %chat, message_id = %msg.message_id, keys = reposts.len(), "Repost detected");

        if toggles.autocallout {
            self.call_out(msg, &reposts).await?;
        }
        if toggles.autodelete {
            self.delete_reposts(chat, &reposts).await?;
        }
        Ok(())
    }

    async fn call_out(&self, msg: &InboundMessage, reposts: &RepostMap) -> Result<(), ServiceError> {
        if !self.allow(msg, CALLOUT_ACTION) {
            return Ok(());
        }
        let messages = {
            let mut rng = rand::thread_rng();
            self.strategy.callout(
                reposts,
                msg.callout_name(),
                msg.message_id,
                &self.strings,
                &mut rng,
            )
        };
        for message in messages {
            if let Err(e) = self.gateway.send_typing(msg.chat_id).await {
                debug!("Typing indicator failed: {e}");
            }
            self.gateway.send(msg.chat_id, message).await?;
        }
        Ok(())
    }

    /// Deletes every later occurrence not deleted before. Failures are logged
    /// and leave the message out of the ledger.
    async fn delete_reposts(&self, chat: GroupId, reposts: &RepostMap) -> Result<(), ServiceError> {
        let deleted = self.states.deleted(chat).await?;
        let mut newly_deleted = Vec::new();
        for message_id in deletion_candidates(reposts, &deleted) {
            match self.gateway.delete_message(chat, message_id).await {
                Ok(()) => newly_deleted.push(message_id),
                Err(e) => error!(
                    group_id = %chat,
                    message_id = %message_id,
                    "Failed to delete repost: {e}"
                ),
            }
        }
        self.states.mark_deleted(chat, newly_deleted).await?;
        Ok(())
    }

    /// `/toggle <names...>`: flips the named toggles and lists their new
    /// values.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on storage or send failures.
    pub async fn toggle(&self, msg: &InboundMessage, args: &str) -> Result<(), ServiceError> {
        if msg.is_private() {
            self.reply(msg, &self.strings.private_chat_toggle).await?;
            return Ok(());
        }
        if !self.allow(msg, "toggle") {
            return Ok(());
        }
        let requested: Vec<Toggle> = args.split_whitespace().filter_map(Toggle::from_arg).collect();
        let flipped = self.states.flip_toggles(msg.chat_id, &requested).await?;
        if flipped.is_empty() {
            return Ok(());
        }
        let lines: Vec<String> = flipped
            .into_iter()
            .map(|(toggle, value)| self.strings.toggle_line(toggle, value))
            .collect();
        self.reply(msg, lines.join("\n")).await?;
        Ok(())
    }

    /// `/settings`: lists all four toggles.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on storage or send failures.
    pub async fn settings(&self, msg: &InboundMessage) -> Result<(), ServiceError> {
        if msg.is_private() || !self.allow(msg, "settings") {
            return Ok(());
        }
        let toggles = self.states.toggles(msg.chat_id).await?;
        let mut lines = vec![self.strings.settings_command_response.clone()];
        lines.extend(
            Toggle::ALL
                .into_iter()
                .map(|toggle| self.strings.toggle_line(toggle, toggles.get(toggle))),
        );
        self.reply(msg, lines.join("\n")).await?;
        Ok(())
    }

    /// `/whitelist` as a reply: flips whitelist membership of every key of
    /// the replied-to message, whatever the tracking toggles say.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the replied-to content cannot be fetched,
    /// or on storage or send failures.
    pub async fn whitelist(&self, msg: &InboundMessage) -> Result<(), ServiceError> {
        if msg.is_private() || !self.allow(msg, "whitelist") {
            return Ok(());
        }
        let Some(target) = msg.reply_to.as_deref() else {
            self.reply(msg, &self.strings.invalid_whitelist_reply).await?;
            return Ok(());
        };
        let keys = self
            .extractor
            .extract_all(self.gateway.as_ref(), &target.content)
            .await?
            .all();
        let status = self.states.toggle_whitelist(msg.chat_id, &keys).await?;
        info!(group_id = %msg.chat_id, ?status, "Whitelist toggled");
        let response = match status {
            WhitelistStatus::Success => &self.strings.successful_whitelist_reply,
            WhitelistStatus::AlreadyExists => &self.strings.removed_from_whitelist,
            WhitelistStatus::AddedAndRemoved => &self.strings.added_and_removed_whitelist_reply,
            WhitelistStatus::Fail => &self.strings.invalid_whitelist_reply,
        };
        self.reply(msg, response).await?;
        Ok(())
    }

    /// `/stats`: unique keys and repost totals per content kind.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on storage or send failures.
    pub async fn stats(&self, msg: &InboundMessage) -> Result<(), ServiceError> {
        if msg.is_private() || !self.allow(msg, "stats") {
            return Ok(());
        }
        let stats = self.states.stats(msg.chat_id).await?;
        let text = fill(
            &self.strings.stats_command_reply,
            &[
                ("num_unique_images", &stats.unique_images),
                ("num_image_reposts", &stats.image_reposts),
                ("num_unique_urls", &stats.unique_urls),
                ("num_url_reposts", &stats.url_reposts),
            ],
        );
        self.reply(msg, text).await?;
        Ok(())
    }

    async fn may_reset(&self, msg: &InboundMessage) -> Result<bool, GatewayError> {
        if self.bot_admin_id == Some(msg.sender.id) || msg.sender.kind == SenderKind::AnonymousAdmin {
            return Ok(true);
        }
        self.gateway.is_group_admin(msg.chat_id, msg.sender.id).await
    }

    /// `/reset`: asks an admin for confirmation; refuses anyone else.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the admin lookup or a send fails.
    pub async fn reset(&self, msg: &InboundMessage) -> Result<(), ServiceError> {
        if msg.is_private() || !self.allow(msg, "reset") {
            return Ok(());
        }
        if !self.may_reset(msg).await? {
            self.reply(msg, &self.strings.group_repost_reset_admin_only)
                .await?;
            return Ok(());
        }
        self.resets.begin(msg.chat_id, msg.sender.id);
        let prompt = OutboundMessage::reply(
            &self.strings.group_repost_reset_initial_prompt,
            msg.message_id,
        )
        .with_keyboard(ReplyKeyboard::Choices(vec![
            self.strings.group_reset_yes.clone(),
            self.strings.group_reset_no.clone(),
        ]));
        self.gateway.send(msg.chat_id, prompt).await?;
        Ok(())
    }

    /// Answers an open reset prompt. Returns `false` when the sender has no
    /// prompt open, leaving the message to other handlers.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` on storage or send failures.
    pub async fn reset_reply(&self, msg: &InboundMessage) -> Result<bool, ServiceError> {
        let Some(answer) = msg.text.as_deref() else {
            return Ok(false);
        };
        if !self.resets.finish(msg.chat_id, msg.sender.id) {
            return Ok(false);
        }
        let text = if self.strings.is_affirmative(answer) {
            self.states.reset(msg.chat_id).await?;
            &self.strings.group_repost_data_reset
        } else {
            info!(group_id = %msg.chat_id, "Reset cancelled");
            &self.strings.group_repost_reset_cancel
        };
        let reply = OutboundMessage::reply(text, msg.message_id).with_keyboard(ReplyKeyboard::Remove);
        self.gateway.send(msg.chat_id, reply).await?;
        Ok(true)
    }

    /// `/help`: introduces the bot by `bot_name`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the send fails.
    pub async fn help(&self, msg: &InboundMessage, bot_name: &str) -> Result<(), ServiceError> {
        if !self.allow(msg, "help") {
            return Ok(());
        }
        let text = fill(&self.strings.help_command, &[("name", &bot_name)]);
        self.reply(msg, text).await?;
        Ok(())
    }

    /// `/userid`: tells the sender their id. Private chats only.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the send fails.
    pub async fn userid(&self, msg: &InboundMessage) -> Result<(), ServiceError> {
        if !msg.is_private() {
            return Ok(());
        }
        self.reply(msg, msg.sender.id.to_string()).await?;
        Ok(())
    }

    /// Notice for content sent in a private chat.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the send fails.
    pub async fn private_notice(&self, msg: &InboundMessage) -> Result<(), ServiceError> {
        self.reply(msg, &self.strings.private_chat).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ChatKind, MockChatGateway, Sender};
    use crate::group::MessageId;
    use crate::keys::MessageContent;
    use crate::storage::MemoryGroupStore;
    use crate::toggles::ToggleSet;

    fn group_message(id: i32, urls: &[&str]) -> InboundMessage {
        InboundMessage {
            chat_id: GroupId(42),
            chat_kind: ChatKind::Group,
            message_id: MessageId(id),
            sender: Sender::user(7, "Alice"),
            text: Some(urls.join(" ")),
            content: MessageContent {
                photo_file_id: None,
                urls: urls.iter().map(ToString::to_string).collect(),
            },
            forwarded_from_channel: None,
            reply_to: None,
        }
    }

    fn service(gateway: MockChatGateway, defaults: ToggleSet) -> RepostService {
        let states = Arc::new(GroupStateStore::new(
            Arc::new(MemoryGroupStore::new()),
            defaults,
        ));
        match RepostService::new(
            Arc::new(gateway),
            states,
            &RepostSettings::default(),
            BotStrings::default(),
        ) {
            Ok(service) => service,
            Err(e) => panic!("default settings rejected: {e}"),
        }
    }

    #[tokio::test]
    async fn test_auto_delete_failure_is_not_recorded() -> Result<(), ServiceError> {
        let mut gateway = MockChatGateway::new();
        gateway
            .expect_delete_message()
            .times(1)
            .returning(|_, _| Err(GatewayError::Forbidden("not enough rights".to_string())));
        let defaults = ToggleSet {
            autocallout: false,
            autodelete: true,
            ..ToggleSet::default()
        };
        let service = service(gateway, defaults);

        service.check_message(&group_message(1, &["http://x.com"])).await?;
        service.check_message(&group_message(2, &["http://x.com"])).await?;

        assert!(service.states().deleted(GroupId(42)).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_picture_fetch_failure_keeps_urls() -> Result<(), ServiceError> {
        let mut gateway = MockChatGateway::new();
        gateway
            .expect_fetch_file()
            .returning(|_| Err(GatewayError::Request("timeout".to_string())));
        let service = service(gateway, ToggleSet::default());
        let mut msg = group_message(1, &["http://x.com"]);
        msg.content.photo_file_id = Some("photo".to_string());

        service.check_message(&msg).await?;

        let state = service.states().snapshot(GroupId(42)).await?;
        assert_eq!(state.reposts.len(), 1);
        assert!(state.history(&ContentKey::url("http://x.com")).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_non_admin_reset_is_refused() -> Result<(), ServiceError> {
        let mut gateway = MockChatGateway::new();
        gateway.expect_is_group_admin().returning(|_, _| Ok(false));
        gateway
            .expect_send()
            .withf(|_, message| message.text == BotStrings::default().group_repost_reset_admin_only)
            .times(1)
            .returning(|_, _| Ok(()));
        let service = service(gateway, ToggleSet::default());

        service.reset(&group_message(3, &[])).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_private_chat_ignores_content() -> Result<(), ServiceError> {
        let mut gateway = MockChatGateway::new();
        gateway.expect_send().never();
        let service = service(gateway, ToggleSet::default());
        let mut msg = group_message(1, &["http://x.com"]);
        msg.chat_kind = ChatKind::Private;

        service.check_message(&msg).await?;
        service.stats(&msg).await?;

        assert!(service.states().snapshot(GroupId(42)).await?.reposts.is_empty());
        Ok(())
    }
}
