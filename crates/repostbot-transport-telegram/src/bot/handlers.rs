//! Dispatcher endpoints for commands and messages.

use crate::bot::inbound::{is_repost_candidate, to_inbound};
use anyhow::Result;
use repostbot_core::service::RepostService;
use std::sync::Arc;
use teloxide::{prelude::*, types::Me, utils::command::BotCommands};
use tracing::debug;

/// Bot commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Flip repost-tracking toggles
    #[command(description = "Toggle picture, url, autocallout or autodelete.")]
    Toggle(String),
    /// Show the group's toggles
    #[command(description = "Show current settings.")]
    Settings,
    /// Whitelist the content of the replied-to message
    #[command(description = "Reply to a message to (un)whitelist its content.")]
    Whitelist,
    /// Clear the group's repost history
    #[command(description = "Reset repost history (admins only).")]
    Reset,
    /// Show repost counts
    #[command(description = "Show repost statistics.")]
    Stats,
    /// Show the help text
    #[command(description = "Show help.")]
    Help,
    /// Show the sender's user id
    #[command(description = "Show your user id (private chat).")]
    Userid,
}

/// Runs a parsed command.
///
/// # Errors
///
/// Returns an error if the command fails on storage or the Telegram API.
pub async fn command(service: Arc<RepostService>, me: Me, msg: Message, cmd: Command) -> Result<()> {
    let inbound = to_inbound(&msg);
    debug!(chat = %inbound.chat_id, command = ?cmd, "Command received");
    match cmd {
        Command::Toggle(args) => service.toggle(&inbound, &args).await?,
        Command::Settings => service.settings(&inbound).await?,
        Command::Whitelist => service.whitelist(&inbound).await?,
        Command::Reset => service.reset(&inbound).await?,
        Command::Stats => service.stats(&inbound).await?,
        Command::Help => service.help(&inbound, &me.user.first_name).await?,
        Command::Userid => service.userid(&inbound).await?,
    }
    Ok(())
}

/// Handles a non-command message: a pending reset answer first, then repost
/// detection.
///
/// # Errors
///
/// Returns an error if processing fails on storage or the Telegram API.
pub async fn message(service: Arc<RepostService>, msg: Message) -> Result<()> {
    let inbound = to_inbound(&msg);
    if service.reset_reply(&inbound).await? {
        return Ok(());
    }
    if inbound.is_private() {
        if !inbound.content.is_empty() {
            service.private_notice(&inbound).await?;
        }
        return Ok(());
    }
    if is_repost_candidate(&msg) {
        service.check_message(&inbound).await?;
    }
    Ok(())
}
