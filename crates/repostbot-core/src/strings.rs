//! User-facing message strings.
//!
//! Built-in English strings can be overridden key by key from a YAML file.

use crate::callout::CalloutStrategy;
use crate::config::SettingsError;
use crate::toggles::Toggle;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::info;

/// Every text the bot may send
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct BotStrings {
    pub private_chat: String,
    pub private_chat_toggle: String,
    pub help_command: String,
    pub invalid_whitelist_reply: String,
    pub removed_from_whitelist: String,
    pub successful_whitelist_reply: String,
    pub added_and_removed_whitelist_reply: String,
    pub group_repost_reset_initial_prompt: String,
    pub group_repost_reset_admin_only: String,
    pub group_repost_reset_cancel: String,
    pub group_repost_data_reset: String,
    pub group_reset_yes: String,
    pub group_reset_no: String,
    pub group_reset_confirmation_responses: Vec<String>,
    pub stats_command_reply: String,
    pub settings_command_response: String,
    pub settings_track_pictures: String,
    pub settings_track_urls: String,
    pub settings_auto_callout: String,
    pub settings_auto_delete: String,
    pub enabled: String,
    pub disabled: String,
    pub repost_alert: String,
    pub first_repost_callout: String,
    pub intermediary_callouts: Vec<String>,
    pub final_repost_callout: String,
    pub single_callout_one_repost_options: Vec<String>,
    pub single_callout_x_num_reposts_options: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

impl Default for BotStrings {
    fn default() -> Self {
        Self {
            private_chat: "I don't care about reposts just between us. I only check in group chats. \
                           Add me to a group ya dingus"
                .to_string(),
            private_chat_toggle: "I don't track reposts in private chats.".to_string(),
            help_command: "I'm {name}. I analyze the pictures and URLs you send and call out reposts. \
                           I store the message id, and hashed versions of the URLs and pictures you \
                           send. GIFs and videos are not tracked."
                .to_string(),
            invalid_whitelist_reply:
                "Reply to a message containing a picture or URL you want whitelisted.".to_string(),
            removed_from_whitelist: "Removed that from the whitelist.".to_string(),
            successful_whitelist_reply: "I won't track reposts of that from now on.".to_string(),
            added_and_removed_whitelist_reply:
                "Some of that was whitelisted already, so I flipped each one.".to_string(),
            group_repost_reset_initial_prompt:
                "Are you sure you want to delete the group's repost data? This is irreversible."
                    .to_string(),
            group_repost_reset_admin_only: "Only admins can do this action.".to_string(),
            group_repost_reset_cancel: "I won't delete it then.".to_string(),
            group_repost_data_reset: "The group repost data has been reset.".to_string(),
            group_reset_yes: "Yes".to_string(),
            group_reset_no: "No".to_string(),
            group_reset_confirmation_responses: owned(&["yes", "y", "yeah", "yep", "sure"]),
            stats_command_reply: "Unique pictures: {num_unique_images}\n\
                                  Picture reposts: {num_image_reposts}\n\
                                  Unique URLs: {num_unique_urls}\n\
                                  URL reposts: {num_url_reposts}"
                .to_string(),
            settings_command_response: "Current settings:".to_string(),
            settings_track_pictures: "Track pictures".to_string(),
            settings_track_urls: "Track URLs".to_string(),
            settings_auto_callout: "Auto callout".to_string(),
            settings_auto_delete: "Auto delete".to_string(),
            enabled: "enabled".to_string(),
            disabled: "disabled".to_string(),
            repost_alert: "!!! REPOST ALERT! REPOST ALERT !!!".to_string(),
            first_repost_callout: "FIRST POSTED HERE".to_string(),
            intermediary_callouts: owned(&["AND THEN HERE", "AND HERE", "ALSO HERE", "HERE TOO"]),
            final_repost_callout:
                "REEEEEE ORIGINAL CONTENT PLEASE {name}!!!!!!!!!!!!!!!!! AAAAAAAAAAAA".to_string(),
            single_callout_one_repost_options: owned(&[
                "{name}, that's a repost.",
                "Seen it, {name}. That's a repost.",
            ]),
            single_callout_x_num_reposts_options: owned(&[
                "{name}, that's been posted {num} times before.",
                "{num} reposts, {name}. Impressive.",
            ]),
        }
    }
}

/// Replaces every `{key}` in `template` with its value.
#[must_use]
pub fn fill(template: &str, values: &[(&str, &dyn Display)]) -> String {
    values.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{key}}}"), &value.to_string())
    })
}

impl BotStrings {
    /// Built-in strings overlaid with the YAML file at `path`, if any.
    ///
    /// # Errors
    ///
    /// Returns a `SettingsError` if the file cannot be read or parsed.
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::StringsIo {
            path: path.to_string(),
            source,
        })?;
        let strings = Self::from_yaml(&raw).map_err(|source| SettingsError::StringsYaml {
            path: path.to_string(),
            source,
        })?;
        info!("Loaded message strings from {}", path);
        Ok(strings)
    }

    /// Parses a YAML override document; absent keys keep their built-in text.
    ///
    /// # Errors
    ///
    /// Returns the YAML error if the document is malformed.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Checks that every string `strategy` uses is non-empty.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::MissingString` naming the first empty string.
    pub fn validate_for(&self, strategy: CalloutStrategy) -> Result<(), SettingsError> {
        for &name in strategy.required_strings() {
            if !self.is_present(name) {
                return Err(SettingsError::MissingString {
                    name,
                    style: strategy.name(),
                });
            }
        }
        Ok(())
    }

    fn is_present(&self, name: &str) -> bool {
        let has_text = |s: &String| !s.trim().is_empty();
        let has_pool = |pool: &Vec<String>| pool.iter().any(has_text);
        match name {
            "repost_alert" => has_text(&self.repost_alert),
            "first_repost_callout" => has_text(&self.first_repost_callout),
            "final_repost_callout" => has_text(&self.final_repost_callout),
            "intermediary_callouts" => has_pool(&self.intermediary_callouts),
            "single_callout_one_repost_options" => has_pool(&self.single_callout_one_repost_options),
            "single_callout_x_num_reposts_options" => {
                has_pool(&self.single_callout_x_num_reposts_options)
            }
            _ => false,
        }
    }

    /// Display name of a toggle.
    #[must_use]
    pub fn toggle_name(&self, toggle: Toggle) -> &str {
        match toggle {
            Toggle::Picture => &self.settings_track_pictures,
            Toggle::Url => &self.settings_track_urls,
            Toggle::AutoCallout => &self.settings_auto_callout,
            Toggle::AutoDelete => &self.settings_auto_delete,
        }
    }

    /// `"<toggle name>: <enabled|disabled>"` line.
    #[must_use]
    pub fn toggle_line(&self, toggle: Toggle, value: bool) -> String {
        let state = if value { &self.enabled } else { &self.disabled };
        format!("{}: {state}", self.toggle_name(toggle))
    }

    /// Whether a reset answer confirms. Compares lowercase ASCII letters only.
    #[must_use]
    pub fn is_affirmative(&self, answer: &str) -> bool {
        let normalized: String = answer
            .to_lowercase()
            .chars()
            .filter(char::is_ascii_lowercase)
            .collect();
        self.group_reset_confirmation_responses
            .iter()
            .any(|accepted| *accepted == normalized)
    }
}
