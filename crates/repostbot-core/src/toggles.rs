//! Tracking and automation toggles.
//!
//! Groups persist a (possibly partial) [`Toggles`] record; lookups always
//! resolve against the process-wide [`ToggleSet`] defaults so they never fail.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named boolean group setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    /// Track picture reposts
    Picture,
    /// Track URL reposts
    Url,
    /// Call out reposts automatically
    AutoCallout,
    /// Delete reposts automatically
    AutoDelete,
}

impl Toggle {
    /// Every toggle, in display order.
    pub const ALL: [Self; 4] = [Self::Picture, Self::Url, Self::AutoCallout, Self::AutoDelete];

    /// Command argument naming this toggle.
    #[must_use]
    pub const fn arg(self) -> &'static str {
        match self {
            Self::Picture => "picture",
            Self::Url => "url",
            Self::AutoCallout => "autocallout",
            Self::AutoDelete => "autodelete",
        }
    }

    /// Parses a command argument (case-insensitive).
    #[must_use]
    pub fn from_arg(arg: &str) -> Option<Self> {
        let arg = arg.trim().to_lowercase();
        Self::ALL.into_iter().find(|toggle| toggle.arg() == arg)
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.arg())
    }
}

/// A complete set of toggle values. Used for the configured defaults and for
/// resolved per-group values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleSet {
    /// Track picture reposts
    #[serde(default = "enabled")]
    pub picture: bool,
    /// Track URL reposts
    #[serde(default = "enabled")]
    pub url: bool,
    /// Call out reposts automatically
    #[serde(default = "enabled")]
    pub autocallout: bool,
    /// Delete reposts automatically
    #[serde(default)]
    pub autodelete: bool,
}

const fn enabled() -> bool {
    true
}

impl Default for ToggleSet {
    fn default() -> Self {
        Self {
            picture: true,
            url: true,
            autocallout: true,
            autodelete: false,
        }
    }
}

impl ToggleSet {
    /// Value of a single toggle.
    #[must_use]
    pub const fn get(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::Picture => self.picture,
            Toggle::Url => self.url,
            Toggle::AutoCallout => self.autocallout,
            Toggle::AutoDelete => self.autodelete,
        }
    }
}

/// Persisted per-group toggles. Unset entries fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggles {
    /// Track picture reposts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<bool>,
    /// Track URL reposts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<bool>,
    /// Call out reposts automatically
    #[serde(default, alias = "auto_callout", skip_serializing_if = "Option::is_none")]
    pub autocallout: Option<bool>,
    /// Delete reposts automatically
    #[serde(default, alias = "auto_delete", skip_serializing_if = "Option::is_none")]
    pub autodelete: Option<bool>,
}

impl Toggles {
    /// Explicitly stored value of a toggle, if any.
    #[must_use]
    pub const fn get(&self, toggle: Toggle) -> Option<bool> {
        match toggle {
            Toggle::Picture => self.picture,
            Toggle::Url => self.url,
            Toggle::AutoCallout => self.autocallout,
            Toggle::AutoDelete => self.autodelete,
        }
    }

    /// Stores a toggle value.
    pub fn set(&mut self, toggle: Toggle, value: bool) {
        let slot = match toggle {
            Toggle::Picture => &mut self.picture,
            Toggle::Url => &mut self.url,
            Toggle::AutoCallout => &mut self.autocallout,
            Toggle::AutoDelete => &mut self.autodelete,
        };
        *slot = Some(value);
    }

    /// Returns `self` overlaid with every value set in `update`.
    #[must_use]
    pub fn merged(&self, update: &Self) -> Self {
        Self {
            picture: update.picture.or(self.picture),
            url: update.url.or(self.url),
            autocallout: update.autocallout.or(self.autocallout),
            autodelete: update.autodelete.or(self.autodelete),
        }
    }

    /// Resolves every toggle against `defaults`.
    #[must_use]
    pub fn resolve(&self, defaults: &ToggleSet) -> ToggleSet {
        ToggleSet {
            picture: self.picture.unwrap_or(defaults.picture),
            url: self.url.unwrap_or(defaults.url),
            autocallout: self.autocallout.unwrap_or(defaults.autocallout),
            autodelete: self.autodelete.unwrap_or(defaults.autodelete),
        }
    }
}

impl From<ToggleSet> for Toggles {
    fn from(set: ToggleSet) -> Self {
        Self {
            picture: Some(set.picture),
            url: Some(set.url),
            autocallout: Some(set.autocallout),
            autodelete: Some(set.autodelete),
        }
    }
}
