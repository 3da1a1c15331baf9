//! Callout strategies.
//!
//! A strategy turns the repost histories found in one message into the
//! messages the bot sends. It is chosen once from configuration.

use crate::config::SettingsError;
use crate::gateway::OutboundMessage;
use crate::group::{MessageId, RepostMap};
use crate::strings::{fill, BotStrings};
use rand::seq::SliceRandom;
use rand::Rng;

/// How detected reposts are announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutStrategy {
    /// Alert, one reply per earlier post, then a final callout; per key
    Verbose,
    /// A single reply stating the total repost count
    Summary,
}

const VERBOSE_STRINGS: &[&str] = &[
    "repost_alert",
    "first_repost_callout",
    "final_repost_callout",
    "intermediary_callouts",
];

const SUMMARY_STRINGS: &[&str] = &[
    "single_callout_one_repost_options",
    "single_callout_x_num_reposts_options",
];

impl CalloutStrategy {
    /// Parses a configured style name. `singular` is accepted for `summary`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::UnknownCalloutStyle` for any other name.
    pub fn from_name(name: &str) -> Result<Self, SettingsError> {
        match name.trim().to_lowercase().as_str() {
            "verbose" => Ok(Self::Verbose),
            "summary" | "singular" => Ok(Self::Summary),
            _ => Err(SettingsError::UnknownCalloutStyle(name.to_string())),
        }
    }

    /// Canonical style name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Verbose => "verbose",
            Self::Summary => "summary",
        }
    }

    /// String keys this style reads.
    #[must_use]
    pub const fn required_strings(self) -> &'static [&'static str] {
        match self {
            Self::Verbose => VERBOSE_STRINGS,
            Self::Summary => SUMMARY_STRINGS,
        }
    }

    /// Builds the callout for `reposts`. Keys whose history holds a single
    /// message are ignored; an empty result means nothing to call out.
    pub fn callout<R: Rng + ?Sized>(
        self,
        reposts: &RepostMap,
        name: &str,
        current: MessageId,
        strings: &BotStrings,
        rng: &mut R,
    ) -> Vec<OutboundMessage> {
        match self {
            Self::Verbose => verbose(reposts, name, current, strings, rng),
            Self::Summary => summary(reposts, name, current, strings, rng)
                .into_iter()
                .collect(),
        }
    }
}

fn verbose<R: Rng + ?Sized>(
    reposts: &RepostMap,
    name: &str,
    current: MessageId,
    strings: &BotStrings,
    rng: &mut R,
) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    for history in reposts.values().filter(|history| history.len() > 1) {
        out.push(OutboundMessage::reply(&strings.repost_alert, current));
        let mut previous: Option<&str> = None;
        for (i, &prior) in history[..history.len() - 1].iter().enumerate() {
            let template = if i == 0 {
                strings.first_repost_callout.as_str()
            } else {
                pick_other(&strings.intermediary_callouts, previous, rng)
            };
            previous = Some(template);
            out.push(OutboundMessage::reply(fill(template, &[("name", &name)]), prior));
        }
        out.push(OutboundMessage::reply(
            fill(&strings.final_repost_callout, &[("name", &name)]),
            current,
        ));
    }
    out
}

fn summary<R: Rng + ?Sized>(
    reposts: &RepostMap,
    name: &str,
    current: MessageId,
    strings: &BotStrings,
    rng: &mut R,
) -> Option<OutboundMessage> {
    let num: usize = reposts
        .values()
        .map(|history| history.len().saturating_sub(1))
        .sum();
    if num == 0 {
        return None;
    }
    let pool = if num == 1 {
        &strings.single_callout_one_repost_options
    } else {
        &strings.single_callout_x_num_reposts_options
    };
    let template = pool.choose(rng)?;
    Some(OutboundMessage::reply(
        fill(template, &[("name", &name), ("num", &num)]),
        current,
    ))
}

/// Random pool entry other than `previous` when the pool allows it.
fn pick_other<'a, R: Rng + ?Sized>(
    pool: &'a [String],
    previous: Option<&str>,
    rng: &mut R,
) -> &'a str {
    let candidates: Vec<&String> = pool
        .iter()
        .filter(|entry| Some(entry.as_str()) != previous)
        .collect();
    if let Some(entry) = candidates.choose(rng) {
        return entry.as_str();
    }
    pool.choose(rng).map_or("", String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ContentKey;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids(raw: &[i32]) -> Vec<MessageId> {
        raw.iter().copied().map(MessageId).collect()
    }

    #[test]
    fn test_from_name() {
        assert!(matches!(CalloutStrategy::from_name("Verbose"), Ok(CalloutStrategy::Verbose)));
        assert!(matches!(CalloutStrategy::from_name("summary"), Ok(CalloutStrategy::Summary)));
        assert!(matches!(CalloutStrategy::from_name(" singular "), Ok(CalloutStrategy::Summary)));
        assert!(CalloutStrategy::from_name("loud").is_err());
    }

    #[test]
    fn test_summary_single_repost() {
        let strings = BotStrings {
            single_callout_one_repost_options: vec!["{name}: {num} repost".to_string()],
            ..BotStrings::default()
        };
        let mut reposts = RepostMap::new();
        reposts.insert(ContentKey::picture("abc123"), ids(&[1, 7]));
        let out = CalloutStrategy::Summary.callout(
            &reposts,
            "Alice",
            MessageId(7),
            &strings,
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(out, vec![OutboundMessage::reply("Alice: 1 repost", MessageId(7))]);
    }

    #[test]
    fn test_summary_counts_across_keys() {
        let strings = BotStrings {
            single_callout_x_num_reposts_options: vec!["{num}".to_string()],
            ..BotStrings::default()
        };
        let mut reposts = RepostMap::new();
        reposts.insert(ContentKey::picture("a"), ids(&[1, 4, 9]));
        reposts.insert(ContentKey::url("http://x.com"), ids(&[2, 9]));
        let out = CalloutStrategy::Summary.callout(
            &reposts,
            "Alice",
            MessageId(9),
            &strings,
            &mut StdRng::seed_from_u64(1),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "3");
    }

    #[test]
    fn test_nothing_to_call_out() {
        let mut reposts = RepostMap::new();
        reposts.insert(ContentKey::picture("a"), ids(&[1]));
        for strategy in [CalloutStrategy::Verbose, CalloutStrategy::Summary] {
            let out = strategy.callout(
                &reposts,
                "Alice",
                MessageId(1),
                &BotStrings::default(),
                &mut StdRng::seed_from_u64(1),
            );
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_verbose_replies_to_each_prior_post() {
        let strings = BotStrings::default();
        let mut reposts = RepostMap::new();
        reposts.insert(ContentKey::picture("abc123"), ids(&[1, 4, 6, 7]));
        let out = CalloutStrategy::Verbose.callout(
            &reposts,
            "Alice",
            MessageId(7),
            &strings,
            &mut StdRng::seed_from_u64(3),
        );

        assert_eq!(out.len(), 5);
        assert_eq!(out[0], OutboundMessage::reply(&strings.repost_alert, MessageId(7)));
        assert_eq!(
            out[1],
            OutboundMessage::reply(&strings.first_repost_callout, MessageId(1))
        );
        assert_eq!(out[2].reply_to, Some(MessageId(4)));
        assert_eq!(out[3].reply_to, Some(MessageId(6)));
        assert!(strings.intermediary_callouts.contains(&out[2].text));
        assert!(strings.intermediary_callouts.contains(&out[3].text));
        assert_ne!(out[2].text, out[3].text);
        assert_eq!(out[4].reply_to, Some(MessageId(7)));
        assert!(out[4].text.contains("Alice"));
    }

    #[test]
    fn test_intermediary_never_repeats_previous() {
        let strings = BotStrings {
            intermediary_callouts: vec!["A".to_string(), "B".to_string()],
            ..BotStrings::default()
        };
        let mut reposts = RepostMap::new();
        reposts.insert(ContentKey::url("u"), (1..=12).map(MessageId).collect());
        let out = CalloutStrategy::Verbose.callout(
            &reposts,
            "Bob",
            MessageId(12),
            &strings,
            &mut StdRng::seed_from_u64(9),
        );
        let middle: Vec<&str> = out[2..out.len() - 1].iter().map(|m| m.text.as_str()).collect();
        assert_eq!(middle.len(), 10);
        assert!(middle.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn test_single_entry_pool_may_repeat() {
        let mut rng = StdRng::seed_from_u64(0);
        let pool = vec!["only".to_string()];
        assert_eq!(pick_other(&pool, Some("only"), &mut rng), "only");
        assert_eq!(pick_other(&[], None, &mut rng), "");
    }
}
