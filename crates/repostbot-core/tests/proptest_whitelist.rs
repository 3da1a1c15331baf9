use proptest::prelude::*;
use repostbot_core::group::WhitelistStatus;
use repostbot_core::toggles::ToggleSet;
use repostbot_core::{ContentKey, GroupId, GroupState};

fn keys() -> impl Strategy<Value = Vec<ContentKey>> {
    prop::collection::vec(
        prop_oneof![
            "[a-zA-Z0-9+/]{4,12}".prop_map(|h| ContentKey::picture(&h)),
            "https?://[a-z]{1,8}\\.com".prop_map(|u| ContentKey::url(&u)),
        ],
        0..8,
    )
}

proptest! {
    /// Toggling the same keys twice restores the whitelist.
    #[test]
    fn toggling_twice_is_identity(initial in keys(), toggled in keys()) {
        let mut state = GroupState::blank(GroupId(1), &ToggleSet::default());
        state.toggle_whitelist(&initial);
        let before = state.whitelist.clone();

        state.toggle_whitelist(&toggled);
        state.toggle_whitelist(&toggled);

        prop_assert_eq!(state.whitelist, before);
    }

    /// Status reflects which keys were added and which removed.
    #[test]
    fn status_matches_membership(initial in keys(), toggled in keys()) {
        let mut state = GroupState::blank(GroupId(1), &ToggleSet::default());
        state.toggle_whitelist(&initial);
        let added = toggled.iter().any(|k| !state.is_whitelisted(k));
        let removed = toggled.iter().any(|k| state.is_whitelisted(k));

        let status = state.toggle_whitelist(&toggled);

        let expected = match (added, removed) {
            (true, false) => WhitelistStatus::Success,
            (false, true) => WhitelistStatus::AlreadyExists,
            (true, true) => WhitelistStatus::AddedAndRemoved,
            (false, false) => WhitelistStatus::Fail,
        };
        prop_assert_eq!(status, expected);
    }

    /// Recording never leaves an empty history and keeps the original first.
    #[test]
    fn histories_start_with_original(ids in prop::collection::vec(1i32..50, 1..20), key in keys()) {
        let mut state = GroupState::blank(GroupId(1), &ToggleSet::default());
        for id in &ids {
            state.record(repostbot_core::MessageId(*id), &key);
        }
        for history in state.reposts.values() {
            prop_assert!(!history.is_empty());
            prop_assert_eq!(history[0], repostbot_core::MessageId(ids[0]));
        }
    }
}
