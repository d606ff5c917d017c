use serde::{Deserialize, Serialize};

use crate::domain::snapshot::StructuredData;

/// Block the service currently operates in.
pub const SERVICE_BLOCK: i64 = 6;

/// The next thing the funnel should do for a contact, derived entirely from
/// snapshot completeness. There is no stored step marker: the gate table is
/// re-evaluated from scratch on every inbound turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateAction {
    SendWardMenu,
    SendPropertyTypeMenu,
    AskAddress,
    RegisterUser,
    SendBinSizeMenu,
    SendFrequencyMenu,
    SendPickupDaysMenu,
    SendBigPurchaseButtons,
    CompleteNonSubscriber,
    CompleteSubscriber,
    HandOffToAssistant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunnelCompletion {
    Incomplete,
    CompleteNonSubscriber,
    CompleteSubscriber,
}

/// Ordered gate table. The first matching row wins and the evaluation
/// short-circuits; rows are mutually exclusive by construction because each
/// gates on the absence of the field the previous row collects.
pub fn next_action(state: &StructuredData) -> GateAction {
    if state.block == Some(SERVICE_BLOCK) && !state.has_ward() {
        return GateAction::SendWardMenu;
    }
    if state.has_ward() && state.property_type.is_none() {
        return GateAction::SendPropertyTypeMenu;
    }
    if state.has_ward() && state.property_type.is_some() && !state.has_address() {
        return GateAction::AskAddress;
    }
    if state.has_address() && state.block.is_some() && state.has_ward() && state.user_id.is_none() {
        return GateAction::RegisterUser;
    }
    if state.has_address() && state.wants_subscription == Some(true) && !state.has_bin_size() {
        return GateAction::SendBinSizeMenu;
    }
    if state.has_bin_size() && !state.has_frequency() {
        return GateAction::SendFrequencyMenu;
    }
    if state.has_frequency() && !state.has_pickup_days() {
        return GateAction::SendPickupDaysMenu;
    }
    if state.has_pickup_days() && state.big_purchase.is_none() {
        return GateAction::SendBigPurchaseButtons;
    }
    match classify(state) {
        FunnelCompletion::CompleteNonSubscriber => GateAction::CompleteNonSubscriber,
        FunnelCompletion::CompleteSubscriber => GateAction::CompleteSubscriber,
        FunnelCompletion::Incomplete => GateAction::HandOffToAssistant,
    }
}

/// Terminal classification of the cumulative record.
pub fn classify(state: &StructuredData) -> FunnelCompletion {
    if !state.has_personal_fields() {
        return FunnelCompletion::Incomplete;
    }

    match state.wants_subscription {
        Some(false) => {
            if state.free_time.as_deref().is_some_and(|value| !value.trim().is_empty()) {
                FunnelCompletion::CompleteNonSubscriber
            } else {
                FunnelCompletion::Incomplete
            }
        }
        Some(true) => {
            if state.has_bin_size()
                && state.has_frequency()
                && state.has_pickup_days()
                && state.big_purchase.is_some()
            {
                FunnelCompletion::CompleteSubscriber
            } else {
                FunnelCompletion::Incomplete
            }
        }
        None => FunnelCompletion::Incomplete,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, next_action, FunnelCompletion, GateAction};
    use crate::domain::snapshot::{PropertyType, StructuredData, Weekday};

    fn registered_state() -> StructuredData {
        StructuredData {
            fullname: Some("Asha Rao".to_owned()),
            block: Some(6),
            ward_number: Some(430),
            property_type: Some(PropertyType::Domestic),
            address: Some("12 Canal Road".to_owned()),
            block_id: Some("blk-6".to_owned()),
            ward_id: Some("wrd-430".to_owned()),
            user_id: Some("usr-9".to_owned()),
            ..StructuredData::default()
        }
    }

    #[test]
    fn ward_menu_wins_when_block_is_six_and_ward_missing() {
        let state = StructuredData {
            fullname: Some("Asha Rao".to_owned()),
            block: Some(6),
            // property_type set out of order must not shadow the ward gate
            property_type: Some(PropertyType::Commercial),
            ..StructuredData::default()
        };

        assert_eq!(next_action(&state), GateAction::SendWardMenu);
    }

    #[test]
    fn property_menu_follows_ward_selection() {
        let state = StructuredData {
            block: Some(6),
            ward_number: Some(431),
            ..StructuredData::default()
        };

        assert_eq!(next_action(&state), GateAction::SendPropertyTypeMenu);
    }

    #[test]
    fn address_request_follows_the_property_selection() {
        let state = StructuredData {
            fullname: Some("Asha Rao".to_owned()),
            block: Some(6),
            ward_number: Some(430),
            property_type: Some(PropertyType::Domestic),
            ..StructuredData::default()
        };

        assert_eq!(next_action(&state), GateAction::AskAddress);
    }

    #[test]
    fn registration_fires_once_address_arrives_and_only_until_user_exists() {
        let mut state = registered_state();
        state.user_id = None;
        assert_eq!(next_action(&state), GateAction::RegisterUser);

        state.user_id = Some("usr-9".to_owned());
        assert_ne!(next_action(&state), GateAction::RegisterUser);
    }

    #[test]
    fn subscriber_branch_walks_bin_frequency_days_purchase() {
        let mut state = registered_state();
        state.wants_subscription = Some(true);
        assert_eq!(next_action(&state), GateAction::SendBinSizeMenu);

        state.bin_size = Some("120L".to_owned());
        state.bin_size_id = Some("65f1a2b3c4d5e6f708192a3b".to_owned());
        assert_eq!(next_action(&state), GateAction::SendFrequencyMenu);

        state.frequency = Some("twice_per_week".to_owned());
        assert_eq!(next_action(&state), GateAction::SendPickupDaysMenu);

        state.pickup_days = Some(vec![Weekday::Monday, Weekday::Wednesday]);
        assert_eq!(next_action(&state), GateAction::SendBigPurchaseButtons);

        state.big_purchase = Some(false);
        assert_eq!(next_action(&state), GateAction::CompleteSubscriber);
    }

    #[test]
    fn non_subscriber_completes_with_opt_out_and_callback_time() {
        let mut state = registered_state();
        state.wants_subscription = Some(false);
        assert_eq!(next_action(&state), GateAction::HandOffToAssistant);

        state.free_time = Some("10am".to_owned());
        assert_eq!(next_action(&state), GateAction::CompleteNonSubscriber);
        assert_eq!(classify(&state), FunnelCompletion::CompleteNonSubscriber);
    }

    #[test]
    fn classification_matches_both_terminal_branches() {
        let non_subscriber = StructuredData {
            fullname: Some("Asha Rao".to_owned()),
            block: Some(6),
            ward_number: Some(430),
            property_type: Some(PropertyType::Domestic),
            address: Some("X".to_owned()),
            wants_subscription: Some(false),
            free_time: Some("10am".to_owned()),
            ..StructuredData::default()
        };
        assert_eq!(classify(&non_subscriber), FunnelCompletion::CompleteNonSubscriber);

        let subscriber = StructuredData {
            wants_subscription: Some(true),
            bin_size: Some("120L".to_owned()),
            frequency: Some("once_per_week".to_owned()),
            pickup_days: Some(vec![Weekday::Monday]),
            big_purchase: Some(false),
            ..non_subscriber
        };
        assert_eq!(classify(&subscriber), FunnelCompletion::CompleteSubscriber);
    }

    #[test]
    fn empty_state_falls_through_to_the_assistant() {
        assert_eq!(next_action(&StructuredData::default()), GateAction::HandOffToAssistant);
        assert_eq!(classify(&StructuredData::default()), FunnelCompletion::Incomplete);
    }

    #[test]
    fn first_matching_row_wins_on_inconsistent_data() {
        // Ward and bin size both missing in an unexpected combination: the
        // earlier row (ward menu) must win without evaluating later rows.
        let state = StructuredData {
            block: Some(6),
            wants_subscription: Some(true),
            address: Some("12 Canal Road".to_owned()),
            ..StructuredData::default()
        };

        assert_eq!(next_action(&state), GateAction::SendWardMenu);
    }
}
