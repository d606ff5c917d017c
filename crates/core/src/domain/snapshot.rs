use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Property classification collected during registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    Domestic,
    Commercial,
    Institutional,
}

impl PropertyType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "domestic" => Some(Self::Domestic),
            "commercial" => Some(Self::Commercial),
            "institutional" => Some(Self::Institutional),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domestic => "Domestic",
            Self::Commercial => "Commercial",
            Self::Institutional => "Institutional",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankTransfer => "bank_transfer",
            Self::Cheque => "cheque",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "monday" => Some(Self::Monday),
            "tuesday" => Some(Self::Tuesday),
            "wednesday" => Some(Self::Wednesday),
            "thursday" => Some(Self::Thursday),
            "friday" => Some(Self::Friday),
            "saturday" => Some(Self::Saturday),
            "sunday" => Some(Self::Sunday),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|day| day == self).unwrap_or(0)
    }

    pub fn offset(&self, days: usize) -> Weekday {
        Self::ALL[(self.index() + days) % Self::ALL.len()]
    }
}

/// A priced frequency option returned by the backend pricing call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPlan {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub discounted_price: Option<Decimal>,
    pub currency: String,
}

/// Cumulative funnel record for one contact.
///
/// Every field stays `None` until collected. A snapshot attached to an
/// outbound turn always carries the FULL state as of that turn, never a
/// delta; `merged_with` enforces the carry-forward invariant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredData {
    pub fullname: Option<String>,
    pub block: Option<i64>,
    pub ward_number: Option<i64>,
    pub property_type: Option<PropertyType>,
    pub address: Option<String>,
    pub wants_subscription: Option<bool>,
    pub free_time: Option<String>,
    pub bin_size: Option<String>,
    pub bin_size_id: Option<String>,
    pub frequency: Option<String>,
    pub pickup_days: Option<Vec<Weekday>>,
    pub big_purchase: Option<bool>,
    pub pricing_options: Option<Vec<PricingPlan>>,
    pub selected_plan: Option<PricingPlan>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_tx_id: Option<String>,
    pub block_id: Option<String>,
    pub ward_id: Option<String>,
    pub user_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl StructuredData {
    /// Forward merge: every field present in `incoming` overwrites, every
    /// absent field keeps its previous value. Applied strictly in turn order.
    pub fn merged_with(&self, incoming: &StructuredData) -> StructuredData {
        StructuredData {
            fullname: incoming.fullname.clone().or_else(|| self.fullname.clone()),
            block: incoming.block.or(self.block),
            ward_number: incoming.ward_number.or(self.ward_number),
            property_type: incoming.property_type.or(self.property_type),
            address: incoming.address.clone().or_else(|| self.address.clone()),
            wants_subscription: incoming.wants_subscription.or(self.wants_subscription),
            free_time: incoming.free_time.clone().or_else(|| self.free_time.clone()),
            bin_size: incoming.bin_size.clone().or_else(|| self.bin_size.clone()),
            bin_size_id: incoming.bin_size_id.clone().or_else(|| self.bin_size_id.clone()),
            frequency: incoming.frequency.clone().or_else(|| self.frequency.clone()),
            pickup_days: incoming.pickup_days.clone().or_else(|| self.pickup_days.clone()),
            big_purchase: incoming.big_purchase.or(self.big_purchase),
            pricing_options: incoming
                .pricing_options
                .clone()
                .or_else(|| self.pricing_options.clone()),
            selected_plan: incoming.selected_plan.clone().or_else(|| self.selected_plan.clone()),
            payment_method: incoming.payment_method.or(self.payment_method),
            payment_tx_id: incoming.payment_tx_id.clone().or_else(|| self.payment_tx_id.clone()),
            block_id: incoming.block_id.clone().or_else(|| self.block_id.clone()),
            ward_id: incoming.ward_id.clone().or_else(|| self.ward_id.clone()),
            user_id: incoming.user_id.clone().or_else(|| self.user_id.clone()),
            subscription_id: incoming
                .subscription_id
                .clone()
                .or_else(|| self.subscription_id.clone()),
        }
    }

    pub fn has_fullname(&self) -> bool {
        self.fullname.as_deref().is_some_and(|value| !value.trim().is_empty())
    }

    pub fn has_address(&self) -> bool {
        self.address.as_deref().is_some_and(|value| !value.trim().is_empty())
    }

    pub fn has_ward(&self) -> bool {
        self.ward_number.is_some()
    }

    pub fn has_bin_size(&self) -> bool {
        self.bin_size.is_some() || self.bin_size_id.is_some()
    }

    pub fn has_frequency(&self) -> bool {
        self.frequency.as_deref().is_some_and(|value| !value.is_empty())
    }

    pub fn has_pickup_days(&self) -> bool {
        self.pickup_days.as_deref().is_some_and(|days| !days.is_empty())
    }

    pub fn has_personal_fields(&self) -> bool {
        self.has_fullname()
            && self.block.is_some()
            && self.has_ward()
            && self.property_type.is_some()
            && self.has_address()
    }

    /// Payment method chosen but no transaction id yet: the next free-text
    /// message from the contact is the transaction id.
    pub fn awaiting_payment_tx_id(&self) -> bool {
        self.payment_method.is_some() && self.payment_tx_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{PaymentMethod, PricingPlan, PropertyType, StructuredData, Weekday};

    fn partial_state() -> StructuredData {
        StructuredData {
            fullname: Some("Kenil Patel".to_owned()),
            block: Some(6),
            ward_number: Some(430),
            property_type: Some(PropertyType::Domestic),
            ..StructuredData::default()
        }
    }

    #[test]
    fn merge_with_empty_incoming_is_identity() {
        let state = partial_state();
        assert_eq!(state.merged_with(&StructuredData::default()), state);
    }

    #[test]
    fn merge_overwrites_only_fields_present_in_incoming() {
        let previous = partial_state();
        let incoming = StructuredData {
            ward_number: Some(431),
            address: Some("14 Rose Street".to_owned()),
            ..StructuredData::default()
        };

        let merged = previous.merged_with(&incoming);

        assert_eq!(merged.ward_number, Some(431));
        assert_eq!(merged.address.as_deref(), Some("14 Rose Street"));
        assert_eq!(merged.fullname.as_deref(), Some("Kenil Patel"));
        assert_eq!(merged.block, Some(6));
        assert_eq!(merged.property_type, Some(PropertyType::Domestic));
    }

    #[test]
    fn merge_never_nulls_a_previously_known_field() {
        let mut previous = partial_state();
        previous.payment_method = Some(PaymentMethod::Cheque);
        previous.pickup_days = Some(vec![Weekday::Monday]);

        let merged = previous.merged_with(&StructuredData {
            free_time: Some("10am".to_owned()),
            ..StructuredData::default()
        });

        assert_eq!(merged.payment_method, Some(PaymentMethod::Cheque));
        assert_eq!(merged.pickup_days, Some(vec![Weekday::Monday]));
        assert_eq!(merged.free_time.as_deref(), Some("10am"));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut state = partial_state();
        state.selected_plan = Some(PricingPlan {
            id: "65f1a2b3c4d5e6f708192a3b".to_owned(),
            name: "Twice a week".to_owned(),
            price: Decimal::new(45_000, 2),
            discounted_price: Some(Decimal::new(40_500, 2)),
            currency: "INR".to_owned(),
        });
        state.pickup_days = Some(vec![Weekday::Monday, Weekday::Wednesday]);

        let encoded = serde_json::to_string(&state).expect("serialize snapshot");
        let decoded: StructuredData = serde_json::from_str(&encoded).expect("parse snapshot");

        assert_eq!(decoded, state);
    }

    #[test]
    fn snapshot_tolerates_missing_fields_in_stored_json() {
        let decoded: StructuredData =
            serde_json::from_str(r#"{"fullname":"Asha","block":6}"#).expect("parse snapshot");

        assert_eq!(decoded.fullname.as_deref(), Some("Asha"));
        assert_eq!(decoded.block, Some(6));
        assert!(decoded.ward_number.is_none());
        assert!(decoded.pricing_options.is_none());
    }

    #[test]
    fn awaiting_payment_tx_id_requires_method_without_tx() {
        let mut state = partial_state();
        assert!(!state.awaiting_payment_tx_id());

        state.payment_method = Some(PaymentMethod::BankTransfer);
        assert!(state.awaiting_payment_tx_id());

        state.payment_tx_id = Some("TXN-001".to_owned());
        assert!(!state.awaiting_payment_tx_id());
    }

    #[test]
    fn weekday_offset_wraps_around_the_week() {
        assert_eq!(Weekday::Saturday.offset(2), Weekday::Monday);
        assert_eq!(Weekday::Monday.offset(4), Weekday::Friday);
        assert_eq!(Weekday::Sunday.offset(7), Weekday::Sunday);
    }

    #[test]
    fn property_type_parses_case_insensitively() {
        assert_eq!(PropertyType::parse("Domestic"), Some(PropertyType::Domestic));
        assert_eq!(PropertyType::parse("COMMERCIAL"), Some(PropertyType::Commercial));
        assert_eq!(PropertyType::parse("shed"), None);
    }
}
