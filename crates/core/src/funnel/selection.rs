use crate::domain::snapshot::{PaymentMethod, PropertyType, Weekday};

pub const WARD_MIN: i64 = 429;
pub const WARD_MAX: i64 = 434;

pub const BIG_PURCHASE_YES: &str = "big_purchase_yes";
pub const BIG_PURCHASE_NO: &str = "big_purchase_no";
pub const PAYMENT_BANK_TRANSFER: &str = "payment_bank_transfer";
pub const PAYMENT_CHEQUE: &str = "payment_cheque";
pub const PRICING_ID_PREFIX: &str = "pricing_";

/// A list-menu row id mapped onto the snapshot field it fills.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListSelection {
    Ward(i64),
    PropertyType(PropertyType),
    BinSize { id: String, label: String },
    Frequency(String),
    PickupDay(Weekday),
    /// Backend id with the `pricing_` prefix stripped; resolved against the
    /// pricing options carried on the snapshot.
    PricingPlan(String),
    Unrecognized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonSelection {
    BigPurchase(bool),
    PaymentMethod(PaymentMethod),
    Unrecognized,
}

/// Fixed id-pattern rules for interactive list replies. Evaluated most
/// specific first; anything unmatched falls through to the generic
/// "selection recorded" branch.
pub fn map_list_selection(id: &str, title: &str) -> ListSelection {
    let id = id.trim();

    if let Ok(ward) = id.parse::<i64>() {
        if (WARD_MIN..=WARD_MAX).contains(&ward) {
            return ListSelection::Ward(ward);
        }
        return ListSelection::Unrecognized;
    }

    if let Some(property) = PropertyType::parse(id) {
        return ListSelection::PropertyType(property);
    }

    if let Some(day) = Weekday::parse(id) {
        return ListSelection::PickupDay(day);
    }

    if id == "daily" || id.ends_with("per_week") {
        return ListSelection::Frequency(id.to_owned());
    }

    if let Some(plan_id) = id.strip_prefix(PRICING_ID_PREFIX) {
        if !plan_id.is_empty() {
            return ListSelection::PricingPlan(plan_id.to_owned());
        }
    }

    // Bin size ids are opaque backend object ids, observed as 24 hex chars.
    if is_hex_object_id(id) {
        return ListSelection::BinSize { id: id.to_owned(), label: title.trim().to_owned() };
    }

    ListSelection::Unrecognized
}

pub fn map_button_reply(id: &str) -> ButtonSelection {
    match id.trim() {
        BIG_PURCHASE_YES => ButtonSelection::BigPurchase(true),
        BIG_PURCHASE_NO => ButtonSelection::BigPurchase(false),
        PAYMENT_BANK_TRANSFER => ButtonSelection::PaymentMethod(PaymentMethod::BankTransfer),
        PAYMENT_CHEQUE => ButtonSelection::PaymentMethod(PaymentMethod::Cheque),
        _ => ButtonSelection::Unrecognized,
    }
}

fn is_hex_object_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|byte| byte.is_ascii_hexdigit())
}
