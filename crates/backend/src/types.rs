use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dirtybox_core::{PropertyType, Weekday};

/// A serviced block as the line-of-business backend knows it.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Block {
    pub id: String,
    pub number: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Ward {
    pub id: String,
    pub number: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CreateUserRequest {
    pub fullname: String,
    pub phone: Option<String>,
    pub wa_id: Option<String>,
    pub address: String,
    pub property_type: PropertyType,
    pub block_id: String,
    pub ward_id: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CreatedUser {
    pub id: String,
}

/// Filter for the pricing catalogue lookup.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PricingQuery {
    pub bin_size_id: String,
    pub frequency: String,
    pub property_type: PropertyType,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CreateSubscriptionRequest {
    pub user_id: String,
    pub bin_size_id: String,
    pub pricing_id: String,
    pub price: Decimal,
    pub frequency: String,
    pub pickup_days: Vec<Weekday>,
    pub big_purchase: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CreatedSubscription {
    pub id: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CreateTransactionRequest {
    pub user_id: String,
    pub subscription_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub transaction_ref: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CreatedTransaction {
    pub id: String,
}
