pub mod client;
pub mod types;

pub use client::{BackendApi, BackendError, FakeBackend, HttpBackendClient};
pub use types::{
    Block, CreateSubscriptionRequest, CreateTransactionRequest, CreateUserRequest,
    CreatedSubscription, CreatedTransaction, CreatedUser, PricingQuery, Ward,
};
