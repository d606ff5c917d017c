pub mod config;
pub mod domain;
pub mod errors;
pub mod funnel;

pub use domain::snapshot::{PaymentMethod, PricingPlan, PropertyType, StructuredData, Weekday};
pub use domain::turn::{ContactProfile, ConversationTurn, Direction, TurnKind};
pub use errors::{ApplicationError, DomainError, FinalizationError, InterfaceError};
pub use funnel::gates::{classify, next_action, FunnelCompletion, GateAction, SERVICE_BLOCK};
pub use funnel::reconstruct::reconstruct;
pub use funnel::schedule::pickup_schedule;
pub use funnel::selection::{
    map_button_reply, map_list_selection, ButtonSelection, ListSelection, BIG_PURCHASE_NO,
    BIG_PURCHASE_YES, PAYMENT_BANK_TRANSFER, PAYMENT_CHEQUE, PRICING_ID_PREFIX, WARD_MAX, WARD_MIN,
};
