// Lifecycle module - Subscription expiry and renewal date engine
//
// Pure and synchronous: callers fetch the record snapshot and pass "today"
// explicitly. Nothing in here touches the database or the network.

pub mod calendar;
pub mod classifier;
pub mod record;

pub use calendar::{add_months, compute_expiry_date, compute_next_due_date};
pub use classifier::{
    classify_expiring, classify_renewals_due_soon, AlertKind, AlertPolicy, Classification,
    ClassifiedAlert,
};
pub use record::{
    normalize, Channel, DateValue, Normalized, RawSubscription, RejectedRecord, SubscriptionRecord,
};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Malformed {field}: {value:?}")]
    MalformedDate { field: &'static str, value: String },

    #[error("Renewal interval must be positive, got {0}")]
    InvalidInterval(i32),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Date arithmetic overflowed the supported calendar range")]
    DateOverflow,

    #[error("Configuration error: {0}")]
    Configuration(String),
}
