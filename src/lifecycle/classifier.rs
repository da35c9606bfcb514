use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{calendar::compute_next_due_date, record::SubscriptionRecord, LifecycleError};

pub const DEFAULT_EXPIRING_HORIZON_DAYS: i64 = 1;
pub const DEFAULT_RENEWAL_DUE_HORIZON_DAYS: i64 = 2;
pub const DEFAULT_RENEWAL_EXCLUSION_HORIZON_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Expiring,
    RenewalDue,
}

/// A subscription surfaced by one classification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedAlert<'a> {
    pub record: &'a SubscriptionRecord,
    pub kind: AlertKind,
    pub days_left: i64,
    /// Expiry date for expiring alerts, next renewal checkpoint otherwise
    pub target_date: NaiveDate,
}

/// Lookahead windows, all inclusive and in days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertPolicy {
    expiring_horizon_days: i64,
    renewal_due_horizon_days: i64,
    renewal_exclusion_horizon_days: i64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            expiring_horizon_days: DEFAULT_EXPIRING_HORIZON_DAYS,
            renewal_due_horizon_days: DEFAULT_RENEWAL_DUE_HORIZON_DAYS,
            renewal_exclusion_horizon_days: DEFAULT_RENEWAL_EXCLUSION_HORIZON_DAYS,
        }
    }
}

impl AlertPolicy {
    /// Builds a validated policy
    ///
    /// Horizons must be non-negative, and the renewal exclusion horizon must
    /// cover the renewal due horizon or expiring subscriptions would leak
    /// into the renewals list.
    pub fn new(
        expiring_horizon_days: i64,
        renewal_due_horizon_days: i64,
        renewal_exclusion_horizon_days: i64,
    ) -> Result<Self, LifecycleError> {
        for (name, value) in [
            ("expiring horizon", expiring_horizon_days),
            ("renewal due horizon", renewal_due_horizon_days),
            ("renewal exclusion horizon", renewal_exclusion_horizon_days),
        ] {
            if value < 0 {
                return Err(LifecycleError::Configuration(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }

        if renewal_exclusion_horizon_days < renewal_due_horizon_days {
            return Err(LifecycleError::Configuration(format!(
                "renewal exclusion horizon ({}) is shorter than renewal due horizon ({})",
                renewal_exclusion_horizon_days, renewal_due_horizon_days
            )));
        }

        Ok(Self {
            expiring_horizon_days,
            renewal_due_horizon_days,
            renewal_exclusion_horizon_days,
        })
    }

    pub fn expiring_horizon_days(&self) -> i64 {
        self.expiring_horizon_days
    }

    pub fn renewal_due_horizon_days(&self) -> i64 {
        self.renewal_due_horizon_days
    }

    pub fn renewal_exclusion_horizon_days(&self) -> i64 {
        self.renewal_exclusion_horizon_days
    }

    /// Runs both classifiers over one record snapshot
    pub fn classify<'a>(
        &self,
        records: &'a [SubscriptionRecord],
        today: NaiveDate,
    ) -> Classification<'a> {
        Classification {
            today,
            expiring: classify_expiring(records, today, self),
            renewals: classify_renewals_due_soon(records, today, self),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Classification<'a> {
    pub today: NaiveDate,
    pub expiring: Vec<ClassifiedAlert<'a>>,
    pub renewals: Vec<ClassifiedAlert<'a>>,
}

/// Subscriptions whose expiry date is within the policy's expiring horizon
///
/// Sorted soonest first; ties keep input order.
pub fn classify_expiring<'a>(
    records: &'a [SubscriptionRecord],
    today: NaiveDate,
    policy: &AlertPolicy,
) -> Vec<ClassifiedAlert<'a>> {
    let horizon_days = policy.expiring_horizon_days;
    let mut alerts: Vec<_> = records
        .iter()
        .filter_map(|record| {
            let days_left = (record.expired_date - today).num_days();
            (0..=horizon_days).contains(&days_left).then_some(ClassifiedAlert {
                record,
                kind: AlertKind::Expiring,
                days_left,
                target_date: record.expired_date,
            })
        })
        .collect();

    // sort_by_key is stable
    alerts.sort_by_key(|alert| alert.days_left);
    alerts
}

/// Subscriptions whose next renewal checkpoint is within the due horizon
///
/// Records expiring within the exclusion horizon are left out so they are
/// only ever reported as expiring. Sorted by days left, then by due date;
/// ties keep input order.
pub fn classify_renewals_due_soon<'a>(
    records: &'a [SubscriptionRecord],
    today: NaiveDate,
    policy: &AlertPolicy,
) -> Vec<ClassifiedAlert<'a>> {
    let due_horizon_days = policy.renewal_due_horizon_days;
    let exclusion_horizon_days = policy.renewal_exclusion_horizon_days;
    let mut alerts = Vec::new();

    for record in records.iter().filter(|r| r.has_renewal_checkpoints()) {
        let interval = record.renewal_interval_months;
        let next_due = match compute_next_due_date(record.purchased_date, interval, today) {
            Ok(next_due) => next_due,
            Err(e) => {
                tracing::warn!(
                    product = %record.product_label,
                    customer = %record.customer,
                    error = %e,
                    "Skipping record with no computable renewal date"
                );
                continue;
            }
        };

        let days_left = (next_due - today).num_days();
        if !(0..=due_horizon_days).contains(&days_left) {
            continue;
        }

        let days_to_expiry = (record.expired_date - today).num_days();
        if days_to_expiry <= exclusion_horizon_days {
            continue;
        }

        alerts.push(ClassifiedAlert {
            record,
            kind: AlertKind::RenewalDue,
            days_left,
            target_date: next_due,
        });
    }

    alerts.sort_by_key(|alert| (alert.days_left, alert.target_date));
    alerts
}
