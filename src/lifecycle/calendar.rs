use chrono::{Months, NaiveDate};

use super::LifecycleError;

/// Adds a number of calendar months to a date
///
/// Keeps the day-of-month when the target month has it, otherwise clamps to
/// the last day of the target month (Jan 31 + 1 month = Feb 28/29).
/// Negative values move backwards. Returns `None` only when the result falls
/// outside the representable date range.
pub fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let delta = Months::new(months.unsigned_abs());

    if months >= 0 {
        date.checked_add_months(delta)
    } else {
        date.checked_sub_months(delta)
    }
}

/// Expiry date of a subscription bought on `purchased_date` for `duration_months`
pub fn compute_expiry_date(
    purchased_date: NaiveDate,
    duration_months: i32,
) -> Result<NaiveDate, LifecycleError> {
    if duration_months < 0 {
        return Err(LifecycleError::InvalidRecord(format!(
            "duration must not be negative, got {}",
            duration_months
        )));
    }

    add_months(purchased_date, duration_months).ok_or(LifecycleError::DateOverflow)
}

/// First renewal checkpoint on or after `today`
///
/// Checkpoints are generated by stepping `renewal_interval_months` from the
/// purchase date, each step applied to the previous checkpoint. A purchase
/// date that is already on or after `today` is returned as is.
pub fn compute_next_due_date(
    purchased_date: NaiveDate,
    renewal_interval_months: i32,
    today: NaiveDate,
) -> Result<NaiveDate, LifecycleError> {
    // Must be rejected before stepping, a zero step never reaches `today`
    if renewal_interval_months <= 0 {
        return Err(LifecycleError::InvalidInterval(renewal_interval_months));
    }

    let mut due_date = purchased_date;
    while due_date < today {
        due_date =
            add_months(due_date, renewal_interval_months).ok_or(LifecycleError::DateOverflow)?;
    }

    Ok(due_date)
}
