use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{calendar::compute_expiry_date, LifecycleError};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Sales channel; decides display prefix and persistence tables only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Retail,
    Wholesale,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Retail => "retail",
            Channel::Wholesale => "wholesale",
        }
    }

    /// Human readable prefix used to disambiguate product labels
    pub fn display_name(&self) -> &'static str {
        match self {
            Channel::Retail => "Retail",
            Channel::Wholesale => "Wholesale",
        }
    }

    pub fn sales_table(&self) -> &'static str {
        match self {
            Channel::Retail => "sale_overview",
            Channel::Wholesale => "ws_sale_overview",
        }
    }

    pub fn catalog_table(&self) -> &'static str {
        match self {
            Channel::Retail => "products_catalog",
            Channel::Wholesale => "ws_products_catalog",
        }
    }

    /// Prefix of the public product id (`R-12`, `WS-7`)
    pub fn product_id_prefix(&self) -> &'static str {
        match self {
            Channel::Retail => "R-",
            Channel::Wholesale => "WS-",
        }
    }

    pub fn label(&self, product_name: &str) -> String {
        format!("{} - {}", self.display_name(), product_name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retail" => Ok(Channel::Retail),
            "wholesale" => Ok(Channel::Wholesale),
            other => Err(LifecycleError::InvalidRecord(format!(
                "unknown channel: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Channel {
    type Error = LifecycleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A date as delivered by the record source: native or `YYYY-MM-DD` text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl DateValue {
    pub fn resolve(&self, field: &'static str) -> Result<NaiveDate, LifecycleError> {
        match self {
            DateValue::Date(date) => Ok(*date),
            DateValue::DateTime(datetime) => Ok(datetime.date()),
            DateValue::Text(text) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                .map_err(|_| LifecycleError::MalformedDate {
                    field,
                    value: text.clone(),
                }),
        }
    }
}

impl From<NaiveDate> for DateValue {
    fn from(date: NaiveDate) -> Self {
        DateValue::Date(date)
    }
}

impl From<&str> for DateValue {
    fn from(text: &str) -> Self {
        DateValue::Text(text.to_string())
    }
}

impl From<String> for DateValue {
    fn from(text: String) -> Self {
        DateValue::Text(text)
    }
}

/// Row shape handed over by the record source, before any validation
#[derive(Debug, Clone)]
pub struct RawSubscription {
    pub product_label: String,
    pub customer: String,
    pub email: Option<String>,
    pub purchased_date: Option<DateValue>,
    pub expired_date: Option<DateValue>,
    pub duration_months: i32,
    pub renewal_interval_months: i32,
    pub channel: Channel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRecord {
    pub product_label: String,
    pub customer: String,
    pub email: Option<String>,
    pub purchased_date: NaiveDate,
    pub duration_months: i32,
    pub renewal_interval_months: i32,
    pub expired_date: NaiveDate,
    pub channel: Channel,
}

impl SubscriptionRecord {
    /// Validates a raw row and resolves its dates
    ///
    /// A missing expiry date is derived from the purchase date and duration.
    pub fn from_raw(raw: RawSubscription) -> Result<Self, LifecycleError> {
        let purchased_date = raw
            .purchased_date
            .as_ref()
            .ok_or_else(|| LifecycleError::MalformedDate {
                field: "purchased_date",
                value: "NULL".to_string(),
            })?
            .resolve("purchased_date")?;

        if raw.duration_months <= 0 {
            return Err(LifecycleError::InvalidRecord(format!(
                "duration must be positive, got {}",
                raw.duration_months
            )));
        }

        if raw.renewal_interval_months < 0 {
            return Err(LifecycleError::InvalidRecord(format!(
                "renewal interval must not be negative, got {}",
                raw.renewal_interval_months
            )));
        }

        let expired_date = match &raw.expired_date {
            Some(value) => value.resolve("expired_date")?,
            None => compute_expiry_date(purchased_date, raw.duration_months)?,
        };

        if expired_date < purchased_date {
            return Err(LifecycleError::InvalidRecord(format!(
                "expired_date {} is before purchased_date {}",
                expired_date, purchased_date
            )));
        }

        Ok(Self {
            product_label: raw.product_label,
            customer: raw.customer,
            email: raw.email,
            purchased_date,
            duration_months: raw.duration_months,
            renewal_interval_months: raw.renewal_interval_months,
            expired_date,
            channel: raw.channel,
        })
    }

    /// True when periodic renewal checkpoints fall before expiry
    pub fn has_renewal_checkpoints(&self) -> bool {
        self.renewal_interval_months > 0 && self.renewal_interval_months < self.duration_months
    }
}

/// A row that could not be turned into a `SubscriptionRecord`
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRecord {
    pub index: usize,
    pub product_label: String,
    pub customer: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Normalized {
    pub records: Vec<SubscriptionRecord>,
    pub rejected: Vec<RejectedRecord>,
}

/// Normalizes a batch of raw rows, isolating failures per row
///
/// A bad row is logged and reported in `rejected`; it never prevents the
/// remaining rows from being normalized. Input order is preserved.
pub fn normalize(rows: Vec<RawSubscription>) -> Normalized {
    let mut normalized = Normalized::default();

    for (index, raw) in rows.into_iter().enumerate() {
        let product_label = raw.product_label.clone();
        let customer = raw.customer.clone();

        match SubscriptionRecord::from_raw(raw) {
            Ok(record) => normalized.records.push(record),
            Err(e) => {
                tracing::warn!(
                    index,
                    product = %product_label,
                    customer = %customer,
                    error = %e,
                    "Skipping malformed subscription record"
                );
                normalized.rejected.push(RejectedRecord {
                    index,
                    product_label,
                    customer,
                    reason: e.to_string(),
                });
            }
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(purchased: Option<DateValue>, expired: Option<DateValue>) -> RawSubscription {
        RawSubscription {
            product_label: "Retail - Netflix Premium".to_string(),
            customer: "Somchai".to_string(),
            email: Some("somchai@example.com".to_string()),
            purchased_date: purchased,
            expired_date: expired,
            duration_months: 12,
            renewal_interval_months: 1,
            channel: Channel::Retail,
        }
    }

    #[test]
    fn test_date_value_accepts_text_and_native() {
        assert_eq!(DateValue::from("2024-02-29").resolve("d"), Ok(date(2024, 2, 29)));
        assert_eq!(DateValue::from(" 2024-02-29 ").resolve("d"), Ok(date(2024, 2, 29)));
        assert_eq!(DateValue::from(date(2024, 3, 1)).resolve("d"), Ok(date(2024, 3, 1)));

        let datetime = date(2024, 3, 1).and_hms_opt(23, 59, 0).unwrap();
        assert_eq!(DateValue::DateTime(datetime).resolve("d"), Ok(date(2024, 3, 1)));
    }

    #[test]
    fn test_date_value_rejects_garbage() {
        let result = DateValue::from("2023-02-30").resolve("expired_date");
        assert_eq!(
            result,
            Err(LifecycleError::MalformedDate {
                field: "expired_date",
                value: "2023-02-30".to_string(),
            })
        );
        assert!(DateValue::from("15/01/2024").resolve("d").is_err());
    }

    #[test]
    fn test_from_raw_derives_missing_expiry() {
        let record = SubscriptionRecord::from_raw(raw(Some("2024-01-31".into()), None)).unwrap();
        assert_eq!(record.expired_date, date(2025, 1, 31));
        assert!(record.has_renewal_checkpoints());
    }

    #[test]
    fn test_from_raw_keeps_supplied_expiry() {
        let record = SubscriptionRecord::from_raw(raw(
            Some(date(2024, 1, 1).into()),
            Some("2024-06-30".into()),
        ))
        .unwrap();
        assert_eq!(record.expired_date, date(2024, 6, 30));
    }

    #[test]
    fn test_from_raw_rejects_expiry_before_purchase() {
        let result = SubscriptionRecord::from_raw(raw(
            Some("2024-05-01".into()),
            Some("2024-04-30".into()),
        ));
        assert!(matches!(result, Err(LifecycleError::InvalidRecord(_))));
    }

    #[test]
    fn test_from_raw_rejects_missing_purchase_date() {
        let result = SubscriptionRecord::from_raw(raw(None, None));
        assert!(matches!(
            result,
            Err(LifecycleError::MalformedDate { field: "purchased_date", .. })
        ));
    }

    #[test]
    fn test_from_raw_rejects_non_positive_duration() {
        let mut row = raw(Some("2024-05-01".into()), None);
        row.duration_months = 0;
        assert!(matches!(
            SubscriptionRecord::from_raw(row),
            Err(LifecycleError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_renewal_checkpoints_require_shorter_interval() {
        let mut row = raw(Some("2024-05-01".into()), None);
        row.renewal_interval_months = 12;
        assert!(!SubscriptionRecord::from_raw(row.clone()).unwrap().has_renewal_checkpoints());

        row.renewal_interval_months = 0;
        assert!(!SubscriptionRecord::from_raw(row).unwrap().has_renewal_checkpoints());
    }

    #[test]
    fn test_normalize_isolates_bad_rows() {
        let rows = vec![
            raw(Some("2024-01-01".into()), None),
            raw(Some("not-a-date".into()), None),
            raw(Some("2024-02-01".into()), None),
        ];

        let normalized = normalize(rows);
        assert_eq!(normalized.records.len(), 2);
        assert_eq!(normalized.rejected.len(), 1);
        assert_eq!(normalized.rejected[0].index, 1);
        assert!(normalized.rejected[0].reason.contains("purchased_date"));
    }

    #[test]
    fn test_channel_parsing_and_tables() {
        assert_eq!("Wholesale".parse::<Channel>(), Ok(Channel::Wholesale));
        assert_eq!(Channel::Retail.sales_table(), "sale_overview");
        assert_eq!(Channel::Wholesale.catalog_table(), "ws_products_catalog");
        assert_eq!(Channel::Wholesale.label("Spotify"), "Wholesale - Spotify");
        assert!("partner".parse::<Channel>().is_err());
    }
}
