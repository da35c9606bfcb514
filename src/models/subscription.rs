use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};

use crate::lifecycle::{Channel, DateValue, RawSubscription};

/// Subscription row as stored in either sales table
///
/// Legacy imports keep dates in text columns, so date columns are decoded
/// as native dates when possible and as raw text otherwise.
#[derive(Debug, Clone)]
pub struct SubscriptionRow {
    pub product_label: String,
    pub customer: String,
    pub email: Option<String>,
    pub purchased_date: Option<DateValue>,
    pub expired_date: Option<DateValue>,
    pub duration: i32,
    pub renew: i32,
    pub channel: Channel,
}

fn decode_date(row: &PgRow, column: &str) -> Result<Option<DateValue>, sqlx::Error> {
    if let Ok(date) = row.try_get::<Option<NaiveDate>, _>(column) {
        return Ok(date.map(DateValue::Date));
    }
    if let Ok(datetime) = row.try_get::<Option<NaiveDateTime>, _>(column) {
        return Ok(datetime.map(DateValue::DateTime));
    }

    Ok(row.try_get::<Option<String>, _>(column)?.map(DateValue::Text))
}

impl<'r> FromRow<'r, PgRow> for SubscriptionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let channel: String = row.try_get("channel")?;

        Ok(Self {
            product_label: row.try_get("product_label")?,
            customer: row.try_get("customer")?,
            email: row.try_get("email")?,
            purchased_date: decode_date(row, "purchased_date")?,
            expired_date: decode_date(row, "expired_date")?,
            duration: row.try_get("duration")?,
            renew: row.try_get("renew")?,
            channel: channel.parse().map_err(|e| sqlx::Error::ColumnDecode {
                index: "channel".to_string(),
                source: Box::new(e),
            })?,
        })
    }
}

impl From<SubscriptionRow> for RawSubscription {
    fn from(row: SubscriptionRow) -> Self {
        RawSubscription {
            product_label: row.product_label,
            customer: row.customer,
            email: row.email,
            purchased_date: row.purchased_date,
            expired_date: row.expired_date,
            duration_months: row.duration,
            renewal_interval_months: row.renew,
            channel: row.channel,
        }
    }
}

impl SubscriptionRow {
    /// Fetches every subscription from both channels in one snapshot
    ///
    /// Labels are prefixed with the channel name so retail and wholesale
    /// products with the same name stay distinguishable.
    pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "{} UNION ALL {} ORDER BY expired_date ASC NULLS LAST",
            select_subscriptions(Channel::Retail),
            select_subscriptions(Channel::Wholesale)
        );

        sqlx::query_as::<_, Self>(&query).fetch_all(pool).await
    }

    /// Same as `fetch_all`, converted for the lifecycle engine
    pub async fn fetch_raw(pool: &PgPool) -> Result<Vec<RawSubscription>, sqlx::Error> {
        Ok(Self::fetch_all(pool)
            .await?
            .into_iter()
            .map(RawSubscription::from)
            .collect())
    }
}

fn select_subscriptions(channel: Channel) -> String {
    format!(
        "SELECT CONCAT('{} - ', sale_product) AS product_label, customer, email, \
         purchased_date, expired_date, duration, COALESCE(renew, 0) AS renew, \
         '{}' AS channel FROM {}",
        channel.display_name(),
        channel.as_str(),
        channel.sales_table()
    )
}
