use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::lifecycle::{add_months, Channel};

/// Price and profit totals over a date range
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, FromRow)]
pub struct SalesTotals {
    pub total_sales: Decimal,
    pub total_profit: Decimal,
    pub sale_count: i64,
}

/// One sale of the day, labelled with its channel
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SaleLine {
    pub sale_product: String,
    pub customer: String,
    pub price: Decimal,
    pub profit: Decimal,
    pub manager: Option<String>,
    #[sqlx(try_from = "String")]
    pub channel: Channel,
}

impl SalesTotals {
    /// Totals across both channels for `[from, until)`
    pub async fn between(
        pool: &PgPool,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT
                COALESCE(SUM(price), 0) AS total_sales,
                COALESCE(SUM(profit), 0) AS total_profit,
                COUNT(*) AS sale_count
            FROM (
                SELECT price, profit FROM sale_overview
                WHERE purchased_date >= $1 AND purchased_date < $2
                UNION ALL
                SELECT price, profit FROM ws_sale_overview
                WHERE purchased_date >= $1 AND purchased_date < $2
            ) combined_sales
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_one(pool)
        .await
    }

    pub async fn for_day(pool: &PgPool, day: NaiveDate) -> Result<Self, sqlx::Error> {
        let next_day = day.succ_opt().unwrap_or(day);
        Self::between(pool, day, next_day).await
    }

    /// Totals for the calendar month containing `day`
    pub async fn for_month(pool: &PgPool, day: NaiveDate) -> Result<Self, sqlx::Error> {
        let (from, until) = month_bounds(day);
        Self::between(pool, from, until).await
    }
}

impl SaleLine {
    /// Sales of one day across both channels, largest first
    pub async fn on_day(pool: &PgPool, day: NaiveDate) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT
                CONCAT('Retail - ', sale_product) AS sale_product,
                customer, price, profit, manager,
                'retail' AS channel
            FROM sale_overview
            WHERE purchased_date = $1

            UNION ALL

            SELECT
                CONCAT('Wholesale - ', sale_product) AS sale_product,
                customer, price, profit, manager,
                'wholesale' AS channel
            FROM ws_sale_overview
            WHERE purchased_date = $1

            ORDER BY price DESC
            "#,
        )
        .bind(day)
        .fetch_all(pool)
        .await
    }
}

/// Parses `YYYY-MM` into the first day of that month
pub fn parse_month(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", text.trim()), "%Y-%m-%d").ok()
}

/// First day of the month containing `day` and first day of the next month
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let next = add_months(first, 1).unwrap_or(first);
    (first, next)
}
