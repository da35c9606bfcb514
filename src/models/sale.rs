use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::lifecycle::{compute_expiry_date, Channel};
use crate::models::summary::month_bounds;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Sale {
    pub sale_id: i32,
    #[sqlx(try_from = "String")]
    pub channel: Channel,
    pub sale_product: String,
    pub duration: i32,
    pub quantity: i32,
    pub renew: i32,
    pub customer: String,
    pub email: Option<String>,
    pub purchased_date: NaiveDate,
    pub expired_date: Option<NaiveDate>,
    pub manager: Option<String>,
    pub note: Option<String>,
    pub price: Decimal,
    pub profit: Decimal,
}

fn default_quantity() -> i32 {
    1
}

/// A sale as submitted by staff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub channel: Channel,
    pub sale_product: String,
    pub duration: i32,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub renew: i32,
    pub customer: String,
    pub email: Option<String>,
    pub purchased_date: NaiveDate,
    pub expired_date: Option<NaiveDate>,
    pub manager: Option<String>,
    pub note: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub profit: Decimal,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl NewSale {
    fn validation_errors(&mut self) -> Vec<String> {
        let mut errors = Vec::new();

        self.sale_product = self.sale_product.trim().to_string();
        self.customer = self.customer.trim().to_string();
        self.email = non_empty(self.email.take());

        if self.sale_product.is_empty() {
            errors.push("product is required".to_string());
        }
        if self.customer.is_empty() {
            errors.push("customer is required".to_string());
        }
        if self.duration <= 0 {
            errors.push("duration must be a positive number of months".to_string());
        }
        if self.renew < 0 {
            errors.push("renew must not be negative".to_string());
        }
        if self.quantity <= 0 {
            errors.push("quantity must be positive".to_string());
        }
        if self.price < Decimal::ZERO {
            errors.push("price must not be negative".to_string());
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                errors.push("email is not valid".to_string());
            }
        }
        if let Some(expired_date) = self.expired_date {
            if expired_date < self.purchased_date {
                errors.push("expired_date must not be before purchased_date".to_string());
            }
        }

        errors
    }

    /// Validates the submission and fills in a missing expiry date
    pub fn prepare(mut self) -> Result<Self, AppError> {
        let errors = self.validation_errors();
        if !errors.is_empty() {
            return Err(AppError::Validation(errors.join(", ")));
        }

        if self.expired_date.is_none() {
            self.expired_date = Some(compute_expiry_date(self.purchased_date, self.duration)?);
        }

        Ok(self)
    }
}

/// Inline edit of a recorded sale
///
/// Absent fields are left alone. An empty `email`, `manager` or `note`
/// clears the column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleUpdate {
    pub customer: Option<String>,
    pub email: Option<String>,
    pub manager: Option<String>,
    pub note: Option<String>,
}

impl SaleUpdate {
    /// Column assignments to apply, in a fixed order
    pub fn changes(self) -> Result<Vec<(&'static str, Option<String>)>, AppError> {
        let mut changes = Vec::new();
        let mut errors = Vec::new();

        if let Some(customer) = self.customer {
            match non_empty(Some(customer)) {
                Some(customer) => changes.push(("customer", Some(customer))),
                None => errors.push("customer cannot be empty".to_string()),
            }
        }
        if let Some(email) = self.email {
            let email = non_empty(Some(email));
            if email.as_deref().is_some_and(|e| !e.contains('@')) {
                errors.push("email is not valid".to_string());
            }
            changes.push(("email", email));
        }
        if let Some(manager) = self.manager {
            changes.push(("manager", non_empty(Some(manager))));
        }
        if let Some(note) = self.note {
            changes.push(("note", non_empty(Some(note))));
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors.join(", ")));
        }
        if changes.is_empty() {
            return Err(AppError::Validation("nothing to update".to_string()));
        }

        Ok(changes)
    }
}

impl Sale {
    /// Records a sale in its channel's table
    pub async fn create(pool: &PgPool, data: NewSale) -> Result<Self, AppError> {
        let data = data.prepare()?;
        let sale = insert(pool, &data).await?;

        tracing::info!(
            sale_id = sale.sale_id,
            channel = %sale.channel,
            product = %sale.sale_product,
            expired_date = ?sale.expired_date,
            "Sale recorded"
        );

        Ok(sale)
    }

    /// Records a batch of sales in one transaction
    ///
    /// Every row is validated before anything is written; any invalid row
    /// rejects the whole batch with all row errors listed.
    pub async fn create_many(pool: &PgPool, sales: Vec<NewSale>) -> Result<Vec<Self>, AppError> {
        if sales.is_empty() {
            return Err(AppError::Validation("sales list is empty".to_string()));
        }

        let prepared = prepare_batch(sales)?;

        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(prepared.len());
        for data in &prepared {
            created.push(insert(&mut *tx, data).await?);
        }
        tx.commit().await?;

        tracing::info!(count = created.len(), "Sales batch recorded");

        Ok(created)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        channel: Channel,
        sale_id: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM {} WHERE sale_id = $1",
            returning_columns(channel),
            channel.sales_table()
        );

        sqlx::query_as::<_, Self>(&query)
            .bind(sale_id)
            .fetch_optional(pool)
            .await
    }

    /// Sales of one channel, newest first, optionally limited to the month
    /// containing `month`
    pub async fn list(
        pool: &PgPool,
        channel: Channel,
        month: Option<NaiveDate>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            returning_columns(channel),
            channel.sales_table()
        ));

        if let Some(month) = month {
            let (from, until) = month_bounds(month);
            builder
                .push(" WHERE purchased_date >= ")
                .push_bind(from)
                .push(" AND purchased_date < ")
                .push_bind(until);
        }
        builder.push(" ORDER BY purchased_date DESC, sale_id DESC");

        builder.build_query_as::<Self>().fetch_all(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        channel: Channel,
        sale_id: i32,
        update: SaleUpdate,
    ) -> Result<Option<Self>, AppError> {
        let changes = update.changes()?;

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", channel.sales_table()));
        {
            let mut assignments = builder.separated(", ");
            for (column, value) in changes {
                assignments.push(format!("{} = ", column));
                assignments.push_bind_unseparated(value);
            }
        }
        builder
            .push(" WHERE sale_id = ")
            .push_bind(sale_id)
            .push(format!(" RETURNING {}", returning_columns(channel)));

        let sale = builder.build_query_as::<Self>().fetch_optional(pool).await?;

        if let Some(sale) = &sale {
            tracing::info!(sale_id = sale.sale_id, channel = %channel, "Sale updated");
        }

        Ok(sale)
    }

    /// Returns false when no such sale exists
    pub async fn delete(
        pool: &PgPool,
        channel: Channel,
        sale_id: i32,
    ) -> Result<bool, sqlx::Error> {
        let query = format!("DELETE FROM {} WHERE sale_id = $1", channel.sales_table());
        let result = sqlx::query(&query).bind(sale_id).execute(pool).await?;

        if result.rows_affected() > 0 {
            tracing::info!(sale_id, channel = %channel, "Sale deleted");
        }

        Ok(result.rows_affected() > 0)
    }
}

/// Validates every row, reporting errors with 1-based row numbers
fn prepare_batch(sales: Vec<NewSale>) -> Result<Vec<NewSale>, AppError> {
    let mut prepared = Vec::with_capacity(sales.len());
    let mut errors = Vec::new();

    for (index, sale) in sales.into_iter().enumerate() {
        match sale.prepare() {
            Ok(sale) => prepared.push(sale),
            Err(e) => errors.push(format!("row {}: {}", index + 1, e)),
        }
    }

    if errors.is_empty() {
        Ok(prepared)
    } else {
        Err(AppError::Validation(errors.join("; ")))
    }
}

async fn insert<'e, E>(executor: E, data: &NewSale) -> Result<Sale, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let table = data.channel.sales_table();
    let columns = returning_columns(data.channel);

    match data.channel {
        Channel::Wholesale => {
            let query = format!(
                r#"
                INSERT INTO {table}
                    (sale_product, duration, quantity, renew, customer, email,
                     purchased_date, expired_date, manager, note, price, profit)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING {columns}
                "#
            );

            sqlx::query_as::<_, Sale>(&query)
                .bind(&data.sale_product)
                .bind(data.duration)
                .bind(data.quantity)
                .bind(data.renew)
                .bind(&data.customer)
                .bind(&data.email)
                .bind(data.purchased_date)
                .bind(data.expired_date)
                .bind(&data.manager)
                .bind(&data.note)
                .bind(data.price)
                .bind(data.profit)
                .fetch_one(executor)
                .await
        }
        Channel::Retail => {
            let query = format!(
                r#"
                INSERT INTO {table}
                    (sale_product, duration, renew, customer, email,
                     purchased_date, expired_date, manager, note, price, profit)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING {columns}
                "#
            );

            sqlx::query_as::<_, Sale>(&query)
                .bind(&data.sale_product)
                .bind(data.duration)
                .bind(data.renew)
                .bind(&data.customer)
                .bind(&data.email)
                .bind(data.purchased_date)
                .bind(data.expired_date)
                .bind(&data.manager)
                .bind(&data.note)
                .bind(data.price)
                .bind(data.profit)
                .fetch_one(executor)
                .await
        }
    }
}

/// Column list shared by both sales tables; retail rows report a quantity of 1
fn returning_columns(channel: Channel) -> String {
    let quantity = match channel {
        Channel::Wholesale => "quantity",
        Channel::Retail => "1",
    };

    format!(
        "sale_id, '{}' AS channel, sale_product, duration, {} AS quantity, renew, customer, \
         email, purchased_date, expired_date, manager, note, price, profit",
        channel.as_str(),
        quantity
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_sale() -> NewSale {
        NewSale {
            channel: Channel::Retail,
            sale_product: "  Netflix Premium ".to_string(),
            duration: 1,
            quantity: 1,
            renew: 0,
            customer: "Somchai".to_string(),
            email: Some("".to_string()),
            purchased_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            expired_date: None,
            manager: None,
            note: None,
            price: Decimal::new(35000, 2),
            profit: Decimal::new(12000, 2),
        }
    }

    #[test]
    fn test_prepare_fills_expiry_and_trims() {
        let sale = new_sale().prepare().unwrap();

        assert_eq!(sale.sale_product, "Netflix Premium");
        assert_eq!(sale.email, None);
        assert_eq!(sale.expired_date, NaiveDate::from_ymd_opt(2024, 2, 29));
    }

    #[test]
    fn test_prepare_keeps_explicit_expiry() {
        let mut sale = new_sale();
        sale.expired_date = NaiveDate::from_ymd_opt(2024, 3, 15);

        assert_eq!(
            sale.prepare().unwrap().expired_date,
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn test_prepare_collects_all_errors() {
        let mut sale = new_sale();
        sale.customer = " ".to_string();
        sale.duration = 0;
        sale.price = Decimal::new(-1, 0);
        sale.email = Some("not-an-email".to_string());

        match sale.prepare() {
            Err(AppError::Validation(msg)) => {
                assert!(msg.contains("customer is required"));
                assert!(msg.contains("duration"));
                assert!(msg.contains("price"));
                assert!(msg.contains("email"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_prepare_rejects_expiry_before_purchase() {
        let mut sale = new_sale();
        sale.expired_date = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert!(matches!(sale.prepare(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_new_sale_defaults_from_json() {
        let sale: NewSale = serde_json::from_str(
            r#"{
                "channel": "wholesale",
                "sale_product": "Spotify Family",
                "duration": 12,
                "customer": "Reseller Co",
                "purchased_date": "2024-05-01",
                "price": 900
            }"#,
        )
        .unwrap();

        assert_eq!(sale.channel, Channel::Wholesale);
        assert_eq!(sale.quantity, 1);
        assert_eq!(sale.renew, 0);
        assert_eq!(sale.email, None);
        assert_eq!(sale.profit, Decimal::ZERO);
    }

    #[test]
    fn test_prices_keep_cents_exactly() {
        let sale: NewSale = serde_json::from_str(
            r#"{
                "channel": "retail",
                "sale_product": "Canva Pro",
                "duration": 1,
                "customer": "Aye",
                "purchased_date": "2024-05-01",
                "price": "19.99",
                "profit": 0.1
            }"#,
        )
        .unwrap();

        assert_eq!(sale.price, Decimal::new(1999, 2));
        assert_eq!(sale.profit, Decimal::new(1, 1));
        assert_eq!(sale.price + sale.profit, Decimal::new(2009, 2));
    }

    #[test]
    fn test_prepare_batch_reports_row_numbers() {
        let mut broken = new_sale();
        broken.customer = String::new();

        match prepare_batch(vec![new_sale(), broken, new_sale()]) {
            Err(AppError::Validation(msg)) => {
                assert!(msg.starts_with("row 2: "));
                assert!(!msg.contains("row 1"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        assert_eq!(prepare_batch(vec![new_sale(), new_sale()]).unwrap().len(), 2);
    }

    #[test]
    fn test_sale_update_changes() {
        let update = SaleUpdate {
            customer: Some(" Mya ".to_string()),
            email: Some(String::new()),
            note: Some("paid by KBZPay".to_string()),
            ..Default::default()
        };

        assert_eq!(
            update.changes().unwrap(),
            vec![
                ("customer", Some("Mya".to_string())),
                ("email", None),
                ("note", Some("paid by KBZPay".to_string())),
            ]
        );
    }

    #[test]
    fn test_sale_update_rejects_invalid_or_empty() {
        assert!(matches!(
            SaleUpdate::default().changes(),
            Err(AppError::Validation(_))
        ));

        let update = SaleUpdate {
            customer: Some("  ".to_string()),
            email: Some("nope".to_string()),
            ..Default::default()
        };
        match update.changes() {
            Err(AppError::Validation(msg)) => {
                assert!(msg.contains("customer"));
                assert!(msg.contains("email"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_returning_columns_per_channel() {
        assert!(returning_columns(Channel::Retail).contains("1 AS quantity"));
        assert!(returning_columns(Channel::Wholesale).contains("quantity AS quantity"));
        assert!(!returning_columns(Channel::Retail).contains("float8"));
    }
}
