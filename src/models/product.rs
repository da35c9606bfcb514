use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::lifecycle::Channel;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub product_id: i32,
    #[sqlx(try_from = "String")]
    pub channel: Channel,
    pub product_name: String,
    pub duration: i32,
    pub renew: i32,
    pub wholesale: Decimal,
    pub retail: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub channel: Channel,
    pub product_name: String,
    pub duration: i32,
    #[serde(default)]
    pub renew: i32,
    #[serde(default)]
    pub wholesale: Decimal,
    #[serde(default)]
    pub retail: Decimal,
}

/// Partial catalog edit; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub product_name: Option<String>,
    pub duration: Option<i32>,
    pub renew: Option<i32>,
    pub wholesale: Option<Decimal>,
    pub retail: Option<Decimal>,
}

enum Assignment {
    Text(&'static str, String),
    Int(&'static str, i32),
    Money(&'static str, Decimal),
}

fn check_fields(
    errors: &mut Vec<String>,
    product_name: Option<&str>,
    duration: Option<i32>,
    renew: Option<i32>,
    prices: [Option<Decimal>; 2],
) {
    if product_name.is_some_and(str::is_empty) {
        errors.push("product name cannot be empty".to_string());
    }
    if duration.is_some_and(|d| d < 1) {
        errors.push("duration must be at least 1 month".to_string());
    }
    if renew.is_some_and(|r| r < 0) {
        errors.push("renew must not be negative".to_string());
    }
    if prices.iter().flatten().any(|price| *price < Decimal::ZERO) {
        errors.push("prices must not be negative".to_string());
    }
}

impl NewProduct {
    pub fn prepare(mut self) -> Result<Self, AppError> {
        self.product_name = self.product_name.trim().to_string();

        let mut errors = Vec::new();
        check_fields(
            &mut errors,
            Some(&self.product_name),
            Some(self.duration),
            Some(self.renew),
            [Some(self.wholesale), Some(self.retail)],
        );

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(AppError::Validation(errors.join(", ")))
        }
    }
}

impl ProductUpdate {
    fn assignments(self) -> Result<Vec<Assignment>, AppError> {
        let product_name = self.product_name.map(|name| name.trim().to_string());

        let mut errors = Vec::new();
        check_fields(
            &mut errors,
            product_name.as_deref(),
            self.duration,
            self.renew,
            [self.wholesale, self.retail],
        );
        if !errors.is_empty() {
            return Err(AppError::Validation(errors.join(", ")));
        }

        let mut assignments = Vec::new();
        if let Some(name) = product_name {
            assignments.push(Assignment::Text("product_name", name));
        }
        if let Some(duration) = self.duration {
            assignments.push(Assignment::Int("duration", duration));
        }
        if let Some(renew) = self.renew {
            assignments.push(Assignment::Int("renew", renew));
        }
        if let Some(wholesale) = self.wholesale {
            assignments.push(Assignment::Money("wholesale", wholesale));
        }
        if let Some(retail) = self.retail {
            assignments.push(Assignment::Money("retail", retail));
        }

        if assignments.is_empty() {
            return Err(AppError::Validation("nothing to update".to_string()));
        }

        Ok(assignments)
    }
}

impl Product {
    /// Public id combining channel and row id, e.g. `WS-7`
    pub fn public_id(&self) -> String {
        format!("{}{}", self.channel.product_id_prefix(), self.product_id)
    }

    /// Lists a catalog, or both catalogs when no channel is given
    pub async fn list(pool: &PgPool, channel: Option<Channel>) -> Result<Vec<Self>, sqlx::Error> {
        let query = match channel {
            Some(channel) => format!("{} ORDER BY product_name", select_catalog(channel)),
            None => format!(
                "{} UNION ALL {} ORDER BY product_name",
                select_catalog(Channel::Retail),
                select_catalog(Channel::Wholesale)
            ),
        };

        sqlx::query_as::<_, Self>(&query).fetch_all(pool).await
    }

    /// Finds a product by its public id
    ///
    /// A bare number is looked up in the retail catalog.
    pub async fn find_by_public_id(
        pool: &PgPool,
        public_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some((channel, product_id)) = parse_public_id(public_id) else {
            return Ok(None);
        };

        let query = format!("{} WHERE product_id = $1", select_catalog(channel));
        sqlx::query_as::<_, Self>(&query)
            .bind(product_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &PgPool, data: NewProduct) -> Result<Self, AppError> {
        let data = data.prepare()?;

        let query = format!(
            "INSERT INTO {} (product_name, duration, renew, wholesale, retail) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            data.channel.catalog_table(),
            catalog_columns(data.channel)
        );
        let product = sqlx::query_as::<_, Self>(&query)
            .bind(&data.product_name)
            .bind(data.duration)
            .bind(data.renew)
            .bind(data.wholesale)
            .bind(data.retail)
            .fetch_one(pool)
            .await?;

        tracing::info!(product_id = %product.public_id(), "Product added to catalog");

        Ok(product)
    }

    pub async fn update(
        pool: &PgPool,
        public_id: &str,
        update: ProductUpdate,
    ) -> Result<Option<Self>, AppError> {
        let Some((channel, product_id)) = parse_public_id(public_id) else {
            return Ok(None);
        };
        let assignments = update.assignments()?;

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", channel.catalog_table()));
        {
            let mut separated = builder.separated(", ");
            for assignment in assignments {
                match assignment {
                    Assignment::Text(column, value) => {
                        separated.push(format!("{} = ", column));
                        separated.push_bind_unseparated(value);
                    }
                    Assignment::Int(column, value) => {
                        separated.push(format!("{} = ", column));
                        separated.push_bind_unseparated(value);
                    }
                    Assignment::Money(column, value) => {
                        separated.push(format!("{} = ", column));
                        separated.push_bind_unseparated(value);
                    }
                }
            }
        }
        builder
            .push(" WHERE product_id = ")
            .push_bind(product_id)
            .push(format!(" RETURNING {}", catalog_columns(channel)));

        Ok(builder.build_query_as::<Self>().fetch_optional(pool).await?)
    }

    /// Returns false when no such product exists
    pub async fn delete(pool: &PgPool, public_id: &str) -> Result<bool, sqlx::Error> {
        let Some((channel, product_id)) = parse_public_id(public_id) else {
            return Ok(false);
        };

        let query = format!("DELETE FROM {} WHERE product_id = $1", channel.catalog_table());
        let result = sqlx::query(&query).bind(product_id).execute(pool).await?;

        Ok(result.rows_affected() > 0)
    }
}

fn catalog_columns(channel: Channel) -> String {
    format!(
        "product_id, '{}' AS channel, product_name, duration, renew, wholesale, retail",
        channel.as_str()
    )
}

fn select_catalog(channel: Channel) -> String {
    format!(
        "SELECT {} FROM {}",
        catalog_columns(channel),
        channel.catalog_table()
    )
}

/// Splits `R-12` / `WS-7` into channel and row id
pub fn parse_public_id(public_id: &str) -> Option<(Channel, i32)> {
    let public_id = public_id.trim();
    let wholesale = Channel::Wholesale.product_id_prefix();
    let retail = Channel::Retail.product_id_prefix();

    let (channel, id) = if let Some(id) = public_id.strip_prefix(wholesale) {
        (Channel::Wholesale, id)
    } else if let Some(id) = public_id.strip_prefix(retail) {
        (Channel::Retail, id)
    } else {
        (Channel::Retail, public_id)
    };

    id.parse().ok().map(|id| (channel, id))
}
