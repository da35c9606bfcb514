use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BotUser {
    pub id: i32,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl BotUser {
    /// Checks whether a chat user has logged in and is still active
    pub async fn is_authenticated(pool: &PgPool, telegram_id: i64) -> Result<bool, sqlx::Error> {
        let found: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT id FROM bot_users WHERE telegram_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(telegram_id)
        .fetch_optional(pool)
        .await?;

        Ok(found.is_some())
    }

    /// Records a successful login, reactivating a previously logged out user
    pub async fn save_authenticated(
        pool: &PgPool,
        telegram_id: i64,
        username: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO bot_users (telegram_id, username)
            VALUES ($1, $2)
            ON CONFLICT (telegram_id) DO UPDATE
            SET username = EXCLUDED.username, is_active = TRUE, last_login_at = NOW()
            RETURNING *
            "#,
        )
        .bind(telegram_id)
        .bind(username)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// All chat users, most recent login first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM bot_users ORDER BY last_login_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Removes a chat user so they must log in again; false when absent
    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM bot_users WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn deactivate(pool: &PgPool, telegram_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE bot_users SET is_active = FALSE WHERE telegram_id = $1
            "#,
        )
        .bind(telegram_id)
        .execute(pool)
        .await?;

        Ok(())
    }
}
