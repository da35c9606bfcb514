use chrono::NaiveDate;
use sqlx::PgPool;

use crate::lifecycle::{normalize, AlertPolicy, RawSubscription};
use crate::models::SubscriptionRow;
use crate::services::{
    alert_formatter::{format_expiring_message, format_renewals_message},
    telegram::{DeliveryReport, TelegramClient},
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationStats {
    pub total_records: usize,
    pub rejected_records: usize,
    pub expiring: usize,
    pub renewals: usize,
    pub batches_sent: usize,
    pub batches_failed: usize,
}

/// Formatted alert lists for one day, ready to send
#[derive(Debug, Clone)]
pub struct AlertDigest {
    pub today: NaiveDate,
    pub expiring_messages: Vec<String>,
    pub renewal_messages: Vec<String>,
    pub stats: NotificationStats,
}

/// Classifies a record snapshot and renders both alert lists
///
/// Rows that fail normalization are counted and logged; they never keep
/// other rows from being reported.
pub fn build_digest(
    rows: Vec<RawSubscription>,
    today: NaiveDate,
    policy: &AlertPolicy,
) -> AlertDigest {
    let total_records = rows.len();
    let normalized = normalize(rows);
    let classification = policy.classify(&normalized.records, today);

    if !normalized.rejected.is_empty() {
        tracing::warn!(
            rejected = normalized.rejected.len(),
            records = ?normalized.rejected,
            "Some subscription records were skipped"
        );
    }

    AlertDigest {
        today,
        expiring_messages: format_expiring_message(
            &classification.expiring,
            policy.expiring_horizon_days(),
        ),
        renewal_messages: format_renewals_message(
            &classification.renewals,
            policy.renewal_due_horizon_days(),
        ),
        stats: NotificationStats {
            total_records,
            rejected_records: normalized.rejected.len(),
            expiring: classification.expiring.len(),
            renewals: classification.renewals.len(),
            ..Default::default()
        },
    }
}

/// Sends the expiring list, then the renewals list
pub async fn deliver_digest(
    telegram: &TelegramClient,
    chat_id: &str,
    digest: &AlertDigest,
) -> DeliveryReport {
    let expiring = telegram.send_batched(chat_id, &digest.expiring_messages).await;
    let renewals = telegram.send_batched(chat_id, &digest.renewal_messages).await;

    DeliveryReport {
        sent: expiring.sent + renewals.sent,
        failed: expiring.failed + renewals.failed,
    }
}

/// Background job posting the daily expiring/renewal alerts to the channel
///
/// 1. Fetch every subscription from both sales tables
/// 2. Classify against `today` with the configured horizons
/// 3. Send both lists, in batches, to the notification channel
pub async fn send_daily_notifications(
    pool: &PgPool,
    telegram: &TelegramClient,
    chat_id: &str,
    policy: &AlertPolicy,
    today: NaiveDate,
) -> Result<NotificationStats, sqlx::Error> {
    let rows = SubscriptionRow::fetch_raw(pool).await?;

    tracing::info!(
        total_records = rows.len(),
        %today,
        "Starting daily notification job"
    );

    let digest = build_digest(rows, today, policy);
    let delivery = deliver_digest(telegram, chat_id, &digest).await;

    let stats = NotificationStats {
        batches_sent: delivery.sent,
        batches_failed: delivery.failed,
        ..digest.stats
    };

    tracing::info!(?stats, "Daily notification job completed");

    Ok(stats)
}
