use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::api::state::AppState;
use crate::clock;
use crate::jobs::daily_notifications::send_daily_notifications;

/// Starts the scheduler running the daily notification job
///
/// The cron expression is evaluated in the configured time zone. The
/// returned scheduler must be kept alive for the job to keep firing.
pub async fn start(state: AppState) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    let cron = state.config.notification_cron.clone();
    let timezone = state.config.timezone;

    let job = Job::new_async_tz(cron.as_str(), timezone, move |_id, _scheduler| {
        let state = state.clone();
        Box::pin(async move {
            let today = clock::today_in(state.config.timezone);
            if let Err(e) = send_daily_notifications(
                &state.pool,
                &state.telegram,
                &state.config.telegram_channel_id,
                &state.config.alert_policy,
                today,
            )
            .await
            {
                tracing::error!(error = %e, "Daily notification job failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(cron = %cron, timezone = %timezone, "Notification scheduler started");

    Ok(scheduler)
}
