use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::clock;
use crate::error::{AppError, Result};
use crate::lifecycle::{normalize, ClassifiedAlert, Normalized, RejectedRecord};
use crate::models::{SaleLine, SalesTotals, SubscriptionRow};

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct DailySummary {
    date: NaiveDate,
    totals: SalesTotals,
    sales: Vec<SaleLine>,
}

async fn daily_summary(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<DailySummary>> {
    let date = query
        .date
        .unwrap_or_else(|| clock::today_in(state.config.timezone));

    let totals = SalesTotals::for_day(&state.pool, date).await?;
    let sales = SaleLine::on_day(&state.pool, date).await?;

    Ok(Json(DailySummary {
        date,
        totals,
        sales,
    }))
}

#[derive(Debug, Serialize)]
struct MonthlySummary {
    month: String,
    totals: SalesTotals,
}

async fn monthly_summary(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<MonthlySummary>> {
    let date = query
        .date
        .unwrap_or_else(|| clock::today_in(state.config.timezone));

    Ok(Json(MonthlySummary {
        month: date.format("%Y-%m").to_string(),
        totals: SalesTotals::for_month(&state.pool, date).await?,
    }))
}

#[derive(Debug, Serialize)]
struct AlertsResponse<'a> {
    today: NaiveDate,
    expiring: Vec<ClassifiedAlert<'a>>,
    renewals: Vec<ClassifiedAlert<'a>>,
    rejected: Vec<RejectedRecord>,
}

async fn alerts(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<serde_json::Value>> {
    let today = query
        .date
        .unwrap_or_else(|| clock::today_in(state.config.timezone));

    let rows = SubscriptionRow::fetch_raw(&state.pool).await?;
    let Normalized { records, rejected } = normalize(rows);
    let classification = state.config.alert_policy.classify(&records, today);

    let body = serde_json::to_value(AlertsResponse {
        today,
        expiring: classification.expiring,
        renewals: classification.renewals,
        rejected,
    })
    .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(body))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/summary", get(daily_summary))
        .route("/api/summary/monthly", get(monthly_summary))
        .route("/api/alerts", get(alerts))
}
