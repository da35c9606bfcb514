use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::error::{AppError, Result};
use crate::lifecycle::Channel;
use crate::models::summary::parse_month;
use crate::models::{NewSale, Sale, SaleUpdate};
use crate::services::csv_export::{export_file_name, sales_to_csv};

async fn create_sale(
    State(state): State<AppState>,
    Json(data): Json<NewSale>,
) -> Result<(StatusCode, Json<Sale>)> {
    let sale = Sale::create(&state.pool, data).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

#[derive(Debug, Deserialize)]
struct BulkSales {
    sales: Vec<NewSale>,
}

async fn create_sales_bulk(
    State(state): State<AppState>,
    Json(body): Json<BulkSales>,
) -> Result<(StatusCode, Json<Vec<Sale>>)> {
    let sales = Sale::create_many(&state.pool, body.sales).await?;
    Ok((StatusCode::CREATED, Json(sales)))
}

#[derive(Debug, Deserialize)]
struct MonthQuery {
    /// `YYYY-MM`
    month: Option<String>,
}

impl MonthQuery {
    fn first_day(&self) -> Result<Option<NaiveDate>> {
        match &self.month {
            None => Ok(None),
            Some(text) => parse_month(text).map(Some).ok_or_else(|| {
                AppError::Validation(format!("invalid month {:?}, expected YYYY-MM", text))
            }),
        }
    }
}

async fn list_sales(
    State(state): State<AppState>,
    Path(channel): Path<Channel>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Vec<Sale>>> {
    let month = query.first_day()?;
    Ok(Json(Sale::list(&state.pool, channel, month).await?))
}

async fn export_sales(
    State(state): State<AppState>,
    Path(channel): Path<Channel>,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse> {
    let month = query.first_day()?;
    let sales = Sale::list(&state.pool, channel, month).await?;
    let body = sales_to_csv(&sales).map_err(|e| AppError::Internal(e.into()))?;

    tracing::info!(channel = %channel, rows = sales.len(), "Sales exported");

    let file_name = export_file_name(channel.as_str(), query.month.as_deref());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    ))
}

async fn get_sale(
    State(state): State<AppState>,
    Path((channel, sale_id)): Path<(Channel, i32)>,
) -> Result<Json<Sale>> {
    Sale::find_by_id(&state.pool, channel, sale_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{} sale {}", channel, sale_id)))
}

async fn update_sale(
    State(state): State<AppState>,
    Path((channel, sale_id)): Path<(Channel, i32)>,
    Json(update): Json<SaleUpdate>,
) -> Result<Json<Sale>> {
    Sale::update(&state.pool, channel, sale_id, update)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{} sale {}", channel, sale_id)))
}

async fn delete_sale(
    State(state): State<AppState>,
    Path((channel, sale_id)): Path<(Channel, i32)>,
) -> Result<StatusCode> {
    if Sale::delete(&state.pool, channel, sale_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("{} sale {}", channel, sale_id)))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sales", post(create_sale))
        .route("/api/sales/bulk", post(create_sales_bulk))
        .route("/api/sales/:channel", get(list_sales))
        .route("/api/sales/:channel/export", get(export_sales))
        .route(
            "/api/sales/:channel/:id",
            get(get_sale).patch(update_sale).delete(delete_sale),
        )
}
