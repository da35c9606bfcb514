use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::state::AppState;
use crate::error::{AppError, Result};
use crate::lifecycle::Channel;
use crate::models::{NewProduct, Product, ProductUpdate};

#[derive(Debug, Deserialize)]
struct ProductQuery {
    channel: Option<Channel>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(Product::list(&state.pool, query.channel).await?))
}

async fn create_product(
    State(state): State<AppState>,
    Json(data): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = Product::create(&state.pool, data).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> Result<Json<Product>> {
    Product::find_by_public_id(&state.pool, &public_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {}", public_id)))
}

async fn update_product(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    let product = Product::update(&state.pool, &public_id, update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", public_id)))?;

    tracing::info!(product_id = %product.public_id(), "Product updated");

    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> Result<StatusCode> {
    if Product::delete(&state.pool, &public_id).await? {
        tracing::info!(product_id = %public_id, "Product removed from catalog");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("product {}", public_id)))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_products).post(create_product))
        .route(
            "/api/products/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}
