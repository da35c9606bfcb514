// API module - HTTP endpoints

pub mod bot_users;
pub mod health;
pub mod middleware;
pub mod products;
pub mod reports;
pub mod sales;
pub mod state;
pub mod telegram_webhook;

use axum::Router;

use self::middleware::auth::require_api_token;
use self::state::AppState;

/// JSON API routes behind the bearer token guard
pub fn protected_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(sales::router())
        .merge(products::router())
        .merge(reports::router())
        .merge(bot_users::router())
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            require_api_token,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::state::test_support::lazy_state;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app() -> Router {
        let state = lazy_state(None);
        protected_router(state.clone()).with_state(state)
    }

    async fn send(method: &str, uri: &str, body: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_invalid_requests_fail_before_the_database() {
        assert_eq!(
            send("GET", "/api/sales/retail?month=2024-13", "").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            send("GET", "/api/sales/online/export", "").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            send("POST", "/api/sales/bulk", r#"{"sales": []}"#).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            send("PATCH", "/api/sales/wholesale/4", "{}").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            send("PATCH", "/api/products/R-1", r#"{"duration": 0}"#).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            send(
                "POST",
                "/api/products",
                r#"{"channel": "retail", "product_name": "", "duration": 1}"#
            )
            .await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_unparsable_ids_are_not_found() {
        assert_eq!(
            send("PATCH", "/api/products/X-9", r#"{"renew": 1}"#).await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(send("DELETE", "/api/products/WS-", "").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_routes_win_over_channel_param() {
        // `bulk` is POST only; GET must not be parsed as a channel
        assert_eq!(
            send("GET", "/api/sales/bulk", "").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
