use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::api::state::AppState;
use crate::error::{AppError, Result};
use crate::models::BotUser;

async fn list_bot_users(State(state): State<AppState>) -> Result<Json<Vec<BotUser>>> {
    Ok(Json(BotUser::list(&state.pool).await?))
}

/// Revokes chat access; the user has to `/login` again
async fn remove_bot_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    if BotUser::delete(&state.pool, id).await? {
        tracing::info!(bot_user_id = id, "Bot user removed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("bot user {}", id)))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/bot-users", get(list_bot_users))
        .route("/api/bot-users/:id", delete(remove_bot_user))
}
