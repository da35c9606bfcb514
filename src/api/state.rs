use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::Config;
use crate::services::telegram::TelegramClient;

/// Shared application state handed to every handler and job
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub telegram: TelegramClient,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}
