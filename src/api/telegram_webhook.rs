use axum::{body::Bytes, extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::NaiveDate;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::api::{middleware::auth::constant_time_eq, state::AppState};
use crate::clock;
use crate::error::{AppError, Result};
use crate::jobs::daily_notifications::build_digest;
use crate::models::{BotUser, SaleLine, SalesTotals, SubscriptionRow};
use crate::services::alert_formatter::{format_sales_lines, format_summary};

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

const HELP_TEXT: &str = "*Eraverse Bot*\n\n\
    /expiring - Subscriptions expiring soon\n\
    /renewals - Renewals due soon\n\
    /summary - Sales summary (optionally `/summary YYYY-MM-DD`)\n\
    /logout - Sign out";

const LOGIN_PROMPT: &str = "Please log in first: `/login <password>`";

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Login(String),
    Logout,
    Expiring,
    Renewals,
    Summary(Option<String>),
    Unknown(String),
}

impl Command {
    /// Parses a chat message; returns `None` for plain text
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };
        // Group chats address commands as `/summary@eraverse_bot`
        let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();
        let argument = (!argument.is_empty()).then(|| argument.to_string());

        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "login" => Command::Login(argument.unwrap_or_default()),
            "logout" => Command::Logout,
            "expiring" => Command::Expiring,
            "renewals" => Command::Renewals,
            "summary" => Command::Summary(argument),
            _ => Command::Unknown(name),
        })
    }

    fn requires_login(&self) -> bool {
        !matches!(
            self,
            Command::Start | Command::Help | Command::Login(_) | Command::Unknown(_)
        )
    }
}

/// Checks the secret Telegram echoes back on every webhook call
pub fn verify_secret(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| constant_time_eq(value.as_bytes(), expected.as_bytes()))
        .unwrap_or(false)
}

/// Receives Telegram updates
///
/// The secret is checked before the body is parsed. Once it is accepted the
/// answer is always 200, so Telegram does not redeliver an update whose
/// handling failed.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let expected = state
        .config
        .telegram_webhook_secret
        .as_ref()
        .map(|s| s.expose_secret().as_str());
    if !verify_secret(&headers, expected) {
        tracing::warn!("Webhook call with invalid secret token");
        return Err(AppError::Unauthorized);
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparsable webhook update");
            return Ok(Json(serde_json::json!({ "ok": true })));
        }
    };

    let Some(message) = update.message else {
        return Ok(Json(serde_json::json!({ "ok": true })));
    };
    let Some(command) = message.text.as_deref().and_then(Command::parse) else {
        return Ok(Json(serde_json::json!({ "ok": true })));
    };

    let chat_id = message.chat.id.to_string();
    let replies = match handle_command(&state, &message, command).await {
        Ok(replies) => replies,
        Err(e) => {
            tracing::error!(
                update_id = update.update_id,
                chat_id = %chat_id,
                error = %e,
                "Failed to handle chat command"
            );
            vec!["An error occurred while processing your request.".to_string()]
        }
    };

    state.telegram.send_batched(&chat_id, &replies).await;

    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn handle_command(
    state: &AppState,
    message: &Message,
    command: Command,
) -> Result<Vec<String>> {
    let Some(user) = &message.from else {
        return Ok(Vec::new());
    };

    if command.requires_login() && !BotUser::is_authenticated(&state.pool, user.id).await? {
        return Ok(vec![LOGIN_PROMPT.to_string()]);
    }

    let today = clock::today_in(state.config.timezone);
    let policy = &state.config.alert_policy;

    let replies = match command {
        Command::Start => {
            if BotUser::is_authenticated(&state.pool, user.id).await? {
                vec![HELP_TEXT.to_string()]
            } else {
                vec![format!("Welcome to Eraverse Bot!\n\n{}", LOGIN_PROMPT)]
            }
        }
        Command::Help => vec![HELP_TEXT.to_string()],
        Command::Login(password) => {
            if constant_time_eq(
                password.as_bytes(),
                state.config.bot_password.expose_secret().as_bytes(),
            ) {
                BotUser::save_authenticated(&state.pool, user.id, user.username.as_deref())
                    .await?;
                tracing::info!(telegram_id = user.id, "Bot user logged in");
                vec![format!("Login successful!\n\n{}", HELP_TEXT)]
            } else {
                tracing::warn!(
                    telegram_id = user.id,
                    username = ?user.username,
                    "Invalid password attempt"
                );
                vec!["Invalid password. Please try again.".to_string()]
            }
        }
        Command::Logout => {
            BotUser::deactivate(&state.pool, user.id).await?;
            vec!["You have been logged out.".to_string()]
        }
        Command::Expiring => {
            let rows = SubscriptionRow::fetch_raw(&state.pool).await?;
            build_digest(rows, today, policy).expiring_messages
        }
        Command::Renewals => {
            let rows = SubscriptionRow::fetch_raw(&state.pool).await?;
            build_digest(rows, today, policy).renewal_messages
        }
        Command::Summary(date) => {
            let day = match date {
                Some(text) => match NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
                    Ok(day) => day,
                    Err(_) => {
                        return Ok(vec![
                            "Invalid date format. Use `/summary YYYY-MM-DD`".to_string()
                        ])
                    }
                },
                None => today,
            };

            let daily = SalesTotals::for_day(&state.pool, day).await?;
            let monthly = SalesTotals::for_month(&state.pool, day).await?;
            let lines = SaleLine::on_day(&state.pool, day).await?;

            let mut replies = vec![format_summary(day, &daily, &monthly)];
            replies.extend(format_sales_lines(day, today, &lines));
            replies
        }
        Command::Unknown(name) => vec![format!("Unknown command /{}\n\n{}", name, HELP_TEXT)],
    };

    Ok(replies)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/telegram/webhook", post(webhook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("  /Expiring "), Some(Command::Expiring));
        assert_eq!(Command::parse("/renewals@eraverse_bot"), Some(Command::Renewals));
        assert_eq!(
            Command::parse("/login  hunter2 "),
            Some(Command::Login("hunter2".to_string()))
        );
        assert_eq!(Command::parse("/login"), Some(Command::Login(String::new())));
        assert_eq!(Command::parse("/summary"), Some(Command::Summary(None)));
        assert_eq!(
            Command::parse("/summary 2024-03-01"),
            Some(Command::Summary(Some("2024-03-01".to_string())))
        );
        assert_eq!(
            Command::parse("/refund"),
            Some(Command::Unknown("refund".to_string()))
        );
        assert_eq!(Command::parse("hello"), None);
    }

    #[test]
    fn test_login_not_required_for_entry_commands() {
        assert!(!Command::Start.requires_login());
        assert!(!Command::Login("x".into()).requires_login());
        assert!(Command::Expiring.requires_login());
        assert!(Command::Summary(None).requires_login());
        assert!(Command::Logout.requires_login());
    }

    #[test]
    fn test_verify_secret() {
        let mut headers = HeaderMap::new();
        assert!(verify_secret(&headers, None));
        assert!(!verify_secret(&headers, Some("s3cret")));

        headers.insert(SECRET_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        assert!(verify_secret(&headers, Some("s3cret")));
        assert!(!verify_secret(&headers, Some("other")));
    }

    #[test]
    fn test_update_deserialization() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 10001,
                "message": {
                    "message_id": 5,
                    "date": 1709251200,
                    "chat": { "id": -100123, "type": "group" },
                    "from": { "id": 42, "is_bot": false, "first_name": "Aye", "username": "aye" },
                    "text": "/expiring"
                }
            }"#,
        )
        .unwrap();

        let message = update.message.unwrap();
        assert_eq!(message.chat.id, -100123);
        assert_eq!(message.from.unwrap().username.as_deref(), Some("aye"));
        assert_eq!(
            message.text.as_deref().and_then(Command::parse),
            Some(Command::Expiring)
        );
    }

    async fn post_update(secret_header: Option<&str>, body: &str) -> axum::http::StatusCode {
        use crate::api::state::test_support::lazy_state;
        use axum::body::Body;
        use tower::ServiceExt;

        let app: Router = router().with_state(lazy_state(Some("s3cret")));
        let mut request = axum::http::Request::builder()
            .method("POST")
            .uri("/telegram/webhook")
            .header("content-type", "application/json");
        if let Some(value) = secret_header {
            request = request.header(SECRET_TOKEN_HEADER, value);
        }

        app.oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_webhook_rejects_wrong_secret() {
        let status = post_update(Some("guess"), r#"{"update_id": 1}"#).await;
        assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);

        let status = post_update(None, r#"{"update_id": 1}"#).await;
        assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_checks_secret_before_parsing_body() {
        let status = post_update(None, "not json at all").await;
        assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);

        let status = post_update(Some("guess"), r#"{"update_id": "x"}"#).await;
        assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);

        let status = post_update(Some("s3cret"), "not json at all").await;
        assert_eq!(status, axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_updates_without_commands() {
        let status = post_update(Some("s3cret"), r#"{"update_id": 2}"#).await;
        assert_eq!(status, axum::http::StatusCode::OK);

        let status = post_update(
            Some("s3cret"),
            r#"{"update_id": 3, "message": {"chat": {"id": 5}, "text": "just chatting"}}"#,
        )
        .await;
        assert_eq!(status, axum::http::StatusCode::OK);
    }
}
