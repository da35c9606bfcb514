use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Telegram rejects messages longer than this many characters
pub const MAX_MESSAGE_CHARS: usize = 4096;
/// Messages joined into a single `sendMessage` call
pub const BATCH_SIZE: usize = 10;

#[derive(thiserror::Error, Debug)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Telegram API error: {status} - {description}")]
    ApiError {
        status: StatusCode,
        description: String,
    },
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base_url: String,
    bot_token: Secret<String>,
}

impl TelegramClient {
    pub fn new(
        api_base_url: &str,
        bot_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bot_token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base_url,
            self.bot_token.expose_secret(),
            method
        )
    }

    /// Checks that the bot token is accepted by the API
    #[tracing::instrument(skip(self))]
    pub async fn get_me(&self) -> Result<(), TelegramError> {
        let response = self.client.get(self.method_url("getMe")).send().await?;
        check_response(response).await
    }

    /// Sends one Markdown message
    #[tracing::instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TelegramError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessageRequest {
                chat_id,
                text,
                parse_mode: "Markdown",
            })
            .send()
            .await?;

        check_response(response).await
    }

    /// Sends messages grouped into as few API calls as the limits allow
    ///
    /// A batch rejected as a bad request is retried one message at a time, so
    /// a single message with broken Markdown does not take its neighbours
    /// down. Other failures are logged and counted; later batches are still
    /// sent.
    pub async fn send_batched(&self, chat_id: &str, messages: &[String]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for (index, group) in group_messages(messages).into_iter().enumerate() {
            let batch = group.join("\n");
            let err = match self.send_message(chat_id, &batch).await {
                Ok(()) => {
                    report.sent += 1;
                    continue;
                }
                Err(e) => e,
            };

            let rejected = matches!(
                &err,
                TelegramError::ApiError { status, .. } if *status == StatusCode::BAD_REQUEST
            );
            if !rejected || group.len() == 1 {
                tracing::error!(
                    chat_id = %chat_id,
                    batch = index + 1,
                    error = %err,
                    "Failed to send message batch"
                );
                report.failed += 1;
                continue;
            }

            tracing::warn!(
                chat_id = %chat_id,
                batch = index + 1,
                messages = group.len(),
                error = %err,
                "Batch rejected, sending its messages one by one"
            );
            for message in group {
                match self.send_message(chat_id, message).await {
                    Ok(()) => report.sent += 1,
                    Err(e) => {
                        tracing::error!(
                            chat_id = %chat_id,
                            batch = index + 1,
                            error = %e,
                            "Failed to send message"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }
}

async fn check_response(response: reqwest::Response) -> Result<(), TelegramError> {
    let status = response.status();
    let body: Option<ApiResponse> = response.json().await.ok();

    match body {
        Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
        Some(ApiResponse { description, .. }) => Err(TelegramError::ApiError {
            status,
            description: description.unwrap_or_else(|| "Unknown error".to_string()),
        }),
        None => Err(TelegramError::ApiError {
            status,
            description: "Unreadable response body".to_string(),
        }),
    }
}

/// Joins up to `BATCH_SIZE` messages per call, staying under `MAX_MESSAGE_CHARS`
///
/// A single message longer than the limit is passed through on its own.
pub fn batch_messages(messages: &[String]) -> Vec<String> {
    group_messages(messages)
        .into_iter()
        .map(|group| group.join("\n"))
        .collect()
}

/// Consecutive runs of messages that fit in one call
fn group_messages(messages: &[String]) -> Vec<&[String]> {
    let mut groups = Vec::new();
    let mut start = 0;
    let mut current_chars = 0;

    for (index, message) in messages.iter().enumerate() {
        let message_chars = message.chars().count();
        let count = index - start;
        if count > 0
            && (count == BATCH_SIZE || current_chars + 1 + message_chars > MAX_MESSAGE_CHARS)
        {
            groups.push(&messages[start..index]);
            start = index;
            current_chars = 0;
        }

        if index > start {
            current_chars += 1;
        }
        current_chars += message_chars;
    }

    if start < messages.len() {
        groups.push(&messages[start..]);
    }

    groups
}
