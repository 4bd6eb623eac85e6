//! Reqwest-backed chat Web API client
//!
//! Thin transport layer: cursor pagination parameters in, serde envelopes
//! out, HTTP status mapped onto the error taxonomy. Retry policy lives with
//! callers, never here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::client::{ChatApi, HistoryPage, TokenKind};
use super::types::{HistoryResponse, RawUser, UserResponse};
use crate::core::constants::{
    CHAT_API_BASE_URL, ENV_BOT_TOKEN, ENV_USER_TOKEN, HISTORY_PAGE_LIMIT, HTTP_TIMEOUT_SECS,
};
use crate::data::error::DataError;
use crate::data::types::UserRecord;
use crate::utils::time::datetime_to_message_ts;

/// Chat Web API client over HTTPS
pub struct SlackHttpClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    token_kind: TokenKind,
}

impl SlackHttpClient {
    /// Construct from environment: `USER_TOKEN` takes precedence, then
    /// `BOT_TOKEN`; startup fails when neither is set.
    pub fn from_env() -> Result<Self, DataError> {
        let (token, token_kind) = match std::env::var(ENV_USER_TOKEN) {
            Ok(token) if !token.is_empty() => (token, TokenKind::User),
            _ => match std::env::var(ENV_BOT_TOKEN) {
                Ok(token) if !token.is_empty() => (token, TokenKind::Bot),
                _ => {
                    return Err(DataError::Config(format!(
                        "No chat credential found; set {ENV_USER_TOKEN} or {ENV_BOT_TOKEN}"
                    )));
                }
            },
        };
        Self::new(CHAT_API_BASE_URL, token, token_kind)
    }

    /// Construct against an explicit base URL (tests point this at a local server)
    pub fn new(
        base_url: impl Into<String>,
        token: String,
        token_kind: TokenKind,
    ) -> Result<Self, DataError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        tracing::debug!(token_kind = %token_kind, "Chat client initialized");
        Ok(Self {
            http,
            base_url: base_url.into(),
            token,
            token_kind,
        })
    }

    /// The credential kind in use (for logging)
    pub fn token_kind(&self) -> TokenKind {
        self.token_kind
    }

    /// Call one API method, map HTTP status onto the error taxonomy, and
    /// deserialize the envelope.
    async fn get_json<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, DataError> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        match status {
            s if s.is_success() => Ok(response.json::<T>().await?),
            StatusCode::TOO_MANY_REQUESTS => Err(DataError::Retryable {
                status: status.as_u16(),
                retry_after: parse_retry_after(&response),
            }),
            s if s.is_server_error() => Err(DataError::Retryable {
                status: status.as_u16(),
                retry_after: parse_retry_after(&response),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DataError::Auth {
                status: status.as_u16(),
                detail: response.text().await.unwrap_or_default(),
            }),
            StatusCode::NOT_FOUND => Err(DataError::not_found(method.to_string())),
            _ => Err(DataError::Fatal(format!(
                "{method} returned unexpected status {status}"
            ))),
        }
    }

    fn page_params(
        channel_id: &str,
        cursor: Option<&str>,
        extra: &[(&'static str, String)],
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("limit", HISTORY_PAGE_LIMIT.to_string()),
        ];
        params.extend_from_slice(extra);
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        params
    }
}

/// Map the platform's application-level `error` field onto the taxonomy
fn api_error(method: &str, error: Option<String>) -> DataError {
    let code = error.unwrap_or_else(|| "unknown_error".to_string());
    match code.as_str() {
        "ratelimited" => DataError::Retryable {
            status: 429,
            retry_after: None,
        },
        "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked" => DataError::Auth {
            status: 401,
            detail: code,
        },
        "channel_not_found" | "user_not_found" | "thread_not_found" => {
            DataError::not_found(format!("{method}: {code}"))
        }
        _ => DataError::Fatal(format!("{method} failed: {code}")),
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn user_from_raw(raw: RawUser) -> UserRecord {
    let profile = raw.profile.unwrap_or(super::types::RawUserProfile {
        real_name: None,
        display_name: None,
        email: None,
    });
    UserRecord {
        user_id: raw.id,
        name: raw.name,
        real_name: profile.real_name.filter(|s| !s.is_empty()),
        display_name: profile.display_name.filter(|s| !s.is_empty()),
        email: profile.email.filter(|s| !s.is_empty()),
        is_bot: raw.is_bot,
    }
}

#[async_trait]
impl ChatApi for SlackHttpClient {
    async fn history(
        &self,
        channel_id: &str,
        oldest: DateTime<Utc>,
        latest: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, DataError> {
        let extra = [
            ("oldest", datetime_to_message_ts(oldest)),
            ("latest", datetime_to_message_ts(latest)),
        ];
        let params = Self::page_params(channel_id, cursor, &extra);
        let resp: HistoryResponse = self.get_json("conversations.history", &params).await?;
        if !resp.ok {
            return Err(api_error("conversations.history", resp.error));
        }
        Ok(HistoryPage {
            next_cursor: resp.next_cursor(),
            messages: resp.messages,
        })
    }

    async fn replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, DataError> {
        let extra = [("ts", thread_ts.to_string())];
        let params = Self::page_params(channel_id, cursor, &extra);
        let resp: HistoryResponse = self.get_json("conversations.replies", &params).await?;
        if !resp.ok {
            return Err(api_error("conversations.replies", resp.error));
        }
        Ok(HistoryPage {
            next_cursor: resp.next_cursor(),
            messages: resp.messages,
        })
    }

    async fn user(&self, user_id: &str) -> Result<UserRecord, DataError> {
        let params = [("user", user_id.to_string())];
        let resp: UserResponse = self.get_json("users.info", &params).await?;
        if !resp.ok {
            return Err(api_error("users.info", resp.error));
        }
        let raw = resp
            .user
            .ok_or_else(|| DataError::Fatal("users.info returned ok without a user".to_string()))?;
        Ok(user_from_raw(raw))
    }
}
