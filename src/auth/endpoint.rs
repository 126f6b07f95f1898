use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use tracing::debug;

use super::token::{TokenRecord, TokenResponse};
use crate::util::timeout::with_timeout;

/// Grant sent to the provider's token endpoint.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Grant<'a> {
    AuthorizationCode(&'a str),
    RefreshToken(&'a str),
}

impl Grant<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Self::AuthorizationCode(_) => "authorization_code",
            Self::RefreshToken(_) => "refresh_token",
        }
    }
}

/// Why a token endpoint call produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GrantError {
    /// 400/401: the code or refresh token is invalid, expired or revoked.
    Rejected { status: u16, code: Option<String> },
    /// Any other non-2xx response.
    Status { status: u16, code: Option<String> },
    Transport(String),
    Decode(String),
    Timeout(Duration),
}

impl GrantError {
    pub(crate) fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Rejected { status, code } | Self::Status { status, code } => format!(
                "token endpoint returned {status} ({})",
                code.as_deref().unwrap_or("no error code")
            ),
            Self::Transport(message) => format!("token endpoint unreachable: {message}"),
            Self::Decode(message) => format!("invalid token response: {message}"),
            Self::Timeout(duration) => {
                format!("token request timed out after {}ms", duration.as_millis())
            }
        }
    }
}

/// HTTP client for the provider's `/v2/oauth2/token` endpoint.
#[derive(Clone)]
pub(crate) struct TokenEndpoint {
    pub(crate) client: reqwest::Client,
    pub(crate) url: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) redirect_uri: String,
    pub(crate) timeout: Duration,
}

impl TokenEndpoint {
    pub(crate) async fn request(&self, grant: Grant<'_>) -> Result<TokenRecord, GrantError> {
        // issued_at must not be later than the provider's own issuance time.
        let requested_at = Utc::now();
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", grant.kind()),
        ];
        match grant {
            Grant::AuthorizationCode(code) => form.push(("code", code)),
            Grant::RefreshToken(token) => form.push(("refresh_token", token)),
        }

        let send = async {
            let resp = self
                .client
                .post(&self.url)
                .header("Accept", "application/json")
                .form(&form)
                .send()
                .await
                .map_err(|e| GrantError::Transport(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                let code = extract_error_code(&body);
                return Err(
                    if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
                        GrantError::Rejected {
                            status: status.as_u16(),
                            code,
                        }
                    } else {
                        GrantError::Status {
                            status: status.as_u16(),
                            code,
                        }
                    },
                );
            }
            let payload: TokenResponse = resp
                .json()
                .await
                .map_err(|e| GrantError::Decode(e.to_string()))?;
            payload.into_record(requested_at).map_err(GrantError::Decode)
        };

        let result = with_timeout(self.timeout, send, GrantError::Timeout).await;
        debug!(
            grant_type = grant.kind(),
            ok = result.is_ok(),
            "token endpoint call finished"
        );
        result
    }
}

fn extract_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
        })
}
