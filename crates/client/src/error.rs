use std::collections::BTreeMap;

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use stringr_shared::{FieldError, FilterError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never reached the service
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The service answered with a failure status
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The service rejected one or more field values
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    /// The response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Rejected before any request was made
    #[error(transparent)]
    Form(#[from] FieldError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// Turn a non-success response into the matching error.
    pub(crate) async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::from_status(status, &body)
    }

    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        let parsed: Option<ServiceErrorBody> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .map(|b| b.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::BAD_REQUEST => ClientError::Validation {
                message,
                fields: parsed.map(|b| b.field_messages()).unwrap_or_default(),
            },
            _ => ClientError::Server {
                status: status.as_u16(),
                message,
            },
        }
    }
}

/// `{"code": 400, "message": "...", "data": {"name": {"code": "...", "message": "..."}}}`
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: BTreeMap<String, serde_json::Value>,
}

impl ServiceErrorBody {
    fn field_messages(&self) -> BTreeMap<String, String> {
        self.data
            .iter()
            .map(|(field, detail)| {
                let message = detail
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("invalid value")
                    .to_string();
                (field.clone(), message)
            })
            .collect()
    }
}
