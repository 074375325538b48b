//! HTTP response wrapper.

use std::collections::HashMap;

use reqwest::{Response, StatusCode};

use crate::rate_limit::parse_retry_after;

/// Response with headers captured before the body is consumed.
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub(crate) response: Response,
}

impl HttpResponse {
    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Server-requested wait before retrying, if any.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        parse_retry_after(self.headers.get("retry-after").map(|s| s.as_str()))
    }

    /// Read the body as text.
    pub async fn text(self) -> Result<String, reqwest::Error> {
        self.response.text().await
    }

    /// Deserialize a JSON body.
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T, reqwest::Error> {
        self.response.json().await
    }
}
