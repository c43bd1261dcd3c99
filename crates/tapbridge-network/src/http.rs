//! HTTP balance backend.
//!
//! Each endpoint is a URL template with a `{uid}` placeholder, queried with
//! `GET`. A 2xx response must carry a JSON object with a numeric `balance`;
//! other fields are ignored.
//!
//! ```text
//! GET http://backend:8080/card/A1B2C3D4
//! 200 {"uid": "A1B2C3D4", "balance": 72.5, "owner": "..."}
//! ```

use std::time::Duration;

use serde::Deserialize;
use tapbridge_core::{Error, Result, Uid};
use tapbridge_engine::{BalanceLookup, LookupError};

/// Placeholder replaced by the card UID.
pub const UID_PLACEHOLDER: &str = "{uid}";

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: f64,
}

/// One backend endpoint.
#[derive(Debug, Clone)]
pub struct HttpLookup {
    client: reqwest::Client,
    name: String,
    url_template: String,
    timeout: Duration,
}

impl HttpLookup {
    /// Create a lookup for `url_template`.
    ///
    /// # Errors
    ///
    /// `Error::Config` if the template is not an http(s) URL containing
    /// `{uid}`, the timeout is zero, or the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let url_template = url_template.into();

        if !url_template.starts_with("http://") && !url_template.starts_with("https://") {
            return Err(Error::Config(format!(
                "backend {name}: url must start with http:// or https://, got {url_template}"
            )));
        }
        if !url_template.contains(UID_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "backend {name}: url must contain {UID_PLACEHOLDER}"
            )));
        }
        if timeout.is_zero() {
            return Err(Error::Config(format!("backend {name}: timeout is zero")));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("backend {name}: {e}")))?;

        Ok(Self {
            client,
            name,
            url_template,
            timeout,
        })
    }

    /// Request URL for `uid`.
    pub fn url_for(&self, uid: &Uid) -> String {
        self.url_template.replace(UID_PLACEHOLDER, uid.as_str())
    }

    fn request_error(&self, e: reqwest::Error) -> LookupError {
        if e.is_timeout() {
            LookupError::Timeout {
                endpoint: self.name.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if e.is_connect() {
            LookupError::unreachable(&self.name, format!("connection failed: {e}"))
        } else {
            LookupError::unreachable(&self.name, e.to_string())
        }
    }
}

impl BalanceLookup for HttpLookup {
    async fn fetch(&self, uid: &Uid) -> std::result::Result<f64, LookupError> {
        let response = self
            .client
            .get(self.url_for(uid))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                endpoint: self.name.clone(),
                status: status.as_u16(),
            });
        }

        let body: BalanceResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(e)
            } else {
                LookupError::malformed(&self.name, e.to_string())
            }
        })?;

        Ok(body.balance)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
