//! REST client adapter for the expense server.
//!
//! [`RestClient`] is the shipping [`ExpenseApi`] implementation. It is
//! configured with a single base URL, bounds every request with a timeout
//! (30 seconds unless overridden), and funnels every response through one
//! decoder so that failure classification is identical for all endpoints:
//!
//! - 2xx with the expected body → decoded payload
//! - any status with an `{error}` body → [`Error::BadRequest`]
//! - transport failure (connect, timeout) → [`Error::NetworkError`]
//! - undecodable body → [`Error::ParseError`]
//! - anything else → [`Error::Unknown`]

use crate::api::ExpenseApi;
use crate::error::{Error, Result};
use crate::model::{DateRange, Expense, ExpenseDraft, ExpensePatch, Summary};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Upper bound on any single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Standard success wrapper for list/detail/summary endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    code: u16,
    message: String,
    data: T,
}

/// Validation failure body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Acknowledgement body of the delete endpoint.
#[derive(Debug, Deserialize)]
struct DeleteAck {
    success: bool,
}

/// HTTP adapter against the expense REST surface.
#[derive(Clone, Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
}

impl RestClient {
    /// Create a client for the given server origin with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::ValidationError` for an unparsable base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::ValidationError` for an unparsable base URL and
    /// `Error::Unknown` when the underlying client cannot be constructed.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::ValidationError(format!("Invalid base URL: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Unknown(format!("Failed to build HTTP client: {}", e)))?;
        Ok(RestClient { http, base })
    }

    /// Server origin this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::ValidationError(format!("Invalid request path {}: {}", path, e)))
    }

    /// Decode an enveloped success payload, or classify the failure.
    async fn decode_enveloped<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        debug!(
            "« {} {} ({})",
            envelope.code, envelope.message, envelope.status
        );
        Ok(envelope.data)
    }

    /// Decode a bare success payload, or classify the failure.
    async fn decode_plain<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Classify a non-success response independent of which call produced it.
fn classify_failure(status: StatusCode, body: &[u8]) -> Error {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return Error::BadRequest(parsed.error);
    }
    Error::Unknown(format!("server returned {}", status))
}

#[async_trait]
impl ExpenseApi for RestClient {
    async fn list_expenses(&self, search: Option<&str>) -> Result<Vec<Expense>> {
        let mut url = self.url("/expenses")?;
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            url.query_pairs_mut().append_pair("search", search);
        }
        debug!("» GET {}", url);
        let resp = self.http.get(url).send().await?;
        Self::decode_enveloped(resp).await
    }

    async fn get_expense(&self, id: &str) -> Result<Expense> {
        let url = self.url(&format!("/expenses/{}", id))?;
        debug!("» GET {}", url);
        let resp = self.http.get(url).send().await?;
        Self::decode_enveloped(resp).await
    }

    async fn create_expense(&self, draft: &ExpenseDraft) -> Result<Expense> {
        let url = self.url("/expenses")?;
        debug!("» POST {}", url);
        let resp = self.http.post(url).json(draft).send().await?;
        Self::decode_plain(resp).await
    }

    async fn update_expense(&self, id: &str, patch: &ExpensePatch) -> Result<Expense> {
        let url = self.url(&format!("/expenses/{}", id))?;
        debug!("» PATCH {}", url);
        let resp = self.http.patch(url).json(patch).send().await?;
        Self::decode_plain(resp).await
    }

    async fn delete_expense(&self, id: &str) -> Result<()> {
        let url = self.url(&format!("/expenses/{}", id))?;
        debug!("» DELETE {}", url);
        let resp = self.http.delete(url).send().await?;
        let ack: DeleteAck = Self::decode_plain(resp).await?;
        if !ack.success {
            return Err(Error::Unknown("delete was not acknowledged".to_string()));
        }
        Ok(())
    }

    async fn fetch_summary(&self, range: Option<&DateRange>) -> Result<Summary> {
        let mut url = self.url("/expenses/summary/total")?;
        if let Some(range) = range {
            url.query_pairs_mut()
                .append_pair("startDate", &range.start_param())
                .append_pair("endDate", &range.end_param());
        }
        debug!("» GET {}", url);
        let resp = self.http.get(url).send().await?;
        Self::decode_enveloped(resp).await
    }
}
