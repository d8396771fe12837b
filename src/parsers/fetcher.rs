//! HTTP fetcher used by every parser
//!
//! Pages are fetched with a bounded total timeout. Redirects are followed and
//! certificate verification is off, since several sources serve broken chains.

use crate::parsers::ParserError;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

const USER_AGENT: &str = concat!("black-library/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;

/// Builds the HTTP client shared by one parser
///
/// # Arguments
///
/// * `timeout` - Total time allowed for one request, body included
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages as text
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, ParserError> {
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }

    /// Fetches `url` and returns its body
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | 2xx | body text |
    /// | other status | `HttpStatus` |
    /// | timeout | `Fetch` ("request timeout") |
    /// | connection refused | `Fetch` ("connection refused") |
    /// | anything else | `Fetch` with the client's message |
    pub async fn fetch(&self, url: &str) -> Result<String, ParserError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ParserError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify_error(url, e))
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> ParserError {
    let reason = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection refused".to_string()
    } else if error.is_redirect() {
        "too many redirects".to_string()
    } else {
        error.to_string()
    };

    ParserError::Fetch {
        url: url.to_string(),
        reason,
    }
}
