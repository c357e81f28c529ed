//! HTTP page loader
//!
//! Plain `reqwest` fetch of server-rendered HTML. Request timeouts surface as
//! `NavigationError::LoadFailed` and are recovered like any other fetch failure.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use super::PageLoader;
use crate::domain::errors::NavigationError;
use crate::infrastructure::config::HttpConfig;

pub struct HttpPageLoader {
    client: Client,
}

impl HttpPageLoader {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageLoader for HttpPageLoader {
    async fn load(&self, url: &str) -> Result<String, NavigationError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NavigationError::load_failed(url, e))?;

        let status = response.status();
        debug!("HTTP {} for {}", status.as_u16(), url);
        if !status.is_success() {
            return Err(NavigationError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| NavigationError::load_failed(url, e))
    }
}
