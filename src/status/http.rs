//! Status provider that GETs a JSON report from an HTTP endpoint.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::provider::{Result, StatusError, StatusProvider};
use super::report::StatusReport;

pub struct HttpStatusProvider {
    client: Client,
    url: String,
}

impl HttpStatusProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl StatusProvider for HttpStatusProvider {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<StatusReport> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(StatusError::Unavailable(format!(
                "{} returned {}",
                self.url,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}
