//! Status provider trait and the timeout-to-absent wrapper.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::report::StatusReport;

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Status command failed: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StatusError>;

/// Source of point-in-time agent, session and security data.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<StatusReport>;
}

/// Fetch a report, resolving to `None` on error or timeout.
pub async fn fetch_or_absent(
    provider: &Arc<dyn StatusProvider>,
    timeout: Duration,
) -> Option<StatusReport> {
    match tokio::time::timeout(timeout, provider.fetch()).await {
        Ok(Ok(report)) => Some(report),
        Ok(Err(e)) => {
            tracing::warn!("Status provider {} unavailable: {}", provider.name(), e);
            None
        }
        Err(_) => {
            tracing::warn!(
                "Status provider {} timed out after {}ms",
                provider.name(),
                timeout.as_millis()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider;

    #[async_trait]
    impl StatusProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch(&self) -> Result<StatusReport> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(StatusReport::default())
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl StatusProvider for BrokenProvider {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self) -> Result<StatusReport> {
            Err(StatusError::Unavailable("gateway offline".into()))
        }
    }

    #[tokio::test]
    async fn timeout_resolves_to_absent() {
        let provider: Arc<dyn StatusProvider> = Arc::new(SlowProvider);
        assert!(fetch_or_absent(&provider, Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn error_resolves_to_absent() {
        let provider: Arc<dyn StatusProvider> = Arc::new(BrokenProvider);
        assert!(fetch_or_absent(&provider, Duration::from_secs(1)).await.is_none());
    }
}
