//! External status provider: where live agent, session and security data
//! comes from.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod command;
pub mod http;
pub mod provider;
pub mod report;

pub use provider::{fetch_or_absent, StatusError, StatusProvider};
pub use report::StatusReport;

use crate::config::Settings;

/// Provider that always returns the same report, or always fails when built
/// with `None`. Used for offline runs and tests.
pub struct StaticStatusProvider {
    report: Option<StatusReport>,
}

impl StaticStatusProvider {
    pub fn new(report: Option<StatusReport>) -> Self {
        Self { report }
    }
}

#[async_trait]
impl StatusProvider for StaticStatusProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> provider::Result<StatusReport> {
        self.report
            .clone()
            .ok_or_else(|| StatusError::Unavailable("no status report configured".to_string()))
    }
}

/// Build the configured provider. A command takes precedence over a URL.
pub fn create_status_provider(settings: &Settings) -> Option<Arc<dyn StatusProvider>> {
    let status = &settings.status;
    if let Some(program) = status.command.as_deref().filter(|c| !c.trim().is_empty()) {
        return Some(Arc::new(command::CommandStatusProvider::new(
            program,
            status.args.clone(),
        )));
    }
    if let Some(url) = status.url.as_deref().filter(|u| !u.trim().is_empty()) {
        return Some(Arc::new(http::HttpStatusProvider::new(
            url,
            Duration::from_millis(status.timeout_ms),
        )));
    }
    None
}
