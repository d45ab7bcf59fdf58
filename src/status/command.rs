//! Status provider backed by a local CLI that prints a JSON report.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::provider::{Result, StatusError, StatusProvider};
use super::report::StatusReport;

pub struct CommandStatusProvider {
    program: String,
    args: Vec<String>,
}

impl CommandStatusProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl StatusProvider for CommandStatusProvider {
    fn name(&self) -> &str {
        &self.program
    }

    async fn fetch(&self) -> Result<StatusReport> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StatusError::Command(stderr.trim().to_string()));
        }

        parse_report(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse CLI output. Some tools print banner lines before the JSON body, so
/// parsing starts at the first `{`.
fn parse_report(stdout: &str) -> Result<StatusReport> {
    let body = stdout
        .find('{')
        .map(|start| &stdout[start..])
        .ok_or_else(|| StatusError::Unavailable("status command printed no JSON".to_string()))?;
    Ok(serde_json::from_str(body)?)
}
