//! Chat responder: produces the assistant reply to an operator message.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::mission::{ChatMessage, ChatRole};

/// Author name on replies.
pub const ASSISTANT_AUTHOR: &str = "Mission Control";

#[async_trait]
pub trait ChatResponder: Send + Sync {
    fn name(&self) -> &str;

    async fn reply(&self, message: &ChatMessage) -> Result<String>;
}

/// Responder that runs a local CLI with the message as its final argument
/// and replies with its stdout.
pub struct CommandResponder {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandResponder {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Option<Self> {
        let program = config.responder_command.as_deref().filter(|c| !c.trim().is_empty())?;
        Some(Self::new(
            program,
            config.responder_args.clone(),
            Duration::from_millis(config.timeout_ms),
        ))
    }
}

#[async_trait]
impl ChatResponder for CommandResponder {
    fn name(&self) -> &str {
        &self.program
    }

    async fn reply(&self, message: &ChatMessage) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(&message.message);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::UpstreamUnavailable(format!("{} timed out", self.program)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::UpstreamUnavailable(stderr.trim().to_string()));
        }

        let reply = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if reply.is_empty() {
            return Err(Error::UpstreamUnavailable(format!("{} returned no reply", self.program)));
        }
        Ok(reply)
    }
}

/// Deterministic reply used when no responder is configured or it fails.
pub fn local_reply(message: &str) -> String {
    let text = message.trim();
    let lower = text.to_lowercase();
    if lower.contains("status") || lower.contains("health") {
        "Status is on the dashboard: agent health, token usage and security score refresh automatically.".to_string()
    } else if lower.contains("task") {
        "Tasks can be moved between Inbox, Assigned, In Progress and Review on the board.".to_string()
    } else {
        let preview: String = text.chars().take(80).collect();
        format!(
            "Noted: \"{}\". The agent gateway is not answering right now, so this reply was generated locally.",
            preview
        )
    }
}

/// Reply to `message`, falling back to [`local_reply`] on any failure.
pub async fn respond(responder: Option<&Arc<dyn ChatResponder>>, message: &ChatMessage) -> ChatMessage {
    let text = match responder {
        Some(responder) => match responder.reply(message).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Chat responder {} failed, replying locally: {}", responder.name(), e);
                local_reply(&message.message)
            }
        },
        None => local_reply(&message.message),
    };
    ChatMessage::new(ChatRole::Assistant, ASSISTANT_AUTHOR, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoResponder;

    #[async_trait]
    impl ChatResponder for EchoResponder {
        fn name(&self) -> &str {
            "echo"
        }

        async fn reply(&self, message: &ChatMessage) -> Result<String> {
            Ok(format!("echo: {}", message.message))
        }
    }

    #[tokio::test]
    async fn configured_responder_answers() {
        let responder: Arc<dyn ChatResponder> = Arc::new(EchoResponder);
        let msg = ChatMessage::new(ChatRole::User, "op", "ping");
        let reply = respond(Some(&responder), &msg).await;
        assert_eq!(reply.message, "echo: ping");
        assert_eq!(reply.role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn missing_command_falls_back_locally() {
        let responder: Arc<dyn ChatResponder> = Arc::new(CommandResponder::new(
            "mission-deck-no-such-responder",
            vec![],
            Duration::from_secs(1),
        ));
        let msg = ChatMessage::new(ChatRole::User, "op", "hello there");
        let reply = respond(Some(&responder), &msg).await;
        assert_eq!(reply.message, local_reply("hello there"));
        assert!(reply.message.contains("hello there"));
    }

    #[test]
    fn local_reply_is_deterministic() {
        assert_eq!(local_reply("task?"), local_reply("task?"));
        assert!(local_reply("what's the status").starts_with("Status"));
    }
}
