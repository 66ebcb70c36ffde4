// envsync/src/notify/mod.rs
use serde::Serialize;
use tracing::debug;

use crate::config::SyncOptions;
use crate::environment::Environment;
use crate::utils::command::{CommandRunner, ToolCommand};

const UNKNOWN_USER: &str = "Unknown";
const SUCCESS_COLOR: &str = "#36a64f";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackAttachment {
    pub fallback: String,
    pub color: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlackPayload {
    pub channel: String,
    pub attachments: Vec<SlackAttachment>,
}

impl SlackPayload {
    pub fn sync_complete(channel: &str, from_url: &str, to_url: &str, user: &str) -> Self {
        Self {
            channel: channel.to_string(),
            attachments: vec![SlackAttachment {
                fallback: String::new(),
                color: SUCCESS_COLOR.to_string(),
                text: format!("🔄 Sync from {} to {} by {} complete", from_url, to_url, user),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Disabled, not configured, or not requested.
    Skipped,
    Sent,
    Failed(String),
}

/// Display name of whoever runs the sync, from `git config user.name`.
pub async fn current_user(runner: &dyn CommandRunner, options: &SyncOptions) -> String {
    let command = ToolCommand::new("git")
        .args(["config", "user.name"])
        .timeout(options.command_timeout());
    match runner.run(&command).await {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => output.stdout.trim().to_string(),
        Ok(_) => UNKNOWN_USER.to_string(),
        Err(e) => {
            debug!(error = %e, "identity lookup failed");
            UNKNOWN_USER.to_string()
        }
    }
}

pub struct Notifier<'a> {
    runner: &'a dyn CommandRunner,
    options: &'a SyncOptions,
}

impl<'a> Notifier<'a> {
    pub fn new(runner: &'a dyn CommandRunner, options: &'a SyncOptions) -> Self {
        Self { runner, options }
    }

    /// Posts the completion message. Never returns an error: delivery
    /// problems come back as [`NotifyOutcome::Failed`].
    pub async fn notify_sync_complete(&self, from: &Environment, to: &Environment) -> NotifyOutcome {
        if !self.options.enable_slack_notifications {
            return NotifyOutcome::Skipped;
        }
        let Some(webhook_url) = self.options.slack_webhook_url.as_deref().filter(|u| !u.is_empty()) else {
            debug!("notifications enabled but no webhook url configured");
            return NotifyOutcome::Skipped;
        };

        let user = current_user(self.runner, self.options).await;
        let payload = SlackPayload::sync_complete(&self.options.slack_channel, &from.url, &to.url, &user);

        let mut request = reqwest::Client::new().post(webhook_url).json(&payload);
        if let Some(limit) = self.options.command_timeout() {
            request = request.timeout(limit);
        }
        match request.send().await.and_then(|response| response.error_for_status()) {
            Ok(_) => NotifyOutcome::Sent,
            Err(e) => NotifyOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::{ScriptedRunner, failed, ok};
    use serde_json::json;

    fn environment(name: &str, url: &str) -> Environment {
        Environment {
            name: name.into(),
            url: url.into(),
            uploads_path: "web/app/uploads/".into(),
            cli_alias: None,
            ssh_host: None,
            ssh_port: 22,
            remote_path: None,
        }
    }

    #[test]
    fn test_payload_shape() -> anyhow::Result<()> {
        let payload = SlackPayload::sync_complete("#deploys", "https://example.com", "https://example.test", "Ada");
        assert_eq!(
            serde_json::to_value(&payload)?,
            json!({
                "channel": "#deploys",
                "attachments": [{
                    "fallback": "",
                    "color": "#36a64f",
                    "text": "🔄 Sync from https://example.com to https://example.test by Ada complete"
                }]
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_current_user_falls_back_to_unknown() {
        let options = SyncOptions::default();
        let named = ScriptedRunner::with(|_| ok("Ada Lovelace\n"));
        assert_eq!(current_user(&named, &options).await, "Ada Lovelace");

        let unset = ScriptedRunner::with(|_| failed(""));
        assert_eq!(current_user(&unset, &options).await, UNKNOWN_USER);
    }

    #[tokio::test]
    async fn test_skipped_without_webhook() {
        let options = SyncOptions {
            enable_slack_notifications: true,
            slack_webhook_url: None,
            ..Default::default()
        };
        let runner = ScriptedRunner::succeeding();
        let notifier = Notifier::new(&runner, &options);
        let outcome = notifier
            .notify_sync_complete(
                &environment("production", "https://example.com"),
                &environment("development", "https://example.test"),
            )
            .await;
        assert_eq!(outcome, NotifyOutcome::Skipped);
        assert!(runner.calls().is_empty());
    }
}
