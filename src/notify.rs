use std::process::Stdio;

use futures::future::BoxFuture;
use log::info;
use thiserror::Error;
use tokio::process::Command;

use crate::config::NtfySettings;
use crate::messages::Announcement;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Somewhere announcements can be delivered. Delivery is best effort; the
/// caller logs failures and moves on.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn announce<'a>(&'a self, announcement: &'a Announcement)
    -> BoxFuture<'a, Result<(), NotifyError>>;

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// Pushes plain-text messages to an ntfy topic by posting with curl.
pub struct NtfyNotifier {
    curl: String,
    url: String,
    topic: String,
    quiet: bool,
}

impl NtfyNotifier {
    /// In `quiet` mode an empty topic means "log only".
    pub fn new(settings: &NtfySettings, quiet: bool) -> Self {
        NtfyNotifier {
            curl: settings.curl_path.clone(),
            url: format!("{}/{}", settings.server.trim_end_matches('/'), settings.topic),
            topic: settings.topic.clone(),
            quiet,
        }
    }

    async fn send(&self, message: String) -> Result<(), NotifyError> {
        info!("🔔{} {}", self.topic, message);
        if self.quiet && self.topic.is_empty() {
            return Ok(());
        }

        let output = Command::new(&self.curl)
            .args(["-sS", "-d", &message, &self.url])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| NotifyError::Io {
                program: self.curl.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(NotifyError::Delivery(format!(
                "{} exited with {}: {}",
                self.curl,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl Notifier for NtfyNotifier {
    fn name(&self) -> &str {
        "ntfy"
    }

    fn announce<'a>(
        &'a self,
        announcement: &'a Announcement,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(self.send(announcement.message()))
    }
}
