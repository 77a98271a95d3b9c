//! Fire-and-forget alerting (§6, §7): structured-log sink always on, optional
//! Discord webhook sink. Grounded on
//! `paper_trading::discord_alerts::DiscordAlerter`'s embed/webhook shape,
//! narrowed from opportunity-specific embeds to a generic title/payload/level
//! envelope.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warn,
    Error,
    Success,
    Critical,
}

impl AlertLevel {
    fn color(self) -> u32 {
        match self {
            AlertLevel::Info => 0x3498DB,
            AlertLevel::Warn => 0xF1C40F,
            AlertLevel::Error => 0xE74C3C,
            AlertLevel::Success => 0x2ECC71,
            AlertLevel::Critical => 0x992D22,
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertLevel::Info => "info",
            AlertLevel::Warn => "warn",
            AlertLevel::Error => "error",
            AlertLevel::Success => "success",
            AlertLevel::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// An alert sink must never block the caller on a slow or unreachable
/// downstream; implementations log their own delivery failures rather than
/// propagating them.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, title: &str, payload: Value, level: AlertLevel);
}

/// Always-on sink: every alert becomes a structured log line at a severity
/// matching its level, so alerts are visible even with no webhook configured.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn alert(&self, title: &str, payload: Value, level: AlertLevel) {
        match level {
            AlertLevel::Info | AlertLevel::Success => info!(payload = %payload, "{title}"),
            AlertLevel::Warn => warn!(payload = %payload, "{title}"),
            AlertLevel::Error | AlertLevel::Critical => error!(payload = %payload, "{title}"),
        }
    }
}

#[derive(Serialize)]
struct DiscordMessage {
    embeds: Vec<DiscordEmbed>,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
}

pub struct DiscordAlertSink {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordAlertSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for DiscordAlertSink {
    async fn alert(&self, title: &str, payload: Value, level: AlertLevel) {
        let embed = DiscordEmbed {
            title: title.to_string(),
            description: serde_json::to_string_pretty(&payload).unwrap_or_default(),
            color: level.color(),
        };
        let message = DiscordMessage { embeds: vec![embed] };

        match self.client.post(&self.webhook_url).json(&message).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!(status = %response.status(), "discord webhook returned non-success status"),
            Err(e) => warn!(error = %e, "discord webhook delivery failed"),
        }
    }
}

/// Broadcasts to every configured sink; delivery to one sink never blocks or
/// is gated on another.
pub struct AlertHub {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl AlertHub {
    pub fn new(sinks: Vec<Box<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    pub async fn alert(&self, title: &str, payload: Value, level: AlertLevel) {
        for sink in &self.sinks {
            sink.alert(title, payload.clone(), level).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn log_sink_never_panics_on_any_level() {
        let sink = LogAlertSink;
        for level in [AlertLevel::Info, AlertLevel::Warn, AlertLevel::Error, AlertLevel::Success, AlertLevel::Critical] {
            sink.alert("test", json!({"k": "v"}), level).await;
        }
    }

    #[tokio::test]
    async fn hub_with_no_sinks_is_a_noop() {
        let hub = AlertHub::new(vec![]);
        hub.alert("test", json!({}), AlertLevel::Info).await;
    }
}
