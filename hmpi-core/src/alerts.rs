//! Threshold alerting over stored results
//!
//! Global invariants enforced:
//! - Hotspot evaluation is deterministic (stored order, reasons in fixed order)
//! - Thresholds are inclusive: a value equal to its threshold raises an alert
//! - Delivery is delegated to a [`Notifier`]; evaluation does no IO

use crate::report::StoredSample;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_HPI_THRESHOLD: f64 = 100.0;
pub const DEFAULT_CD_THRESHOLD: f64 = 3.0;

/// Alert thresholds and routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AlertConfig {
    pub hpi_threshold: f64,
    pub cd_threshold: f64,
    #[serde(default)]
    pub email_recipients: Vec<String>,
    #[serde(default)]
    pub sms_recipients: Vec<String>,
    /// Free-form region policies, kept as a JSON object
    #[serde(default = "empty_policy")]
    pub policy_json: serde_json::Value,
}

fn empty_policy() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            hpi_threshold: DEFAULT_HPI_THRESHOLD,
            cd_threshold: DEFAULT_CD_THRESHOLD,
            email_recipients: Vec::new(),
            sms_recipients: Vec::new(),
            policy_json: empty_policy(),
        }
    }
}

impl AlertConfig {
    /// Validate thresholds, recipients and policy shape
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("hpi_threshold", self.hpi_threshold),
            ("cd_threshold", self.cd_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                anyhow::bail!("{} must be a positive number (got {})", name, value);
            }
        }
        for recipient in self.email_recipients.iter().chain(&self.sms_recipients) {
            if recipient.trim().is_empty() {
                anyhow::bail!("alert recipients must not be empty");
            }
        }
        for email in &self.email_recipients {
            if !email.contains('@') {
                anyhow::bail!("invalid email recipient: {}", email);
            }
        }
        if !self.policy_json.is_object() {
            anyhow::bail!("policy_json must be a JSON object");
        }
        Ok(())
    }

    pub fn recipients(&self, channel: Channel) -> &[String] {
        match channel {
            Channel::Email => &self.email_recipients,
            Channel::Sms => &self.sms_recipients,
        }
    }
}

/// Split a comma-separated recipient list
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a sample was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertReason {
    HpiThreshold,
    CdThreshold,
}

/// A stored sample exceeding at least one threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Hotspot {
    pub sample_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub hpi: f64,
    pub cd: f64,
    pub reasons: Vec<AlertReason>,
}

/// Select samples at or above either threshold, in stored order
pub fn find_hotspots(samples: &[StoredSample], config: &AlertConfig) -> Vec<Hotspot> {
    samples
        .iter()
        .filter_map(|stored| {
            let mut reasons = Vec::new();
            if stored.result.hpi_value >= config.hpi_threshold {
                reasons.push(AlertReason::HpiThreshold);
            }
            if stored.result.cd_value >= config.cd_threshold {
                reasons.push(AlertReason::CdThreshold);
            }
            (!reasons.is_empty()).then(|| Hotspot {
                sample_id: stored.id,
                latitude: stored.sample.latitude,
                longitude: stored.sample.longitude,
                hpi: stored.result.hpi_value,
                cd: stored.result.cd_value,
                reasons,
            })
        })
        .collect()
}

/// Outcome of a dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Sent,
    NoRecipients,
    NoHotspots,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Sent => "sent",
            DispatchStatus::NoRecipients => "no_recipients",
            DispatchStatus::NoHotspots => "no_hotspots",
        }
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch summary returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AlertDispatch {
    pub status: DispatchStatus,
    pub channel: Channel,
    /// Comma-joined recipients
    pub to: String,
    /// Number of hotspots covered by the alert
    pub count: usize,
}

/// Transport for alert messages (email gateway, SMS provider, ...)
pub trait Notifier {
    fn deliver(&self, channel: Channel, recipients: &[String], message: &str) -> Result<()>;
}

/// Notifier that only records alerts in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, channel: Channel, recipients: &[String], message: &str) -> Result<()> {
        tracing::info!(
            channel = channel.as_str(),
            recipients = recipients.join(","),
            "alert: {}",
            message
        );
        Ok(())
    }
}

/// Evaluate hotspots and send one alert over `channel`
pub fn dispatch(
    config: &AlertConfig,
    channel: Channel,
    message: &str,
    samples: &[StoredSample],
    notifier: &dyn Notifier,
) -> Result<AlertDispatch> {
    let recipients = config.recipients(channel);
    let hotspots = find_hotspots(samples, config);

    let status = if recipients.is_empty() {
        DispatchStatus::NoRecipients
    } else if hotspots.is_empty() {
        DispatchStatus::NoHotspots
    } else {
        notifier.deliver(channel, recipients, &compose_message(message, &hotspots))?;
        DispatchStatus::Sent
    };

    tracing::info!(
        channel = channel.as_str(),
        status = status.as_str(),
        hotspots = hotspots.len(),
        "alert dispatch"
    );

    Ok(AlertDispatch {
        status,
        channel,
        to: recipients.join(","),
        count: hotspots.len(),
    })
}

fn compose_message(message: &str, hotspots: &[Hotspot]) -> String {
    let mut body = format!("{}\n{} hotspot(s):\n", message, hotspots.len());
    for h in hotspots {
        body.push_str(&format!(
            "- sample {} at ({:.4}, {:.4}): HPI {:.2}, Cd {:.2}\n",
            h.sample_id, h.latitude, h.longitude, h.hpi, h.cd
        ));
    }
    body
}
