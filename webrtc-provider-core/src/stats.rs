//! Statistics translation
//!
//! Hosts report peer connection statistics in different shapes. This
//! module maps them onto one [`StatsReport`] layout: outgoing and
//! incoming audio/video streams plus the active candidate pair.

use crate::browser::{BrowserFamily, StatsFormat};
use crate::platform::PlatformError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Statistics errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// No mapping exists for the host
    #[error("Statistics are not supported for {0}")]
    Unsupported(BrowserFamily),

    /// Host failed to produce statistics
    #[error("Stats query failed: {0}")]
    Platform(#[from] PlatformError),
}

/// One raw report as produced by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawStatsEntry(pub Map<String, Value>);

impl RawStatsEntry {
    /// Report type, empty when missing
    #[must_use]
    pub fn stats_type(&self) -> &str {
        self.str_field("type").unwrap_or_default()
    }

    /// Report id, empty when missing
    #[must_use]
    pub fn id(&self) -> &str {
        self.str_field("id").unwrap_or_default()
    }

    /// String valued field
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Whether a field is `true` or `"true"`
    #[must_use]
    pub fn is_true(&self, name: &str) -> bool {
        match self.0.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

impl From<Value> for RawStatsEntry {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// Raw reports, either keyed by report id or as a plain list
#[derive(Debug, Clone, PartialEq)]
pub enum RawStats {
    /// Keyed collection in host order
    Keyed(Vec<(String, RawStatsEntry)>),
    /// Indexable list
    List(Vec<RawStatsEntry>),
}

impl RawStats {
    /// Iterate the reports in host order
    pub fn entries(&self) -> Box<dyn Iterator<Item = &RawStatsEntry> + '_> {
        match self {
            Self::Keyed(entries) => Box::new(entries.iter().map(|(_, entry)| entry)),
            Self::List(entries) => Box::new(entries.iter()),
        }
    }
}

/// A kept report with its fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPart {
    /// Report id
    pub id: String,
    /// Report type
    #[serde(rename = "type")]
    pub stats_type: String,
    /// All fields of the report
    pub values: Map<String, Value>,
}

impl StatsPart {
    fn from_entry(entry: &RawStatsEntry) -> Self {
        Self {
            id: entry.id().to_string(),
            stats_type: entry.stats_type().to_string(),
            values: entry.0.clone(),
        }
    }

    /// Numeric field
    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Audio and video sub-records of one direction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Audio stream report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<StatsPart>,
    /// Video stream report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<StatsPart>,
}

impl StreamStats {
    fn slot(&mut self, audio: bool) -> &mut Option<StatsPart> {
        if audio {
            &mut self.audio
        } else {
            &mut self.video
        }
    }
}

/// Normalized statistics of a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    /// Browser family the reports came from
    #[serde(rename = "type")]
    pub browser: BrowserFamily,
    /// Sent streams
    pub outgoing_streams: StreamStats,
    /// Received streams
    pub incoming_streams: StreamStats,
    /// Candidate pair carrying media
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_candidate: Option<StatsPart>,
    /// When the report was translated
    pub timestamp: DateTime<Utc>,
}

impl StatsReport {
    fn empty(browser: BrowserFamily) -> Self {
        Self {
            browser,
            outgoing_streams: StreamStats::default(),
            incoming_streams: StreamStats::default(),
            active_candidate: None,
            timestamp: Utc::now(),
        }
    }
}

/// Translate raw reports into a [`StatsReport`]
///
/// # Errors
///
/// Returns [`StatsError::Unsupported`] when the format has no mapping
pub fn translate(
    format: StatsFormat,
    browser: BrowserFamily,
    raw: &RawStats,
) -> Result<StatsReport, StatsError> {
    let mut report = StatsReport::empty(browser);
    match format {
        StatsFormat::Chrome => {
            for entry in raw.entries() {
                apply_chrome(&mut report, entry);
            }
        }
        StatsFormat::Firefox => {
            for entry in raw.entries() {
                apply_firefox(&mut report, entry);
            }
        }
        StatsFormat::Unsupported => return Err(StatsError::Unsupported(browser)),
    }
    Ok(report)
}

fn apply_chrome(report: &mut StatsReport, entry: &RawStatsEntry) {
    match entry.stats_type() {
        "googCandidatePair" if entry.is_true("googActiveConnection") => {
            report.active_candidate = Some(StatsPart::from_entry(entry));
        }
        "ssrc" => {
            let audio = entry
                .str_field("transportId")
                .is_some_and(|t| t.contains("audio"));
            let direction = if entry.id().contains("send") {
                &mut report.outgoing_streams
            } else {
                &mut report.incoming_streams
            };
            *direction.slot(audio) = Some(StatsPart::from_entry(entry));
        }
        _ => {}
    }
}

fn apply_firefox(report: &mut StatsReport, entry: &RawStatsEntry) {
    if entry.id().contains("rtcp") {
        return;
    }
    let direction = match entry.stats_type() {
        "outboundrtp" | "outbound-rtp" => &mut report.outgoing_streams,
        "inboundrtp" | "inbound-rtp" => &mut report.incoming_streams,
        _ => return,
    };
    let audio = entry.id().contains("audio");
    *direction.slot(audio) = Some(StatsPart::from_entry(entry));
}
