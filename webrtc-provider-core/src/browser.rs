//! Browser family and the capabilities derived from it
//!
//! The family is resolved once when the provider is built; everything
//! that differs between hosts reads the resulting [`Capabilities`].

use serde::{Deserialize, Serialize};

/// Host browser family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserFamily {
    /// Chrome and Chromium derivatives
    Chrome,
    /// Firefox
    Firefox,
    /// Legacy Edge
    Edge,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for BrowserFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Edge => "edge",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// How a screen source is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenCaptureMechanism {
    /// Source id is picked through a companion extension
    Extension,
    /// Capture flags are passed straight to the capture API
    Native,
}

/// Shape of the raw statistics reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatsFormat {
    /// `ssrc` and `googCandidatePair` reports
    Chrome,
    /// `inboundrtp` and `outboundrtp` reports
    Firefox,
    /// No known mapping
    Unsupported,
}

/// Behaviour switches for one browser family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Family these capabilities describe
    pub family: BrowserFamily,
    /// Screen source mechanism
    pub screen_capture: ScreenCaptureMechanism,
    /// Statistics report format
    pub stats_format: StatsFormat,
    /// Screen video and microphone audio can be captured in one request
    pub combined_screen_audio: bool,
    /// Width, height and frame rate must be removed from screen requests
    pub strip_screen_dimensions: bool,
    /// Peer connections may be used at all
    pub webrtc_allowed: bool,
}

impl Capabilities {
    /// Resolve the capabilities of a browser family
    #[must_use]
    pub fn for_browser(family: BrowserFamily) -> Self {
        match family {
            BrowserFamily::Chrome => Self {
                family,
                screen_capture: ScreenCaptureMechanism::Extension,
                stats_format: StatsFormat::Chrome,
                combined_screen_audio: false,
                strip_screen_dimensions: true,
                webrtc_allowed: true,
            },
            BrowserFamily::Firefox => Self {
                family,
                screen_capture: ScreenCaptureMechanism::Native,
                stats_format: StatsFormat::Firefox,
                combined_screen_audio: true,
                strip_screen_dimensions: false,
                webrtc_allowed: true,
            },
            BrowserFamily::Edge => Self {
                family,
                screen_capture: ScreenCaptureMechanism::Native,
                stats_format: StatsFormat::Unsupported,
                combined_screen_audio: true,
                strip_screen_dimensions: false,
                webrtc_allowed: false,
            },
            BrowserFamily::Unknown => Self {
                family,
                screen_capture: ScreenCaptureMechanism::Native,
                stats_format: StatsFormat::Unsupported,
                combined_screen_audio: true,
                strip_screen_dimensions: false,
                webrtc_allowed: true,
            },
        }
    }
}
