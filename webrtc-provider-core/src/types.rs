//! Shared types and data structures

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Suffix marking a local video element as a reusable cached capture
pub const CACHED_INSTANCE_POSTFIX: &str = "-CACHED_WEBRTC_INSTANCE";

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl MediaKind {
    /// Kind name as reported by the host
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// Signaling state of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalingState {
    /// No offer/answer exchange in progress
    Stable,
    /// A local offer has been applied
    HaveLocalOffer,
    /// A remote offer has been applied
    HaveRemoteOffer,
    /// A local provisional answer has been applied
    HaveLocalPranswer,
    /// A remote provisional answer has been applied
    HaveRemotePranswer,
    /// The connection is closed
    Closed,
}

impl std::fmt::Display for SignalingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stable => "stable",
            Self::HaveLocalOffer => "have-local-offer",
            Self::HaveRemoteOffer => "have-remote-offer",
            Self::HaveLocalPranswer => "have-local-pranswer",
            Self::HaveRemotePranswer => "have-remote-pranswer",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// ICE connection state of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    /// Gathering has not started
    New,
    /// Checking candidate pairs
    Checking,
    /// A usable pair was found
    Connected,
    /// All checks finished
    Completed,
    /// No usable pair
    Failed,
    /// Connectivity lost
    Disconnected,
    /// Agent shut down
    Closed,
}

/// SDP description type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// Offer
    Offer,
    /// Answer
    Answer,
    /// Provisional answer
    Pranswer,
    /// Rollback
    Rollback,
}

/// Session description exchanged with the host peer connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Description type
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    /// SDP content
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Create an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE server configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URLs
    pub urls: Vec<String>,
    /// Username for TURN servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Credential for TURN servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Peer connection configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcConfiguration {
    /// ICE servers, none by default
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

/// Legacy peer connection constraints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConstraints {
    /// Mandatory constraints
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub mandatory: Map<String, Value>,
    /// Optional constraints; `None` gets the DTLS-SRTP default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<Vec<Map<String, Value>>>,
}

impl ConnectionConstraints {
    /// Fill in `DtlsSrtpKeyAgreement` when no optional list was given
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        if self.optional.is_none() {
            let mut dtls = Map::new();
            dtls.insert("DtlsSrtpKeyAgreement".to_string(), Value::Bool(true));
            self.optional = Some(vec![dtls]);
        }
        self
    }
}

/// Offer constraints passed to the host peer connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferConstraints {
    /// Offer to receive audio
    pub offer_to_receive_audio: bool,
    /// Offer to receive video
    pub offer_to_receive_video: bool,
}

/// Options for [`crate::Connection::create_offer`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferOptions {
    /// Receive remote audio
    #[serde(default)]
    pub receive_audio: bool,
    /// Receive remote video
    #[serde(default)]
    pub receive_video: bool,
    /// Codec names removed from the resulting SDP
    #[serde(default)]
    pub strip_codecs: Vec<String>,
}

impl OfferOptions {
    /// Receive both audio and video
    #[must_use]
    pub fn receive_all() -> Self {
        Self {
            receive_audio: true,
            receive_video: true,
            strip_codecs: Vec::new(),
        }
    }
}

/// Options for [`crate::Connection::create_answer`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOptions {
    /// Codec names removed from the resulting SDP
    #[serde(default)]
    pub strip_codecs: Vec<String>,
}

/// Local offer annotated with the media actually captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDescription {
    /// SDP after codec stripping
    pub sdp: String,
    /// Local capture has an audio track
    pub has_audio: bool,
    /// Local capture has a video track
    pub has_video: bool,
}

/// Device kind as reported by the host enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Microphone
    #[serde(rename = "audioinput")]
    AudioInput,
    /// Camera
    #[serde(rename = "videoinput")]
    VideoInput,
    /// Speaker
    #[serde(rename = "audiooutput")]
    AudioOutput,
    /// Anything else
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AudioInput => f.write_str("audioinput"),
            Self::VideoInput => f.write_str("videoinput"),
            Self::AudioOutput => f.write_str("audiooutput"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// Raw device entry from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDeviceInfo {
    /// Device identifier
    pub device_id: String,
    /// Human readable label, empty until capture is granted
    pub label: String,
    /// Device kind
    pub kind: DeviceKind,
}

/// Classified device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Audio input
    Mic,
    /// Video input
    Camera,
}

/// Listed input device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier
    pub id: String,
    /// Device label
    pub label: String,
    /// Device type
    #[serde(rename = "type")]
    pub device_type: DeviceType,
}

/// Input devices grouped by media kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList {
    /// Microphones
    pub audio: Vec<Device>,
    /// Cameras
    pub video: Vec<Device>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_constraints_default_dtls() {
        let constraints = ConnectionConstraints::default().with_defaults();
        let optional = constraints.optional.unwrap();
        assert_eq!(optional.len(), 1);
        assert_eq!(optional[0]["DtlsSrtpKeyAgreement"], Value::Bool(true));
    }

    #[test]
    fn test_connection_constraints_keep_given_optional() {
        let constraints = ConnectionConstraints {
            optional: Some(Vec::new()),
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(constraints.optional, Some(Vec::new()));
    }

    #[test]
    fn test_device_kind_serde() {
        let kind: DeviceKind = serde_json::from_str("\"videoinput\"").unwrap();
        assert_eq!(kind, DeviceKind::VideoInput);

        let kind: DeviceKind = serde_json::from_str("\"midi\"").unwrap();
        assert_eq!(kind, DeviceKind::Other("midi".to_string()));
        assert_eq!(kind.to_string(), "midi");
    }

    #[test]
    fn test_signaling_state_display() {
        assert_eq!(SignalingState::HaveLocalOffer.to_string(), "have-local-offer");
        let json = serde_json::to_string(&SignalingState::HaveRemoteOffer).unwrap();
        assert_eq!(json, "\"have-remote-offer\"");
    }

    #[test]
    fn test_device_serializes_type_field() {
        let device = Device {
            id: "mic-1".to_string(),
            label: "Built-in".to_string(),
            device_type: DeviceType::Mic,
        };
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["type"], "mic");
    }
}
