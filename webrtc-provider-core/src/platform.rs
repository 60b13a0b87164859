//! Host platform capabilities
//!
//! Everything the provider needs from the host (peer connections, media
//! capture, device enumeration, video elements, display containers and
//! the screen sharing extension) is reached through the traits in this
//! module. Handles are shared `Arc<dyn Trait>` objects, mirroring how the
//! host hands out references to its own objects.
//!
//! The `memory` module (feature `test-utils`) has an in-memory
//! implementation.

use crate::browser::BrowserFamily;
use crate::constraints::MediaConstraints;
use crate::stats::RawStats;
use crate::types::{
    ConnectionConstraints, IceConnectionState, MediaDeviceInfo, MediaKind, OfferConstraints,
    RtcConfiguration, SessionDescription, SignalingState,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by the host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The user or the host refused access
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Requested device does not exist
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// SDP could not be produced or applied
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Host lacks the capability
    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Shared media track handle
pub type MediaTrackHandle = Arc<dyn MediaTrack>;
/// Shared media stream handle
pub type MediaStreamHandle = Arc<dyn MediaStream>;
/// Shared video element handle
pub type VideoElementHandle = Arc<dyn VideoElement>;
/// Shared display container handle
pub type ContainerHandle = Arc<dyn DisplayContainer>;
/// Shared peer connection handle
pub type PeerConnectionHandle = Arc<dyn PeerConnection>;

/// A single audio or video track
pub trait MediaTrack: Send + Sync {
    /// Track identifier
    fn id(&self) -> String;

    /// Track kind
    fn kind(&self) -> MediaKind;

    /// Whether the track produces media
    fn is_enabled(&self) -> bool;

    /// Enable or disable the track
    fn set_enabled(&self, enabled: bool);

    /// Stop the track permanently
    fn stop(&self);

    /// Whether the track has not been stopped
    fn is_live(&self) -> bool;
}

/// A group of tracks
pub trait MediaStream: Send + Sync {
    /// Stream identifier
    fn id(&self) -> String;

    /// All tracks
    fn tracks(&self) -> Vec<MediaTrackHandle>;

    /// Add a track
    fn add_track(&self, track: MediaTrackHandle);

    /// Audio tracks in order
    fn audio_tracks(&self) -> Vec<MediaTrackHandle> {
        self.tracks_of(MediaKind::Audio)
    }

    /// Video tracks in order
    fn video_tracks(&self) -> Vec<MediaTrackHandle> {
        self.tracks_of(MediaKind::Video)
    }

    /// Tracks of one kind in order
    fn tracks_of(&self, kind: MediaKind) -> Vec<MediaTrackHandle> {
        self.tracks()
            .into_iter()
            .filter(|track| track.kind() == kind)
            .collect()
    }
}

/// A video element in the document
pub trait VideoElement: Send + Sync {
    /// Element id
    fn id(&self) -> String;

    /// Change the element id
    fn set_id(&self, id: &str);

    /// Attached stream
    fn src_object(&self) -> Option<MediaStreamHandle>;

    /// Attach or detach a stream
    fn set_src_object(&self, stream: Option<MediaStreamHandle>);

    /// Whether audio output is muted
    fn is_muted(&self) -> bool;

    /// Mute or unmute audio output
    fn set_muted(&self, muted: bool);

    /// Output volume in `0.0..=1.0`
    fn volume(&self) -> f64;

    /// Set output volume in `0.0..=1.0`
    fn set_volume(&self, volume: f64);

    /// Start playback once the stream metadata has loaded
    fn play_on_metadata(&self);

    /// Pause playback
    fn pause(&self);

    /// Remove the element from its parent, if any
    fn detach(&self);
}

/// A container element that video elements are appended to
pub trait DisplayContainer: Send + Sync {
    /// Append a child element
    fn append_child(&self, element: VideoElementHandle);

    /// Current children in document order
    fn children(&self) -> Vec<VideoElementHandle>;
}

/// Event raised by a host peer connection
#[derive(Clone)]
pub enum PeerConnectionEvent {
    /// A remote stream arrived
    Track(MediaStreamHandle),
    /// The remote stream was removed
    StreamRemoved,
    /// Signaling state changed
    SignalingStateChange(SignalingState),
    /// ICE connection state changed
    IceConnectionStateChange(IceConnectionState),
}

impl std::fmt::Debug for PeerConnectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Track(stream) => f.debug_tuple("Track").field(&stream.id()).finish(),
            Self::StreamRemoved => f.write_str("StreamRemoved"),
            Self::SignalingStateChange(state) => {
                f.debug_tuple("SignalingStateChange").field(state).finish()
            }
            Self::IceConnectionStateChange(state) => {
                f.debug_tuple("IceConnectionStateChange").field(state).finish()
            }
        }
    }
}

/// Callback receiving peer connection events
pub type PeerEventHandler = Arc<dyn Fn(PeerConnectionEvent) + Send + Sync>;

/// Host peer connection
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Current signaling state
    fn signaling_state(&self) -> SignalingState;

    /// Send a local stream
    fn add_stream(&self, stream: MediaStreamHandle);

    /// Install the event handler, replacing any previous one
    fn set_event_handler(&self, handler: PeerEventHandler);

    /// Produce an offer
    async fn create_offer(
        &self,
        constraints: OfferConstraints,
    ) -> Result<SessionDescription, PlatformError>;

    /// Produce an answer to the applied remote offer
    async fn create_answer(&self) -> Result<SessionDescription, PlatformError>;

    /// Apply a local description
    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PlatformError>;

    /// Apply a remote description
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PlatformError>;

    /// Raw statistics reports
    async fn get_stats(&self) -> Result<RawStats, PlatformError>;

    /// Close the connection
    fn close(&self);
}

/// Host capture and enumeration
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Prompt for capture access
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStreamHandle, PlatformError>;

    /// List media devices
    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, PlatformError>;
}

/// Message sent to the screen sharing extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExtensionRequest {
    /// Ask whether the extension is installed
    IsInstalled,
    /// Ask the user to pick a screen source
    GetSourceId,
}

/// Reply from the screen sharing extension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionResponse {
    /// Picked source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Failure reported by the extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Message channel to a browser extension
#[async_trait]
pub trait ExtensionChannel: Send + Sync {
    /// Send a message; `None` when nothing answered
    async fn send_message(
        &self,
        extension_id: &str,
        request: ExtensionRequest,
    ) -> Result<Option<ExtensionResponse>, PlatformError>;
}

/// Entry point to the host
pub trait Platform: Send + Sync {
    /// Detected browser family
    fn browser(&self) -> BrowserFamily;

    /// Whether both capture and peer connections exist
    fn supports_webrtc(&self) -> bool;

    /// Capture and enumeration
    fn media_devices(&self) -> Arc<dyn MediaDevices>;

    /// Extension messaging, when the host has one
    fn extension_channel(&self) -> Option<Arc<dyn ExtensionChannel>>;

    /// Create a peer connection
    ///
    /// # Errors
    ///
    /// Returns error if the host rejects the configuration
    fn create_peer_connection(
        &self,
        configuration: &RtcConfiguration,
        constraints: &ConnectionConstraints,
    ) -> Result<PeerConnectionHandle, PlatformError>;

    /// Create a detached video element
    fn create_video_element(&self) -> VideoElementHandle;

    /// Create a detached container element
    fn create_container(&self) -> ContainerHandle;
}
