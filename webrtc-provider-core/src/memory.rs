//! In-memory host platform
//!
//! Implements every [`crate::platform`] trait without a browser. Capture
//! requests, extension messages and peer connection negotiation are
//! recorded so callers can inspect what the provider asked the host for.
//! The peer connection follows the offer/answer signaling state machine
//! and produces a minimal SDP for the media it would send or receive.

use crate::browser::BrowserFamily;
use crate::constraints::MediaConstraints;
use crate::platform::{
    ContainerHandle, DisplayContainer, ExtensionChannel, ExtensionRequest, ExtensionResponse,
    MediaDevices, MediaStream, MediaStreamHandle, MediaTrack, MediaTrackHandle, PeerConnection,
    PeerConnectionEvent, PeerConnectionHandle, PeerEventHandler, Platform, PlatformError,
    VideoElement, VideoElementHandle,
};
use crate::stats::RawStats;
use crate::types::{
    ConnectionConstraints, DeviceKind, MediaDeviceInfo, MediaKind, OfferConstraints,
    RtcConfiguration, SdpType, SessionDescription, SignalingState,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    format!("{prefix}-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// In-memory media track
pub struct MemoryTrack {
    id: String,
    kind: MediaKind,
    enabled: AtomicBool,
    live: AtomicBool,
}

impl MemoryTrack {
    /// Create a live, enabled track
    #[must_use]
    pub fn new(kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            id: next_id(kind.as_str()),
            kind,
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
        })
    }
}

impl MediaTrack for MemoryTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// In-memory media stream
pub struct MemoryStream {
    id: String,
    tracks: Mutex<Vec<MediaTrackHandle>>,
}

impl MemoryStream {
    /// Stream with one track per requested kind
    #[must_use]
    pub fn with_tracks(audio: bool, video: bool) -> Arc<Self> {
        let mut tracks: Vec<MediaTrackHandle> = Vec::new();
        if audio {
            tracks.push(MemoryTrack::new(MediaKind::Audio));
        }
        if video {
            tracks.push(MemoryTrack::new(MediaKind::Video));
        }
        Arc::new(Self {
            id: next_id("stream"),
            tracks: Mutex::new(tracks),
        })
    }
}

impl MediaStream for MemoryStream {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn tracks(&self) -> Vec<MediaTrackHandle> {
        self.tracks.lock().clone()
    }

    fn add_track(&self, track: MediaTrackHandle) {
        self.tracks.lock().push(track);
    }
}

/// All containers created by one platform, used to detach elements
#[derive(Default)]
struct MemoryDocument {
    containers: Mutex<Vec<Weak<MemoryContainer>>>,
}

impl MemoryDocument {
    fn detach(&self, element: *const ()) {
        let containers: Vec<_> = self
            .containers
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for container in containers {
            container
                .children
                .lock()
                .retain(|child| Arc::as_ptr(child) as *const () != element);
        }
    }
}

#[derive(Default)]
struct ElementState {
    id: String,
    src: Option<MediaStreamHandle>,
    muted: bool,
    volume: f64,
    autoplay: bool,
    playing: bool,
}

/// In-memory video element
pub struct MemoryVideoElement {
    document: Arc<MemoryDocument>,
    state: Mutex<ElementState>,
}

impl MemoryVideoElement {
    /// Whether playback is running
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }
}

impl VideoElement for MemoryVideoElement {
    fn id(&self) -> String {
        self.state.lock().id.clone()
    }

    fn set_id(&self, id: &str) {
        self.state.lock().id = id.to_string();
    }

    fn src_object(&self) -> Option<MediaStreamHandle> {
        self.state.lock().src.clone()
    }

    fn set_src_object(&self, stream: Option<MediaStreamHandle>) {
        let mut state = self.state.lock();
        state.playing = state.autoplay && stream.is_some();
        state.src = stream;
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: f64) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn play_on_metadata(&self) {
        let mut state = self.state.lock();
        state.autoplay = true;
        state.playing = state.src.is_some();
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        state.autoplay = false;
        state.playing = false;
    }

    fn detach(&self) {
        self.document.detach(self as *const Self as *const ());
    }
}

/// In-memory container element
pub struct MemoryContainer {
    children: Mutex<Vec<VideoElementHandle>>,
}

impl DisplayContainer for MemoryContainer {
    fn append_child(&self, element: VideoElementHandle) {
        element.detach();
        self.children.lock().push(element);
    }

    fn children(&self) -> Vec<VideoElementHandle> {
        self.children.lock().clone()
    }
}

#[derive(Default)]
struct MemoryDevicesState {
    requests: Vec<MediaConstraints>,
    denial: Option<String>,
    devices: Vec<MediaDeviceInfo>,
    granted: bool,
}

/// In-memory capture and enumeration
///
/// Device labels stay empty until a capture has been granted.
#[derive(Default)]
pub struct MemoryMediaDevices {
    state: Mutex<MemoryDevicesState>,
}

impl MemoryMediaDevices {
    fn default_devices() -> Vec<MediaDeviceInfo> {
        vec![
            MediaDeviceInfo {
                device_id: "mic-0".to_string(),
                label: "Built-in Microphone".to_string(),
                kind: DeviceKind::AudioInput,
            },
            MediaDeviceInfo {
                device_id: "cam-0".to_string(),
                label: "Built-in Camera".to_string(),
                kind: DeviceKind::VideoInput,
            },
            MediaDeviceInfo {
                device_id: "spk-0".to_string(),
                label: "Built-in Speakers".to_string(),
                kind: DeviceKind::AudioOutput,
            },
        ]
    }
}

#[async_trait]
impl MediaDevices for MemoryMediaDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStreamHandle, PlatformError> {
        let mut state = self.state.lock();
        state.requests.push(constraints.clone());
        if let Some(reason) = &state.denial {
            return Err(PlatformError::PermissionDenied(reason.clone()));
        }
        if !constraints.has_audio() && !constraints.has_video() {
            return Err(PlatformError::NotSupported(
                "at least one of audio and video must be requested".to_string(),
            ));
        }
        state.granted = true;
        Ok(MemoryStream::with_tracks(
            constraints.has_audio(),
            constraints.has_video(),
        ))
    }

    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, PlatformError> {
        let state = self.state.lock();
        Ok(state
            .devices
            .iter()
            .cloned()
            .map(|mut device| {
                if !state.granted {
                    device.label.clear();
                }
                device
            })
            .collect())
    }
}

/// In-memory screen sharing extension
pub struct MemoryExtension {
    installed: bool,
    reply: ExtensionResponse,
    requests: Mutex<Vec<ExtensionRequest>>,
}

impl MemoryExtension {
    /// Installed extension that grants `source_id`
    #[must_use]
    pub fn granting(source_id: &str) -> Self {
        Self {
            installed: true,
            reply: ExtensionResponse {
                source_id: Some(source_id.to_string()),
                error: None,
            },
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Installed extension whose source picker fails with `error`
    #[must_use]
    pub fn denying(error: &str) -> Self {
        Self {
            installed: true,
            reply: ExtensionResponse {
                source_id: None,
                error: Some(error.to_string()),
            },
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Nothing answers
    #[must_use]
    pub fn not_installed() -> Self {
        Self {
            installed: false,
            reply: ExtensionResponse::default(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Messages received so far
    #[must_use]
    pub fn requests(&self) -> Vec<ExtensionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ExtensionChannel for MemoryExtension {
    async fn send_message(
        &self,
        _extension_id: &str,
        request: ExtensionRequest,
    ) -> Result<Option<ExtensionResponse>, PlatformError> {
        self.requests.lock().push(request.clone());
        if !self.installed {
            return Ok(None);
        }
        Ok(Some(match request {
            ExtensionRequest::IsInstalled => ExtensionResponse::default(),
            ExtensionRequest::GetSourceId => self.reply.clone(),
        }))
    }
}

struct PeerState {
    signaling: SignalingState,
    streams: Vec<MediaStreamHandle>,
    remote_history: Vec<SessionDescription>,
    stats: Result<RawStats, PlatformError>,
    close_calls: usize,
}

/// In-memory peer connection
pub struct MemoryPeerConnection {
    configuration: RtcConfiguration,
    constraints: ConnectionConstraints,
    state: Mutex<PeerState>,
    handler: Mutex<Option<PeerEventHandler>>,
}

impl MemoryPeerConnection {
    fn new(configuration: RtcConfiguration, constraints: ConnectionConstraints) -> Self {
        Self {
            configuration,
            constraints,
            state: Mutex::new(PeerState {
                signaling: SignalingState::Stable,
                streams: Vec::new(),
                remote_history: Vec::new(),
                stats: Ok(RawStats::List(Vec::new())),
                close_calls: 0,
            }),
            handler: Mutex::new(None),
        }
    }

    /// Configuration the connection was created with
    #[must_use]
    pub fn configuration(&self) -> &RtcConfiguration {
        &self.configuration
    }

    /// Constraints the connection was created with
    #[must_use]
    pub fn constraints(&self) -> &ConnectionConstraints {
        &self.constraints
    }

    /// Local streams added so far
    #[must_use]
    pub fn streams(&self) -> Vec<MediaStreamHandle> {
        self.state.lock().streams.clone()
    }

    /// Remote descriptions applied, oldest first
    #[must_use]
    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.state.lock().remote_history.clone()
    }

    /// How many times `close` was called
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    /// Set the result of the next stats queries
    pub fn set_stats(&self, stats: Result<RawStats, PlatformError>) {
        self.state.lock().stats = stats;
    }

    /// Raise an event as the host would
    pub fn emit(&self, event: PeerConnectionEvent) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    fn transition(&self, next: SignalingState) {
        self.state.lock().signaling = next;
        self.emit(PeerConnectionEvent::SignalingStateChange(next));
    }

    fn invalid(state: SignalingState, op: &str) -> PlatformError {
        PlatformError::InvalidState(format!("cannot {op} in state {state}"))
    }

    fn build_sdp(audio: bool, video: bool) -> String {
        let mut sdp = format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n",
            NEXT_ID.fetch_add(1, Ordering::Relaxed)
        );
        if audio {
            sdp.push_str("m=audio 9 UDP/TLS/RTP/SAVPF 111 0\r\n");
            sdp.push_str("a=rtpmap:111 opus/48000/2\r\n");
            sdp.push_str("a=fmtp:111 minptime=10;useinbandfec=1\r\n");
            sdp.push_str("a=rtpmap:0 PCMU/8000\r\n");
        }
        if video {
            sdp.push_str("m=video 9 UDP/TLS/RTP/SAVPF 96 102\r\n");
            sdp.push_str("a=rtpmap:96 VP8/90000\r\n");
            sdp.push_str("a=rtcp-fb:96 nack\r\n");
            sdp.push_str("a=rtpmap:102 H264/90000\r\n");
            sdp.push_str("a=fmtp:102 packetization-mode=1\r\n");
        }
        sdp
    }
}

#[async_trait]
impl PeerConnection for MemoryPeerConnection {
    fn signaling_state(&self) -> SignalingState {
        self.state.lock().signaling
    }

    fn add_stream(&self, stream: MediaStreamHandle) {
        self.state.lock().streams.push(stream);
    }

    fn set_event_handler(&self, handler: PeerEventHandler) {
        *self.handler.lock() = Some(handler);
    }

    async fn create_offer(
        &self,
        constraints: OfferConstraints,
    ) -> Result<SessionDescription, PlatformError> {
        let state = self.state.lock();
        if state.signaling == SignalingState::Closed {
            return Err(Self::invalid(state.signaling, "create offer"));
        }
        let sends = |kind: MediaKind| state.streams.iter().any(|s| !s.tracks_of(kind).is_empty());
        let audio = constraints.offer_to_receive_audio || sends(MediaKind::Audio);
        let video = constraints.offer_to_receive_video || sends(MediaKind::Video);
        Ok(SessionDescription::offer(Self::build_sdp(audio, video)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PlatformError> {
        let state = self.state.lock();
        if state.signaling != SignalingState::HaveRemoteOffer {
            return Err(Self::invalid(state.signaling, "create answer"));
        }
        let offer = state
            .remote_history
            .last()
            .map(|d| d.sdp.clone())
            .unwrap_or_default();
        Ok(SessionDescription::answer(Self::build_sdp(
            offer.contains("m=audio"),
            offer.contains("m=video"),
        )))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PlatformError> {
        let current = self.signaling_state();
        let next = match (description.sdp_type, current) {
            (SdpType::Offer, SignalingState::Stable) => SignalingState::HaveLocalOffer,
            (SdpType::Answer, SignalingState::HaveRemoteOffer) => SignalingState::Stable,
            _ => return Err(Self::invalid(current, "set local description")),
        };
        tracing::trace!(sdp_type = ?description.sdp_type, "Local description applied");
        self.transition(next);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PlatformError> {
        if !description.sdp.starts_with("v=0") {
            return Err(PlatformError::Negotiation(
                "failed to parse session description".to_string(),
            ));
        }
        let current = self.signaling_state();
        let next = match (description.sdp_type, current) {
            (SdpType::Offer, SignalingState::Stable) => SignalingState::HaveRemoteOffer,
            (SdpType::Answer, SignalingState::HaveLocalOffer) => SignalingState::Stable,
            _ => return Err(Self::invalid(current, "set remote description")),
        };
        self.state.lock().remote_history.push(description);
        self.transition(next);
        Ok(())
    }

    async fn get_stats(&self) -> Result<RawStats, PlatformError> {
        self.state.lock().stats.clone()
    }

    fn close(&self) {
        self.state.lock().close_calls += 1;
        self.transition(SignalingState::Closed);
    }
}

/// In-memory host
pub struct MemoryPlatform {
    family: BrowserFamily,
    webrtc: AtomicBool,
    document: Arc<MemoryDocument>,
    devices: Arc<MemoryMediaDevices>,
    extension: Mutex<Option<Arc<MemoryExtension>>>,
    peers: Mutex<Vec<Arc<MemoryPeerConnection>>>,
    elements: Mutex<Vec<Arc<MemoryVideoElement>>>,
}

impl MemoryPlatform {
    /// Host of the given family
    ///
    /// Chrome hosts come with an installed extension granting
    /// `screen:0:0`; other families have no extension channel.
    #[must_use]
    pub fn new(family: BrowserFamily) -> Arc<Self> {
        let extension = (family == BrowserFamily::Chrome)
            .then(|| Arc::new(MemoryExtension::granting("screen:0:0")));
        let devices = MemoryMediaDevices::default();
        devices.state.lock().devices = MemoryMediaDevices::default_devices();
        Arc::new(Self {
            family,
            webrtc: AtomicBool::new(true),
            document: Arc::new(MemoryDocument::default()),
            devices: Arc::new(devices),
            extension: Mutex::new(extension),
            peers: Mutex::new(Vec::new()),
            elements: Mutex::new(Vec::new()),
        })
    }

    /// Chrome host
    #[must_use]
    pub fn chrome() -> Arc<Self> {
        Self::new(BrowserFamily::Chrome)
    }

    /// Firefox host
    #[must_use]
    pub fn firefox() -> Arc<Self> {
        Self::new(BrowserFamily::Firefox)
    }

    /// Toggle capture and peer connection support
    pub fn set_webrtc_supported(&self, supported: bool) {
        self.webrtc.store(supported, Ordering::SeqCst);
    }

    /// Replace the extension
    pub fn set_extension(&self, extension: MemoryExtension) {
        *self.extension.lock() = Some(Arc::new(extension));
    }

    /// Refuse every capture request with `reason`
    pub fn deny_capture(&self, reason: &str) {
        self.devices.state.lock().denial = Some(reason.to_string());
    }

    /// Constraints of every capture request, oldest first
    #[must_use]
    pub fn capture_requests(&self) -> Vec<MediaConstraints> {
        self.devices.state.lock().requests.clone()
    }

    /// Most recently created peer connection
    #[must_use]
    pub fn last_peer_connection(&self) -> Option<Arc<MemoryPeerConnection>> {
        self.peers.lock().last().cloned()
    }

    /// Element currently carrying `id`
    #[must_use]
    pub fn element(&self, id: &str) -> Option<Arc<MemoryVideoElement>> {
        self.elements
            .lock()
            .iter()
            .find(|element| element.id() == id)
            .cloned()
    }
}

impl Platform for MemoryPlatform {
    fn browser(&self) -> BrowserFamily {
        self.family
    }

    fn supports_webrtc(&self) -> bool {
        self.webrtc.load(Ordering::SeqCst)
    }

    fn media_devices(&self) -> Arc<dyn MediaDevices> {
        self.devices.clone()
    }

    fn extension_channel(&self) -> Option<Arc<dyn ExtensionChannel>> {
        self.extension
            .lock()
            .clone()
            .map(|extension| extension as Arc<dyn ExtensionChannel>)
    }

    fn create_peer_connection(
        &self,
        configuration: &RtcConfiguration,
        constraints: &ConnectionConstraints,
    ) -> Result<PeerConnectionHandle, PlatformError> {
        if !self.supports_webrtc() {
            return Err(PlatformError::NotSupported(
                "RTCPeerConnection is not available".to_string(),
            ));
        }
        let peer = Arc::new(MemoryPeerConnection::new(
            configuration.clone(),
            constraints.clone(),
        ));
        self.peers.lock().push(peer.clone());
        Ok(peer)
    }

    fn create_video_element(&self) -> VideoElementHandle {
        let element = Arc::new(MemoryVideoElement {
            document: self.document.clone(),
            state: Mutex::new(ElementState {
                volume: 1.0,
                ..Default::default()
            }),
        });
        self.elements.lock().push(element.clone());
        element
    }

    fn create_container(&self) -> ContainerHandle {
        let container = Arc::new(MemoryContainer {
            children: Mutex::new(Vec::new()),
        });
        self.document
            .containers
            .lock()
            .push(Arc::downgrade(&container));
        container
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offer_answer_state_machine() {
        let caller = MemoryPeerConnection::new(RtcConfiguration::default(), Default::default());
        let callee = MemoryPeerConnection::new(RtcConfiguration::default(), Default::default());

        let offer = caller
            .create_offer(OfferConstraints {
                offer_to_receive_audio: true,
                offer_to_receive_video: false,
            })
            .await
            .unwrap();
        caller.set_local_description(offer.clone()).await.unwrap();
        assert_eq!(caller.signaling_state(), SignalingState::HaveLocalOffer);

        callee.set_remote_description(offer).await.unwrap();
        let answer = callee.create_answer().await.unwrap();
        assert!(answer.sdp.contains("m=audio"));
        assert!(!answer.sdp.contains("m=video"));
        callee.set_local_description(answer.clone()).await.unwrap();
        assert_eq!(callee.signaling_state(), SignalingState::Stable);

        caller.set_remote_description(answer).await.unwrap();
        assert_eq!(caller.signaling_state(), SignalingState::Stable);
    }

    #[tokio::test]
    async fn test_answer_without_offer_fails() {
        let peer = MemoryPeerConnection::new(RtcConfiguration::default(), Default::default());
        let err = peer.create_answer().await.unwrap_err();
        assert!(matches!(err, PlatformError::InvalidState(_)));
    }

    #[test]
    fn test_detach_removes_from_container() {
        let platform = MemoryPlatform::chrome();
        let container = platform.create_container();
        let element = platform.create_video_element();
        container.append_child(element.clone());
        assert_eq!(container.children().len(), 1);

        element.detach();
        assert!(container.children().is_empty());
    }

    #[tokio::test]
    async fn test_labels_hidden_until_granted() {
        let platform = MemoryPlatform::firefox();
        let devices = platform.media_devices();
        let listed = devices.enumerate_devices().await.unwrap();
        assert!(listed.iter().all(|d| d.label.is_empty()));

        devices
            .get_user_media(&MediaConstraints::audio_only())
            .await
            .unwrap();
        let listed = devices.enumerate_devices().await.unwrap();
        assert!(listed.iter().all(|d| !d.label.is_empty()));
    }
}
