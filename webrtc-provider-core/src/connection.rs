//! Peer connection management
//!
//! A [`Connection`] wraps one host peer connection under a caller chosen
//! id. It binds the local capture cached in a [`Display`] and a remote
//! video element, drives the offer/answer exchange and exposes mute,
//! volume and statistics accessors. Live connections are tracked in a
//! [`ConnectionRegistry`] owned by the provider that created them.

use crate::browser::Capabilities;
use crate::display::Display;
use crate::media::remove_video_element;
use crate::platform::{
    MediaStreamHandle, PeerConnectionEvent, PeerConnectionHandle, Platform, PlatformError,
    VideoElementHandle,
};
use crate::sdp::strip_codecs;
use crate::stats::{translate, StatsError, StatsReport};
use crate::types::{
    AnswerOptions, ConnectionConstraints, LocalDescription, MediaKind, OfferConstraints,
    OfferOptions, RtcConfiguration, SessionDescription, SignalingState,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Connection errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Host refused to create the peer connection
    #[error("Failed to create peer connection: {0}")]
    Creation(PlatformError),

    /// Offer/answer exchange failed
    #[error("Negotiation failed: {0}")]
    Negotiation(#[from] PlatformError),
}

/// Where the connection's video elements live
#[derive(Debug, Clone)]
pub enum DisplayBinding {
    /// Publish the display's cached capture, or play remote media in it
    OneWay {
        /// The single display
        display: Display,
    },
    /// Send the local capture and play remote media in a second display
    Bidirectional {
        /// Display holding the cached local capture
        local: Display,
        /// Display receiving the remote element
        remote: Display,
    },
}

impl DisplayBinding {
    fn local_display(&self) -> &Display {
        match self {
            Self::OneWay { display } => display,
            Self::Bidirectional { local, .. } => local,
        }
    }
}

/// Options for [`crate::MediaProvider::create_connection`]
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Caller chosen id
    pub id: String,
    /// ICE configuration
    pub rtc_configuration: RtcConfiguration,
    /// Legacy peer connection constraints
    pub constraints: ConnectionConstraints,
    /// Display wiring
    pub binding: DisplayBinding,
}

impl ConnectionOptions {
    /// One-way connection bound to `display`
    pub fn one_way(id: impl Into<String>, display: Display) -> Self {
        Self {
            id: id.into(),
            rtc_configuration: RtcConfiguration::default(),
            constraints: ConnectionConstraints::default(),
            binding: DisplayBinding::OneWay { display },
        }
    }

    /// Two-way connection sending from `local` and playing into `remote`
    pub fn bidirectional(id: impl Into<String>, local: Display, remote: Display) -> Self {
        Self {
            id: id.into(),
            rtc_configuration: RtcConfiguration::default(),
            constraints: ConnectionConstraints::default(),
            binding: DisplayBinding::Bidirectional { local, remote },
        }
    }

    /// Set the ICE configuration
    #[must_use]
    pub fn with_rtc_configuration(mut self, configuration: RtcConfiguration) -> Self {
        self.rtc_configuration = configuration;
        self
    }

    /// Set the peer connection constraints
    #[must_use]
    pub fn with_constraints(mut self, constraints: ConnectionConstraints) -> Self {
        self.constraints = constraints;
        self
    }
}

type ConnectionTable = Mutex<HashMap<String, Connection>>;

/// Live connections by id
///
/// Clones share the same table.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<ConnectionTable>,
}

impl ConnectionRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, replacing any previous one with the same id
    pub fn insert(&self, connection: Connection) -> Option<Connection> {
        self.connections
            .lock()
            .insert(connection.id().to_string(), connection)
    }

    /// Look up a connection
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Connection> {
        self.connections.lock().get(id).cloned()
    }

    /// Forget a connection
    pub fn remove(&self, id: &str) -> Option<Connection> {
        self.connections.lock().remove(id)
    }

    /// Registered ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.connections.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of live connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether no connection is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

#[derive(Default)]
struct Elements {
    local: Option<VideoElementHandle>,
    remote: Option<VideoElementHandle>,
}

struct ConnectionInner {
    id: String,
    peer: PeerConnectionHandle,
    capabilities: Capabilities,
    local_display: Display,
    elements: Mutex<Elements>,
    registry: Weak<ConnectionTable>,
}

/// Handle to one managed peer connection
///
/// Clones refer to the same connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Create the peer connection, wire its elements and register it
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Creation`] if the host refuses the
    /// peer connection
    #[tracing::instrument(skip_all, fields(id = %options.id))]
    pub fn create(
        platform: &dyn Platform,
        capabilities: Capabilities,
        registry: &ConnectionRegistry,
        options: ConnectionOptions,
    ) -> Result<Self, ConnectionError> {
        let ConnectionOptions {
            id,
            rtc_configuration,
            constraints,
            binding,
        } = options;

        let peer = platform
            .create_peer_connection(&rtc_configuration, &constraints.with_defaults())
            .map_err(ConnectionError::Creation)?;

        let mut elements = Elements::default();
        match &binding {
            DisplayBinding::Bidirectional { local, remote } => {
                match local.take_cached() {
                    Some(element) => {
                        element.set_id(&format!("{id}-local"));
                        elements.local = Some(element);
                    }
                    None => {
                        tracing::warn!("No cached local capture, connection will not send media");
                    }
                }
                let element = platform.create_video_element();
                element.set_id(&format!("{id}-remote"));
                remote.container().append_child(element.clone());
                elements.remote = Some(element);
            }
            DisplayBinding::OneWay { display } => match display.take_cached() {
                Some(element) => {
                    element.set_id(&id);
                    elements.local = Some(element);
                }
                None => {
                    let element = platform.create_video_element();
                    element.set_id(&id);
                    display.container().append_child(element.clone());
                    elements.remote = Some(element);
                }
            },
        }

        if let Some(stream) = elements.local.as_ref().and_then(|e| e.src_object()) {
            peer.add_stream(stream);
        }

        let connection = Self {
            inner: Arc::new(ConnectionInner {
                id,
                peer,
                capabilities,
                local_display: binding.local_display().clone(),
                elements: Mutex::new(elements),
                registry: Arc::downgrade(&registry.connections),
            }),
        };
        connection.install_event_handler();

        if registry.insert(connection.clone()).is_some() {
            tracing::warn!("Replaced existing connection with the same id");
        }
        tracing::info!("Connection created");
        Ok(connection)
    }

    fn install_event_handler(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.peer.set_event_handler(Arc::new(move |event: PeerConnectionEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(event);
            }
        }));
    }

    /// Caller chosen id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Signaling state of the peer connection
    #[must_use]
    pub fn state(&self) -> SignalingState {
        self.inner.peer.signaling_state()
    }

    /// Local video element, if bound
    #[must_use]
    pub fn local_element(&self) -> Option<VideoElementHandle> {
        self.inner.elements.lock().local.clone()
    }

    /// Remote video element, if bound
    #[must_use]
    pub fn remote_element(&self) -> Option<VideoElementHandle> {
        self.inner.elements.lock().remote.clone()
    }

    fn local_stream(&self) -> Option<MediaStreamHandle> {
        self.local_element().and_then(|e| e.src_object())
    }

    fn remote_stream(&self) -> Option<(VideoElementHandle, MediaStreamHandle)> {
        let remote = self.remote_element()?;
        let stream = remote.src_object()?;
        Some((remote, stream))
    }

    /// Create an offer and apply it as local description
    ///
    /// A bound local capture without audio or video clears the matching
    /// `has_*` flag; a missing video track also stops offering to receive
    /// video.
    ///
    /// # Errors
    ///
    /// Returns error if the host fails to create or apply the offer
    #[tracing::instrument(skip_all, fields(id = %self.inner.id))]
    pub async fn create_offer(
        &self,
        options: OfferOptions,
    ) -> Result<LocalDescription, ConnectionError> {
        let mut has_audio = true;
        let mut has_video = true;
        let mut receive_video = options.receive_video;
        if let Some(stream) = self.local_stream() {
            if stream.audio_tracks().is_empty() {
                has_audio = false;
            }
            if stream.video_tracks().is_empty() {
                has_video = false;
                receive_video = false;
            }
        }

        let offer = self
            .inner
            .peer
            .create_offer(OfferConstraints {
                offer_to_receive_audio: options.receive_audio,
                offer_to_receive_video: receive_video,
            })
            .await?;
        self.inner.peer.set_local_description(offer.clone()).await?;
        tracing::debug!(sdp = %offer.sdp, "Local offer applied");

        Ok(LocalDescription {
            sdp: strip_codecs(&offer.sdp, &options.strip_codecs),
            has_audio,
            has_video,
        })
    }

    /// Create an answer and apply it as local description
    ///
    /// # Errors
    ///
    /// Returns error if the host fails to create or apply the answer
    #[tracing::instrument(skip_all, fields(id = %self.inner.id))]
    pub async fn create_answer(&self, options: AnswerOptions) -> Result<String, ConnectionError> {
        let answer = self.inner.peer.create_answer().await?;
        self.inner.peer.set_local_description(answer.clone()).await?;
        tracing::debug!(sdp = %answer.sdp, "Local answer applied");
        Ok(strip_codecs(&answer.sdp, &options.strip_codecs))
    }

    /// Apply remote SDP
    ///
    /// The SDP is an answer when a local offer is pending and an offer
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns error if the host rejects the description
    #[tracing::instrument(skip_all, fields(id = %self.inner.id))]
    pub async fn set_remote_sdp(&self, sdp: &str) -> Result<(), ConnectionError> {
        tracing::debug!(sdp = %sdp, "Setting remote SDP");
        let description = if self.state() == SignalingState::HaveLocalOffer {
            SessionDescription::answer(sdp)
        } else {
            SessionDescription::offer(sdp)
        };
        self.inner.peer.set_remote_description(description).await?;
        Ok(())
    }

    /// Not supported by the host; always `false`
    #[must_use]
    pub fn change_audio_codec(&self, _codec: &str) -> bool {
        false
    }

    /// Tear the connection down
    ///
    /// The remote element is always removed. With `cache_camera` set and
    /// no cached capture left in the local display, the local element
    /// becomes that display's cached capture with its tracks enabled;
    /// otherwise it is removed and its tracks stopped.
    #[tracing::instrument(skip(self), fields(id = %self.inner.id))]
    pub fn close(&self, cache_camera: bool) {
        let (local, remote) = {
            let mut elements = self.inner.elements.lock();
            (elements.local.take(), elements.remote.take())
        };

        if let Some(remote) = remote {
            remove_video_element(remote.as_ref());
        }

        if let Some(local) = local {
            let display = &self.inner.local_display;
            if cache_camera && !display.has_cached() {
                set_first_track_enabled(&local, MediaKind::Audio, true);
                set_first_track_enabled(&local, MediaKind::Video, true);
                display.cache(local.clone());
                tracing::info!(element = %local.id(), "Local capture kept as cached instance");
            } else {
                remove_video_element(local.as_ref());
            }
        }

        if self.state() != SignalingState::Closed {
            self.inner.peer.close();
        }

        if let Some(table) = self.inner.registry.upgrade() {
            table.lock().remove(&self.inner.id);
        }
        tracing::info!("Connection closed");
    }

    /// Remote playback volume on a 0 to 100 scale
    ///
    /// Ignored until the remote element plays a stream with audio.
    pub fn set_volume(&self, volume: f64) {
        if let Some((remote, stream)) = self.remote_stream() {
            if !stream.audio_tracks().is_empty() {
                remote.set_volume(volume / 100.0);
            }
        }
    }

    /// Remote playback volume on a 0 to 100 scale, `-1` without remote audio
    #[must_use]
    pub fn get_volume(&self) -> f64 {
        match self.remote_stream() {
            Some((remote, stream)) if !stream.audio_tracks().is_empty() => remote.volume() * 100.0,
            _ => -1.0,
        }
    }

    /// Disable the local audio track
    pub fn mute_audio(&self) {
        self.set_local_enabled(MediaKind::Audio, false);
    }

    /// Enable the local audio track
    pub fn unmute_audio(&self) {
        self.set_local_enabled(MediaKind::Audio, true);
    }

    /// Whether the local audio track is disabled, `true` without one
    #[must_use]
    pub fn is_audio_muted(&self) -> bool {
        self.is_local_muted(MediaKind::Audio)
    }

    /// Disable the local video track
    pub fn mute_video(&self) {
        self.set_local_enabled(MediaKind::Video, false);
    }

    /// Enable the local video track
    pub fn unmute_video(&self) {
        self.set_local_enabled(MediaKind::Video, true);
    }

    /// Whether the local video track is disabled, `true` without one
    #[must_use]
    pub fn is_video_muted(&self) -> bool {
        self.is_local_muted(MediaKind::Video)
    }

    fn set_local_enabled(&self, kind: MediaKind, enabled: bool) {
        if let Some(local) = self.local_element() {
            set_first_track_enabled(&local, kind, enabled);
        }
    }

    fn is_local_muted(&self, kind: MediaKind) -> bool {
        self.local_stream()
            .and_then(|stream| stream.tracks_of(kind).into_iter().next())
            .map_or(true, |track| !track.is_enabled())
    }

    /// Normalized statistics of the peer connection
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Unsupported`] when the host has no known
    /// statistics layout, or the host failure
    #[tracing::instrument(skip_all, fields(id = %self.inner.id))]
    pub async fn get_stats(&self) -> Result<StatsReport, StatsError> {
        let capabilities = self.inner.capabilities;
        let raw = self.inner.peer.get_stats().await?;
        translate(capabilities.stats_format, capabilities.family, &raw)
    }

    /// [`Connection::get_stats`] delivered through a callback
    pub async fn get_stats_with<F>(&self, callback: F)
    where
        F: FnOnce(Result<StatsReport, StatsError>) + Send,
    {
        callback(self.get_stats().await);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let elements = self.inner.elements.lock();
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("state", &self.inner.peer.signaling_state())
            .field("local", &elements.local.as_ref().map(|e| e.id()))
            .field("remote", &elements.remote.as_ref().map(|e| e.id()))
            .finish()
    }
}

impl ConnectionInner {
    fn handle_event(&self, event: PeerConnectionEvent) {
        match event {
            PeerConnectionEvent::Track(stream) => {
                let remote = self.elements.lock().remote.clone();
                match remote {
                    Some(remote) => {
                        tracing::debug!(id = %self.id, stream = %stream.id(), "Remote stream attached");
                        remote.set_src_object(Some(stream));
                        remote.play_on_metadata();
                    }
                    None => {
                        tracing::debug!(id = %self.id, "Remote stream ignored, no remote element");
                    }
                }
            }
            PeerConnectionEvent::StreamRemoved => {
                let remote = self.elements.lock().remote.clone();
                if let Some(remote) = remote {
                    remote.pause();
                }
            }
            PeerConnectionEvent::SignalingStateChange(state) => {
                tracing::debug!(id = %self.id, state = %state, "Signaling state changed");
            }
            PeerConnectionEvent::IceConnectionStateChange(state) => {
                tracing::trace!(id = %self.id, state = ?state, "ICE connection state changed");
            }
        }
    }
}

fn set_first_track_enabled(element: &VideoElementHandle, kind: MediaKind, enabled: bool) {
    if let Some(track) = element
        .src_object()
        .and_then(|stream| stream.tracks_of(kind).into_iter().next())
    {
        track.set_enabled(enabled);
    }
}
