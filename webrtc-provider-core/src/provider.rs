//! Media provider facade
//!
//! [`MediaProvider`] ties the host platform, the resolved browser
//! capabilities, media acquisition and the connection registry together.
//! Build one with [`MediaProviderBuilder`]; independent providers never
//! share connections.

use crate::browser::Capabilities;
use crate::config::ProviderConfig;
use crate::connection::{Connection, ConnectionError, ConnectionOptions, ConnectionRegistry};
use crate::constraints::MediaConstraints;
use crate::devices;
use crate::display::Display;
use crate::media::{MediaAcquirer, MediaError};
use crate::platform::Platform;
use crate::types::DeviceList;
use std::any::Any;
use std::sync::Arc;

/// Opaque audio context handle supplied by the embedder
pub type AudioContextHandle = Arc<dyn Any + Send + Sync>;

/// Builder for [`MediaProvider`]
pub struct MediaProviderBuilder {
    platform: Arc<dyn Platform>,
    config: ProviderConfig,
    audio_context: Option<AudioContextHandle>,
}

impl MediaProviderBuilder {
    /// Start from the default configuration
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            config: ProviderConfig::default(),
            audio_context: None,
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Store an audio context handle
    #[must_use]
    pub fn with_audio_context(mut self, audio_context: AudioContextHandle) -> Self {
        self.audio_context = Some(audio_context);
        self
    }

    /// Resolve capabilities and build the provider
    #[must_use]
    pub fn build(self) -> MediaProvider {
        let family = self.config.browser.unwrap_or_else(|| self.platform.browser());
        let capabilities = Capabilities::for_browser(family);
        let acquirer = MediaAcquirer::new(
            self.platform.clone(),
            capabilities,
            self.config.constraints.clone(),
            self.config.extension_id.clone(),
        );
        tracing::info!(browser = %family, "Initialized");

        MediaProvider {
            platform: self.platform,
            capabilities,
            acquirer,
            registry: ConnectionRegistry::new(),
            config: self.config,
            audio_context: self.audio_context,
        }
    }
}

/// Browser media provider
pub struct MediaProvider {
    platform: Arc<dyn Platform>,
    capabilities: Capabilities,
    acquirer: MediaAcquirer,
    registry: ConnectionRegistry,
    config: ProviderConfig,
    audio_context: Option<AudioContextHandle>,
}

impl MediaProvider {
    /// Builder over `platform`
    pub fn builder(platform: Arc<dyn Platform>) -> MediaProviderBuilder {
        MediaProviderBuilder::new(platform)
    }

    /// Resolved capabilities
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Audio context handle, if one was supplied
    #[must_use]
    pub fn audio_context(&self) -> Option<&AudioContextHandle> {
        self.audio_context.as_ref()
    }

    /// Create and register a connection
    ///
    /// # Errors
    ///
    /// Returns error if the host refuses the peer connection
    pub fn create_connection(
        &self,
        options: ConnectionOptions,
    ) -> Result<Connection, ConnectionError> {
        Connection::create(
            self.platform.as_ref(),
            self.capabilities,
            &self.registry,
            options,
        )
    }

    /// Capture local media into `display`
    ///
    /// # Errors
    ///
    /// Returns error if the capture or screen source negotiation fails
    pub async fn get_media_access(
        &self,
        constraints: Option<MediaConstraints>,
        display: &Display,
    ) -> Result<Display, MediaError> {
        self.acquirer.get_media_access(constraints, display).await
    }

    /// Stop and remove the cached capture of `display`
    pub fn release_media(&self, display: &Display) -> bool {
        self.acquirer.release_media(display)
    }

    /// List microphones and cameras, optionally unlocking their labels
    ///
    /// # Errors
    ///
    /// Returns error if the temporary capture or the enumeration fails
    pub async fn list_devices(&self, labels: bool) -> Result<DeviceList, MediaError> {
        devices::list_devices(self.platform.as_ref(), &self.acquirer, labels).await
    }

    /// Whether the host can capture media and create peer connections
    #[must_use]
    pub fn available(&self) -> bool {
        self.capabilities.webrtc_allowed && self.platform.supports_webrtc()
    }

    /// Always `true`; no sound is played
    #[must_use]
    pub fn play_first_sound(&self) -> bool {
        true
    }

    /// Live connection by id
    #[must_use]
    pub fn connection(&self, id: &str) -> Option<Connection> {
        self.registry.get(id)
    }

    /// Ids of the live connections, sorted
    #[must_use]
    pub fn connection_ids(&self) -> Vec<String> {
        self.registry.ids()
    }
}

impl std::fmt::Debug for MediaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaProvider")
            .field("capabilities", &self.capabilities)
            .field("config", &self.config)
            .field("connections", &self.registry)
            .finish()
    }
}
