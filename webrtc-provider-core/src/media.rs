//! Local media acquisition
//!
//! Captures camera, microphone or screen from the host, attaches the
//! stream to a muted video element and keeps that element as the cached
//! instance of its [`Display`], so later connections can reuse the
//! capture without prompting again.

use crate::browser::Capabilities;
use crate::constraints::{normalize, MediaConstraints};
use crate::display::Display;
use crate::platform::{MediaDevices, Platform, PlatformError, VideoElement};
use crate::screen::ScreenShareNegotiator;
use crate::types::CACHED_INSTANCE_POSTFIX;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Media-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Host refused or failed the capture
    #[error("Capture failed: {0}")]
    Capture(#[from] PlatformError),

    /// Screen sharing extension missing
    #[error("Screen sharing extension is not available")]
    ExtensionUnavailable,

    /// User refused the screen source selection
    #[error("Screen access denied")]
    ScreenAccessDenied,
}

/// Acquires local media into displays
pub struct MediaAcquirer {
    platform: Arc<dyn Platform>,
    devices: Arc<dyn MediaDevices>,
    capabilities: Capabilities,
    default_constraints: MediaConstraints,
    screen: ScreenShareNegotiator,
}

impl MediaAcquirer {
    /// Create an acquirer
    #[must_use]
    pub fn new(
        platform: Arc<dyn Platform>,
        capabilities: Capabilities,
        default_constraints: MediaConstraints,
        extension_id: Option<String>,
    ) -> Self {
        let screen =
            ScreenShareNegotiator::new(capabilities, extension_id, platform.extension_channel());
        Self {
            devices: platform.media_devices(),
            platform,
            capabilities,
            default_constraints,
            screen,
        }
    }

    /// Capture local media into `display`
    ///
    /// Without constraints the default constraints are used and an
    /// existing cached capture is reused as is. With constraints any
    /// cached capture is released first.
    ///
    /// # Errors
    ///
    /// Returns error if the host refuses the capture or screen source
    /// negotiation fails
    #[tracing::instrument(skip_all, fields(explicit = constraints.is_some()))]
    pub async fn get_media_access(
        &self,
        constraints: Option<MediaConstraints>,
        display: &Display,
    ) -> Result<Display, MediaError> {
        let mut constraints = match constraints {
            None => {
                if display.has_cached() {
                    tracing::debug!("Reusing cached capture");
                    return Ok(display.clone());
                }
                self.default_constraints.clone()
            }
            Some(constraints) => {
                let constraints = normalize(constraints);
                self.release_media(display);
                constraints
            }
        };

        let screen_share = constraints.is_screen_share();
        if screen_share {
            let capture = self.screen.get_screen_device_id(&constraints).await?;
            if let Some(video) = constraints.video.as_mut() {
                video.capture = None;
                capture.merge_into(video);
                if self.capabilities.strip_screen_dimensions {
                    video.clear_dimensions();
                }
            }
        }

        let request_mic =
            screen_share && constraints.has_audio() && !self.capabilities.combined_screen_audio;
        if request_mic {
            constraints.audio = None;
        }

        tracing::info!(constraints = ?constraints, "Requesting media access");
        let stream = self.devices.get_user_media(&constraints).await?;

        let video = self.platform.create_video_element();
        video.set_id(&format!("{}{}", Uuid::new_v4(), CACHED_INSTANCE_POSTFIX));
        video.set_src_object(Some(stream.clone()));
        if !display.cache(video.clone()) {
            tracing::warn!(id = %video.id(), "Display already cached, dropping capture");
            remove_video_element(video.as_ref());
            return Ok(display.clone());
        }
        display.container().append_child(video.clone());
        video.set_muted(true);
        video.play_on_metadata();

        if request_mic {
            tracing::info!("Requesting separate microphone stream");
            let mic = self
                .devices
                .get_user_media(&MediaConstraints::audio_only())
                .await?;
            if let Some(track) = mic.audio_tracks().into_iter().next() {
                tracing::info!("Adding microphone track to screen stream");
                stream.add_track(track);
            }
        }

        Ok(display.clone())
    }

    /// Stop and remove the cached capture of `display`
    ///
    /// Returns `true` if there was one.
    pub fn release_media(&self, display: &Display) -> bool {
        match display.take_cached() {
            Some(video) => {
                remove_video_element(video.as_ref());
                true
            }
            None => false,
        }
    }
}

/// Pause an element, stop its tracks and detach it from the document
pub fn remove_video_element(video: &dyn VideoElement) {
    if let Some(stream) = video.src_object() {
        video.pause();
        for track in stream.tracks() {
            track.stop();
        }
    }
    video.detach();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::browser::BrowserFamily;
    use crate::constraints::{AudioConstraints, VideoConstraints};
    use crate::memory::{MemoryExtension, MemoryPlatform};
    use crate::platform::{
        ContainerHandle, ExtensionChannel, MediaStreamHandle, PeerConnectionHandle,
        VideoElementHandle,
    };
    use crate::types::{ConnectionConstraints, MediaDeviceInfo, RtcConfiguration};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Host whose capture completes after another capture filled the display
    struct RacingPlatform {
        inner: Arc<MemoryPlatform>,
        devices: Arc<RacingDevices>,
    }

    struct RacingDevices {
        inner: Arc<dyn MediaDevices>,
        display: Display,
        rival: VideoElementHandle,
        returned: Mutex<Option<MediaStreamHandle>>,
    }

    #[async_trait]
    impl MediaDevices for RacingDevices {
        async fn get_user_media(
            &self,
            constraints: &MediaConstraints,
        ) -> Result<MediaStreamHandle, PlatformError> {
            let stream = self.inner.get_user_media(constraints).await?;
            self.display.cache(self.rival.clone());
            *self.returned.lock() = Some(stream.clone());
            Ok(stream)
        }

        async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, PlatformError> {
            self.inner.enumerate_devices().await
        }
    }

    impl Platform for RacingPlatform {
        fn browser(&self) -> BrowserFamily {
            self.inner.browser()
        }

        fn supports_webrtc(&self) -> bool {
            self.inner.supports_webrtc()
        }

        fn media_devices(&self) -> Arc<dyn MediaDevices> {
            self.devices.clone()
        }

        fn extension_channel(&self) -> Option<Arc<dyn ExtensionChannel>> {
            self.inner.extension_channel()
        }

        fn create_peer_connection(
            &self,
            configuration: &RtcConfiguration,
            constraints: &ConnectionConstraints,
        ) -> Result<PeerConnectionHandle, PlatformError> {
            self.inner.create_peer_connection(configuration, constraints)
        }

        fn create_video_element(&self) -> VideoElementHandle {
            self.inner.create_video_element()
        }

        fn create_container(&self) -> ContainerHandle {
            self.inner.create_container()
        }
    }

    fn acquirer(platform: &Arc<MemoryPlatform>) -> MediaAcquirer {
        let capabilities = Capabilities::for_browser(platform.browser());
        MediaAcquirer::new(
            platform.clone(),
            capabilities,
            MediaConstraints::audio_video(),
            Some("ext-id".to_string()),
        )
    }

    #[tokio::test]
    async fn test_default_access_caches_element() {
        let platform = MemoryPlatform::chrome();
        let display = Display::new(platform.create_container());

        acquirer(&platform)
            .get_media_access(None, &display)
            .await
            .unwrap();

        let cached = display.cached().unwrap();
        assert!(cached.id().ends_with(CACHED_INSTANCE_POSTFIX));
        assert!(cached.is_muted());
        assert_eq!(display.container().children().len(), 1);
        assert_eq!(platform.capture_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_default_access_reuses_cache() {
        let platform = MemoryPlatform::chrome();
        let display = Display::new(platform.create_container());
        let acquirer = acquirer(&platform);

        acquirer.get_media_access(None, &display).await.unwrap();
        acquirer.get_media_access(None, &display).await.unwrap();

        assert_eq!(platform.capture_requests().len(), 1);
        assert_eq!(display.container().children().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_access_replaces_cache() {
        let platform = MemoryPlatform::chrome();
        let display = Display::new(platform.create_container());
        let acquirer = acquirer(&platform);

        acquirer.get_media_access(None, &display).await.unwrap();
        let first = display.cached().unwrap();
        let first_stream = first.src_object().unwrap();

        acquirer
            .get_media_access(Some(MediaConstraints::audio_only()), &display)
            .await
            .unwrap();

        assert!(first_stream.tracks().iter().all(|t| !t.is_live()));
        assert_eq!(display.container().children().len(), 1);
        assert_ne!(display.cached().unwrap().id(), first.id());
        assert_eq!(platform.capture_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_capture_failure_propagates() {
        let platform = MemoryPlatform::chrome();
        platform.deny_capture("NotAllowedError");
        let display = Display::new(platform.create_container());

        let err = acquirer(&platform)
            .get_media_access(None, &display)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Capture(PlatformError::PermissionDenied(_))));
        assert!(!display.has_cached());
    }

    #[tokio::test]
    async fn test_chrome_screen_share_requests_mic_separately() {
        let platform = MemoryPlatform::chrome();
        platform.set_extension(MemoryExtension::granting("screen:0"));
        let display = Display::new(platform.create_container());

        let constraints = MediaConstraints {
            audio: Some(AudioConstraints::default()),
            video: Some(VideoConstraints::screen(1280.0, 720.0, 5.0)),
        };
        acquirer(&platform)
            .get_media_access(Some(constraints), &display)
            .await
            .unwrap();

        let requests = platform.capture_requests();
        assert_eq!(requests.len(), 2);
        let screen = &requests[0];
        assert!(screen.audio.is_none());
        let video = screen.video.as_ref().unwrap();
        assert!(video.capture.is_none());
        assert!(video.width.is_none());
        assert!(video.frame_rate.is_none());
        assert_eq!(
            video.mandatory.as_ref().unwrap().chrome_media_source_id,
            "screen:0"
        );
        assert_eq!(requests[1], MediaConstraints::audio_only());

        let stream = display.cached().unwrap().src_object().unwrap();
        assert_eq!(stream.audio_tracks().len(), 1);
        assert_eq!(stream.video_tracks().len(), 1);
    }

    #[tokio::test]
    async fn test_firefox_screen_share_single_request() {
        let platform = MemoryPlatform::new(BrowserFamily::Firefox);
        let display = Display::new(platform.create_container());

        let constraints = MediaConstraints {
            audio: Some(AudioConstraints::default()),
            video: Some(VideoConstraints::screen(1280.0, 720.0, 5.0)),
        };
        acquirer(&platform)
            .get_media_access(Some(constraints), &display)
            .await
            .unwrap();

        let requests = platform.capture_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].audio.is_some());
        assert_eq!(
            requests[0].video.as_ref().unwrap().media_source.as_deref(),
            Some("window")
        );
    }

    #[tokio::test]
    async fn test_concurrent_cache_drops_new_capture() {
        let inner = MemoryPlatform::firefox();
        let display = Display::new(inner.create_container());
        let rival = inner.create_video_element();
        rival.set_id("rival");
        let devices = Arc::new(RacingDevices {
            inner: inner.media_devices(),
            display: display.clone(),
            rival,
            returned: Mutex::new(None),
        });
        let platform = Arc::new(RacingPlatform {
            inner: inner.clone(),
            devices: devices.clone(),
        });
        let acquirer = MediaAcquirer::new(
            platform,
            Capabilities::for_browser(BrowserFamily::Firefox),
            MediaConstraints::audio_video(),
            None,
        );

        acquirer.get_media_access(None, &display).await.unwrap();

        assert_eq!(
            display.cached().unwrap().id(),
            format!("rival{CACHED_INSTANCE_POSTFIX}")
        );
        assert!(display.container().children().is_empty());
        let dropped = devices.returned.lock().clone().unwrap();
        assert!(dropped.tracks().iter().all(|t| !t.is_live()));
    }

    #[tokio::test]
    async fn test_release_media() {
        let platform = MemoryPlatform::chrome();
        let display = Display::new(platform.create_container());
        let acquirer = acquirer(&platform);

        assert!(!acquirer.release_media(&display));
        acquirer.get_media_access(None, &display).await.unwrap();
        let stream = display.cached().unwrap().src_object().unwrap();

        assert!(acquirer.release_media(&display));
        assert!(display.container().children().is_empty());
        assert!(stream.tracks().iter().all(|t| !t.is_live()));
        assert!(!acquirer.release_media(&display));
    }
}
