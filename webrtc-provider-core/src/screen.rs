//! Screen sharing source negotiation

use crate::browser::{Capabilities, ScreenCaptureMechanism};
use crate::constraints::{DesktopCapture, Dimension, FrameRate, MediaConstraints, VideoConstraints};
use crate::media::MediaError;
use crate::platform::{ExtensionChannel, ExtensionRequest};
use std::sync::Arc;

/// Source kind requested from the extension
pub const DESKTOP_MEDIA_SOURCE: &str = "desktop";

/// Source kind requested from native capture
pub const WINDOW_MEDIA_SOURCE: &str = "window";

/// Screen capture parameters merged into the video constraints
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCapture {
    /// Source picked through the extension
    Desktop(DesktopCapture),
    /// Native capture flags
    Window {
        /// Native source kind
        media_source: String,
        /// Pinned width
        width: Option<Dimension>,
        /// Pinned height
        height: Option<Dimension>,
        /// Pinned frame rate
        frame_rate: Option<FrameRate>,
    },
}

impl ScreenCapture {
    /// Copy the capture parameters into video constraints
    pub fn merge_into(self, video: &mut VideoConstraints) {
        match self {
            Self::Desktop(desktop) => video.mandatory = Some(desktop),
            Self::Window {
                media_source,
                width,
                height,
                frame_rate,
            } => {
                video.media_source = Some(media_source);
                if width.is_some() {
                    video.width = width;
                }
                if height.is_some() {
                    video.height = height;
                }
                if frame_rate.is_some() {
                    video.frame_rate = frame_rate;
                }
            }
        }
    }
}

/// Obtains screen capture parameters for the host
pub struct ScreenShareNegotiator {
    capabilities: Capabilities,
    extension_id: Option<String>,
    channel: Option<Arc<dyn ExtensionChannel>>,
}

impl ScreenShareNegotiator {
    /// Create a negotiator
    #[must_use]
    pub fn new(
        capabilities: Capabilities,
        extension_id: Option<String>,
        channel: Option<Arc<dyn ExtensionChannel>>,
    ) -> Self {
        Self {
            capabilities,
            extension_id,
            channel,
        }
    }

    /// Resolve capture parameters for the requested video
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::ExtensionUnavailable`] when the extension is
    /// missing and [`MediaError::ScreenAccessDenied`] when the user
    /// cancels the source selection
    #[tracing::instrument(skip(self, constraints), fields(browser = %self.capabilities.family))]
    pub async fn get_screen_device_id(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<ScreenCapture, MediaError> {
        let video = constraints.video.clone().unwrap_or_default();
        let width = video.width.as_ref().and_then(Dimension::as_pixels);
        let height = video.height.as_ref().and_then(Dimension::as_pixels);
        let frame_rate = video.frame_rate.as_ref().map(FrameRate::max);

        match self.capabilities.screen_capture {
            ScreenCaptureMechanism::Extension => {
                let source_id = self.request_source_id().await?;
                Ok(ScreenCapture::Desktop(DesktopCapture {
                    max_width: width,
                    max_height: height,
                    max_frame_rate: frame_rate,
                    chrome_media_source: DESKTOP_MEDIA_SOURCE.to_string(),
                    chrome_media_source_id: source_id,
                }))
            }
            ScreenCaptureMechanism::Native => Ok(ScreenCapture::Window {
                media_source: WINDOW_MEDIA_SOURCE.to_string(),
                width: width.map(Dimension::exact_range),
                height: height.map(Dimension::exact_range),
                frame_rate: frame_rate.map(|rate| FrameRate::Range {
                    min: rate,
                    max: rate,
                }),
            }),
        }
    }

    async fn request_source_id(&self) -> Result<String, MediaError> {
        let (Some(channel), Some(extension_id)) = (&self.channel, &self.extension_id) else {
            return Err(MediaError::ExtensionUnavailable);
        };

        let installed = channel
            .send_message(extension_id, ExtensionRequest::IsInstalled)
            .await?;
        if installed.is_none() {
            tracing::warn!(extension_id = %extension_id, "Screen sharing extension did not answer");
            return Err(MediaError::ExtensionUnavailable);
        }

        let response = channel
            .send_message(extension_id, ExtensionRequest::GetSourceId)
            .await?
            .unwrap_or_default();
        match (response.error, response.source_id) {
            (None, Some(source_id)) => {
                tracing::debug!(source_id = %source_id, "Screen source selected");
                Ok(source_id)
            }
            (error, _) => {
                tracing::info!(error = ?error, "Screen source selection refused");
                Err(MediaError::ScreenAccessDenied)
            }
        }
    }
}
