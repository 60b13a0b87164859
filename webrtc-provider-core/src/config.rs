//! Provider configuration

use crate::browser::BrowserFamily;
use crate::constraints::{
    AudioConstraints, FrameRate, MediaConstraints, VideoConstraints, DEFAULT_FRAME_RATE,
    DEFAULT_HEIGHT, DEFAULT_WIDTH,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration document could not be parsed
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings applied when the provider is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Screen sharing extension id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_id: Option<String>,
    /// Constraints used when media access is requested without any
    #[serde(default = "default_constraints")]
    pub constraints: MediaConstraints,
    /// Override of the detected browser family
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserFamily>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            extension_id: None,
            constraints: default_constraints(),
            browser: None,
        }
    }
}

impl ProviderConfig {
    /// Parse a JSON configuration
    ///
    /// # Errors
    ///
    /// Returns error if the document is not a valid configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn default_constraints() -> MediaConstraints {
    let mut video = VideoConstraints::with_resolution(DEFAULT_WIDTH, DEFAULT_HEIGHT);
    video.frame_rate = Some(FrameRate::Fixed(DEFAULT_FRAME_RATE));
    MediaConstraints {
        audio: Some(AudioConstraints::default()),
        video: Some(video),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::constraints::Dimension;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_constraints() {
        let config = ProviderConfig::default();
        let video = config.constraints.video.unwrap();
        assert!(config.constraints.audio.is_some());
        assert_eq!(video.width, Some(Dimension::Pixels(320.0)));
        assert_eq!(video.height, Some(Dimension::Pixels(240.0)));
        assert_eq!(video.frame_rate, Some(FrameRate::Fixed(30.0)));
    }

    #[test]
    fn test_from_json() {
        let config = ProviderConfig::from_json(
            r#"{"extensionId": "abc", "browser": "firefox", "constraints": {"audio": {}}}"#,
        )
        .unwrap();
        assert_eq!(config.extension_id.as_deref(), Some("abc"));
        assert_eq!(config.browser, Some(BrowserFamily::Firefox));
        assert_eq!(config.constraints, MediaConstraints::audio_only());
    }

    #[test]
    fn test_from_json_boolean_constraints() {
        let config =
            ProviderConfig::from_json(r#"{"constraints": {"audio": true, "video": true}}"#)
                .unwrap();
        assert_eq!(config.constraints, MediaConstraints::audio_video());

        let config = ProviderConfig::from_json(
            r#"{"constraints": {"audio": true, "video": {"width": 640, "height": 480}}}"#,
        )
        .unwrap();
        let video = config.constraints.video.unwrap();
        assert_eq!(video.width, Some(Dimension::Pixels(640.0)));
        assert_eq!(config.constraints.audio, Some(AudioConstraints::default()));
    }

    #[test]
    fn test_from_json_empty_object_uses_defaults() {
        let config = ProviderConfig::from_json("{}").unwrap();
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_from_json_rejects_unknown_browser() {
        let err = ProviderConfig::from_json(r#"{"browser": "netscape"}"#).unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }
}
