//! Capture constraints and their normalization
//!
//! Constraints are described the way the host capture API expects them
//! (camelCase, nested per media kind). [`normalize`] rewrites the user
//! supplied shape before it is handed to the host.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Frame rate used when a fixed rate of zero is requested
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Width used when the requested resolution is unusable
pub const DEFAULT_WIDTH: f64 = 320.0;

/// Height used when the requested resolution is unusable
pub const DEFAULT_HEIGHT: f64 = 240.0;

/// Video resolution component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    /// Plain pixel count
    Pixels(f64),
    /// Accepted range
    Range {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
    /// Any other value supplied by the caller
    Unparsed(Value),
}

impl Dimension {
    /// Pixel count if this is a plain, finite number
    #[must_use]
    pub fn as_pixels(&self) -> Option<f64> {
        match self {
            Self::Pixels(px) if px.is_finite() => Some(*px),
            _ => None,
        }
    }

    fn is_usable(&self) -> bool {
        matches!(self.as_pixels(), Some(px) if px != 0.0)
    }

    /// Range pinned to a single value
    #[must_use]
    pub fn exact_range(value: f64) -> Self {
        Self::Range {
            min: value,
            max: value,
        }
    }
}

/// Frame rate constraint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameRate {
    /// Single value
    Fixed(f64),
    /// Accepted range
    Range {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
}

impl FrameRate {
    /// Upper bound of the rate
    #[must_use]
    pub fn max(&self) -> f64 {
        match self {
            Self::Fixed(rate) => *rate,
            Self::Range { max, .. } => *max,
        }
    }
}

/// Kind of video capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureType {
    /// Camera capture
    Camera,
    /// Screen capture
    Screen,
}

/// Desktop capture parameters for extension based screen sharing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopCapture {
    /// Maximum capture width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f64>,
    /// Maximum capture height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<f64>,
    /// Maximum frame rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frame_rate: Option<f64>,
    /// Capture source kind, always `desktop`
    pub chrome_media_source: String,
    /// Source picked by the user through the extension
    pub chrome_media_source_id: String,
}

/// Audio capture constraints; presence requests audio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraints {
    /// Stereo capture
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stereo: bool,
    /// Standard echo cancellation flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo_cancellation: Option<bool>,
    /// Legacy echo cancellation flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goog_echo_cancellation: Option<bool>,
    /// Specific microphone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Video capture constraints; presence requests video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    /// Camera or screen
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureType>,
    /// Requested width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Dimension>,
    /// Requested height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Dimension>,
    /// Requested frame rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<FrameRate>,
    /// Specific camera
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Native screen capture source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_source: Option<String>,
    /// Extension screen capture parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory: Option<DesktopCapture>,
}

impl VideoConstraints {
    /// Video at a fixed resolution
    #[must_use]
    pub fn with_resolution(width: f64, height: f64) -> Self {
        Self {
            width: Some(Dimension::Pixels(width)),
            height: Some(Dimension::Pixels(height)),
            ..Default::default()
        }
    }

    /// Screen capture at a fixed resolution and frame rate
    #[must_use]
    pub fn screen(width: f64, height: f64, frame_rate: f64) -> Self {
        Self {
            capture: Some(CaptureType::Screen),
            frame_rate: Some(FrameRate::Fixed(frame_rate)),
            ..Self::with_resolution(width, height)
        }
    }

    /// Whether a screen capture is requested
    #[must_use]
    pub fn is_screen(&self) -> bool {
        self.capture == Some(CaptureType::Screen)
    }

    /// Drop resolution and frame rate
    pub fn clear_dimensions(&mut self) {
        self.width = None;
        self.height = None;
        self.frame_rate = None;
    }
}

/// Capture constraints for both media kinds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Audio request; `true` reads as unconstrained audio
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flag_or_constraints"
    )]
    pub audio: Option<AudioConstraints>,
    /// Video request; `true` reads as unconstrained video
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flag_or_constraints"
    )]
    pub video: Option<VideoConstraints>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KindRequest<T> {
    Flag(bool),
    Constraints(T),
}

/// `true`, `false`, `null` or a constraint object for one media kind
fn flag_or_constraints<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(
        match Option::<KindRequest<T>>::deserialize(deserializer)? {
            Some(KindRequest::Flag(true)) => Some(T::default()),
            Some(KindRequest::Constraints(constraints)) => Some(constraints),
            Some(KindRequest::Flag(false)) | None => None,
        },
    )
}

impl MediaConstraints {
    /// Audio only
    #[must_use]
    pub fn audio_only() -> Self {
        Self {
            audio: Some(AudioConstraints::default()),
            video: None,
        }
    }

    /// Audio and unconstrained video
    #[must_use]
    pub fn audio_video() -> Self {
        Self {
            audio: Some(AudioConstraints::default()),
            video: Some(VideoConstraints::default()),
        }
    }

    /// Whether audio is requested
    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Whether video is requested
    #[must_use]
    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    /// Whether a screen capture is requested
    #[must_use]
    pub fn is_screen_share(&self) -> bool {
        self.video.as_ref().is_some_and(VideoConstraints::is_screen)
    }
}

/// Rewrite user supplied constraints into the shape the host expects
#[must_use]
pub fn normalize(mut constraints: MediaConstraints) -> MediaConstraints {
    if let Some(video) = constraints.video.as_mut() {
        if let Some(FrameRate::Fixed(rate)) = video.frame_rate {
            let rate = if rate == 0.0 { DEFAULT_FRAME_RATE } else { rate };
            video.frame_rate = Some(FrameRate::Range {
                min: rate,
                max: rate,
            });
        }

        let unusable = |d: &Option<Dimension>| d.as_ref().is_some_and(|d| !d.is_usable());
        if unusable(&video.width) || unusable(&video.height) {
            tracing::warn!(
                width = ?video.width,
                height = ?video.height,
                "Width or height has zero/NaN value, using default resolution 320x240"
            );
            video.width = Some(Dimension::Pixels(DEFAULT_WIDTH));
            video.height = Some(Dimension::Pixels(DEFAULT_HEIGHT));
        }
    }

    if let Some(audio) = constraints.audio.as_mut() {
        // Echo cancellation collapses stereo to mono
        if audio.stereo {
            audio.echo_cancellation = Some(false);
            audio.goog_echo_cancellation = Some(false);
        }
    }

    constraints
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn video(constraints: &MediaConstraints) -> &VideoConstraints {
        constraints.video.as_ref().unwrap()
    }

    #[test]
    fn test_fixed_frame_rate_becomes_range() {
        let constraints = MediaConstraints {
            audio: None,
            video: Some(VideoConstraints {
                frame_rate: Some(FrameRate::Fixed(15.0)),
                ..VideoConstraints::with_resolution(640.0, 480.0)
            }),
        };
        let normalized = normalize(constraints);
        assert_eq!(
            video(&normalized).frame_rate,
            Some(FrameRate::Range {
                min: 15.0,
                max: 15.0
            })
        );
    }

    #[test]
    fn test_zero_frame_rate_defaults_to_thirty() {
        let constraints = MediaConstraints {
            audio: None,
            video: Some(VideoConstraints {
                frame_rate: Some(FrameRate::Fixed(0.0)),
                ..Default::default()
            }),
        };
        let normalized = normalize(constraints);
        assert_eq!(
            video(&normalized).frame_rate,
            Some(FrameRate::Range {
                min: 30.0,
                max: 30.0
            })
        );
    }

    #[test]
    fn test_range_frame_rate_untouched() {
        let range = FrameRate::Range {
            min: 10.0,
            max: 25.0,
        };
        let constraints = MediaConstraints {
            audio: None,
            video: Some(VideoConstraints {
                frame_rate: Some(range),
                ..Default::default()
            }),
        };
        assert_eq!(video(&normalize(constraints)).frame_rate, Some(range));
    }

    #[test]
    fn test_zero_width_resets_resolution() {
        let constraints = MediaConstraints {
            audio: None,
            video: Some(VideoConstraints::with_resolution(0.0, 720.0)),
        };
        let normalized = normalize(constraints);
        assert_eq!(video(&normalized).width, Some(Dimension::Pixels(320.0)));
        assert_eq!(video(&normalized).height, Some(Dimension::Pixels(240.0)));
    }

    #[test]
    fn test_non_numeric_height_resets_resolution() {
        let constraints: MediaConstraints =
            serde_json::from_str(r#"{"video": {"width": 1280, "height": "tall"}}"#).unwrap();
        let normalized = normalize(constraints);
        assert_eq!(video(&normalized).width, Some(Dimension::Pixels(320.0)));
        assert_eq!(video(&normalized).height, Some(Dimension::Pixels(240.0)));
    }

    #[test]
    fn test_valid_resolution_kept() {
        let constraints = MediaConstraints {
            audio: None,
            video: Some(VideoConstraints::with_resolution(1280.0, 720.0)),
        };
        let normalized = normalize(constraints);
        assert_eq!(video(&normalized).width, Some(Dimension::Pixels(1280.0)));
        assert_eq!(video(&normalized).height, Some(Dimension::Pixels(720.0)));
    }

    #[test]
    fn test_stereo_disables_echo_cancellation() {
        let constraints = MediaConstraints {
            audio: Some(AudioConstraints {
                stereo: true,
                echo_cancellation: Some(true),
                ..Default::default()
            }),
            video: None,
        };
        let normalized = normalize(constraints);
        let audio = normalized.audio.unwrap();
        assert_eq!(audio.echo_cancellation, Some(false));
        assert_eq!(audio.goog_echo_cancellation, Some(false));
    }

    #[test]
    fn test_mono_keeps_echo_cancellation() {
        let normalized = normalize(MediaConstraints::audio_only());
        assert_eq!(normalized.audio, Some(AudioConstraints::default()));
    }

    #[test]
    fn test_boolean_kinds() {
        let constraints: MediaConstraints =
            serde_json::from_str(r#"{"audio": true, "video": false}"#).unwrap();
        assert_eq!(constraints, MediaConstraints::audio_only());

        let constraints: MediaConstraints =
            serde_json::from_str(r#"{"audio": null, "video": true}"#).unwrap();
        assert!(constraints.audio.is_none());
        assert_eq!(constraints.video, Some(VideoConstraints::default()));
    }

    #[test]
    fn test_screen_type_round_trips_as_type_field() {
        let constraints = MediaConstraints {
            audio: None,
            video: Some(VideoConstraints::screen(1920.0, 1080.0, 5.0)),
        };
        let json = serde_json::to_value(&constraints).unwrap();
        assert_eq!(json["video"]["type"], "screen");
        assert_eq!(json["video"]["frameRate"], 5.0);
        assert!(constraints.is_screen_share());
    }
}
