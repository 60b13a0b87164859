//! WebRTC media provider - peer connection and capture orchestration over a host WebRTC stack
//!
//! This library drives a browser-style WebRTC host (peer connections, capture,
//! device enumeration, video elements) on behalf of a streaming client. It features:
//!
//! - **Capture caching**: Local captures are kept in their display and reused by later connections
//! - **Connection management**: Offer/answer exchange, mute, volume and stats per connection id
//! - **Screen sharing**: Extension based source selection or native window capture
//! - **Browser capabilities**: Host differences resolved once into a capability descriptor
//! - **Host abstraction**: Every host facility sits behind a trait, with an in-memory
//!   implementation behind the `test-utils` feature
//!
//! # Examples
//!
//! ```rust,no_run
//! use webrtc_provider_core::{ConnectionOptions, Display, MediaProvider, OfferOptions};
//! use webrtc_provider_core::memory::MemoryPlatform;
//! use webrtc_provider_core::platform::Platform;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = MemoryPlatform::chrome();
//! let provider = MediaProvider::builder(platform.clone()).build();
//!
//! // Capture the camera into a display
//! let display = Display::new(platform.create_container());
//! provider.get_media_access(None, &display).await?;
//!
//! // Publish it
//! let connection = provider.create_connection(ConnectionOptions::one_way("stream-1", display))?;
//! let offer = connection.create_offer(OfferOptions::receive_all()).await?;
//! println!("{}", offer.sdp);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

/// Core types and data structures
pub mod types;

/// Browser family and capabilities
pub mod browser;

/// Capture constraints and normalization
pub mod constraints;

/// Host platform traits
pub mod platform;

/// In-memory host platform
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

/// Display binding and cached capture slot
pub mod display;

/// Local media acquisition
pub mod media;

/// Screen sharing source negotiation
pub mod screen;

/// Peer connection management
pub mod connection;

/// Statistics translation
pub mod stats;

/// SDP rewriting
pub mod sdp;

/// Input device enumeration
pub mod devices;

/// Provider configuration
pub mod config;

/// Tracing subscriber setup
pub mod logging;

/// Media provider facade
pub mod provider;

// Re-export main types at crate root
pub use browser::{BrowserFamily, Capabilities, ScreenCaptureMechanism, StatsFormat};
pub use config::{ConfigError, ProviderConfig};
pub use connection::{
    Connection, ConnectionError, ConnectionOptions, ConnectionRegistry, DisplayBinding,
};
pub use constraints::{
    normalize, AudioConstraints, CaptureType, Dimension, FrameRate, MediaConstraints,
    VideoConstraints,
};
pub use display::Display;
pub use media::{MediaAcquirer, MediaError};
pub use platform::PlatformError;
pub use provider::{AudioContextHandle, MediaProvider, MediaProviderBuilder};
pub use sdp::strip_codecs;
pub use stats::{StatsError, StatsReport};
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::browser::{BrowserFamily, Capabilities};
    pub use crate::config::ProviderConfig;
    pub use crate::connection::{Connection, ConnectionOptions};
    pub use crate::constraints::{MediaConstraints, VideoConstraints};
    pub use crate::display::Display;
    pub use crate::platform::Platform;
    pub use crate::provider::MediaProvider;
    pub use crate::types::{
        AnswerOptions, DeviceList, LocalDescription, OfferOptions, SignalingState,
    };
}
