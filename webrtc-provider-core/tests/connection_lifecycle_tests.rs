//! Connection lifecycle tests
//!
//! Covers capture reuse across connections and both teardown paths of
//! `close`.

use webrtc_provider_core::memory::{MemoryExtension, MemoryPlatform};
use webrtc_provider_core::platform::Platform;
use webrtc_provider_core::{
    ConnectionOptions, Display, MediaConstraints, MediaError, MediaProvider, OfferOptions,
    SignalingState, VideoConstraints, CACHED_INSTANCE_POSTFIX,
};

#[tokio::test]
async fn call_reuses_cached_capture_after_close() {
    let host = MemoryPlatform::chrome();
    let provider = MediaProvider::builder(host.clone()).build();
    let local = Display::new(host.create_container());
    let remote = Display::new(host.create_container());

    provider.get_media_access(None, &local).await.unwrap();

    let first = provider
        .create_connection(ConnectionOptions::bidirectional(
            "call-1",
            local.clone(),
            remote.clone(),
        ))
        .unwrap();
    assert_eq!(first.local_element().unwrap().id(), "call-1-local");
    assert_eq!(first.remote_element().unwrap().id(), "call-1-remote");
    first.mute_video();
    first.close(true);

    let cached = local.cached().unwrap();
    assert_eq!(cached.id(), format!("call-1-local{CACHED_INSTANCE_POSTFIX}"));
    assert!(remote.container().children().is_empty());

    // No second prompt: the cached capture is handed to the next call
    provider.get_media_access(None, &local).await.unwrap();
    let second = provider
        .create_connection(ConnectionOptions::bidirectional(
            "call-2",
            local.clone(),
            remote.clone(),
        ))
        .unwrap();
    assert_eq!(host.capture_requests().len(), 1);
    assert!(!second.is_video_muted());
    assert!(!second.is_audio_muted());

    let offer = second.create_offer(OfferOptions::receive_all()).await.unwrap();
    assert!(offer.has_audio && offer.has_video);
    assert_eq!(provider.connection_ids(), vec!["call-2".to_string()]);
}

#[tokio::test]
async fn close_when_display_already_cached_tears_down_local() {
    let host = MemoryPlatform::chrome();
    let provider = MediaProvider::builder(host.clone()).build();
    let local = Display::new(host.create_container());
    let remote = Display::new(host.create_container());

    provider.get_media_access(None, &local).await.unwrap();
    let connection = provider
        .create_connection(ConnectionOptions::bidirectional(
            "call",
            local.clone(),
            remote,
        ))
        .unwrap();
    let stream = connection.local_element().unwrap().src_object().unwrap();

    // A fresh capture lands in the display while the call is running
    provider
        .get_media_access(Some(MediaConstraints::audio_only()), &local)
        .await
        .unwrap();
    connection.close(true);

    assert!(stream.tracks().iter().all(|t| !t.is_live()));
    assert_eq!(local.container().children().len(), 1);
    assert!(local
        .cached()
        .unwrap()
        .src_object()
        .unwrap()
        .video_tracks()
        .is_empty());
    assert_eq!(connection.state(), SignalingState::Closed);
}

#[tokio::test]
async fn closing_one_connection_keeps_others() {
    let host = MemoryPlatform::firefox();
    let provider = MediaProvider::builder(host.clone()).build();

    let a = provider
        .create_connection(ConnectionOptions::one_way(
            "a",
            Display::new(host.create_container()),
        ))
        .unwrap();
    provider
        .create_connection(ConnectionOptions::one_way(
            "b",
            Display::new(host.create_container()),
        ))
        .unwrap();
    assert_eq!(provider.connection_ids(), vec!["a".to_string(), "b".to_string()]);

    a.close(false);
    assert_eq!(provider.connection_ids(), vec!["b".to_string()]);
    assert!(provider.connection("b").is_some());
}

#[tokio::test]
async fn screen_share_without_extension_fails() {
    let host = MemoryPlatform::chrome();
    host.set_extension(MemoryExtension::not_installed());
    let provider = MediaProvider::builder(host.clone()).build();
    let display = Display::new(host.create_container());

    let constraints = MediaConstraints {
        audio: None,
        video: Some(VideoConstraints::screen(1280.0, 720.0, 10.0)),
    };
    let err = provider
        .get_media_access(Some(constraints), &display)
        .await
        .unwrap_err();

    assert_eq!(err, MediaError::ExtensionUnavailable);
    assert!(host.capture_requests().is_empty());
    assert!(!display.has_cached());
}
