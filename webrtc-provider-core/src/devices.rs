//! Input device enumeration

use crate::constraints::MediaConstraints;
use crate::display::Display;
use crate::media::{MediaAcquirer, MediaError};
use crate::platform::Platform;
use crate::types::{Device, DeviceKind, DeviceList, DeviceType, MediaDeviceInfo};

/// List microphones and cameras
///
/// Hosts hide device labels until capture has been granted once. With
/// `labels` set, an audio and video capture is acquired into a throwaway
/// container first and released after enumeration.
///
/// # Errors
///
/// Returns error if the temporary capture or the enumeration fails
#[tracing::instrument(skip(platform, acquirer))]
pub async fn list_devices(
    platform: &dyn Platform,
    acquirer: &MediaAcquirer,
    labels: bool,
) -> Result<DeviceList, MediaError> {
    let display = if labels {
        let display = Display::new(platform.create_container());
        acquirer
            .get_media_access(Some(MediaConstraints::audio_video()), &display)
            .await?;
        Some(display)
    } else {
        None
    };

    let devices = platform.media_devices().enumerate_devices().await;
    if let Some(display) = &display {
        acquirer.release_media(display);
    }
    Ok(classify(devices?))
}

fn classify(devices: Vec<MediaDeviceInfo>) -> DeviceList {
    let mut list = DeviceList::default();
    for device in devices {
        let (bucket, device_type) = match device.kind {
            DeviceKind::AudioInput => (&mut list.audio, DeviceType::Mic),
            DeviceKind::VideoInput => (&mut list.video, DeviceType::Camera),
            other => {
                tracing::info!(kind = %other, id = %device.device_id, "Skipping unknown device");
                continue;
            }
        };
        bucket.push(Device {
            id: device.device_id,
            label: device.label,
            device_type,
        });
    }
    list
}
