//! Display binding with its cached local capture

use crate::platform::{ContainerHandle, VideoElementHandle};
use crate::types::CACHED_INSTANCE_POSTFIX;
use parking_lot::Mutex;
use std::sync::Arc;

/// A display container plus the cached local video element living in it
///
/// Clones share the same cache slot, so at most one cached element
/// exists per display.
#[derive(Clone)]
pub struct Display {
    container: ContainerHandle,
    cached: Arc<Mutex<Option<VideoElementHandle>>>,
}

impl Display {
    /// Bind a container
    #[must_use]
    pub fn new(container: ContainerHandle) -> Self {
        Self {
            container,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// The underlying container
    #[must_use]
    pub fn container(&self) -> &ContainerHandle {
        &self.container
    }

    /// Cached local element, if any
    #[must_use]
    pub fn cached(&self) -> Option<VideoElementHandle> {
        let cached = self.cached.lock().clone();
        if let Some(element) = &cached {
            tracing::debug!(id = %element.id(), "Found cached WebRTC instance");
        }
        cached
    }

    /// Whether a cached local element exists
    #[must_use]
    pub fn has_cached(&self) -> bool {
        self.cached.lock().is_some()
    }

    /// Remove the cached element from the slot and hand it over
    pub fn take_cached(&self) -> Option<VideoElementHandle> {
        self.cached.lock().take()
    }

    /// Store an element as the cached instance
    ///
    /// The element id gets the cache postfix. Returns `false` and leaves
    /// the slot untouched when a cached element already exists.
    pub fn cache(&self, element: VideoElementHandle) -> bool {
        let mut slot = self.cached.lock();
        if slot.is_some() {
            return false;
        }
        let id = element.id();
        if !id.ends_with(CACHED_INSTANCE_POSTFIX) {
            element.set_id(&format!("{id}{CACHED_INSTANCE_POSTFIX}"));
        }
        *slot = Some(element);
        true
    }

    /// Whether two bindings share the same cache slot
    #[must_use]
    pub fn same_as(&self, other: &Display) -> bool {
        Arc::ptr_eq(&self.cached, &other.cached)
    }
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Display")
            .field("children", &self.container.children().len())
            .field("cached", &self.cached.lock().as_ref().map(|e| e.id()))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryPlatform;
    use crate::platform::Platform;

    #[test]
    fn test_cache_marks_element_id() {
        let platform = MemoryPlatform::chrome();
        let display = Display::new(platform.create_container());
        let element = platform.create_video_element();
        element.set_id("call-1");

        assert!(display.cache(element.clone()));
        assert_eq!(element.id(), format!("call-1{CACHED_INSTANCE_POSTFIX}"));
        assert!(display.has_cached());
    }

    #[test]
    fn test_single_cached_instance_per_display() {
        let platform = MemoryPlatform::chrome();
        let display = Display::new(platform.create_container());
        let first = platform.create_video_element();
        let second = platform.create_video_element();
        first.set_id("first");
        second.set_id("second");

        assert!(display.cache(first));
        assert!(!display.clone().cache(second.clone()));
        assert_eq!(second.id(), "second");
        assert_eq!(display.cached().unwrap().id(), format!("first{CACHED_INSTANCE_POSTFIX}"));
    }

    #[test]
    fn test_take_cached_empties_slot() {
        let platform = MemoryPlatform::chrome();
        let display = Display::new(platform.create_container());
        display.cache(platform.create_video_element());

        assert!(display.take_cached().is_some());
        assert!(!display.has_cached());
        assert!(display.take_cached().is_none());
    }
}
