//! Encoded frame cache with LRU eviction

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use uuid::Uuid;

/// Identity of one rendered viewport frame.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FrameKey {
    pub session: Uuid,
    pub page: u32,
    /// Annotation layer revision of the page.
    pub layer_revision: u64,
    /// Viewer revision (transform, hover, drag, results, image).
    pub view_revision: u64,
    /// Viewport size in pixels.
    pub viewport: (u32, u32),
}

pub struct RenderCache {
    frames: Mutex<LruCache<FrameKey, Arc<Vec<u8>>>>,
}

impl RenderCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            frames: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &FrameKey) -> Option<Arc<Vec<u8>>> {
        self.frames.lock().get(key).cloned()
    }

    pub fn insert(&self, key: FrameKey, png: Vec<u8>) -> Arc<Vec<u8>> {
        let png = Arc::new(png);
        self.frames.lock().put(key, Arc::clone(&png));
        png
    }

    /// Drop every frame of a session.
    pub fn invalidate_session(&self, session: Uuid) {
        let mut frames = self.frames.lock();
        let stale: Vec<FrameKey> = frames
            .iter()
            .filter(|(key, _)| key.session == session)
            .map(|(key, _)| *key)
            .collect();
        for key in stale {
            frames.pop(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
