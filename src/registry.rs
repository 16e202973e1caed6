//! [`BufferRegistry`]: a concurrent, monotonically-keyed store of shared sample buffers.
//!
//! This is a control-side ambient collaborator, not part of the real-time path: it backs a
//! mutex-guarded `HashMap`, which is perfectly acceptable away from the audio thread. Upper
//! layers use it to keep [`AudioBuffer`] handles alive while voices reference them by key;
//! [`crate::voice::SamplerVoice::configure`] itself only needs a shared `Arc<AudioBuffer>` and
//! does not depend on this type.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio_buffer::AudioBuffer;

/// Reserved for future registry failure modes. The registry's current operations cannot fail;
/// this type exists so the collaborator's signature is stable if that changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Placeholder variant; never constructed today.
    #[error("buffer registry operation failed")]
    Unspecified,
}

/// A concurrent map from monotonically increasing `u64` keys to shared, immutable sample
/// buffers.
#[derive(Default)]
pub struct BufferRegistry {
    next_key: AtomicU64,
    buffers: Mutex<HashMap<u64, Arc<AudioBuffer>>>,
}

impl BufferRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            next_key: AtomicU64::new(0),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts `buffer` and returns its key. Keys returned by successive calls strictly
    /// increase, even under concurrent callers.
    pub fn insert(&self, buffer: Arc<AudioBuffer>) -> u64 {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.buffers.lock().insert(key, buffer);
        key
    }

    /// Returns the buffer stored under `key`, if any.
    pub fn get(&self, key: u64) -> Option<Arc<AudioBuffer>> {
        self.buffers.lock().get(&key).cloned()
    }

    /// Removes the buffer stored under `key`. Returns `true` if a buffer was present.
    pub fn remove(&self, key: u64) -> bool {
        self.buffers.lock().remove(&key).is_some()
    }

    /// Number of buffers currently stored.
    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    /// `true` when the registry holds no buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::thread;

    fn sample_buffer(value: f32) -> Arc<AudioBuffer> {
        let mut buf = AudioBuffer::new(NonZeroUsize::new(1).unwrap(), 4);
        buf.fill(value);
        Arc::new(buf)
    }

    #[test]
    fn round_trip_matches_scenario_s7() {
        let registry = BufferRegistry::new();
        let key = registry.insert(sample_buffer(0.5));

        let fetched = registry.get(key).unwrap();
        assert_eq!(fetched.at(0, 0).unwrap(), 0.5);

        assert!(registry.remove(key));
        assert!(registry.get(key).is_none());
    }

    #[test]
    fn keys_strictly_increase() {
        let registry = BufferRegistry::new();
        let a = registry.insert(sample_buffer(0.0));
        let b = registry.insert(sample_buffer(0.0));
        let c = registry.insert(sample_buffer(0.0));
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn concurrent_inserts_yield_distinct_keys() {
        let registry = Arc::new(BufferRegistry::new());
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || registry.insert(sample_buffer(0.0)))
            })
            .collect();

        let mut keys: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 100);
    }
}
