//! The [`AudioSource`] capability: anything that can render audio into a block.

use crate::audio_buffer::AudioBuffer;

/// Uniform "render into an output buffer" contract shared by every node in the mixer graph.
///
/// Implementers include [`crate::sampler::Sampler`] and [`crate::mixer::Mixer`] itself, so a
/// `Mixer` can hold a heterogeneous set of sources, including nested mixers.
///
/// `process` must be **additive**: it adds this source's next block into `output` without
/// clearing it first. It must also be real-time safe wherever the implementation is meant to run
/// on the audio thread: no allocation, no locking, no syscalls, and work bounded by
/// `output.num_frames()`.
pub trait AudioSource: Send + Sync {
    /// Adds this source's next block of audio into `output`. Must not clear `output`.
    fn process(&self, output: &mut AudioBuffer);

    /// Returns `true` once this source has no more audio to produce and will contribute silence
    /// forever after. Advisory: callers may still invoke `process` on a finished source, which
    /// must then be a no-op.
    fn is_finished(&self) -> bool;
}
