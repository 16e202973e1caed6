#![allow(unused)]
//! Prelude module for `tinymix`. Use as a star-import.

pub use crate::*;

pub use audio_buffer::{AudioBuffer, BufferError, ChannelIter, ChannelIterMut, ChannelView, ChannelViewMut, Sample};
pub use device::{
    DeviceError, OutputCallback, OutputDevice, ResolvedStreamConfig, StreamConfig, StreamHandle,
    StreamStatus,
};
pub use engine::AudioEngine;
pub use mixer::Mixer;
pub use registry::{BufferRegistry, RegistryError};
pub use sampler::Sampler;
pub use source::AudioSource;
pub use voice::SamplerVoice;
