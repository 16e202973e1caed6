#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod audio_buffer;
pub mod device;
pub mod engine;
pub mod mixer;
pub mod prelude;
pub mod registry;
pub mod sampler;
pub mod source;
pub mod voice;
