//! The underlying audio library contract: traits the core depends on but never implements for
//! any concrete OS or driver.
//!
//! Concrete backends (ALSA, WASAPI, CoreAudio, PipeWire, ASIO) are out of scope for this crate;
//! what lives here is the narrow interface [`crate::engine::AudioEngine`] drives. An application
//! embedding this core supplies a real `OutputDevice`/`StreamHandle` pair from whichever backend
//! crate it links against.

use bitflags::bitflags;

/// Requested stream configuration, before negotiation with a device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    /// Desired sample rate, in Hz.
    pub sample_rate: f64,
    /// Desired number of frames per callback invocation.
    pub frames_per_block: usize,
}

/// The configuration a device actually opened a stream with, after negotiation.
///
/// A device is free to adjust the requested block size (and reports its channel count, which
/// is not requested at all — it is a property of the device).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedStreamConfig {
    /// Channel count the device opened the stream with.
    pub channels: usize,
    /// Sample rate actually in use.
    pub sample_rate: f64,
    /// Frames per callback invocation actually in use.
    pub frames_per_block: usize,
}

bitflags! {
    /// Flags describing anomalies reported by the hardware callback for one block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StreamStatus: u32 {
        /// The hardware ran out of data to play (produced silence or repeated the last block).
        const OUTPUT_UNDERRUN = 0b0000_0001;
        /// The hardware had no room to accept the block in time.
        const OUTPUT_OVERRUN  = 0b0000_0010;
    }
}

/// Errors reported by device enumeration and stream open/start/stop.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    /// Opening or starting a stream failed. Carries the underlying library's error text.
    #[error("failed to open audio stream: {0}")]
    OpenFailed(String),
    /// Stopping a stream failed. Logged and swallowed by [`crate::engine::AudioEngine`].
    #[error("failed to stop audio stream: {0}")]
    StopFailed(String),
    /// The device could not provide a usable channel count or sample rate.
    #[error("device configuration unsupported: {0}")]
    UnsupportedConfig(String),
}

/// The signature of the closure an `OutputDevice` invokes once per block on its real-time
/// thread. `output` is interleaved, 32-bit float, `num_frames * channels` samples long.
pub type OutputCallback = dyn FnMut(&mut [f32], usize, StreamStatus) + Send + 'static;

/// A handle to hardware output stream opened by an [`OutputDevice`].
///
/// Sample format on any stream opened through this contract is always 32-bit float, interleaved.
pub trait StreamHandle: Send {
    /// `true` iff the underlying stream is actively running its callback.
    fn is_running(&self) -> bool;

    /// Stops the stream. Idempotent: calling this on an already-stopped stream must succeed.
    fn stop(&mut self) -> Result<(), DeviceError>;
}

/// An audio output device, as exposed by the underlying audio library.
pub trait OutputDevice {
    /// A handle to a stream opened on this device.
    type Stream: StreamHandle;

    /// Human-readable device name.
    fn name(&self) -> &str;

    /// `true` if this is the system's default output device.
    fn is_default_output(&self) -> bool;

    /// Number of output channels this device exposes.
    fn output_channels(&self) -> usize;

    /// Sample rates this device can be opened with.
    fn supported_sample_rates(&self) -> &[f64];

    /// Opens an output stream with the given configuration and registers `callback` to be
    /// invoked once per block on a dedicated real-time thread.
    fn open_output_stream(
        &mut self,
        config: StreamConfig,
        callback: Box<OutputCallback>,
    ) -> Result<(Self::Stream, ResolvedStreamConfig), DeviceError>;
}

/// Picks the channel count and block size a stream will actually run with, given a device's
/// capabilities and a caller's request.
///
/// The channel count always comes from the device (it is not requested); the sample rate is
/// taken from the request as-is (an `OutputDevice` implementation is expected to validate it
/// against [`OutputDevice::supported_sample_rates`] during `open_output_stream`); the block
/// size passes through unchanged, since this core contract performs no internal resampling or
/// buffering beyond what a single block loop iteration does.
pub fn negotiate(device_channels: usize, requested: StreamConfig) -> ResolvedStreamConfig {
    ResolvedStreamConfig {
        channels: device_channels.max(1),
        sample_rate: requested.sample_rate,
        frames_per_block: requested.frames_per_block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_takes_channel_count_from_device() {
        let resolved = negotiate(
            2,
            StreamConfig {
                sample_rate: 48000.0,
                frames_per_block: 256,
            },
        );
        assert_eq!(resolved.channels, 2);
        assert_eq!(resolved.sample_rate, 48000.0);
        assert_eq!(resolved.frames_per_block, 256);
    }

    #[test]
    fn negotiate_floors_zero_channel_devices_to_one() {
        let resolved = negotiate(
            0,
            StreamConfig {
                sample_rate: 44100.0,
                frames_per_block: 128,
            },
        );
        assert_eq!(resolved.channels, 1);
    }

    #[test]
    fn stream_status_flags_combine() {
        let status = StreamStatus::OUTPUT_UNDERRUN | StreamStatus::OUTPUT_OVERRUN;
        assert!(status.contains(StreamStatus::OUTPUT_UNDERRUN));
        assert!(status.contains(StreamStatus::OUTPUT_OVERRUN));
    }
}
