//! [`AudioEngine`]: owns the hardware stream and master mixer, and drives the block loop.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::audio_buffer::AudioBuffer;
use crate::device::{DeviceError, OutputDevice, ResolvedStreamConfig, StreamConfig, StreamHandle};
use crate::mixer::Mixer;
use crate::source::AudioSource;

/// Clears `mix_buffer`, mixes `mixer` into it, then copies the result into `output`.
///
/// This is the block loop the hardware callback runs (§4.7): clear to silence, mix additively,
/// publish. It is split out as a free function so it can be unit-tested directly, without
/// needing a real [`OutputDevice`]/[`StreamHandle`] to drive it.
pub fn run_block(mixer: &Mixer, mix_buffer: &mut AudioBuffer, output: &mut [f32]) {
    mix_buffer.fill(0.0);
    mixer.process(mix_buffer);
    mix_buffer.copy_into_interleaved(output);
}

/// Owns the hardware output stream and the top-level (master) mixer, and wires the hardware
/// callback to the block loop.
///
/// Generic over the concrete [`OutputDevice`] an application links against; the engine itself
/// never depends on any particular backend.
pub struct AudioEngine<D: OutputDevice> {
    master: Arc<Mixer>,
    stream: Option<D::Stream>,
    config: Option<ResolvedStreamConfig>,
}

impl<D: OutputDevice> Default for AudioEngine<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: OutputDevice> AudioEngine<D> {
    /// Creates an engine with an empty master mixer and no open stream.
    pub fn new() -> Self {
        Self {
            master: Arc::new(Mixer::new()),
            stream: None,
            config: None,
        }
    }

    /// Opens an output stream on `device` at `sample_rate` with `frames_per_block`, negotiates
    /// the channel count from the device, allocates the mix buffer, and starts the stream.
    ///
    /// The hardware callback registered here runs [`run_block`] against a clone of the master
    /// mixer and a mix buffer moved entirely into the closure, so the engine itself never holds
    /// a mutable reference into state the audio thread also touches.
    pub fn start_stream(
        &mut self,
        device: &mut D,
        sample_rate: f64,
        frames_per_block: usize,
    ) -> Result<(), DeviceError> {
        self.stop_stream();

        let channels = device.output_channels().max(1);
        let channels = NonZeroUsize::new(channels).unwrap_or(NonZeroUsize::new(1).unwrap());
        let mut mix_buffer = AudioBuffer::new(channels, frames_per_block);

        let master = self.master.clone();
        let callback = Box::new(move |output: &mut [f32], num_frames: usize, status: crate::device::StreamStatus| {
            use crate::device::StreamStatus;
            if status.contains(StreamStatus::OUTPUT_UNDERRUN) {
                log::warn!("audio stream reported an output underrun");
            }
            if status.contains(StreamStatus::OUTPUT_OVERRUN) {
                log::warn!("audio stream reported an output overrun");
            }
            let frames = num_frames.min(mix_buffer.num_frames());
            let channels = mix_buffer.num_channels();
            run_block(&master, &mut mix_buffer, &mut output[..frames * channels]);
        });

        let (stream, resolved) = device.open_output_stream(
            StreamConfig {
                sample_rate,
                frames_per_block,
            },
            callback,
        )?;

        log::info!(
            "audio stream started: {} channel(s) at {} Hz, {} frames/block",
            resolved.channels,
            resolved.sample_rate,
            resolved.frames_per_block
        );

        self.stream = Some(stream);
        self.config = Some(resolved);
        Ok(())
    }

    /// Stops and closes the stream if one is open. Idempotent: safe to call when already
    /// stopped. Stop failures are logged at `warn` level and otherwise ignored.
    pub fn stop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.stop() {
                log::warn!("failed to stop audio stream cleanly: {err}");
            }
        }
        self.config = None;
    }

    /// `true` iff the underlying stream reports running.
    pub fn is_running(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_running())
    }

    /// The configuration negotiated with the device on the last successful `start_stream`.
    pub fn resolved_config(&self) -> Option<ResolvedStreamConfig> {
        self.config
    }

    /// Shared access to the master mixer, for the control side to add/remove sources.
    pub fn master_mixer(&self) -> &Arc<Mixer> {
        &self.master
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize as NZ;
    use std::sync::Arc as StdArc;

    struct ConstantSource {
        value: f32,
    }

    impl AudioSource for ConstantSource {
        fn process(&self, output: &mut AudioBuffer) {
            for f in 0..output.num_frames() {
                for c in 0..output.num_channels() {
                    let cur = output.at(c, f).unwrap();
                    output.set(c, f, cur + self.value).unwrap();
                }
            }
        }

        fn is_finished(&self) -> bool {
            false
        }
    }

    #[test]
    fn run_block_clears_then_mixes_then_copies() {
        let mixer = Mixer::new();
        mixer.add_source(StdArc::new(ConstantSource { value: 0.4 }));

        let mut mix_buffer = AudioBuffer::new(NZ::new(1).unwrap(), 4);
        let mut output = vec![9.0f32; 4];

        run_block(&mixer, &mut mix_buffer, &mut output);

        for s in output {
            assert!((s - 0.4).abs() < 1e-6);
        }
    }
}
