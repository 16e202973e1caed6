//! [`SamplerVoice`]: single-note, pitch-shifted playback from a shared sample buffer.

use std::sync::Arc;

use crate::audio_buffer::AudioBuffer;

/// A single-note playback unit.
///
/// Reads a shared, immutable sample buffer with fractional phase and linear interpolation, and
/// mixes additively into whatever output buffer it is asked to render into. A voice runs through
/// three states: inert until [`SamplerVoice::configure`], playing after [`SamplerVoice::start`],
/// and finished once its phase runs past the end of the source. There is no `note_off`: a voice
/// always runs to its natural end.
#[derive(Debug, Default, Clone)]
pub struct SamplerVoice {
    sample: Option<Arc<AudioBuffer>>,
    src_channels: usize,
    num_frames: usize,
    last_index: f64,
    native_rate: f64,
    engine_rate: f64,
    usable: bool,

    phase: f64,
    step: f64,
    gain: f32,
    active: bool,
}

impl SamplerVoice {
    /// Creates an inert voice with no sample configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the voice to play from `sample` at the given rates.
    ///
    /// If `sample` has fewer than 2 frames, or either rate is non-positive, the voice becomes
    /// permanently inert for this configuration: `start` will never activate it until
    /// `configure` is called again with usable inputs.
    pub fn configure(&mut self, sample: Arc<AudioBuffer>, native_rate: f64, engine_rate: f64) {
        let usable = sample.num_frames() >= 2 && native_rate > 0.0 && engine_rate > 0.0;
        self.src_channels = sample.num_channels();
        self.num_frames = sample.num_frames();
        self.last_index = sample.num_frames().saturating_sub(1) as f64;
        self.native_rate = native_rate;
        self.engine_rate = engine_rate;
        self.usable = usable;
        self.sample = Some(sample);
        self.phase = 0.0;
        self.step = 0.0;
        self.gain = 0.0;
        self.active = false;
        if !usable {
            log::debug!("sampler voice configured with unusable sample/rates; staying inert");
        }
    }

    /// Begins playback of `note` at `velocity`, pitched relative to `root_note` and `tune_cents`.
    ///
    /// `step = (native_rate / engine_rate) * 2^((note - root_note) / 12) * 2^(tune_cents / 1200)`.
    /// Does nothing if the voice was never configured with a usable sample (fewer than 2 frames,
    /// or a non-positive rate): `configure` records that verdict in `self.usable`, and an
    /// unusable configuration stays permanently inert across any number of `start` calls, until
    /// `configure` is called again with usable inputs.
    pub fn start(&mut self, note: i32, velocity: f32, root_note: i32, tune_cents: f64) {
        if !self.usable {
            self.active = false;
            return;
        }
        let semitones = (note - root_note) as f64;
        let pitch_scale = 2f64.powf(semitones / 12.0) * 2f64.powf(tune_cents / 1200.0);
        let step = (self.native_rate / self.engine_rate) * pitch_scale;
        self.phase = 0.0;
        self.step = step;
        self.gain = velocity.clamp(0.0, 1.0);
        self.active = step > 0.0;
    }

    /// Renders up to `frames_to_render` output frames, additively, starting at frame `0` of
    /// `output`. Stops early and marks the voice finished once the source is exhausted.
    pub fn render(&mut self, output: &mut AudioBuffer, frames_to_render: usize) {
        if !self.active {
            return;
        }
        let Some(sample) = self.sample.as_ref() else {
            self.active = false;
            return;
        };
        let frames = frames_to_render.min(output.num_frames());
        let out_channels = output.num_channels();

        for f in 0..frames {
            let i = self.phase.floor();
            if i > self.last_index {
                self.active = false;
                break;
            }
            let i = i as usize;
            let frac = (self.phase - i as f64) as f32;

            if self.src_channels <= 1 {
                let s = interpolate_mono(sample, i, self.last_index as usize, frac);
                let value = self.gain * s;
                for c in 0..out_channels {
                    // SAFETY: `f < frames <= output.num_frames()` and `c < out_channels ==
                    // output.num_channels()`.
                    unsafe {
                        let cur = output.at_unchecked(c, f);
                        output.set_unchecked(c, f, cur + value);
                    }
                }
            } else {
                let usable_channels = out_channels.min(self.src_channels);
                for c in 0..usable_channels {
                    let s = interpolate_channel(sample, c, i, self.last_index as usize, frac);
                    let value = self.gain * s;
                    // SAFETY: `f < frames <= output.num_frames()` and `c < usable_channels <=
                    // output.num_channels()`.
                    unsafe {
                        let cur = output.at_unchecked(c, f);
                        output.set_unchecked(c, f, cur + value);
                    }
                }
            }

            self.phase += self.step;
        }

        if self.phase >= self.last_index {
            self.active = false;
        }
    }

    /// `true` once the voice is inert or has run past the end of its source.
    pub fn is_finished(&self) -> bool {
        !self.active
    }
}

fn interpolate_mono(sample: &AudioBuffer, i: usize, last_index: usize, frac: f32) -> f32 {
    // SAFETY: `i <= last_index < sample.num_frames()`.
    let x0 = unsafe { sample.at_unchecked(0, i) };
    if i == last_index {
        return x0;
    }
    // SAFETY: `i + 1 <= last_index < sample.num_frames()`.
    let x1 = unsafe { sample.at_unchecked(0, i + 1) };
    x0 + (x1 - x0) * frac
}

fn interpolate_channel(
    sample: &AudioBuffer,
    channel: usize,
    i: usize,
    last_index: usize,
    frac: f32,
) -> f32 {
    // SAFETY: `channel < sample.num_channels()` (checked by caller), `i <= last_index`.
    let x0 = unsafe { sample.at_unchecked(channel, i) };
    if i == last_index {
        return x0;
    }
    let x1 = unsafe { sample.at_unchecked(channel, i + 1) };
    x0 + (x1 - x0) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn mono_constant(value: f32, frames: usize) -> Arc<AudioBuffer> {
        let mut buf = AudioBuffer::new(NonZeroUsize::new(1).unwrap(), frames);
        buf.fill(value);
        Arc::new(buf)
    }

    #[test]
    fn inert_until_configured_with_usable_sample() {
        let mut voice = SamplerVoice::new();
        voice.start(48, 1.0, 48, 0.0);
        assert!(voice.is_finished());
    }

    #[test]
    fn step_is_one_at_root_note_and_matching_rates() {
        let mut voice = SamplerVoice::new();
        voice.configure(mono_constant(0.25, 256), 48000.0, 48000.0);
        voice.start(48, 1.0, 48, 0.0);
        assert!((voice.step - 1.0).abs() < 1e-9);
    }

    #[test]
    fn mono_to_stereo_fill_matches_scenario_s1() {
        let mut voice = SamplerVoice::new();
        voice.configure(mono_constant(0.25, 256), 48000.0, 48000.0);
        voice.start(48, 1.0, 48, 0.0);

        let mut output = AudioBuffer::new(NonZeroUsize::new(2).unwrap(), 256);
        voice.render(&mut output, 256);

        for f in 0..256 {
            assert!((output.at(0, f).unwrap() - 0.25).abs() < 1e-6);
            assert!((output.at(1, f).unwrap() - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn stereo_pass_through_matches_scenario_s2() {
        let mut buf = AudioBuffer::new(NonZeroUsize::new(2).unwrap(), 512);
        for f in 0..512 {
            buf.set(0, f, 0.5).unwrap();
            buf.set(1, f, -0.5).unwrap();
        }
        let mut voice = SamplerVoice::new();
        voice.configure(Arc::new(buf), 48000.0, 48000.0);
        voice.start(48, 1.0, 48, 0.0);

        let mut output = AudioBuffer::new(NonZeroUsize::new(2).unwrap(), 256);
        voice.render(&mut output, 256);

        for f in 0..256 {
            assert!((output.at(0, f).unwrap() - 0.5).abs() < 1e-9);
            assert!((output.at(1, f).unwrap() + 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn finishes_after_exhausting_source_matches_scenario_s3() {
        let mut voice = SamplerVoice::new();
        voice.configure(mono_constant(1.0, 64), 48000.0, 48000.0);
        voice.start(48, 1.0, 48, 0.0);

        let mut output = AudioBuffer::new(NonZeroUsize::new(1).unwrap(), 128);
        voice.render(&mut output, 128);

        assert!(voice.is_finished());
    }

    #[test]
    fn configure_with_fewer_than_two_frames_stays_permanently_inert() {
        let mut voice = SamplerVoice::new();
        voice.configure(mono_constant(1.0, 1), 48000.0, 48000.0);
        voice.start(48, 1.0, 48, 0.0);
        assert!(voice.is_finished());

        let mut output = AudioBuffer::new(NonZeroUsize::new(1).unwrap(), 16);
        output.fill(0.0);
        voice.render(&mut output, 16);
        for f in 0..16 {
            assert_eq!(output.at(0, f).unwrap(), 0.0);
        }
    }

    #[test]
    fn configure_with_empty_sample_never_activates() {
        let mut voice = SamplerVoice::new();
        voice.configure(mono_constant(1.0, 0), 48000.0, 48000.0);
        voice.start(48, 1.0, 48, 0.0);
        assert!(voice.is_finished());

        let mut output = AudioBuffer::new(NonZeroUsize::new(1).unwrap(), 16);
        voice.render(&mut output, 16);
        for f in 0..16 {
            assert_eq!(output.at(0, f).unwrap(), 0.0);
        }
    }

    #[test]
    fn render_is_additive_not_overwriting() {
        let mut voice = SamplerVoice::new();
        voice.configure(mono_constant(0.5, 16), 48000.0, 48000.0);
        voice.start(48, 1.0, 48, 0.0);

        let mut output = AudioBuffer::new(NonZeroUsize::new(1).unwrap(), 16);
        output.fill(1.0);
        voice.render(&mut output, 16);

        for f in 0..16 {
            assert!((output.at(0, f).unwrap() - 1.5).abs() < 1e-6);
        }
    }
}
