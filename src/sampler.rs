//! [`Sampler`]: a polyphonic instrument built from a pool of [`SamplerVoice`]s.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio_buffer::AudioBuffer;
use crate::source::AudioSource;
use crate::voice::SamplerVoice;

/// Depth of the lock-free note-event queue from control threads into the audio thread.
///
/// Sized generously relative to typical `note_on` burst rates; a full queue drops the event and
/// logs a warning rather than blocking the control thread that is trying to push it.
const NOTE_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
struct NoteOnEvent {
    note: i32,
    velocity: f32,
    root_note: i32,
    tune_cents: f64,
}

/// Control-side bookkeeping for a [`Sampler`]: the shared sample and the tuning parameters
/// applied to the *next* `note_on`. None of these fields are read by `process`, so guarding them
/// with an ordinary lock never touches the audio thread.
struct SamplerConfig {
    sample: Arc<AudioBuffer>,
    native_rate: f64,
    engine_rate: f64,
    root_note: i32,
    tune_cents: f64,
}

/// Polyphonic playback of one shared sample buffer.
///
/// Holds `max_polyphony` pre-allocated voices. `note_on` never touches voice state directly —
/// it pushes a note-on event onto a lock-free, single-producer/single-consumer queue ([`rtrb`])
/// for exactly this kind of control→audio messaging. `process`, which runs on the audio thread,
/// drains that queue and is the *only* code that ever reads or mutates the voice pool: it reuses
/// the first finished voice, or steals voice 0 when every voice is still playing, exactly as
/// before, but without ever taking a lock on the real-time path. Each voice's finished/playing
/// state is additionally published through an `AtomicBool` per voice so that `is_finished` (a
/// control-side read, see [`crate::source::AudioSource::is_finished`]) can
/// observe it without racing the audio thread.
pub struct Sampler {
    config: Mutex<SamplerConfig>,
    note_tx: Mutex<Producer<NoteOnEvent>>,

    // Audio-thread-owned playback state. Never touched by `note_on` or any other control-side
    // method; `process` is the sole reader/writer, matching the concurrency model's requirement
    // (§5) that a `Sampler` invoked from only one context (the audio thread) at a time is safe.
    voices: UnsafeCell<Vec<SamplerVoice>>,
    note_rx: UnsafeCell<Consumer<NoteOnEvent>>,
    voice_finished: Vec<AtomicBool>,
}

// SAFETY: `voices` and `note_rx` are touched only from `process`, which the concurrency model
// requires to run on a single audio thread at a time; `config` and `note_tx` are guarded by
// `parking_lot::Mutex`, and `voice_finished` is a plain array of atomics. No field is ever
// accessed from two threads without one of those two protections.
unsafe impl Sync for Sampler {}

impl Sampler {
    /// Builds a sampler over `sample`, with `max_polyphony` voices (at least 1).
    pub fn new(sample: Arc<AudioBuffer>, native_rate: f64, engine_rate: f64, max_polyphony: usize) -> Self {
        let max_polyphony = max_polyphony.max(1);
        let mut voices = vec![SamplerVoice::new(); max_polyphony];
        for voice in &mut voices {
            voice.configure(sample.clone(), native_rate, engine_rate);
        }
        let (note_tx, note_rx) = RingBuffer::new(NOTE_EVENT_CAPACITY);
        Self {
            config: Mutex::new(SamplerConfig {
                sample,
                native_rate,
                engine_rate,
                root_note: 60,
                tune_cents: 0.0,
            }),
            note_tx: Mutex::new(note_tx),
            voices: UnsafeCell::new(voices),
            note_rx: UnsafeCell::new(note_rx),
            voice_finished: (0..max_polyphony).map(|_| AtomicBool::new(true)).collect(),
        }
    }

    /// Updates the engine (output) sample rate and re-configures every voice.
    ///
    /// Must only be called while this sampler is not referenced by a running audio callback:
    /// it mutates voice state that `process` also accesses without any lock, relying entirely
    /// on the audio thread being the sole reader/writer while a stream is running. This is a
    /// documented precondition, not an enforced one — see the mixer/sampler concurrency notes.
    pub fn set_engine_rate(&self, rate: f64) {
        let mut config = self.config.lock();
        config.engine_rate = rate;
        let native_rate = config.native_rate;
        let sample = config.sample.clone();
        // SAFETY: caller's responsibility per the precondition documented above.
        let voices = unsafe { &mut *self.voices.get() };
        for voice in voices.iter_mut() {
            voice.configure(sample.clone(), native_rate, rate);
        }
    }

    /// Updates the native (source) sample rate and re-configures every voice. Same precondition
    /// as [`Self::set_engine_rate`].
    pub fn set_native_rate(&self, rate: f64) {
        let mut config = self.config.lock();
        config.native_rate = rate;
        let engine_rate = config.engine_rate;
        let sample = config.sample.clone();
        // SAFETY: caller's responsibility per the precondition documented above.
        let voices = unsafe { &mut *self.voices.get() };
        for voice in voices.iter_mut() {
            voice.configure(sample.clone(), rate, engine_rate);
        }
    }

    /// Sets the root note used by future `note_on` calls to compute pitch.
    pub fn set_root_note(&self, root_note: i32) {
        self.config.lock().root_note = root_note;
    }

    /// Sets the fine-tune offset, in cents, used by future `note_on` calls.
    pub fn set_tune_cents(&self, tune_cents: f64) {
        self.config.lock().tune_cents = tune_cents;
    }

    /// Requests playback of `note` at `velocity`.
    ///
    /// This is a control-side operation: it only reads the current tuning parameters (under a
    /// brief lock) and pushes a note-on event onto the lock-free queue the audio thread drains
    /// in `process`. Voice allocation — reuse the first finished voice, or steal voice 0 when
    /// every voice is still playing — happens on the audio thread when the event is drained, not
    /// here. If the queue is full, the event is dropped and a warning logged; this can only
    /// happen under a control-thread `note_on` burst that outruns the audio thread by more than
    /// [`NOTE_EVENT_CAPACITY`] events between two blocks.
    pub fn note_on(&self, note: i32, velocity: f32) {
        let event = {
            let config = self.config.lock();
            NoteOnEvent {
                note,
                velocity,
                root_note: config.root_note,
                tune_cents: config.tune_cents,
            }
        };
        let mut producer = self.note_tx.lock();
        if producer.push(event).is_err() {
            log::warn!("sampler note-event queue full, dropping note_on for note {note}");
        }
    }

    /// No-op placeholder; note-off envelope handling is out of scope. Voices always run to their
    /// natural end.
    pub fn note_off(&self, _note: i32) {}
}

impl AudioSource for Sampler {
    fn process(&self, output: &mut AudioBuffer) {
        // SAFETY: `process` runs on the audio thread, which is the sole reader/writer of
        // `voices` and `note_rx` by the concurrency invariant documented on `Sampler` above.
        let voices = unsafe { &mut *self.voices.get() };
        let note_rx = unsafe { &mut *self.note_rx.get() };

        while let Ok(event) = note_rx.pop() {
            let index = voices
                .iter()
                .position(|v| v.is_finished())
                .unwrap_or_else(|| {
                    log::debug!(
                        "sampler polyphony exhausted, stealing voice 0 for note {}",
                        event.note
                    );
                    0
                });
            voices[index].start(event.note, event.velocity, event.root_note, event.tune_cents);
            self.voice_finished[index].store(false, Ordering::Release);
        }

        let frames = output.num_frames();
        for (index, voice) in voices.iter_mut().enumerate() {
            if !voice.is_finished() {
                voice.render(output, frames);
                if voice.is_finished() {
                    self.voice_finished[index].store(true, Ordering::Release);
                }
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.voice_finished.iter().all(|f| f.load(Ordering::Acquire))
    }
}
