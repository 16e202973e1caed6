//! Stress test for the mixer's lock-free source snapshot.
//!
//! One thread repeatedly adds a source and clears the source set; another repeatedly mixes a
//! block. Neither thread coordinates with the other beyond the mixer's own atomic snapshot
//! publish/load, matching the concurrency model described for `Mixer`. Success is the absence of
//! a crash, panic, or runaway memory growth over the run — there is no dedicated race-detection
//! harness here (the teacher crate does not pull one in either), so this exercises the same
//! `std::thread`/`std::sync` tools the rest of the crate uses.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tinymix::audio_buffer::AudioBuffer;
use tinymix::mixer::Mixer;
use tinymix::source::AudioSource;

struct CountingSource {
    calls: AtomicUsize,
}

impl AudioSource for CountingSource {
    fn process(&self, output: &mut AudioBuffer) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        for f in 0..output.num_frames() {
            for c in 0..output.num_channels() {
                let cur = output.at(c, f).unwrap();
                output.set(c, f, cur + 0.01).unwrap();
            }
        }
    }

    fn is_finished(&self) -> bool {
        false
    }
}

#[test]
fn concurrent_add_clear_and_process_never_tears_a_snapshot() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mixer = Arc::new(Mixer::new());
    let stop = Arc::new(AtomicBool::new(false));

    let writer_mixer = mixer.clone();
    let writer_stop = stop.clone();
    let writer = thread::spawn(move || {
        while !writer_stop.load(Ordering::Relaxed) {
            writer_mixer.add_source(Arc::new(CountingSource {
                calls: AtomicUsize::new(0),
            }));
            writer_mixer.clear_sources();
        }
    });

    let reader_mixer = mixer.clone();
    let reader_stop = stop.clone();
    let reader = thread::spawn(move || {
        let mut output = AudioBuffer::new(NonZeroUsize::new(1).unwrap(), 16);
        let mut blocks = 0usize;
        while !reader_stop.load(Ordering::Relaxed) {
            output.fill(0.0);
            reader_mixer.process(&mut output);
            for f in 0..output.num_frames() {
                let sample = output.at(0, f).unwrap();
                assert!(sample == 0.0 || sample == 0.01, "torn snapshot observed: {sample}");
            }
            blocks += 1;
        }
        blocks
    });

    let deadline = Instant::now() + Duration::from_millis(500);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    stop.store(true, Ordering::Relaxed);

    writer.join().expect("writer thread panicked");
    let blocks = reader.join().expect("reader thread panicked");
    assert!(blocks > 0, "reader never made progress");
}
