//! Streaming speech-to-text feed.
//!
//! # Architecture
//!
//! ```text
//! capture thread                 worker thread              orchestrator
//! ──────────────                 ─────────────              ────────────
//! TranscriptionFeed::on_frame ─▶ std mpsc ─▶ buffer ≥ 1 s
//!        (enqueue only)                      │
//!                                            ├─ Transcriber::transcribe
//!                                            ├─ keep 0.5 s overlap tail
//!                                            └─ tokio mpsc ─▶ Transcript
//! ```
//!
//! [`TranscriptionFeed`] is the [`FrameConsumer`] face of the subsystem: it
//! does nothing on the capture thread but hand the frame to its worker, so
//! the audio callback never blocks on inference.  The worker accumulates at
//! least one second of audio before each [`Transcriber`] call and carries a
//! half-second tail into the next window so words straddling a window
//! boundary are not lost.

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::{AudioFrame, FrameConsumer, TARGET_SAMPLE_RATE};

// ---------------------------------------------------------------------------
// Transcriber
// ---------------------------------------------------------------------------

/// A speech-to-text engine.
///
/// `audio` is 16 kHz mono f32 PCM.  Implementations run on the dedicated
/// worker thread, so they may block for the duration of inference.
pub trait Transcriber: Send {
    fn transcribe(&mut self, audio: &[f32]) -> anyhow::Result<String>;
}

/// Placeholder engine that recognizes nothing.
///
/// Keeps the rest of the pipeline (VAD, scheduler, device link) fully
/// functional on machines without a recognition backend; keyword matching
/// simply never fires.
pub struct StubTranscriber;

impl Transcriber for StubTranscriber {
    fn transcribe(&mut self, _audio: &[f32]) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// One recognized chunk of speech, with the inference latency.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub latency: Duration,
}

// ---------------------------------------------------------------------------
// TranscriptionFeed
// ---------------------------------------------------------------------------

/// Accumulate this much audio before invoking the engine: 1 s at 16 kHz.
const MIN_BUFFER_SAMPLES: usize = TARGET_SAMPLE_RATE as usize;

/// Tail carried over between windows: 0.5 s at 16 kHz.
const OVERLAP_SAMPLES: usize = TARGET_SAMPLE_RATE as usize / 2;

/// Capture-side handle to the transcription worker.
///
/// Dropping the feed (or calling [`shutdown`]) closes the frame queue; the
/// worker drains what it has and exits.
///
/// [`shutdown`]: TranscriptionFeed::shutdown
pub struct TranscriptionFeed {
    frames: Option<mpsc::Sender<Vec<f32>>>,
    worker: Option<JoinHandle<()>>,
}

impl TranscriptionFeed {
    /// Spawn the worker thread.  Recognized text arrives on `out`; if the
    /// receiving side of `out` is dropped, the worker stops.
    pub fn spawn(
        mut transcriber: Box<dyn Transcriber>,
        out: tokio::sync::mpsc::Sender<Transcript>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<f32>>();

        let worker = std::thread::spawn(move || {
            let mut buffer: Vec<f32> = Vec::new();

            while let Ok(chunk) = rx.recv() {
                buffer.extend_from_slice(&chunk);
                // Pick up everything already queued so a slow engine does
                // not fall further and further behind real time.
                while let Ok(chunk) = rx.try_recv() {
                    buffer.extend_from_slice(&chunk);
                }

                if buffer.len() < MIN_BUFFER_SAMPLES {
                    continue;
                }

                let started = Instant::now();
                match transcriber.transcribe(&buffer) {
                    Ok(text) => {
                        let text = text.trim();
                        if !text.is_empty() {
                            let transcript = Transcript {
                                text: text.to_string(),
                                latency: started.elapsed(),
                            };
                            log::debug!(
                                "transcribed {:?} in {:?}",
                                transcript.text,
                                transcript.latency
                            );
                            if out.blocking_send(transcript).is_err() {
                                break; // orchestrator is gone
                            }
                        }
                    }
                    Err(e) => log::error!("transcription failed: {e:#}"),
                }

                if buffer.len() > OVERLAP_SAMPLES {
                    buffer.drain(..buffer.len() - OVERLAP_SAMPLES);
                }
            }
            log::debug!("transcription worker stopped");
        });

        Self {
            frames: Some(tx),
            worker: Some(worker),
        }
    }

    /// Close the frame queue and wait for the worker to finish.
    pub fn shutdown(&mut self) {
        self.frames.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("transcription worker panicked");
            }
        }
    }
}

impl FrameConsumer for TranscriptionFeed {
    fn name(&self) -> &'static str {
        "transcription"
    }

    fn on_frame(&mut self, frame: &AudioFrame) -> anyhow::Result<()> {
        let Some(frames) = &self.frames else {
            anyhow::bail!("transcription feed already shut down");
        };
        frames
            .send(frame.samples().to_vec())
            .map_err(|_| anyhow::anyhow!("transcription worker exited"))
    }
}

impl Drop for TranscriptionFeed {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FRAME_SIZE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns a canned phrase and records how much audio each call saw.
    struct MockTranscriber {
        phrase: &'static str,
        calls: Arc<AtomicUsize>,
        window_sizes: Arc<std::sync::Mutex<Vec<usize>>>,
    }

    impl Transcriber for MockTranscriber {
        fn transcribe(&mut self, audio: &[f32]) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.window_sizes.lock().unwrap().push(audio.len());
            Ok(self.phrase.to_string())
        }
    }

    fn frame() -> AudioFrame {
        AudioFrame::new(vec![0.1; FRAME_SIZE])
    }

    fn feed_with_mock(
        phrase: &'static str,
    ) -> (
        TranscriptionFeed,
        tokio::sync::mpsc::Receiver<Transcript>,
        Arc<AtomicUsize>,
        Arc<std::sync::Mutex<Vec<usize>>>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let window_sizes = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        let feed = TranscriptionFeed::spawn(
            Box::new(MockTranscriber {
                phrase,
                calls: Arc::clone(&calls),
                window_sizes: Arc::clone(&window_sizes),
            }),
            tx,
        );
        (feed, rx, calls, window_sizes)
    }

    #[test]
    fn emits_transcript_once_a_second_of_audio_arrives() {
        let (mut feed, mut rx, calls, _) = feed_with_mock("hello there");

        // 32 frames × 512 samples = 16_384 ≥ 1 s
        for _ in 0..32 {
            feed.on_frame(&frame()).unwrap();
        }
        feed.shutdown();

        let transcript = rx.blocking_recv().expect("one transcript");
        assert_eq!(transcript.text, "hello there");
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn short_audio_is_buffered_not_transcribed() {
        let (mut feed, mut rx, calls, _) = feed_with_mock("should not appear");

        // 10 frames = 5_120 samples, well under the 1 s minimum.
        for _ in 0..10 {
            feed.on_frame(&frame()).unwrap();
        }
        feed.shutdown();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn windows_overlap_by_half_a_second() {
        let (mut feed, _rx, _calls, window_sizes) = feed_with_mock("words");

        for _ in 0..64 {
            feed.on_frame(&frame()).unwrap();
        }
        feed.shutdown();

        let sizes = window_sizes.lock().unwrap();
        assert!(!sizes.is_empty());
        // Every window after the first starts from the 8_000-sample tail,
        // so none can be smaller than the overlap plus one frame.
        for &size in sizes.iter().skip(1) {
            assert!(size > OVERLAP_SAMPLES, "window of {size} lost the tail");
        }
    }

    #[test]
    fn blank_transcriptions_are_dropped() {
        let (mut feed, mut rx, calls, _) = feed_with_mock("   ");

        for _ in 0..32 {
            feed.on_frame(&frame()).unwrap();
        }
        feed.shutdown();

        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn on_frame_after_shutdown_errors() {
        let (mut feed, _rx, _calls, _) = feed_with_mock("x");
        feed.shutdown();
        assert!(feed.on_frame(&frame()).is_err());
    }

    #[test]
    fn stub_transcriber_recognizes_nothing() {
        let mut stub = StubTranscriber;
        assert_eq!(stub.transcribe(&[0.0; 16_000]).unwrap(), "");
    }
}
