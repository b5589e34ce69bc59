//! Voice activity detection with start/end hysteresis.
//!
//! [`VoiceActivityDetector`] converts a stream of per-chunk speech
//! probabilities into debounced [`SpeechEvent`]s.  Both directions require a
//! minimum sustained duration before the speaking state flips:
//!
//! * speech must stay above `threshold` for `min_speech` before
//!   [`SpeechEvent::Start`] fires, suppressing noise spikes;
//! * silence must persist for `min_silence` before [`SpeechEvent::End`]
//!   fires, so breath pauses do not end an utterance.
//!
//! Start and End strictly alternate; no two consecutive Starts are possible.
//!
//! The probability itself comes from a [`SpeechScorer`] — the statistical
//! model is an external concern.  [`EnergyScorer`] is a cheap RMS-based
//! stand-in suitable for quiet rooms and for wiring tests.

use std::time::{Duration, Instant};

/// Samples per scored chunk — 32 ms at 16 kHz.
pub const VAD_CHUNK_SIZE: usize = 512;

// ---------------------------------------------------------------------------
// SpeechEvent
// ---------------------------------------------------------------------------

/// Debounced speech boundary.  Each Start/End pair brackets one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEvent {
    Start,
    End,
}

// ---------------------------------------------------------------------------
// SpeechScorer
// ---------------------------------------------------------------------------

/// Produces a speech probability in `[0.0, 1.0]` for one
/// [`VAD_CHUNK_SIZE`]-sample chunk of 16 kHz mono audio.
pub trait SpeechScorer: Send {
    fn score(&mut self, chunk: &[f32]) -> f32;
}

/// RMS-energy scorer: `rms / reference`, clamped to `[0, 1]`.
///
/// With the default reference (0.05) the detector's default threshold of 0.5
/// corresponds to an RMS of 0.025 — a reasonable speaking level on a quiet
/// microphone.  Swap in a model-backed scorer for noisy environments.
pub struct EnergyScorer {
    reference_rms: f32,
}

impl EnergyScorer {
    pub fn new(reference_rms: f32) -> Self {
        Self { reference_rms }
    }
}

impl Default for EnergyScorer {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl SpeechScorer for EnergyScorer {
    fn score(&mut self, chunk: &[f32]) -> f32 {
        if chunk.is_empty() || self.reference_rms <= 0.0 {
            return 0.0;
        }
        let mean_sq: f32 = chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
        (mean_sq.sqrt() / self.reference_rms).min(1.0)
    }
}

// ---------------------------------------------------------------------------
// VoiceActivityDetector
// ---------------------------------------------------------------------------

/// Stateful hysteresis classifier over a stream of audio samples.
pub struct VoiceActivityDetector<S: SpeechScorer> {
    scorer: S,
    threshold: f32,
    min_speech: Duration,
    min_silence: Duration,

    speaking: bool,
    /// Guards against re-firing Start while the same sustained run continues.
    triggered: bool,
    speech_candidate: Option<Instant>,
    silence_candidate: Option<Instant>,
    buffer: Vec<f32>,
}

impl<S: SpeechScorer> VoiceActivityDetector<S> {
    /// Create a detector.
    ///
    /// * `threshold` — probability at or above which a chunk counts as speech.
    /// * `min_speech` — sustained speech required before Start fires.
    /// * `min_silence` — sustained silence required before End fires.
    pub fn new(scorer: S, threshold: f32, min_speech: Duration, min_silence: Duration) -> Self {
        Self {
            scorer,
            threshold,
            min_speech,
            min_silence,
            speaking: false,
            triggered: false,
            speech_candidate: None,
            silence_candidate: None,
            buffer: Vec::with_capacity(VAD_CHUNK_SIZE * 2),
        }
    }

    /// Append samples and classify every complete chunk, returning any
    /// boundary events crossed (in order).
    ///
    /// Input may be any length; leftovers stay buffered for the next call.
    pub fn process(&mut self, samples: &[f32]) -> Vec<SpeechEvent> {
        self.buffer.extend_from_slice(samples);

        let mut events = Vec::new();
        while self.buffer.len() >= VAD_CHUNK_SIZE {
            let rest = self.buffer.split_off(VAD_CHUNK_SIZE);
            let chunk = std::mem::replace(&mut self.buffer, rest);

            let prob = self.scorer.score(&chunk);
            if let Some(event) = self.classify(prob, Instant::now()) {
                events.push(event);
            }
        }
        events
    }

    /// Hysteresis core, time-injected so tests can drive the clock.
    fn classify(&mut self, prob: f32, now: Instant) -> Option<SpeechEvent> {
        let is_speech = prob >= self.threshold;

        if is_speech {
            self.silence_candidate = None;

            if !self.speaking {
                let candidate = *self.speech_candidate.get_or_insert(now);
                if now.duration_since(candidate) >= self.min_speech && !self.triggered {
                    self.speaking = true;
                    self.triggered = true;
                    log::debug!("speech start (prob {prob:.2})");
                    return Some(SpeechEvent::Start);
                }
            }
        } else {
            self.speech_candidate = None;

            if self.speaking {
                let candidate = *self.silence_candidate.get_or_insert(now);
                if now.duration_since(candidate) >= self.min_silence {
                    self.speaking = false;
                    self.triggered = false;
                    log::debug!("speech end");
                    return Some(SpeechEvent::End);
                }
            }
        }

        None
    }

    /// Current debounced speaking state.
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Clear all timers and the sample buffer.  Call before reusing the
    /// detector on a new stream.
    pub fn reset(&mut self) {
        self.speaking = false;
        self.triggered = false;
        self.speech_candidate = None;
        self.silence_candidate = None;
        self.buffer.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn detector() -> VoiceActivityDetector<EnergyScorer> {
        // min_speech 250 ms, min_silence 500 ms — the production defaults
        VoiceActivityDetector::new(
            EnergyScorer::default(),
            0.5,
            Duration::from_millis(250),
            Duration::from_millis(500),
        )
    }

    /// Drive `classify` with a (probability, offset-ms) script and collect
    /// the emitted events.
    fn run(det: &mut VoiceActivityDetector<EnergyScorer>, script: &[(f32, u64)]) -> Vec<SpeechEvent> {
        let base = Instant::now();
        script
            .iter()
            .filter_map(|&(prob, at_ms)| det.classify(prob, base + MS * at_ms as u32))
            .collect()
    }

    #[test]
    fn start_fires_once_per_sustained_run() {
        let mut det = detector();
        let events = run(
            &mut det,
            &[(0.9, 0), (0.9, 100), (0.9, 260), (0.9, 300), (0.9, 400)],
        );
        assert_eq!(events, vec![SpeechEvent::Start]);
        assert!(det.is_speaking());
    }

    #[test]
    fn brief_spike_does_not_start() {
        let mut det = detector();
        // 100 ms of speech, then silence clears the candidate timer
        let events = run(&mut det, &[(0.9, 0), (0.9, 100), (0.1, 150), (0.9, 200)]);
        assert!(events.is_empty());
        assert!(!det.is_speaking());
    }

    #[test]
    fn end_fires_once_after_sustained_silence() {
        let mut det = detector();
        let events = run(
            &mut det,
            &[
                (0.9, 0),
                (0.9, 260), // Start
                (0.1, 300),
                (0.1, 810), // End (510 ms of silence)
                (0.1, 900),
            ],
        );
        assert_eq!(events, vec![SpeechEvent::Start, SpeechEvent::End]);
        assert!(!det.is_speaking());
    }

    #[test]
    fn breath_pause_does_not_end_utterance() {
        let mut det = detector();
        let events = run(
            &mut det,
            &[
                (0.9, 0),
                (0.9, 260), // Start
                (0.1, 300), // short pause...
                (0.1, 500),
                (0.9, 550), // ...speech resumes, silence candidate cleared
                (0.1, 600),
                (0.1, 1200), // now a real 600 ms silence
            ],
        );
        assert_eq!(events, vec![SpeechEvent::Start, SpeechEvent::End]);
    }

    #[test]
    fn events_strictly_alternate() {
        let mut det = detector();
        let events = run(
            &mut det,
            &[
                (0.9, 0),
                (0.9, 300),  // Start
                (0.1, 400),
                (0.1, 1000), // End
                (0.9, 1100),
                (0.9, 1400), // Start again
                (0.9, 1500),
                (0.1, 1600),
                (0.1, 2200), // End again
            ],
        );
        assert_eq!(
            events,
            vec![
                SpeechEvent::Start,
                SpeechEvent::End,
                SpeechEvent::Start,
                SpeechEvent::End
            ]
        );
    }

    #[test]
    fn process_buffers_partial_chunks() {
        // Loud scorer input with zero debounce: the first full chunk starts.
        let mut det = VoiceActivityDetector::new(
            EnergyScorer::default(),
            0.5,
            Duration::ZERO,
            Duration::ZERO,
        );

        // 300 loud samples: not yet a full chunk, no classification
        assert!(det.process(&vec![0.5; 300]).is_empty());

        // completing the chunk triggers Start exactly once
        let events = det.process(&vec![0.5; 300]);
        assert_eq!(events, vec![SpeechEvent::Start]);

        // further loud chunks stay silent event-wise
        assert!(det.process(&vec![0.5; VAD_CHUNK_SIZE]).is_empty());
    }

    #[test]
    fn reset_clears_state_and_buffer() {
        let mut det = detector();
        run(&mut det, &[(0.9, 0), (0.9, 300)]);
        assert!(det.is_speaking());

        det.process(&vec![0.5; 100]); // leave a partial chunk buffered
        det.reset();

        assert!(!det.is_speaking());
        // After reset a fresh sustained run is required again.
        let events = run(&mut det, &[(0.9, 1000), (0.9, 1300)]);
        assert_eq!(events, vec![SpeechEvent::Start]);
    }

    #[test]
    fn energy_scorer_scales_rms() {
        let mut scorer = EnergyScorer::new(0.05);
        assert_eq!(scorer.score(&[0.0; 512]), 0.0);
        assert!((scorer.score(&[0.025; 512]) - 0.5).abs() < 1e-3);
        assert_eq!(scorer.score(&[1.0; 512]), 1.0); // clamped
    }
}
