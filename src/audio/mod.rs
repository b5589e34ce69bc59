//! Audio pipeline — microphone capture → 16 kHz mono frames → fan-out → VAD.
//!
//! ```text
//! Microphone → cpal callback → mono_16k → FrameFanout ─┬─▶ VoiceActivityDetector
//!                                                      └─▶ TranscriptionFeed
//! ```
//!
//! The capture thread does only cheap work: format conversion, framing, and
//! synchronous delivery to consumers.  Anything heavier lives behind a
//! consumer's own worker queue.

pub mod capture;
pub mod convert;
pub mod vad;

pub use capture::{AudioFrame, AudioSource, CaptureError, FrameConsumer, InputDevice, FRAME_SIZE};
pub use convert::{mono_16k, TARGET_SAMPLE_RATE};
pub use vad::{EnergyScorer, SpeechEvent, SpeechScorer, VoiceActivityDetector, VAD_CHUNK_SIZE};
