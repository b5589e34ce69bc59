//! Voice-controlled game emotes via an external BLE keyboard-emulator.
//!
//! The crate turns a live microphone stream into timed keystroke sequences
//! sent to a hardware keyboard-emulator over a line-oriented serial protocol,
//! which in turn drives a game client's text console (`/e <emote>` commands).
//!
//! # Data flow
//!
//! ```text
//! Microphone → AudioSource ─┬─▶ VoiceActivityDetector → SpeechEvent ─▶ EmoteScheduler
//!                           └─▶ TranscriptionFeed → Transcript ─▶ KeywordMatcher
//!                                                                        │
//!                                       EmoteDriver ◀── emote name ◀─────┘
//!                                            │
//!                                       DeviceLink ──▶ hardware ──▶ game client
//! ```
//!
//! Two independent decision paths drive the hardware:
//!
//! * **Voice activity** — the [`audio::VoiceActivityDetector`] debounces
//!   per-chunk speech probabilities into speech start/end events; the
//!   [`emote::EmoteScheduler`] reacts by cycling random emotes while the
//!   user talks and playing an idle emote when they stop.
//! * **Keywords** — transcripts from the [`stt::TranscriptionFeed`] are
//!   scanned by the [`emote::KeywordMatcher`], which maps trigger words to
//!   emote pools with per-group cooldowns.
//!
//! Both paths bottom out in the [`device::DeviceLink`] serial protocol,
//! which guarantees a `RELEASEALL` at connection establishment and on every
//! disconnection path so no key is ever left pressed.

pub mod app;
pub mod audio;
pub mod config;
pub mod device;
pub mod emote;
pub mod stt;
