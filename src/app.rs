//! Application orchestrator.
//!
//! # Architecture
//!
//! ```text
//! cpal capture thread                              tokio runtime
//! ───────────────────                              ─────────────
//! AudioSource ─┬─▶ VadConsumer ──▶ EmoteScheduler  App::run()
//!              │    (speech start/end, gated         │
//!              │     by the pause flag)              ├─ transcript rx ──▶ Controller
//!              │                                     │    ├─ toggle word → pause/resume
//!              └─▶ TranscriptionFeed ─▶ worker ──────┘    └─ KeywordMatcher → emote
//!                                                    └─ ctrl-c → shutdown
//! ```
//!
//! The system starts **paused**: audio flows and transcription runs so the
//! toggle word can be heard, but the VAD consumer drops its events and the
//! keyword matcher is not consulted until the user says the toggle word.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::audio::{
    AudioFrame, AudioSource, EnergyScorer, FrameConsumer, SpeechEvent, VoiceActivityDetector,
};
use crate::config::AppConfig;
use crate::device::DeviceLink;
use crate::emote::{EmotePlayer, EmoteScheduler, KeywordMatcher};
use crate::stt::{Transcriber, Transcript, TranscriptionFeed};

// ---------------------------------------------------------------------------
// VadConsumer
// ---------------------------------------------------------------------------

/// Audio-side bridge from VAD events to the emote scheduler.
///
/// Runs on the capture thread; while the shared pause flag is clear it keeps
/// the detector reset instead of feeding it, so stale speech timers cannot
/// fire a bogus start the instant the system resumes.
struct VadConsumer {
    vad: VoiceActivityDetector<EnergyScorer>,
    scheduler: EmoteScheduler,
    active: Arc<AtomicBool>,
}

impl FrameConsumer for VadConsumer {
    fn name(&self) -> &'static str {
        "vad"
    }

    fn on_frame(&mut self, frame: &AudioFrame) -> anyhow::Result<()> {
        if !self.active.load(Ordering::Relaxed) {
            self.vad.reset();
            return Ok(());
        }

        for event in self.vad.process(frame.samples()) {
            match event {
                SpeechEvent::Start => self.scheduler.on_speech_start(),
                SpeechEvent::End => self.scheduler.on_speech_end(),
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Transcript-side logic: toggle word handling and keyword matching.
///
/// Split from [`App`] so the decision logic is testable without an audio
/// device or a tokio runtime.
struct Controller {
    toggle_word: String,
    matcher: KeywordMatcher,
    scheduler: EmoteScheduler,
    active: Arc<AtomicBool>,
}

impl Controller {
    /// React to one recognized chunk of speech.
    ///
    /// The toggle word is checked as a substring of the lowercased text so
    /// it works even when recognition glues it to neighbouring words, and a
    /// toggle utterance is consumed: it never doubles as a keyword trigger.
    fn on_transcript(&mut self, text: &str) {
        let lowered = text.to_lowercase();

        if lowered.contains(&self.toggle_word) {
            let was_active = self.active.fetch_xor(true, Ordering::Relaxed);
            if was_active {
                log::info!("toggle word heard, pausing");
                self.scheduler.stop();
            } else {
                log::info!("toggle word heard, resuming");
            }
            return;
        }

        if !self.active.load(Ordering::Relaxed) {
            return;
        }

        if let Some(emote) = self.matcher.find_match(&lowered) {
            self.scheduler.trigger_keyword_emote(&emote);
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Owns the full pipeline and runs the transcript loop until ctrl-c.
pub struct App {
    audio: AudioSource,
    controller: Controller,
    scheduler: EmoteScheduler,
    transcripts: tokio::sync::mpsc::Receiver<Transcript>,
    /// Present in hardware mode; closed explicitly at shutdown so the
    /// keyboard releases before the process exits.
    link: Option<Arc<Mutex<DeviceLink>>>,
}

impl App {
    /// Wire every component together from config.
    ///
    /// `player` executes emotes (hardware driver or [`crate::emote::NullPlayer`]);
    /// `link` is the shared connection behind a hardware player, kept here
    /// for orderly shutdown.
    pub fn new(
        config: &AppConfig,
        player: Box<dyn EmotePlayer>,
        link: Option<Arc<Mutex<DeviceLink>>>,
        transcriber: Box<dyn Transcriber>,
    ) -> Result<Self> {
        let scheduler = EmoteScheduler::new(
            player,
            config.talking.emotes.clone(),
            config.talking.idle_emote.clone(),
            config.talking.cycle_interval(),
        );

        let matcher = KeywordMatcher::new(
            &config.keywords.emote_groups(),
            config.keywords.cooldown(),
        );

        let active = Arc::new(AtomicBool::new(false)); // starts paused

        let vad = VoiceActivityDetector::new(
            EnergyScorer::default(),
            config.vad.threshold,
            config.vad.min_speech(),
            config.vad.min_silence(),
        );
        let vad_consumer = VadConsumer {
            vad,
            scheduler: scheduler.clone(),
            active: Arc::clone(&active),
        };

        let (transcript_tx, transcripts) = tokio::sync::mpsc::channel(64);
        let feed = TranscriptionFeed::spawn(transcriber, transcript_tx);

        let audio = AudioSource::new(
            config.audio_device.as_deref(),
            vec![Box::new(vad_consumer), Box::new(feed)],
        )?;

        let controller = Controller {
            toggle_word: config.toggle_word.to_lowercase(),
            matcher,
            scheduler: scheduler.clone(),
            active,
        };

        Ok(Self {
            audio,
            controller,
            scheduler,
            transcripts,
            link,
        })
    }

    /// Flip the pause gate without a spoken toggle.  Used when no
    /// recognition backend is available, since the toggle word can never be
    /// heard then.
    pub fn set_active(&self, active: bool) {
        self.controller.active.store(active, Ordering::Relaxed);
    }

    /// Start capture and process transcripts until ctrl-c or the feed ends.
    pub async fn run(mut self) -> Result<()> {
        self.audio.start()?;
        if self.controller.active.load(Ordering::Relaxed) {
            log::info!("running (active)");
        } else {
            log::info!(
                "running (paused), say '{}' to activate",
                self.controller.toggle_word
            );
        }

        loop {
            tokio::select! {
                transcript = self.transcripts.recv() => match transcript {
                    Some(t) => self.controller.on_transcript(&t.text),
                    None => {
                        log::warn!("transcription feed ended");
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    log::info!("ctrl-c received, shutting down");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Tear down in dependency order: capture first (stops the feed and the
    /// VAD), then pending emote cycles, then the device link.
    fn shutdown(&mut self) {
        self.audio.stop();
        self.scheduler.stop();
        if let Some(link) = &self.link {
            link.lock().unwrap().disconnect();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
