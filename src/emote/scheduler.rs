//! Speech-driven emote state machine.
//!
//! Two states: `Idle` (quiet, no emote cycling) and `Talking`.  A speech
//! start flips to `Talking`, plays a random talking emote immediately and
//! schedules another every cycle interval; a speech end cancels the pending
//! cycle, flips back to `Idle` and plays the idle emote once.
//!
//! Cancellation uses a generation counter instead of joining timer threads:
//! every state flip bumps the generation, and a cycle that wakes up with a
//! stale generation simply returns.  A cycle can therefore never fire across
//! a state change, even when the wakeup races the flip.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{pick_index, EmotePlayer};

// ---------------------------------------------------------------------------
// SchedulerState
// ---------------------------------------------------------------------------

/// The two speech states the scheduler moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Talking,
}

// ---------------------------------------------------------------------------
// EmoteScheduler
// ---------------------------------------------------------------------------

struct Inner {
    state: SchedulerState,
    /// Bumped on every transition; pending cycles compare against it.
    generation: u64,
    /// Index of the last talking emote, to avoid playing it twice in a row.
    last_emote: Option<usize>,
}

struct Shared {
    player: Box<dyn EmotePlayer>,
    cycle_interval: Duration,
    talking_emotes: Vec<String>,
    idle_emote: String,
    inner: Mutex<Inner>,
}

/// Clonable handle to the shared scheduler state.
///
/// Emotes play while the state lock is held, which serializes them: a cycle
/// emote can never interleave with the idle emote of a concurrent speech-end.
#[derive(Clone)]
pub struct EmoteScheduler {
    shared: Arc<Shared>,
}

impl EmoteScheduler {
    pub fn new(
        player: Box<dyn EmotePlayer>,
        talking_emotes: Vec<String>,
        idle_emote: String,
        cycle_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                player,
                cycle_interval,
                talking_emotes,
                idle_emote,
                inner: Mutex::new(Inner {
                    state: SchedulerState::Idle,
                    generation: 0,
                    last_emote: None,
                }),
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.inner.lock().unwrap().state
    }

    /// Speech started: enter `Talking`, play a random emote now and start
    /// the cycle timer.  A no-op if already talking.
    pub fn on_speech_start(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state == SchedulerState::Talking {
            return;
        }
        log::debug!("speech start, entering talking mode");
        inner.state = SchedulerState::Talking;
        inner.generation += 1;
        let generation = inner.generation;

        self.play_random_talking(&mut inner);
        drop(inner);
        self.schedule_cycle(generation);
    }

    /// Speech ended: cancel the pending cycle, enter `Idle` and play the
    /// idle emote once.  A no-op if already idle.
    pub fn on_speech_end(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state == SchedulerState::Idle {
            return;
        }
        log::debug!("speech end, returning to idle");
        // Invalidate pending cycles before the flip so none lands in Idle.
        // last_emote survives: the next session must not open with the
        // emote this one ended on.
        inner.generation += 1;
        inner.state = SchedulerState::Idle;

        let idle = self.shared.idle_emote.clone();
        self.play(&idle, &inner);
    }

    /// Play a keyword-triggered emote without touching the speech state.
    pub fn trigger_keyword_emote(&self, emote: &str) {
        let inner = self.shared.inner.lock().unwrap();
        self.play(emote, &inner);
    }

    /// Cancel any pending cycle and return to `Idle` without playing
    /// anything.  Used when the whole system pauses.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.generation += 1;
        inner.state = SchedulerState::Idle;
    }

    fn schedule_cycle(&self, generation: u64) {
        let scheduler = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(scheduler.shared.cycle_interval);
            scheduler.on_cycle(generation);
        });
    }

    fn on_cycle(&self, generation: u64) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.generation != generation || inner.state != SchedulerState::Talking {
            return; // cancelled while we slept
        }
        self.play_random_talking(&mut inner);
        drop(inner);
        self.schedule_cycle(generation);
    }

    /// Pick a talking emote, avoiding an immediate repeat when more than one
    /// is configured.
    fn play_random_talking(&self, inner: &mut Inner) {
        let emotes = &self.shared.talking_emotes;
        if emotes.is_empty() {
            return;
        }
        let mut index = pick_index(emotes.len());
        if emotes.len() > 1 && inner.last_emote == Some(index) {
            index = (index + 1) % emotes.len();
        }
        inner.last_emote = Some(index);
        let emote = emotes[index].clone();
        self.play(&emote, inner);
    }

    fn play(&self, emote: &str, _guard: &Inner) {
        // Player failures are logged and swallowed; a flaky device must not
        // wedge the state machine.
        if let Err(e) = self.shared.player.play(emote) {
            log::error!("failed to play emote '{emote}': {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
