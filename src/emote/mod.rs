//! Emote actuation: drivers, scheduling, and keyword matching.
//!
//! * [`EmoteDriver`] turns an emote name into the console-key choreography
//!   over a [`crate::device::DeviceLink`].
//! * [`EmoteScheduler`] reacts to speech start/end events, cycling random
//!   emotes while the user talks.
//! * [`KeywordMatcher`] maps transcribed trigger words to emote pools with
//!   per-group cooldowns.
//!
//! The scheduler and matcher never touch hardware directly — everything
//! routes through the [`EmotePlayer`] trait so dry runs and tests can swap
//! the driver out.

pub mod clipboard;
pub mod driver;
pub mod matcher;
pub mod scheduler;

pub use driver::{EmoteDriver, EmotePlayer, InputMethod, NullPlayer, Timing};
pub use matcher::{EmoteGroup, KeywordMatcher};
pub use scheduler::{EmoteScheduler, SchedulerState};

use thiserror::Error;

use crate::device::DeviceError;

// ---------------------------------------------------------------------------
// DriverError
// ---------------------------------------------------------------------------

/// Errors surfaced while executing an emote.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("cannot write command to clipboard: {0}")]
    Clipboard(String),
}

// ---------------------------------------------------------------------------
// pick_index
// ---------------------------------------------------------------------------

/// Uniform random index in `0..len` from the OS RNG, with a best-effort
/// time/pid fallback if the OS RNG is unavailable.
pub(crate) fn pick_index(len: usize) -> usize {
    debug_assert!(len > 0);
    if len <= 1 {
        return 0;
    }

    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_ok() {
        return (u64::from_le_bytes(bytes) % len as u64) as usize;
    }

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mixed = nanos ^ (std::process::id() as u128).rotate_left(17);
    (mixed % len as u128) as usize
}
