//! Slash-command driver for the game console.
//!
//! [`EmoteDriver`] turns `/e <name>` commands into the fixed keystroke
//! choreography the game console expects:
//!
//! 1. tap the console key (open the chat/console input),
//! 2. wait for the console to appear,
//! 3. enter the command — either by pasting from the clipboard
//!    (CTRL held, V tapped) or by typing it literally (`TEXT:`),
//! 4. tap ENTER to submit,
//! 5. **always** finish with `RELEASEALL`, even when an earlier step
//!    failed — a half-executed choreography must never leave CTRL held.
//!
//! # Connection ownership
//!
//! One physical link can serve several command-issuing facades.  A driver
//! built with [`EmoteDriver::owned`] created the connection and may close it;
//! one built with [`EmoteDriver::shared`] borrows it and
//! [`EmoteDriver::disconnect`] is a no-op there — only the owner tears the
//! link down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::device::DeviceLink;

use super::{clipboard, DriverError};

// ---------------------------------------------------------------------------
// EmotePlayer
// ---------------------------------------------------------------------------

/// Anything that can execute a named emote.
///
/// The scheduler and keyword path depend on this trait, not on hardware;
/// [`NullPlayer`] satisfies it for dry runs and tests mock it.
pub trait EmotePlayer: Send + Sync {
    fn play(&self, emote: &str) -> Result<(), DriverError>;
}

/// Logs the emote instead of touching hardware (`--dry-run`).
pub struct NullPlayer;

impl EmotePlayer for NullPlayer {
    fn play(&self, emote: &str) -> Result<(), DriverError> {
        log::info!("[dry-run] /e {emote}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InputMethod / Timing
// ---------------------------------------------------------------------------

/// How the command text reaches the console input box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMethod {
    /// Put the command on the clipboard and simulate CTRL+V.  Fast and
    /// robust for arbitrary text.
    ClipboardPaste,
    /// Have the device type the command literally (`TEXT:`).  No clipboard
    /// dependency, slower on long commands.
    TypeText,
}

/// Inter-step settle delays of the choreography.
///
/// Defaults match what the game client reliably tolerates; tests use
/// [`Timing::instant`] to run the choreography without sleeping.
#[derive(Debug, Clone)]
pub struct Timing {
    /// How long the console key stays pressed.
    pub console_key_hold: Duration,
    /// Wait for the console input box to open.
    pub console_open: Duration,
    /// Settle around modifier press/release and the paste tap.
    pub modifier_settle: Duration,
    /// Settle after the command text is in the input box.
    pub input_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            console_key_hold: Duration::from_millis(50),
            console_open: Duration::from_millis(150),
            modifier_settle: Duration::from_millis(20),
            input_settle: Duration::from_millis(30),
        }
    }
}

impl Timing {
    /// All-zero delays — choreography order only, no waiting.
    pub fn instant() -> Self {
        Self {
            console_key_hold: Duration::ZERO,
            console_open: Duration::ZERO,
            modifier_settle: Duration::ZERO,
            input_settle: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// EmoteDriver
// ---------------------------------------------------------------------------

/// Sends slash commands to the game console over a [`DeviceLink`].
///
/// The link lives behind a `Mutex`: the hardware is a single keystate
/// machine and interleaved choreographies would corrupt it, so every
/// command sequence holds the lock end to end.
pub struct EmoteDriver {
    link: Arc<Mutex<DeviceLink>>,
    owns_link: bool,
    console_key: String,
    input: InputMethod,
    timing: Timing,
}

impl EmoteDriver {
    /// Take exclusive ownership of a freshly connected link.
    pub fn owned(link: DeviceLink) -> Self {
        Self::build(Arc::new(Mutex::new(link)), true)
    }

    /// Borrow a link shared with other command issuers.  This driver will
    /// never close it.
    pub fn shared(link: Arc<Mutex<DeviceLink>>) -> Self {
        Self::build(link, false)
    }

    fn build(link: Arc<Mutex<DeviceLink>>, owns_link: bool) -> Self {
        Self {
            link,
            owns_link,
            console_key: "T".into(),
            input: InputMethod::ClipboardPaste,
            timing: Timing::default(),
        }
    }

    /// Override the key that opens the game console (default `T`).
    pub fn with_console_key(mut self, key: impl Into<String>) -> Self {
        self.console_key = key.into();
        self
    }

    /// Select how command text is entered (default clipboard paste).
    pub fn with_input_method(mut self, input: InputMethod) -> Self {
        self.input = input;
        self
    }

    /// Override the settle delays.
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Whether this driver owns (and may close) the underlying link.
    pub fn owns_link(&self) -> bool {
        self.owns_link
    }

    /// Send a slash command to the game console.
    ///
    /// `command` may be given with or without the leading `/` — it is
    /// normalized to include one.  Blocks for the duration of the
    /// choreography; concurrent callers queue on the link lock.
    pub fn slash(&self, command: &str) -> Result<(), DriverError> {
        let command = if command.starts_with('/') {
            command.to_string()
        } else {
            format!("/{command}")
        };

        let mut link = self.link.lock().unwrap();
        let result = self.choreograph(&mut link, &command);

        // Safety net: whatever happened above, no key stays held.
        let release = link.release_all();
        result?;
        release?;
        Ok(())
    }

    /// Shortcut for emote commands: `emote("dance3")` → `/e dance3`.
    pub fn emote(&self, name: &str) -> Result<(), DriverError> {
        self.slash(&format!("e {name}"))
    }

    /// Close the link if — and only if — this driver owns it.
    pub fn disconnect(&self) {
        if self.owns_link {
            self.link.lock().unwrap().disconnect();
        }
    }

    fn choreograph(&self, link: &mut DeviceLink, command: &str) -> Result<(), DriverError> {
        if self.input == InputMethod::ClipboardPaste {
            clipboard::set_clipboard(command)?;
        }

        // Open the console.
        link.press(&self.console_key)?;
        std::thread::sleep(self.timing.console_key_hold);
        link.release(&self.console_key)?;
        std::thread::sleep(self.timing.console_open);

        // Enter the command text.
        match self.input {
            InputMethod::ClipboardPaste => {
                link.press("CTRL")?;
                std::thread::sleep(self.timing.modifier_settle);
                link.tap("V")?;
                std::thread::sleep(self.timing.modifier_settle);
                link.release("CTRL")?;
            }
            InputMethod::TypeText => {
                link.type_text(command)?;
            }
        }
        std::thread::sleep(self.timing.input_settle);

        // Submit.
        link.tap("ENTER")?;
        Ok(())
    }
}

impl EmotePlayer for EmoteDriver {
    fn play(&self, emote: &str) -> Result<(), DriverError> {
        self.emote(emote)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
