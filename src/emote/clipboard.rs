//! Clipboard helper for the paste-based command path, backed by `arboard`.
//!
//! A fresh [`arboard::Clipboard`] handle is created per call — the handle is
//! cheap to open and is not `Send` on every platform, so sharing one across
//! the driver's callers would be more trouble than it is worth.

use arboard::Clipboard;

use super::DriverError;

/// Put `text` on the system clipboard, replacing whatever was there.
///
/// The game console reads the paste, so unlike a text editor workflow there
/// is no save/restore of the previous clipboard content — the slash command
/// intentionally stays on the clipboard for manual re-use.
pub fn set_clipboard(text: &str) -> Result<(), DriverError> {
    let mut clipboard =
        Clipboard::new().map_err(|e| DriverError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text)
        .map_err(|e| DriverError::Clipboard(e.to_string()))
}
