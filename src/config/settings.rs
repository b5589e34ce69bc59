//! Application settings structs, defaults and TOML persistence.
//!
//! Every struct and field carries `#[serde(default)]`, so a settings file
//! only needs to name the values it changes: anything missing, down to a
//! single field inside a nested table, falls back to the built-in default.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::emote::EmoteGroup;

use super::AppPaths;

// ---------------------------------------------------------------------------
// VadConfig
// ---------------------------------------------------------------------------

/// Voice-activity detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Speech probability above which a chunk counts as voice (0.0 – 1.0).
    pub threshold: f32,
    /// Voice must persist this long before a speech start fires.
    pub min_speech_ms: u64,
    /// Silence must persist this long before a speech end fires.
    pub min_silence_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            min_speech_ms: 250,
            min_silence_ms: 500,
        }
    }
}

impl VadConfig {
    pub fn min_speech(&self) -> Duration {
        Duration::from_millis(self.min_speech_ms)
    }

    pub fn min_silence(&self) -> Duration {
        Duration::from_millis(self.min_silence_ms)
    }
}

// ---------------------------------------------------------------------------
// TalkingConfig
// ---------------------------------------------------------------------------

/// What plays while the user is talking, and what plays when they stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TalkingConfig {
    /// Seconds between talking-emote changes.
    pub cycle_interval_secs: f64,
    /// Pool of emotes cycled through while talking.
    pub emotes: Vec<String>,
    /// Emote played once when speech ends.
    pub idle_emote: String,
}

impl Default for TalkingConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 4.0,
            emotes: vec!["think2".into(), "argue".into(), "wait".into()],
            idle_emote: "wait".into(),
        }
    }
}

impl TalkingConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs_f64(self.cycle_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// KeywordConfig
// ---------------------------------------------------------------------------

/// One keyword trigger group as written in `settings.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmoteGroupConfig {
    /// Spoken words that fire this group.
    pub triggers: Vec<String>,
    /// Emotes the group picks from, uniformly at random.
    pub emotes: Vec<String>,
}

impl Default for EmoteGroupConfig {
    fn default() -> Self {
        Self {
            triggers: Vec::new(),
            emotes: Vec::new(),
        }
    }
}

impl From<&EmoteGroupConfig> for EmoteGroup {
    fn from(config: &EmoteGroupConfig) -> Self {
        EmoteGroup {
            triggers: config.triggers.clone(),
            emotes: config.emotes.clone(),
        }
    }
}

/// Keyword matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Seconds a group stays quiet after firing.
    pub cooldown_secs: f64,
    /// Trigger groups, scanned in order (an earlier group keeps a trigger
    /// word that a later group also claims).
    pub groups: Vec<EmoteGroupConfig>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 3.0,
            groups: vec![
                EmoteGroupConfig {
                    triggers: vec!["yes".into(), "yeah".into(), "yep".into(), "yup".into()],
                    emotes: vec!["yes".into()],
                },
                EmoteGroupConfig {
                    triggers: vec!["no".into(), "nope".into(), "nah".into()],
                    emotes: vec!["no".into(), "no2".into()],
                },
            ],
        }
    }
}

impl KeywordConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }

    pub fn emote_groups(&self) -> Vec<EmoteGroup> {
        self.groups.iter().map(EmoteGroup::from).collect()
    }
}

// ---------------------------------------------------------------------------
// DeviceConfig
// ---------------------------------------------------------------------------

/// Serial connection settings for the keyboard-emulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial port name — `None` means auto-discover by USB VID/PID.
    pub port: Option<String>,
    /// Baud rate of the USB-serial bridge.
    pub baud: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: crate::device::DEFAULT_BAUD,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Spoken word that pauses/resumes the whole system.  Matched as a
    /// substring of the transcript so it works even when recognition glues
    /// it to neighbouring words.
    pub toggle_word: String,
    /// Audio input device name — `None` means the system default.
    pub audio_device: Option<String>,
    /// Voice-activity detection thresholds.
    pub vad: VadConfig,
    /// Talking-mode emote cycling.
    pub talking: TalkingConfig,
    /// Keyword trigger groups.
    pub keywords: KeywordConfig,
    /// Serial device connection.
    pub device: DeviceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            toggle_word: "toggle".into(),
            audio_device: None,
            vad: VadConfig::default(),
            talking: TalkingConfig::default(),
            keywords: KeywordConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    ///
    /// A malformed file is not fatal: it logs a warning and yields the full
    /// defaults, same as a missing one.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                log::warn!(
                    "malformed settings file {}: {e}; using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
