//! Keyword-to-emote matching over transcribed text.
//!
//! Trigger words are grouped: each [`EmoteGroup`] maps a set of spoken
//! triggers ("yes", "yeah", "yep") to a pool of emotes, and carries its own
//! cooldown clock so an enthusiastic "yes yes yes" fires at most once per
//! cooldown window while a "no" group stays independently available.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::pick_index;

/// Characters stripped from the edges of each token before matching.
const TOKEN_PUNCTUATION: &[char] = &['.', ',', '!', '?', '"', '\''];

// ---------------------------------------------------------------------------
// EmoteGroup
// ---------------------------------------------------------------------------

/// One trigger group: any of `triggers` fires one emote out of `emotes`.
#[derive(Debug, Clone)]
pub struct EmoteGroup {
    pub triggers: Vec<String>,
    pub emotes: Vec<String>,
}

/// Runtime state per group.
struct GroupState {
    emotes: Vec<String>,
    last_triggered: Option<Instant>,
}

// ---------------------------------------------------------------------------
// KeywordMatcher
// ---------------------------------------------------------------------------

/// Scans transcript text for trigger words with per-group cooldowns.
///
/// Matching is case-insensitive and whole-token: the transcript is lowercased
/// and split on whitespace, each token is stripped of edge punctuation, and
/// the result is looked up against the trigger table.  A token on cooldown
/// does not stop the scan; later tokens may still match another group.
pub struct KeywordMatcher {
    cooldown: Duration,
    /// Trigger word to group index.  A word claimed by one group is not
    /// reassigned by a later group.
    triggers: HashMap<String, usize>,
    groups: Vec<GroupState>,
}

impl KeywordMatcher {
    pub fn new(groups: &[EmoteGroup], cooldown: Duration) -> Self {
        let mut triggers = HashMap::new();
        let mut states = Vec::with_capacity(groups.len());

        for (index, group) in groups.iter().enumerate() {
            for trigger in &group.triggers {
                triggers.entry(trigger.to_lowercase()).or_insert(index);
            }
            states.push(GroupState {
                emotes: group.emotes.clone(),
                last_triggered: None,
            });
        }

        Self {
            cooldown,
            triggers,
            groups: states,
        }
    }

    /// Scan `text` for a trigger and return the emote to play, if any.
    pub fn find_match(&mut self, text: &str) -> Option<String> {
        self.match_at(text, Instant::now())
    }

    /// Time-injected matching core.
    fn match_at(&mut self, text: &str, now: Instant) -> Option<String> {
        for token in text.to_lowercase().split_whitespace() {
            let word = token.trim_matches(TOKEN_PUNCTUATION);
            if word.is_empty() {
                continue;
            }
            let Some(&index) = self.triggers.get(word) else {
                continue;
            };

            let group = &mut self.groups[index];
            if let Some(last) = group.last_triggered {
                if now.duration_since(last) < self.cooldown {
                    log::debug!("trigger '{word}' suppressed by cooldown");
                    continue;
                }
            }
            if group.emotes.is_empty() {
                continue;
            }

            group.last_triggered = Some(now);
            let emote = group.emotes[pick_index(group.emotes.len())].clone();
            log::info!("keyword '{word}' matched, playing '{emote}'");
            return Some(emote);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn group(triggers: &[&str], emotes: &[&str]) -> EmoteGroup {
        EmoteGroup {
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            emotes: emotes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matcher(cooldown_secs: u64) -> KeywordMatcher {
        KeywordMatcher::new(
            &[
                group(&["yes", "yeah", "yep"], &["yes"]),
                group(&["no", "nope", "nah"], &["no", "no2"]),
            ],
            Duration::from_secs(cooldown_secs),
        )
    }

    #[test]
    fn plain_trigger_matches() {
        let mut m = matcher(3);
        assert_eq!(m.find_match("well yes I think so").as_deref(), Some("yes"));
    }

    #[test]
    fn matching_is_case_insensitive_and_strips_punctuation() {
        let mut m = matcher(3);
        assert_eq!(m.find_match("YES!").as_deref(), Some("yes"));

        let mut m = matcher(3);
        assert_eq!(m.find_match("\"Yeah,\" he said").as_deref(), Some("yes"));
    }

    #[test]
    fn trigger_must_be_a_whole_token() {
        let mut m = matcher(3);
        assert_eq!(m.find_match("eyes and noses"), None);
        assert_eq!(m.find_match("yesterday"), None);
    }

    #[test]
    fn cooldown_window_suppresses_then_reopens() {
        let mut m = matcher(3);
        let base = Instant::now();
        let at = |s: u64| base + Duration::from_secs(s);

        assert!(m.match_at("yes", at(0)).is_some());
        assert!(m.match_at("yes", at(1)).is_none());
        assert!(m.match_at("yes again", at(4)).is_some());
    }

    #[test]
    fn cooldown_on_one_group_leaves_others_live() {
        let mut m = matcher(3);
        let base = Instant::now();

        assert!(m.match_at("yes", base).is_some());
        let hit = m.match_at("yes but no", base + Duration::from_secs(1));
        assert!(matches!(hit.as_deref(), Some("no") | Some("no2")));
    }

    #[test]
    fn suppressed_match_does_not_refresh_the_cooldown() {
        let mut m = matcher(3);
        let base = Instant::now();
        let at = |s: u64| base + Duration::from_secs(s);

        assert!(m.match_at("yes", at(0)).is_some());
        assert!(m.match_at("yes", at(2)).is_none());
        // The t=2 attempt did not restart the clock; t=4 is past t=0+3s.
        assert!(m.match_at("yes", at(4)).is_some());
    }

    #[test]
    fn synonyms_share_one_cooldown_clock() {
        let mut m = matcher(3);
        let base = Instant::now();

        assert!(m.match_at("yeah", base).is_some());
        assert!(m.match_at("yep", base + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn duplicate_trigger_belongs_to_the_first_group() {
        let mut m = KeywordMatcher::new(
            &[
                group(&["sure"], &["first"]),
                group(&["sure"], &["second"]),
            ],
            Duration::from_secs(3),
        );
        assert_eq!(m.find_match("sure").as_deref(), Some("first"));
    }

    #[test]
    fn no_trigger_no_match() {
        let mut m = matcher(3);
        assert_eq!(m.find_match("completely unrelated words"), None);
        assert_eq!(m.find_match(""), None);
    }
}
