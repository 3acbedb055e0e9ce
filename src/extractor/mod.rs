//! # Event Extraction
//!
//! Turns a transcribed commentary string into structured play events.
//!
//! ## Pipeline (per call to `EventExtractor::parse`):
//! 1. **Segment** the original text into phrases (sentences, else commas)
//! 2. **Normalize** each phrase: punctuation becomes spaces, then lower-case
//! 3. **Classify** by the first action keyword found as a whole word
//! 4. **Attribute** the nearest known player, if one is close enough
//! 5. **Fall back** to an `unknown` event when no keyword matched
//!
//! ## Guarantees:
//! - Pure: same text and vocabulary always give the same events
//! - Total: every string produces a (possibly empty) list, never an error
//! - One event per non-empty phrase, in reading order
//!
//! The extractor is immutable after construction and is shared between
//! actix workers behind an `Arc` without any locking.

pub mod segment;
pub mod vocabulary;

pub use vocabulary::{ActionKind, Vocabulary, VocabularyError};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Confidence attached to every phrase that matched an action keyword.
pub const MATCHED_CONFIDENCE: f64 = 0.9;

/// Confidence attached to phrases that matched nothing.
pub const UNKNOWN_CONFIDENCE: f64 = 0.0;

/// The classified type of an event: one of the vocabulary actions, or
/// `unknown` when the phrase matched no keyword.
///
/// Serializes as the bare lowercase name (`"goal"`, `"unknown"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventKind {
    Action(ActionKind),
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Action(kind) => kind.as_str(),
            EventKind::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EventKind::Unknown)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = VocabularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("unknown") {
            return Ok(EventKind::Unknown);
        }
        s.parse().map(EventKind::Action)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for EventKind {
    type Error = VocabularyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One extracted event, produced per phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCandidate {
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Only present for matched actions with a player close to the keyword
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,

    /// The phrase as it appeared in the transcription, trimmed
    pub raw_text: String,

    pub confidence: f64,
}

impl EventCandidate {
    fn matched(kind: ActionKind, player: Option<String>, raw_text: &str) -> Self {
        Self {
            kind: EventKind::Action(kind),
            player,
            raw_text: raw_text.to_string(),
            confidence: MATCHED_CONFIDENCE,
        }
    }

    fn unknown(raw_text: &str) -> Self {
        Self {
            kind: EventKind::Unknown,
            player: None,
            raw_text: raw_text.to_string(),
            confidence: UNKNOWN_CONFIDENCE,
        }
    }
}

/// A keyword or player name with its precompiled whole-word matcher.
#[derive(Debug)]
struct WordMatcher {
    word: String,
    pattern: Regex,
}

impl WordMatcher {
    /// The word goes through the same normalization as the phrases it is
    /// matched against, so "O'Brien" finds "o brien".
    fn new(word: &str) -> Result<Self, VocabularyError> {
        let word = word.trim().to_lowercase();
        let tokens: Vec<String> = segment::normalize(&word)
            .split_whitespace()
            .map(regex::escape)
            .collect();
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", tokens.join(r"\s+"))).map_err(|source| {
            VocabularyError::Pattern {
                word: word.clone(),
                source,
            }
        })?;
        Ok(Self { word, pattern })
    }

    /// Character offset of the first whole-word occurrence.
    fn find(&self, haystack: &str) -> Option<usize> {
        self.pattern
            .find(haystack)
            .map(|m| segment::char_offset(haystack, m.start()))
    }
}

#[derive(Debug)]
struct ActionMatcher {
    kind: ActionKind,
    keywords: Vec<WordMatcher>,
}

#[derive(Debug)]
struct PlayerMatcher {
    /// Display name as declared in the vocabulary
    name: String,
    matcher: WordMatcher,
}

/// Stateless commentary-to-event extractor.
#[derive(Debug)]
pub struct EventExtractor {
    vocabulary: Vocabulary,
    actions: Vec<ActionMatcher>,
    players: Vec<PlayerMatcher>,
}

impl EventExtractor {
    /// Validate the vocabulary and precompile every matcher.
    pub fn new(vocabulary: Vocabulary) -> Result<Self, VocabularyError> {
        vocabulary.validate()?;

        let actions = vocabulary
            .actions
            .iter()
            .map(|action| {
                let keywords = action
                    .keywords
                    .iter()
                    .map(|keyword| WordMatcher::new(keyword))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ActionMatcher {
                    kind: action.kind,
                    keywords,
                })
            })
            .collect::<Result<Vec<_>, VocabularyError>>()?;

        let players = vocabulary
            .players
            .iter()
            .map(|name| {
                Ok(PlayerMatcher {
                    name: name.trim().to_string(),
                    matcher: WordMatcher::new(name)?,
                })
            })
            .collect::<Result<Vec<_>, VocabularyError>>()?;

        Ok(Self {
            vocabulary,
            actions,
            players,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Extract one event per phrase of `text`, in reading order.
    pub fn parse(&self, text: &str) -> Vec<EventCandidate> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        segment::segment_phrases(text)
            .into_iter()
            .map(|phrase| self.classify(phrase))
            .collect()
    }

    fn classify(&self, phrase: &str) -> EventCandidate {
        let normalized = segment::normalize(phrase).to_lowercase();

        match self.find_action(&normalized) {
            Some((kind, keyword_offset)) => {
                let player = self.closest_player(&normalized, keyword_offset);
                EventCandidate::matched(kind, player, phrase)
            }
            None => EventCandidate::unknown(phrase),
        }
    }

    /// First action (declared order) with any keyword present, and the
    /// offset of its first matching keyword (declared order).
    fn find_action(&self, normalized: &str) -> Option<(ActionKind, usize)> {
        self.actions.iter().find_map(|action| {
            action
                .keywords
                .iter()
                .find_map(|keyword| keyword.find(normalized))
                .map(|offset| (action.kind, offset))
        })
    }

    /// The player whose first mention is nearest the keyword, if within the
    /// distance limit. Ties go to the earlier-declared player.
    fn closest_player(&self, normalized: &str, keyword_offset: usize) -> Option<String> {
        let mut best: Option<(&PlayerMatcher, usize)> = None;

        for player in &self.players {
            let Some(offset) = player.matcher.find(normalized) else {
                continue;
            };
            let distance = offset.abs_diff(keyword_offset);
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((player, distance));
            }
        }

        best.filter(|(_, distance)| *distance < self.vocabulary.max_player_distance)
            .map(|(player, _)| player.name.clone())
    }

    /// Every keyword this extractor recognises, grouped by action.
    pub fn keyword_summary(&self) -> Vec<(ActionKind, Vec<&str>)> {
        self.actions
            .iter()
            .map(|action| {
                (
                    action.kind,
                    action.keywords.iter().map(|k| k.word.as_str()).collect(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::vocabulary::ActionKeywords;

    fn extractor() -> EventExtractor {
        EventExtractor::new(Vocabulary::default()).unwrap()
    }

    fn single(text: &str) -> EventCandidate {
        let mut events = extractor().parse(text);
        assert_eq!(events.len(), 1, "expected one event for {:?}", text);
        events.remove(0)
    }

    #[test]
    fn test_goal_winston() {
        let event = single("Goal Winston");
        assert_eq!(event.kind, EventKind::Action(ActionKind::Goal));
        assert_eq!(event.player.as_deref(), Some("Winston"));
        assert_eq!(event.raw_text, "Goal Winston");
        assert_eq!(event.confidence, 0.9);
    }

    #[test]
    fn test_save_tommy_is_not_tom() {
        let event = single("Save Tommy");
        assert_eq!(event.kind, EventKind::Action(ActionKind::Save));
        assert_eq!(event.player.as_deref(), Some("Tommy"));
    }

    #[test]
    fn test_alex_scored() {
        let event = single("Alex scored");
        assert_eq!(event.kind, EventKind::Action(ActionKind::Goal));
        assert_eq!(event.player.as_deref(), Some("Alex"));
        assert_eq!(event.confidence, MATCHED_CONFIDENCE);
    }

    #[test]
    fn test_closest_player_wins() {
        let event = single("Pass from Logan to Tom");
        assert_eq!(event.kind, EventKind::Action(ActionKind::Pass));
        assert_eq!(event.player.as_deref(), Some("Logan"));
    }

    #[test]
    fn test_unknown_phrase() {
        let event = single("The weather was nice today");
        assert_eq!(event.kind, EventKind::Unknown);
        assert_eq!(event.player, None);
        assert_eq!(event.raw_text, "The weather was nice today");
        assert_eq!(event.confidence, UNKNOWN_CONFIDENCE);
    }

    #[test]
    fn test_comma_separated_commentary() {
        let events = extractor().parse("Goal Winston, Save Tommy, Shot Kip");
        let summary: Vec<(&str, Option<&str>)> = events
            .iter()
            .map(|e| (e.kind.as_str(), e.player.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("goal", Some("Winston")),
                ("save", Some("Tommy")),
                ("shot", Some("Kip"))
            ]
        );
    }

    #[test]
    fn test_sentence_commentary_keeps_order() {
        let events = extractor().parse("Tackle by Leo! Nice weather. Kip saves it?");
        let kinds: Vec<&str> = events.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["tackle", "unknown", "save"]);
        assert_eq!(events[0].player.as_deref(), Some("Leo"));
        assert_eq!(events[2].player.as_deref(), Some("Kip"));
        assert_eq!(events[2].raw_text, "Kip saves it");
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(extractor().parse("").is_empty());
        assert!(extractor().parse("   \n\t ").is_empty());
    }

    #[test]
    fn test_punctuation_only_degrades_to_unknown() {
        for text in ["?!...", ",", " , ,, "] {
            let event = single(text);
            assert_eq!(event.kind, EventKind::Unknown);
            assert_eq!(event.raw_text, text.trim());
            assert_eq!(event.player, None);
        }
    }

    #[test]
    fn test_names_with_apostrophes_and_hyphens() {
        let vocabulary = Vocabulary {
            players: vec!["O'Brien".to_string(), "Alexander-Arnold".to_string()],
            ..Vocabulary::default()
        };
        let extractor = EventExtractor::new(vocabulary).unwrap();

        let events = extractor.parse("Goal O'Brien, Pass Alexander-Arnold, save o brien");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, EventKind::Action(ActionKind::Goal));
        assert_eq!(events[0].player.as_deref(), Some("O'Brien"));
        assert_eq!(events[1].kind, EventKind::Action(ActionKind::Pass));
        assert_eq!(events[1].player.as_deref(), Some("Alexander-Arnold"));
        assert_eq!(events[2].player.as_deref(), Some("O'Brien"));
    }

    #[test]
    fn test_keyword_with_inner_punctuation() {
        let vocabulary = Vocabulary {
            actions: vec![ActionKeywords {
                kind: ActionKind::Goal,
                keywords: vec!["own-goal".to_string(), "back of the net!".to_string()],
            }],
            players: vec!["Winston".to_string()],
            max_player_distance: 30,
        };
        let extractor = EventExtractor::new(vocabulary);
        // "!" ends a phrase, so that keyword could never be seen whole
        assert!(matches!(extractor, Err(VocabularyError::UnmatchableWord(_))));

        let vocabulary = Vocabulary {
            actions: vec![ActionKeywords {
                kind: ActionKind::Goal,
                keywords: vec!["own-goal".to_string()],
            }],
            players: vec!["Winston".to_string()],
            max_player_distance: 30,
        };
        let event = EventExtractor::new(vocabulary).unwrap().parse("Own goal Winston").remove(0);
        assert_eq!(event.kind, EventKind::Action(ActionKind::Goal));
        assert_eq!(event.player.as_deref(), Some("Winston"));
    }

    #[test]
    fn test_case_insensitive() {
        let upper = single("GOAL WINSTON");
        let lower = single("goal winston");
        assert_eq!(upper.kind, lower.kind);
        assert_eq!(upper.player, lower.player);
        assert_eq!(upper.player.as_deref(), Some("Winston"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let extractor = extractor();
        let text = "Goal Winston. Pass from Logan to Tom! Random chatter";
        assert_eq!(extractor.parse(text), extractor.parse(text));
    }

    #[test]
    fn test_first_declared_action_wins() {
        // "shot" and "goal" both appear; goal is declared first.
        let event = single("Shot by Kip and goal");
        assert_eq!(event.kind, EventKind::Action(ActionKind::Goal));
    }

    #[test]
    fn test_inflected_keyword_matches_once() {
        let event = single("Logan passed");
        assert_eq!(event.kind, EventKind::Action(ActionKind::Pass));
        assert_eq!(event.player.as_deref(), Some("Logan"));

        // Substrings of longer words are not keywords.
        let event = single("Passenger Logan");
        assert_eq!(event.kind, EventKind::Unknown);
    }

    #[test]
    fn test_misrecognised_keyword() {
        let event = single("goll Winston");
        assert_eq!(event.kind, EventKind::Action(ActionKind::Goal));
        assert_eq!(event.player.as_deref(), Some("Winston"));
    }

    #[test]
    fn test_player_distance_cutoff() {
        // "goal" at 0, "winston" at 29: attributed.
        let near = format!("goal{}winston", " ".repeat(25));
        assert_eq!(single(&near).player.as_deref(), Some("Winston"));

        // "goal" at 0, "winston" at 30: too far, but still a goal.
        let far = format!("goal{}winston", " ".repeat(26));
        let event = single(&far);
        assert_eq!(event.kind, EventKind::Action(ActionKind::Goal));
        assert_eq!(event.player, None);
        assert_eq!(event.confidence, MATCHED_CONFIDENCE);
    }

    #[test]
    fn test_matched_action_without_player() {
        let event = single("What a tackle");
        assert_eq!(event.kind, EventKind::Action(ActionKind::Tackle));
        assert_eq!(event.player, None);
    }

    #[test]
    fn test_punctuation_inside_phrase_is_ignored() {
        let event = single("Winston's goal!!!");
        assert_eq!(event.kind, EventKind::Action(ActionKind::Goal));
        assert_eq!(event.player.as_deref(), Some("Winston"));
        assert_eq!(event.raw_text, "Winston's goal!!!");
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocabulary = Vocabulary {
            actions: vec![ActionKeywords {
                kind: ActionKind::Tackle,
                keywords: vec!["slide".to_string()],
            }],
            players: vec!["Ada".to_string()],
            max_player_distance: 5,
        };
        let extractor = EventExtractor::new(vocabulary).unwrap();

        let events = extractor.parse("Ada slide, goal Winston, slide by somebody Ada");
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, EventKind::Action(ActionKind::Tackle));
        assert_eq!(events[0].player.as_deref(), Some("Ada"));
        assert_eq!(events[1].kind, EventKind::Unknown);
        assert_eq!(events[2].kind, EventKind::Action(ActionKind::Tackle));
        assert_eq!(events[2].player, None);
    }

    #[test]
    fn test_invalid_vocabulary_is_rejected() {
        let vocabulary = Vocabulary {
            actions: Vec::new(),
            players: Vec::new(),
            max_player_distance: 30,
        };
        assert!(matches!(
            EventExtractor::new(vocabulary),
            Err(VocabularyError::NoActions)
        ));
    }

    #[test]
    fn test_event_serialization() {
        let event = single("Goal Winston");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "goal",
                "player": "Winston",
                "raw_text": "Goal Winston",
                "confidence": 0.9
            })
        );

        let unknown = serde_json::to_value(single("hello there")).unwrap();
        assert_eq!(unknown["type"], "unknown");
        assert!(unknown.get("player").is_none());

        let parsed: EventCandidate = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_event_kind_parsing() {
        assert_eq!("unknown".parse::<EventKind>().unwrap(), EventKind::Unknown);
        assert_eq!(
            "pass".parse::<EventKind>().unwrap(),
            EventKind::Action(ActionKind::Pass)
        );
        assert!("corner".parse::<EventKind>().is_err());
    }
}
