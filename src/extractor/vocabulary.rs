//! # Commentary Vocabulary
//!
//! The closed set of things the extractor knows how to recognise: the action
//! categories with their spoken (and misheard) keyword variants, and the
//! roster of player names.
//!
//! ## Ordering matters:
//! Both lists are plain `Vec`s because the extractor is "first match wins".
//! `goal` is tried before `save`, `save` before `shot`, and so on; inside a
//! category the keyword variants are tried in the order they are listed.
//!
//! ## Loading:
//! - `Vocabulary::default()` is the built-in squad and keyword list
//! - `Vocabulary::from_toml_str()` / `Vocabulary::load()` read a replacement
//!   from a TOML file so the roster can change without recompiling

use super::segment::{is_phrase_break, normalize};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Players further than this many characters from the action keyword are
/// not attributed to the event.
pub const DEFAULT_MAX_PLAYER_DISTANCE: usize = 30;

/// The play events the extractor can classify a phrase as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Goal,
    Save,
    Shot,
    Pass,
    Tackle,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Goal => "goal",
            ActionKind::Save => "save",
            ActionKind::Shot => "shot",
            ActionKind::Pass => "pass",
            ActionKind::Tackle => "tackle",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = VocabularyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "goal" => Ok(ActionKind::Goal),
            "save" => Ok(ActionKind::Save),
            "shot" => Ok(ActionKind::Shot),
            "pass" => Ok(ActionKind::Pass),
            "tackle" => Ok(ActionKind::Tackle),
            _ => Err(VocabularyError::UnknownAction(s.to_string())),
        }
    }
}

/// One action category and the surface forms that trigger it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionKeywords {
    pub kind: ActionKind,
    pub keywords: Vec<String>,
}

impl ActionKeywords {
    fn new(kind: ActionKind, keywords: &[&str]) -> Self {
        Self {
            kind,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Problems found while loading or validating a vocabulary.
#[derive(Debug, thiserror::Error)]
pub enum VocabularyError {
    #[error("unknown action category '{0}'")]
    UnknownAction(String),

    #[error("vocabulary must declare at least one action category")]
    NoActions,

    #[error("action category '{0}' is declared more than once")]
    DuplicateAction(ActionKind),

    #[error("action category '{0}' has no keywords")]
    EmptyKeywords(ActionKind),

    #[error("action category '{0}' contains a blank keyword")]
    BlankKeyword(ActionKind),

    #[error("player names must not be blank")]
    BlankPlayer,

    #[error("'{0}' contains '.', '!', '?' or ',' which split commentary into phrases, so it can never match")]
    UnmatchableWord(String),

    #[error("max_player_distance must be greater than 0")]
    ZeroDistance,

    #[error("failed to read vocabulary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse vocabulary file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to compile matcher for '{word}': {source}")]
    Pattern {
        word: String,
        #[source]
        source: regex::Error,
    },
}

/// The immutable keyword/player configuration owned by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub actions: Vec<ActionKeywords>,
    pub players: Vec<String>,
    #[serde(default = "default_max_player_distance")]
    pub max_player_distance: usize,
}

fn default_max_player_distance() -> usize {
    DEFAULT_MAX_PLAYER_DISTANCE
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            actions: vec![
                ActionKeywords::new(ActionKind::Goal, &["goal", "goll", "scored", "scores", "goall"]),
                ActionKeywords::new(ActionKind::Save, &["save", "saved", "saves", "safed"]),
                ActionKeywords::new(ActionKind::Shot, &["shot", "shoots", "shooting", "shoot"]),
                ActionKeywords::new(ActionKind::Pass, &["pass", "passed", "passes"]),
                ActionKeywords::new(ActionKind::Tackle, &["tackle", "tackled", "tackles"]),
            ],
            players: ["Winston", "Tom", "Tommy", "Logan", "Kip", "Alex", "Leo"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            max_player_distance: DEFAULT_MAX_PLAYER_DISTANCE,
        }
    }
}

impl Vocabulary {
    /// Parse a vocabulary from TOML text and validate it.
    pub fn from_toml_str(source: &str) -> Result<Self, VocabularyError> {
        let vocabulary: Vocabulary = toml::from_str(source)?;
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    /// Read a vocabulary file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VocabularyError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check the structural rules the extractor relies on.
    ///
    /// ## Rules:
    /// - At least one action, each kind declared once
    /// - Every action has at least one non-blank keyword
    /// - Player names are non-blank (an empty roster is allowed)
    /// - Blank means no letters or digits: matching ignores punctuation
    /// - No keyword or name contains a phrase break (`.`, `!`, `?`, `,`)
    /// - The distance limit is positive
    pub fn validate(&self) -> Result<(), VocabularyError> {
        if self.actions.is_empty() {
            return Err(VocabularyError::NoActions);
        }

        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.kind) {
                return Err(VocabularyError::DuplicateAction(action.kind));
            }
            if action.keywords.is_empty() {
                return Err(VocabularyError::EmptyKeywords(action.kind));
            }
            if action.keywords.iter().any(|k| is_blank(k)) {
                return Err(VocabularyError::BlankKeyword(action.kind));
            }
            if let Some(keyword) = action.keywords.iter().find(|k| k.contains(is_phrase_break)) {
                return Err(VocabularyError::UnmatchableWord(keyword.clone()));
            }
        }

        if self.players.iter().any(|p| is_blank(p)) {
            return Err(VocabularyError::BlankPlayer);
        }
        if let Some(player) = self.players.iter().find(|p| p.contains(is_phrase_break)) {
            return Err(VocabularyError::UnmatchableWord(player.clone()));
        }

        if self.max_player_distance == 0 {
            return Err(VocabularyError::ZeroDistance);
        }

        Ok(())
    }
}

fn is_blank(word: &str) -> bool {
    normalize(word).trim().is_empty()
}
