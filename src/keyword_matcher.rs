//! First-match-wins keyword lookup
//!
//! A line gets the id of the lowest-indexed keyword that occurs anywhere in
//! its normalized text. Position in the line and keyword length play no
//! part: `["warn", "warning"]` labels "warning message" with 0.

use crate::matcher_config::MatcherConfig;
use crate::wordlist::Wordlist;
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use std::fmt;

pub const OTHER_LABEL_ID: i64 = -1;
pub const OTHER_TOKEN: &str = "other";

/// Outcome of matching one line against a wordlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Matched { id: usize, keyword: String },
    Other,
}

impl Label {
    pub fn id(&self) -> i64 {
        match self {
            Label::Matched { id, .. } => *id as i64,
            Label::Other => OTHER_LABEL_ID,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Label::Matched { keyword, .. } => keyword,
            Label::Other => OTHER_TOKEN,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Label::Matched { .. })
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.token())
    }
}

/// Lowercase then trim, the form keywords are matched against.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().trim().to_string()
}

/// Reference rule: scan keywords in id order and stop at the first one
/// contained in the normalized text.
pub fn assign_label(text: &str, wordlist: &Wordlist) -> Label {
    let normalized = normalize(text);
    linear_scan(&normalized, wordlist)
        .map(|id| matched(wordlist, id))
        .unwrap_or(Label::Other)
}

fn linear_scan(normalized: &str, wordlist: &Wordlist) -> Option<usize> {
    wordlist
        .iter()
        .find(|(_, keyword)| normalized.contains(keyword))
        .map(|(id, _)| id)
}

fn matched(wordlist: &Wordlist, id: usize) -> Label {
    Label::Matched {
        id,
        keyword: wordlist.get(id).unwrap_or_default().to_string(),
    }
}

/// Keyword matcher compiled once per wordlist and shared read-only.
pub struct KeywordMatcher {
    wordlist: Wordlist,
    automaton: Option<Automaton>,
    config: MatcherConfig,
}

struct Automaton {
    ac: AhoCorasick,
    // automaton pattern index -> wordlist id
    pattern_ids: Vec<usize>,
    // an empty keyword is contained in every text
    first_empty: Option<usize>,
}

impl Automaton {
    fn build(wordlist: &Wordlist) -> Option<Self> {
        let mut patterns = Vec::with_capacity(wordlist.len());
        let mut pattern_ids = Vec::with_capacity(wordlist.len());
        let mut first_empty = None;

        for (id, keyword) in wordlist.iter() {
            if keyword.is_empty() {
                first_empty.get_or_insert(id);
            } else {
                patterns.push(keyword);
                pattern_ids.push(id);
            }
        }

        // Overlapping search needs Standard semantics so every occurrence is reported
        let ac = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .build(&patterns);

        match ac {
            Ok(ac) => Some(Self {
                ac,
                pattern_ids,
                first_empty,
            }),
            Err(e) => {
                tracing::warn!("Failed to build keyword automaton, using linear scan: {}", e);
                None
            }
        }
    }

    fn lowest_id(&self, normalized: &str) -> Option<usize> {
        // Nothing can beat an empty keyword at id 0
        if self.first_empty == Some(0) {
            return Some(0);
        }

        let mut best = self.first_empty;
        for mat in self.ac.find_overlapping_iter(normalized) {
            let id = self.pattern_ids[mat.pattern().as_usize()];
            if best.map_or(true, |b| id < b) {
                best = Some(id);
                if id == 0 {
                    break;
                }
            }
        }
        best
    }
}

impl KeywordMatcher {
    pub fn new(wordlist: Wordlist) -> Self {
        Self::with_config(wordlist, MatcherConfig::default())
    }

    pub fn with_config(wordlist: Wordlist, config: MatcherConfig) -> Self {
        let automaton = if config.uses_automaton(wordlist.len()) {
            Automaton::build(&wordlist)
        } else {
            None
        };

        Self {
            wordlist,
            automaton,
            config,
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn uses_automaton(&self) -> bool {
        self.automaton.is_some()
    }

    /// Label a line given in raw form.
    pub fn label(&self, raw_text: &str) -> Label {
        self.label_normalized(&normalize(raw_text))
    }

    /// Label text that already went through [`normalize`].
    pub fn label_normalized(&self, normalized: &str) -> Label {
        let id = match &self.automaton {
            Some(automaton) => automaton.lowest_id(normalized),
            None => linear_scan(normalized, &self.wordlist),
        };

        id.map(|id| matched(&self.wordlist, id))
            .unwrap_or(Label::Other)
    }
}
