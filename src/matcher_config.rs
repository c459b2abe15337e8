use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub strategy: MatchStrategy,
    /// Wordlists shorter than this are scanned linearly even with `Automaton`
    pub min_automaton_keywords: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrategy {
    /// One aho-corasick pass per line, lowest keyword id wins
    Automaton,
    /// `contains` per keyword in id order, stops at the first hit
    Linear,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::Automaton,
            min_automaton_keywords: 4,
        }
    }
}

impl MatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn linear() -> Self {
        Self {
            strategy: MatchStrategy::Linear,
            ..Default::default()
        }
    }

    pub fn automaton() -> Self {
        Self {
            strategy: MatchStrategy::Automaton,
            min_automaton_keywords: 0,
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_min_automaton_keywords(mut self, count: usize) -> Self {
        self.min_automaton_keywords = count;
        self
    }

    pub(crate) fn uses_automaton(&self, keyword_count: usize) -> bool {
        self.strategy == MatchStrategy::Automaton && keyword_count >= self.min_automaton_keywords
    }
}
