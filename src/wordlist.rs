/// Per-log-type keyword lists
///
/// A wordlist file holds one keyword per line. The zero-based line position
/// is the label id, so lines are never dropped or reordered.
use crate::error::{GroundTruthError, Result};
use rustc_hash::FxHashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Wordlist {
    keywords: Vec<String>,
}

impl Wordlist {
    pub fn from_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse wordlist text. Every line is trimmed; blank lines stay as empty keywords.
    pub fn parse(text: &str) -> Self {
        Self {
            keywords: text.lines().map(|line| line.trim().to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.keywords.get(id).map(|s| s.as_str())
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.keywords.iter().enumerate().map(|(i, k)| (i, k.as_str()))
    }

    /// Ids of keywords that repeat an earlier entry and can never win.
    pub fn shadowed_duplicates(&self) -> Vec<usize> {
        let mut seen = FxHashSet::default();
        self.iter()
            .filter(|(_, keyword)| !seen.insert(*keyword))
            .map(|(id, _)| id)
            .collect()
    }
}

/// Source of wordlists, keyed by log type
pub trait WordlistProvider: Send + Sync {
    fn load(&self, log_type: &str) -> Result<Wordlist>;

    fn name(&self) -> &str;
}

/// Reads `{log_type}.txt` from a directory
pub struct DirectoryWordlistProvider {
    directory: PathBuf,
}

impl DirectoryWordlistProvider {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl WordlistProvider for DirectoryWordlistProvider {
    fn load(&self, log_type: &str) -> Result<Wordlist> {
        load(log_type, &self.directory)
    }

    fn name(&self) -> &str {
        "directory"
    }
}

/// Load the wordlist of `log_type` from `directory`.
pub fn load(log_type: &str, directory: &Path) -> Result<Wordlist> {
    let path = directory.join(format!("{}.txt", log_type));
    let text = fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GroundTruthError::NotFound {
                what: "Wordlist",
                path: path.clone(),
            }
        } else {
            GroundTruthError::io(format!("reading wordlist {}", path.display()), e)
        }
    })?;

    let wordlist = Wordlist::parse(&text);

    if let Some(id) = wordlist.keywords().iter().position(|k| k.is_empty()) {
        tracing::warn!(
            "Wordlist {} has an empty keyword at line {}; it matches every log line",
            path.display(),
            id + 1
        );
    }
    for id in wordlist.shadowed_duplicates() {
        tracing::debug!(
            "Wordlist {}: keyword {:?} at id {} repeats an earlier entry",
            path.display(),
            wordlist.get(id).unwrap_or_default(),
            id
        );
    }

    tracing::debug!("Loaded {} keywords for log type '{}'", wordlist.len(), log_type);
    Ok(wordlist)
}

/// In-memory provider for tests and embedding
pub struct StaticWordlistProvider {
    wordlists: Vec<(String, Wordlist)>,
}

impl StaticWordlistProvider {
    pub fn new() -> Self {
        Self {
            wordlists: Vec::new(),
        }
    }

    pub fn with(mut self, log_type: &str, wordlist: Wordlist) -> Self {
        self.wordlists.push((log_type.to_string(), wordlist));
        self
    }
}

impl Default for StaticWordlistProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl WordlistProvider for StaticWordlistProvider {
    fn load(&self, log_type: &str) -> Result<Wordlist> {
        self.wordlists
            .iter()
            .find(|(name, _)| name == log_type)
            .map(|(_, wordlist)| wordlist.clone())
            .ok_or_else(|| GroundTruthError::NotFound {
                what: "Wordlist",
                path: PathBuf::from(format!("{}.txt", log_type)),
            })
    }

    fn name(&self) -> &str {
        "static"
    }
}
