/// Preprocessed log bundles
///
/// Template mining and clustering happen outside this crate. What arrives
/// here is their result for one log file: the raw lines by id, events
/// grouped by message length, and the line ids each event covers.
use crate::error::{GroundTruthError, Result};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const BUNDLE_EXTENSION: &str = "bundle.json";

/// Attributes of one event (cluster). Only `member` is used for labeling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttributes {
    #[serde(deserialize_with = "ids::groups")]
    pub member: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessedBundle {
    pub raw_logs: FxHashMap<String, String>,
    #[serde(deserialize_with = "ids::length_groups")]
    pub message_length_group: IndexMap<usize, IndexSet<String>>,
    pub event_attributes: FxHashMap<String, EventAttributes>,
    /// Parser output carried along for other consumers
    #[serde(default)]
    pub parsed_logs: serde_json::Value,
}

impl PreprocessedBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line(mut self, line_id: &str, raw_text: &str) -> Self {
        self.raw_logs.insert(line_id.to_string(), raw_text.to_string());
        self
    }

    /// Append an event to a length group, creating the group on first use.
    pub fn with_event(mut self, message_length: usize, event_id: &str, member: Vec<Vec<&str>>) -> Self {
        self.message_length_group
            .entry(message_length)
            .or_default()
            .insert(event_id.to_string());
        self.event_attributes.insert(
            event_id.to_string(),
            EventAttributes {
                member: member
                    .into_iter()
                    .map(|group| group.into_iter().map(|id| id.to_string()).collect())
                    .collect(),
            },
        );
        self
    }

    /// Line-id occurrences reached by traversal, duplicates included.
    pub fn membership_count(&self) -> usize {
        self.message_length_group
            .values()
            .flat_map(|events| events.iter())
            .filter_map(|event_id| self.event_attributes.get(event_id))
            .flat_map(|attrs| attrs.member.iter())
            .map(|group| group.len())
            .sum()
    }

    pub fn event_count(&self) -> usize {
        self.message_length_group.values().map(|events| events.len()).sum()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| GroundTruthError::DataConsistency(format!("malformed bundle: {}", e)))
    }
}

/// Produces the bundle for one log file
pub trait LogPreprocessor: Send + Sync {
    fn preprocess(&self, log_file: &Path) -> Result<PreprocessedBundle>;

    fn name(&self) -> &str;
}

/// Reads bundles written by an external preprocessing run.
///
/// The bundle of `logs/auth.log` is `logs/auth.log.bundle.json`, or
/// `{bundle_dir}/auth.log.bundle.json` when a bundle directory is set.
pub struct BundleFilePreprocessor {
    bundle_dir: Option<PathBuf>,
}

impl BundleFilePreprocessor {
    pub fn new() -> Self {
        Self { bundle_dir: None }
    }

    pub fn with_bundle_dir(bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_dir: Some(bundle_dir.into()),
        }
    }

    pub fn bundle_path(&self, log_file: &Path) -> PathBuf {
        let file_name = log_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bundle_name = format!("{}.{}", file_name, BUNDLE_EXTENSION);

        match &self.bundle_dir {
            Some(dir) => dir.join(bundle_name),
            None => log_file.with_file_name(bundle_name),
        }
    }
}

impl Default for BundleFilePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl LogPreprocessor for BundleFilePreprocessor {
    fn preprocess(&self, log_file: &Path) -> Result<PreprocessedBundle> {
        if !log_file.is_file() {
            return Err(GroundTruthError::NotFound {
                what: "Log file",
                path: log_file.to_path_buf(),
            });
        }

        let bundle_path = self.bundle_path(log_file);
        let text = fs::read_to_string(&bundle_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GroundTruthError::NotFound {
                    what: "Preprocessed bundle",
                    path: bundle_path.clone(),
                }
            } else {
                GroundTruthError::io(format!("reading bundle {}", bundle_path.display()), e)
            }
        })?;

        let bundle = PreprocessedBundle::from_json(&text)?;
        tracing::debug!(
            "Loaded bundle {}: {} lines, {} events",
            bundle_path.display(),
            bundle.raw_logs.len(),
            bundle.event_count()
        );
        Ok(bundle)
    }

    fn name(&self) -> &str {
        "bundle-file"
    }
}

/// Bundles held in memory, keyed by log file path
pub struct InMemoryPreprocessor {
    bundles: FxHashMap<PathBuf, PreprocessedBundle>,
}

impl InMemoryPreprocessor {
    pub fn new() -> Self {
        Self {
            bundles: FxHashMap::default(),
        }
    }

    pub fn with_bundle(mut self, log_file: impl Into<PathBuf>, bundle: PreprocessedBundle) -> Self {
        self.bundles.insert(log_file.into(), bundle);
        self
    }
}

impl Default for InMemoryPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl LogPreprocessor for InMemoryPreprocessor {
    fn preprocess(&self, log_file: &Path) -> Result<PreprocessedBundle> {
        self.bundles
            .get(log_file)
            .cloned()
            .ok_or_else(|| GroundTruthError::NotFound {
                what: "Log file",
                path: log_file.to_path_buf(),
            })
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// Identifier fields may be JSON strings or integers, depending on the
/// producer; both become strings.
mod ids {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    impl From<Id> for String {
        fn from(id: Id) -> Self {
            match id {
                Id::Text(s) => s,
                Id::Number(n) => n.to_string(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LengthGroups {
        // Object keys stay strings here; buffered untagged content cannot turn them into integers
        Map(IndexMap<String, Vec<Id>>),
        Pairs(Vec<(usize, Vec<Id>)>),
    }

    pub fn groups<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<Vec<Id>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|group| group.into_iter().map(String::from).collect())
            .collect())
    }

    pub fn length_groups<'de, D>(
        deserializer: D,
    ) -> std::result::Result<IndexMap<usize, IndexSet<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs: Vec<(usize, Vec<Id>)> = match LengthGroups::deserialize(deserializer)? {
            LengthGroups::Map(map) => map
                .into_iter()
                .map(|(length, events)| {
                    length
                        .trim()
                        .parse::<usize>()
                        .map(|length| (length, events))
                        .map_err(|_| {
                            serde::de::Error::custom(format!(
                                "message length '{}' is not a non-negative integer",
                                length
                            ))
                        })
                })
                .collect::<std::result::Result<_, D::Error>>()?,
            LengthGroups::Pairs(pairs) => pairs,
        };

        let mut groups: IndexMap<usize, IndexSet<String>> = IndexMap::new();
        for (length, events) in pairs {
            groups
                .entry(length)
                .or_default()
                .extend(events.into_iter().map(String::from));
        }
        Ok(groups)
    }
}
