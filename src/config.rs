use crate::error::{GroundTruthError, Result};
use crate::ini::IniDocument;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "datasets.conf";
pub const DEFAULT_WORDLIST_DIR: &str = "wordlist";
const LOGTYPE_SUFFIX: &str = "-logtype";
const LOGTYPE_KEY: &str = "logtype";

/// A configuration value that is either one string or a list of strings.
///
/// INI values become a `List` when they span several lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Scalar(String),
    List(Vec<String>),
}

impl ConfigValue {
    pub fn from_raw(value: &str) -> Self {
        if value.contains('\n') {
            ConfigValue::List(value.split('\n').map(|s| s.to_string()).collect())
        } else {
            ConfigValue::Scalar(value.to_string())
        }
    }

    /// Normalize to an ordered sequence. Blank entries are dropped.
    pub fn into_list(self) -> Vec<String> {
        let items = match self {
            ConfigValue::Scalar(s) => vec![s],
            ConfigValue::List(items) => items,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(s) => Some(s.as_str()),
            ConfigValue::List(_) => None,
        }
    }
}

/// Files of one log type, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTypeFiles {
    pub log_type: String,
    pub files: Vec<String>,
}

/// Resolved configuration of a single dataset.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub name: String,
    pub base_dir: PathBuf,
    pub labeled_dir: PathBuf,
    pub log_types: Vec<LogTypeFiles>,
}

impl DatasetConfig {
    pub fn input_path(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(file_name)
    }

    pub fn labeled_path(&self, file_name: &str) -> PathBuf {
        self.labeled_dir.join(file_name)
    }

    pub fn file_count(&self) -> usize {
        self.log_types.iter().map(|lt| lt.files.len()).sum()
    }
}

type Section = IndexMap<String, ConfigValue>;

/// Dataset registry, loaded once per run and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct DatasetsConfig {
    source: PathBuf,
    sections: IndexMap<String, Section>,
}

impl DatasetsConfig {
    /// Load an INI registry, or a JSON one when the file ends in `.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            GroundTruthError::Configuration(format!(
                "cannot read dataset configuration '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            Self::from_json_str(&text)?
        } else {
            Self::from_ini_str(&text)?
        };
        config.source = path.to_path_buf();
        Ok(config)
    }

    pub fn from_ini_str(text: &str) -> Result<Self> {
        let doc = IniDocument::parse(text)?;
        let mut sections = IndexMap::new();

        for name in doc.sections() {
            let options = doc
                .items(name)?
                .into_iter()
                .map(|(key, value)| (key, ConfigValue::from_raw(&value)))
                .collect();
            sections.insert(name.to_string(), options);
        }

        Ok(Self {
            source: PathBuf::new(),
            sections,
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: IndexMap<String, IndexMap<String, ConfigValue>> = serde_json::from_str(text)
            .map_err(|e| {
                GroundTruthError::Configuration(format!("invalid JSON configuration: {}", e))
            })?;

        // Option names are case-insensitive, as in the INI form
        let sections = raw
            .into_iter()
            .map(|(name, options)| {
                let options = options
                    .into_iter()
                    .map(|(key, value)| (key.to_lowercase(), value))
                    .collect();
                (name, options)
            })
            .collect();

        Ok(Self {
            source: PathBuf::new(),
            sections,
        })
    }

    /// Names of sections that have a companion `{name}-logtype` section.
    pub fn dataset_names(&self) -> Vec<&str> {
        self.sections
            .keys()
            .filter(|name| {
                !name.ends_with(LOGTYPE_SUFFIX)
                    && self
                        .sections
                        .contains_key(&format!("{}{}", name, LOGTYPE_SUFFIX))
            })
            .map(|s| s.as_str())
            .collect()
    }

    /// Resolve one dataset into paths and per-log-type file lists.
    pub fn dataset(&self, name: &str) -> Result<DatasetConfig> {
        let section = self.sections.get(name).ok_or_else(|| {
            GroundTruthError::Configuration(format!("dataset '{}' is not configured", name))
        })?;

        let logtype_section_name = format!("{}{}", name, LOGTYPE_SUFFIX);
        let logtype_section = self.sections.get(&logtype_section_name).ok_or_else(|| {
            GroundTruthError::Configuration(format!(
                "dataset '{}' has no '{}' section",
                name, logtype_section_name
            ))
        })?;

        let log_type_names = match logtype_section.get(LOGTYPE_KEY) {
            Some(value) => value.clone().into_list(),
            None => logtype_section.keys().cloned().collect(),
        };

        let mut log_types = Vec::with_capacity(log_type_names.len());
        for log_type in log_type_names {
            let listed = section
                .get(&log_type.to_lowercase())
                .ok_or_else(|| {
                    GroundTruthError::Configuration(format!(
                        "dataset '{}' lists log type '{}' but has no '{}' key",
                        name, log_type, log_type
                    ))
                })?
                .clone()
                .into_list();

            // A file listed twice would be labeled twice into the same output path
            let files: IndexSet<String> = listed.iter().cloned().collect();
            if files.len() < listed.len() {
                tracing::warn!(
                    "Dataset '{}', log type '{}': {} duplicate file entries ignored",
                    name,
                    log_type,
                    listed.len() - files.len()
                );
            }
            log_types.push(LogTypeFiles {
                log_type,
                files: files.into_iter().collect(),
            });
        }

        Ok(DatasetConfig {
            name: name.to_string(),
            base_dir: PathBuf::from(required_scalar(section, name, "base_dir")?),
            labeled_dir: PathBuf::from(required_scalar(section, name, "labeled_dir")?),
            log_types,
        })
    }

    pub fn log_config(&self) {
        tracing::info!("📋 Dataset configuration: {}", self.source.display());
        for name in self.dataset_names() {
            match self.dataset(name) {
                Ok(dataset) => {
                    let log_types: Vec<&str> =
                        dataset.log_types.iter().map(|lt| lt.log_type.as_str()).collect();
                    tracing::info!(
                        "   {}: {} files, log types [{}]",
                        name,
                        dataset.file_count(),
                        log_types.join(", ")
                    );
                }
                Err(e) => tracing::warn!("   {}: {}", name, e),
            }
        }
    }
}

fn required_scalar(section: &Section, dataset: &str, key: &str) -> Result<String> {
    let value = section.get(key).ok_or_else(|| {
        GroundTruthError::Configuration(format!("dataset '{}' has no '{}' key", dataset, key))
    })?;
    value.as_scalar().map(|s| s.trim().to_string()).ok_or_else(|| {
        GroundTruthError::Configuration(format!(
            "dataset '{}': '{}' must be a single value",
            dataset, key
        ))
    })
}

/// Locations used by a run, taken from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub config_path: PathBuf,
    pub wordlist_dir: PathBuf,
    pub bundle_dir: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            wordlist_dir: PathBuf::from(DEFAULT_WORDLIST_DIR),
            bundle_dir: None,
        }
    }
}

impl RunSettings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            config_path: env::var("GROUNDTRUTH_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            wordlist_dir: env::var("GROUNDTRUTH_WORDLIST_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.wordlist_dir),
            bundle_dir: env::var("GROUNDTRUTH_BUNDLE_DIR").ok().map(PathBuf::from),
        }
    }

    pub fn log_config(&self) {
        tracing::info!("📋 Run settings:");
        tracing::info!("   Dataset config: {}", self.config_path.display());
        tracing::info!("   Wordlist dir:   {}", self.wordlist_dir.display());
        if let Some(ref dir) = self.bundle_dir {
            tracing::info!("   Bundle dir:     {}", dir.display());
        }
    }
}
