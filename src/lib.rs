// Core modules
pub mod assigner;
pub mod error;
pub mod keyword_matcher;
pub mod label;
pub mod matcher_config;
pub mod wordlist;

// Inputs and outputs around the labeling core
pub mod aggregation;
pub mod config;
pub mod ini;
pub mod output;
pub mod preprocess;

pub mod orchestrator;

pub use assigner::{LabelAssigner, LabelOutcome};
pub use config::{ConfigValue, DatasetConfig, DatasetsConfig, RunSettings};
pub use error::{GroundTruthError, Result};
pub use keyword_matcher::{assign_label, KeywordMatcher, Label};
pub use label::{LabelMap, LabelRecord, LabelStats};
pub use orchestrator::{FailurePolicy, GroundTruth, RunReport};
pub use preprocess::{LogPreprocessor, PreprocessedBundle};
pub use wordlist::{Wordlist, WordlistProvider};
