use std::path::PathBuf;

/// Errors raised while producing ground-truth labels.
///
/// The variants follow how far a failure reaches: configuration problems
/// end the whole run, filesystem problems end a dataset, everything else
/// ends only the file being labeled.
#[derive(Debug, thiserror::Error)]
pub enum GroundTruthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    #[error("Cannot create directory '{}': {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inconsistent preprocessed data: {0}")]
    DataConsistency(String),

    #[error("IO error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl GroundTruthError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        GroundTruthError::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error must stop the whole run rather than one file.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            GroundTruthError::Configuration(_) | GroundTruthError::Filesystem { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GroundTruthError>;
