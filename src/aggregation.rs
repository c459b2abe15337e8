/// Per-abstraction aggregation hook
///
/// Called once per log type after all of its files were labeled. Building
/// per-label abstractions out of the label maps is not implemented here;
/// embedders supply their own hook when they need it.
use crate::error::Result;
use crate::label::LabelMap;
use std::path::PathBuf;

/// Label map of one successfully labeled file
#[derive(Debug, Clone)]
pub struct LabeledFile {
    pub file_name: String,
    pub labeled_file: PathBuf,
    pub labels: LabelMap,
}

pub struct AggregationContext<'a> {
    pub dataset: &'a str,
    pub log_type: &'a str,
    pub files: &'a [LabeledFile],
}

pub trait AbstractionHook: Send + Sync {
    fn aggregate(&self, ctx: &AggregationContext<'_>) -> Result<()>;

    fn name(&self) -> &str;
}

/// Default hook. Does nothing beyond a debug line.
pub struct NoopAbstraction;

impl AbstractionHook for NoopAbstraction {
    fn aggregate(&self, ctx: &AggregationContext<'_>) -> Result<()> {
        tracing::debug!(
            "No abstraction aggregation for {}/{} ({} labeled files)",
            ctx.dataset,
            ctx.log_type,
            ctx.files.len()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}
