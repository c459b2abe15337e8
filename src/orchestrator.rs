/// Ground-truth run over configured datasets
///
/// For each dataset, each log type and each of its files:
/// load wordlist -> load preprocessed bundle -> assign and write labels.
/// After the files of a log type, the aggregation hook runs.
use crate::aggregation::{AbstractionHook, AggregationContext, LabeledFile, NoopAbstraction};
use crate::assigner::LabelAssigner;
use crate::config::{DatasetConfig, DatasetsConfig};
use crate::error::{GroundTruthError, Result};
use crate::keyword_matcher::KeywordMatcher;
use crate::label::{LabelMap, LabelStats};
use crate::matcher_config::MatcherConfig;
use crate::output::{ensure_dir, write_label_map, StagedOutput};
use crate::preprocess::LogPreprocessor;
use crate::wordlist::WordlistProvider;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// What to do when one file fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and go on with the next file
    #[default]
    Continue,
    /// Stop the run at the first failed file
    FailFast,
}

#[derive(Debug, Clone)]
pub struct FileSummary {
    pub stats: LabelStats,
    pub label_map_file: Option<PathBuf>,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub log_type: String,
    pub file_name: String,
    pub labeled_file: PathBuf,
    pub result: Result<FileSummary>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct DatasetReport {
    pub dataset: String,
    pub files: Vec<FileOutcome>,
    pub aggregation_errors: Vec<(String, GroundTruthError)>,
    pub elapsed: Duration,
}

impl DatasetReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some() || !self.aggregation_errors.is_empty()
    }

    pub fn total_stats(&self) -> LabelStats {
        let mut total = LabelStats::default();
        for file in &self.files {
            if let Ok(summary) = &file.result {
                total.merge(&summary.stats);
            }
        }
        total
    }

    pub fn log_summary(&self) {
        let stats = self.total_stats();
        info!("📊 Dataset {}", self.dataset);
        info!(
            "   Files:     {} labeled, {} failed ({:.2}s)",
            self.succeeded(),
            self.files.len() - self.succeeded(),
            self.elapsed.as_secs_f64()
        );
        info!(
            "   Records:   {} ({} matched, {} other, {:.1}% coverage)",
            stats.records,
            stats.matched,
            stats.unmatched,
            stats.coverage()
        );
        for file in self.failed() {
            if let Err(e) = &file.result {
                warn!("   ✗ {}/{}: {}", file.log_type, file.file_name, e);
            }
        }
        for (log_type, e) in &self.aggregation_errors {
            warn!("   ✗ aggregation for {}: {}", log_type, e);
        }
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub datasets: Vec<DatasetReport>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.datasets.iter().any(|d| d.has_failures())
    }

    pub fn file_count(&self) -> usize {
        self.datasets.iter().map(|d| d.files.len()).sum()
    }
}

pub struct GroundTruth {
    config: DatasetsConfig,
    wordlists: Box<dyn WordlistProvider>,
    preprocessor: Box<dyn LogPreprocessor>,
    hook: Box<dyn AbstractionHook>,
    matcher_config: MatcherConfig,
    failure_policy: FailurePolicy,
    parallel: bool,
    persist_label_maps: bool,
}

impl GroundTruth {
    pub fn new(
        config: DatasetsConfig,
        wordlists: Box<dyn WordlistProvider>,
        preprocessor: Box<dyn LogPreprocessor>,
    ) -> Self {
        Self {
            config,
            wordlists,
            preprocessor,
            hook: Box::new(NoopAbstraction),
            matcher_config: MatcherConfig::default(),
            failure_policy: FailurePolicy::default(),
            parallel: false,
            persist_label_maps: false,
        }
    }

    pub fn with_hook(mut self, hook: Box<dyn AbstractionHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn with_matcher_config(mut self, config: MatcherConfig) -> Self {
        self.matcher_config = config;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Label the files of a log type on the rayon pool
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Also write `{labeled_file}.labels.json` for every labeled file
    pub fn with_label_map_persistence(mut self, enabled: bool) -> Self {
        self.persist_label_maps = enabled;
        self
    }

    pub fn config(&self) -> &DatasetsConfig {
        &self.config
    }

    pub fn run_all<S: AsRef<str>>(&self, datasets: &[S]) -> Result<RunReport> {
        let mut report = RunReport::default();
        for dataset in datasets {
            report.datasets.push(self.run(dataset.as_ref())?);
        }
        Ok(report)
    }

    pub fn run(&self, dataset: &str) -> Result<DatasetReport> {
        let start = Instant::now();
        let dataset = self.config.dataset(dataset)?;
        ensure_dir(&dataset.labeled_dir)?;

        info!(
            "🚀 Labeling dataset {} ({} files, {} log types)",
            dataset.name,
            dataset.file_count(),
            dataset.log_types.len()
        );

        let mut report = DatasetReport {
            dataset: dataset.name.clone(),
            files: Vec::with_capacity(dataset.file_count()),
            aggregation_errors: Vec::new(),
            elapsed: Duration::ZERO,
        };

        for log_type in &dataset.log_types {
            let LogTypeOutcomes { outcomes, labels } =
                self.label_log_type(&dataset, &log_type.log_type, &log_type.files)?;

            // Label maps are handed to the hook and dropped afterwards
            let labeled: Vec<LabeledFile> = outcomes
                .iter()
                .zip(labels)
                .filter_map(|(outcome, labels)| {
                    labels.map(|labels| LabeledFile {
                        file_name: outcome.file_name.clone(),
                        labeled_file: outcome.labeled_file.clone(),
                        labels,
                    })
                })
                .collect();

            let ctx = AggregationContext {
                dataset: &dataset.name,
                log_type: &log_type.log_type,
                files: &labeled,
            };
            if let Err(e) = self.hook.aggregate(&ctx) {
                error!("Aggregation hook '{}' failed for {}: {}", self.hook.name(), log_type.log_type, e);
                if self.failure_policy == FailurePolicy::FailFast {
                    return Err(e);
                }
                report.aggregation_errors.push((log_type.log_type.clone(), e));
            }

            report.files.extend(outcomes);
        }

        report.elapsed = start.elapsed();
        Ok(report)
    }

    fn label_log_type(
        &self,
        dataset: &DatasetConfig,
        log_type: &str,
        files: &[String],
    ) -> Result<LogTypeOutcomes> {
        let mut results: Vec<(FileOutcome, Option<LabelMap>)> = if self.parallel {
            files
                .par_iter()
                .map(|file_name| self.label_file(dataset, log_type, file_name))
                .collect()
        } else {
            let mut results = Vec::with_capacity(files.len());
            for file_name in files {
                let result = self.label_file(dataset, log_type, file_name);
                let stop = match &result.0.result {
                    Err(e) => self.failure_policy == FailurePolicy::FailFast || e.is_fatal_for_run(),
                    Ok(_) => false,
                };
                results.push(result);
                if stop {
                    break;
                }
            }
            results
        };

        let fail_fast = self.failure_policy == FailurePolicy::FailFast;
        let first_fatal = results.iter().position(|(outcome, _)| match &outcome.result {
            Err(e) => fail_fast || e.is_fatal_for_run(),
            Ok(_) => false,
        });
        if let Some(pos) = first_fatal {
            if let (FileOutcome { result: Err(e), .. }, _) = results.swap_remove(pos) {
                return Err(e);
            }
        }

        let (outcomes, labels) = results.into_iter().unzip();
        Ok(LogTypeOutcomes { outcomes, labels })
    }

    fn label_file(
        &self,
        dataset: &DatasetConfig,
        log_type: &str,
        file_name: &str,
    ) -> (FileOutcome, Option<LabelMap>) {
        let labeled_file = dataset.labeled_path(file_name);
        let result = self.label_file_stages(dataset, log_type, file_name, &labeled_file);

        let (result, labels) = match result {
            Ok((summary, labels)) => {
                info!(
                    "🏷️  Labeled file: {} ({} records, {} other)",
                    labeled_file.display(),
                    summary.stats.records,
                    summary.stats.unmatched
                );
                (Ok(summary), Some(labels))
            }
            Err(e) => {
                error!("❌ {}/{}: {}", log_type, file_name, e);
                (Err(e), None)
            }
        };

        let outcome = FileOutcome {
            log_type: log_type.to_string(),
            file_name: file_name.to_string(),
            labeled_file,
            result,
        };
        (outcome, labels)
    }

    fn label_file_stages(
        &self,
        dataset: &DatasetConfig,
        log_type: &str,
        file_name: &str,
        labeled_file: &Path,
    ) -> Result<(FileSummary, LabelMap)> {
        let wordlist = self.wordlists.load(log_type)?;
        let matcher = KeywordMatcher::with_config(wordlist, self.matcher_config.clone());

        let bundle = self.preprocessor.preprocess(&dataset.input_path(file_name))?;

        let mut output = StagedOutput::create(labeled_file)?;
        let outcome = LabelAssigner::new(&matcher).assign_with_stats(&bundle, &mut output)?;
        output.commit()?;

        let label_map_file = if self.persist_label_maps {
            Some(write_label_map(labeled_file, &outcome.labels)?)
        } else {
            None
        };

        Ok((
            FileSummary {
                stats: outcome.stats,
                label_map_file,
            },
            outcome.labels,
        ))
    }
}

struct LogTypeOutcomes {
    outcomes: Vec<FileOutcome>,
    labels: Vec<Option<LabelMap>>,
}
