use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use log_groundtruth::config::{DatasetsConfig, RunSettings};
use log_groundtruth::orchestrator::{FailurePolicy, GroundTruth};
use log_groundtruth::preprocess::BundleFilePreprocessor;
use log_groundtruth::wordlist::DirectoryWordlistProvider;

#[derive(Parser)]
#[command(name = "groundtruth")]
#[command(about = "Label raw log lines with wordlist categories to build ground truth")]
#[command(version)]
struct Args {
    /// Datasets to label (section names in the dataset configuration)
    #[arg(value_name = "DATASET", required_unless_present = "list")]
    datasets: Vec<String>,

    /// Dataset configuration file (INI, or JSON with a .json extension)
    #[arg(short = 'c', long = "config", env = "GROUNDTRUTH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding {log_type}.txt wordlists
    #[arg(short = 'w', long = "wordlist-dir", env = "GROUNDTRUTH_WORDLIST_DIR")]
    wordlist_dir: Option<PathBuf>,

    /// Directory holding {file}.bundle.json preprocessing output (default: next to each log file)
    #[arg(short = 'b', long = "bundle-dir", env = "GROUNDTRUTH_BUNDLE_DIR")]
    bundle_dir: Option<PathBuf>,

    /// Stop at the first file that fails
    #[arg(long)]
    fail_fast: bool,

    /// Label the files of each log type in parallel
    #[arg(long)]
    parallel: bool,

    /// Write {labeled_file}.labels.json with the line id -> label map
    #[arg(long)]
    write_label_map: bool,

    /// List configured datasets and exit
    #[arg(long)]
    list: bool,

    /// Debug logging, including unmatched lines
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when some file could not be labeled.
fn run(args: Args) -> Result<bool> {
    let mut settings = RunSettings::from_env();
    if let Some(config) = args.config {
        settings.config_path = config;
    }
    if let Some(dir) = args.wordlist_dir {
        settings.wordlist_dir = dir;
    }
    if args.bundle_dir.is_some() {
        settings.bundle_dir = args.bundle_dir;
    }
    settings.log_config();

    let config = DatasetsConfig::from_file(&settings.config_path)
        .context("Failed to load dataset configuration")?;

    if args.list {
        for name in config.dataset_names() {
            let dataset = config.dataset(name)?;
            println!("{}", name);
            for log_type in &dataset.log_types {
                println!("  {}: {}", log_type.log_type, log_type.files.join(", "));
            }
        }
        return Ok(true);
    }

    config.log_config();

    let preprocessor = match &settings.bundle_dir {
        Some(dir) => BundleFilePreprocessor::with_bundle_dir(dir),
        None => BundleFilePreprocessor::new(),
    };

    let ground_truth = GroundTruth::new(
        config,
        Box::new(DirectoryWordlistProvider::new(&settings.wordlist_dir)),
        Box::new(preprocessor),
    )
    .with_failure_policy(if args.fail_fast {
        FailurePolicy::FailFast
    } else {
        FailurePolicy::Continue
    })
    .with_parallelism(args.parallel)
    .with_label_map_persistence(args.write_label_map);

    let report = ground_truth
        .run_all(&args.datasets)
        .context("Ground truth run aborted")?;

    for dataset in &report.datasets {
        dataset.log_summary();
    }
    info!(
        "✅ Done: {} datasets, {} files",
        report.datasets.len(),
        report.file_count()
    );

    Ok(!report.has_failures())
}
