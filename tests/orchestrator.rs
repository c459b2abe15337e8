// End-to-end runs over a dataset laid out in a temp directory

use log_groundtruth::aggregation::{AbstractionHook, AggregationContext};
use log_groundtruth::config::DatasetsConfig;
use log_groundtruth::error::{GroundTruthError, Result};
use log_groundtruth::orchestrator::{FailurePolicy, GroundTruth};
use log_groundtruth::preprocess::BundleFilePreprocessor;
use log_groundtruth::wordlist::DirectoryWordlistProvider;
use std::fs;
use std::sync::{Arc, Mutex};

const AUTH_LOG: &str = "Failed password for root\nsession opened for user alice\nNew seat seat0.\n";

const AUTH_BUNDLE: &str = r#"{
    "raw_logs": {
        "1": "Failed password for root\n",
        "2": "session opened for user alice\n",
        "3": "New seat seat0.\n"
    },
    "message_length_group": {"5": ["E2", "E1"], "3": ["E3"]},
    "event_attributes": {
        "E1": {"member": [["1"]]},
        "E2": {"member": [["2"]]},
        "E3": {"member": [["3"]]}
    },
    "parsed_logs": {}
}"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
}

impl Fixture {
    /// casper-rw with log types auth (auth.log, auth.log.1) and syslog (syslog)
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        fs::create_dir_all(root.join("logs")).unwrap();
        fs::create_dir_all(root.join("wordlist")).unwrap();
        fs::write(root.join("wordlist/auth.txt"), "failed password\nsession opened\n").unwrap();
        fs::write(root.join("wordlist/syslog.txt"), "kernel\n").unwrap();

        for name in ["auth.log", "auth.log.1"] {
            fs::write(root.join("logs").join(name), AUTH_LOG).unwrap();
            fs::write(root.join("logs").join(format!("{}.bundle.json", name)), AUTH_BUNDLE).unwrap();
        }

        let config = format!(
            "[DEFAULT]\nroot = {root}\n\n\
             [casper-rw]\n\
             base_dir = %(root)s/logs\n\
             labeled_dir = %(root)s/labeled/casper-rw\n\
             auth = auth.log\n    auth.log.1\n\
             syslog = syslog\n\n\
             [casper-rw-logtype]\n\
             logtype = auth\n    syslog\n",
            root = root.display()
        );
        fs::write(root.join("datasets.conf"), config).unwrap();

        Self { _dir: dir, root }
    }

    fn ground_truth(&self) -> GroundTruth {
        let config = DatasetsConfig::from_file(self.root.join("datasets.conf")).unwrap();
        GroundTruth::new(
            config,
            Box::new(DirectoryWordlistProvider::new(self.root.join("wordlist"))),
            Box::new(BundleFilePreprocessor::new()),
        )
    }

    fn labeled(&self, name: &str) -> std::path::PathBuf {
        self.root.join("labeled/casper-rw").join(name)
    }
}

#[test]
fn test_dataset_run_continues_after_failure() {
    let fixture = Fixture::new();
    let report = fixture.ground_truth().run("casper-rw").unwrap();

    assert_eq!(report.files.len(), 3);
    assert_eq!(report.succeeded(), 2);

    // E2 comes before E1 in the first length group
    let expected_order = "1; session opened; 2; session opened for user alice\n\
                          0; failed password; 1; Failed password for root\n\
                          -1; other; 3; New seat seat0.\n";
    assert_eq!(fs::read_to_string(fixture.labeled("auth.log")).unwrap(), expected_order);
    assert_eq!(fs::read_to_string(fixture.labeled("auth.log.1")).unwrap(), expected_order);

    // syslog has no log file and no bundle
    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].file_name, "syslog");
    assert!(matches!(
        failed[0].result,
        Err(GroundTruthError::NotFound { what: "Log file", .. })
    ));
    assert!(!fixture.labeled("syslog").exists());
    assert!(!fixture.labeled("syslog.partial").exists());

    let stats = report.total_stats();
    assert_eq!(stats.records, 6);
    assert_eq!(stats.matched, 4);
    assert_eq!(stats.unmatched, 2);
    assert!(report.has_failures());
}

#[test]
fn test_fail_fast_stops_at_first_error() {
    let fixture = Fixture::new();
    fs::remove_file(fixture.root.join("logs/auth.log.bundle.json")).unwrap();

    let err = fixture
        .ground_truth()
        .with_failure_policy(FailurePolicy::FailFast)
        .run("casper-rw")
        .unwrap_err();

    assert!(matches!(
        err,
        GroundTruthError::NotFound { what: "Preprocessed bundle", .. }
    ));
    assert!(!fixture.labeled("auth.log.1").exists());
}

#[test]
fn test_inconsistent_bundle_leaves_no_output() {
    let fixture = Fixture::new();
    let broken = AUTH_BUNDLE.replace(r#"[["3"]]"#, r#"[["3", "404"]]"#);
    fs::write(fixture.root.join("logs/auth.log.1.bundle.json"), broken).unwrap();

    let report = fixture.ground_truth().run("casper-rw").unwrap();
    let outcome = report
        .files
        .iter()
        .find(|f| f.file_name == "auth.log.1")
        .unwrap();

    assert!(matches!(outcome.result, Err(GroundTruthError::DataConsistency(_))));
    assert!(!fixture.labeled("auth.log.1").exists());
    assert!(!fixture.labeled("auth.log.1.partial").exists());
    assert!(fixture.labeled("auth.log").exists());
}

#[test]
fn test_missing_wordlist_fails_file() {
    let fixture = Fixture::new();
    fs::remove_file(fixture.root.join("wordlist/auth.txt")).unwrap();

    let report = fixture.ground_truth().run("casper-rw").unwrap();
    assert_eq!(report.succeeded(), 0);
    assert!(report.files.iter().take(2).all(|f| matches!(
        f.result,
        Err(GroundTruthError::NotFound { what: "Wordlist", .. })
    )));
}

#[test]
fn test_unknown_dataset_is_configuration_error() {
    let fixture = Fixture::new();
    let err = fixture.ground_truth().run_all(&["casper-rw", "dfrws-2016"]).unwrap_err();
    assert!(matches!(err, GroundTruthError::Configuration(_)));
    assert!(err.is_fatal_for_run());
}

#[test]
fn test_parallel_matches_sequential() {
    let fixture = Fixture::new();
    fixture.ground_truth().run("casper-rw").unwrap();
    let sequential = fs::read_to_string(fixture.labeled("auth.log")).unwrap();

    let report = fixture
        .ground_truth()
        .with_parallelism(true)
        .run("casper-rw")
        .unwrap();

    let order: Vec<&str> = report.files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(order, vec!["auth.log", "auth.log.1", "syslog"]);
    assert_eq!(fs::read_to_string(fixture.labeled("auth.log")).unwrap(), sequential);
    assert_eq!(fs::read_to_string(fixture.labeled("auth.log.1")).unwrap(), sequential);
}

#[test]
fn test_parallel_run_with_file_listed_twice() {
    let fixture = Fixture::new();
    let conf = fixture.root.join("datasets.conf");
    let config = fs::read_to_string(&conf)
        .unwrap()
        .replace("    auth.log.1\n", "    auth.log.1\n    auth.log\n");
    fs::write(&conf, config).unwrap();

    let report = fixture
        .ground_truth()
        .with_parallelism(true)
        .run("casper-rw")
        .unwrap();

    let order: Vec<&str> = report.files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(order, vec!["auth.log", "auth.log.1", "syslog"]);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(
        fs::read_to_string(fixture.labeled("auth.log")).unwrap(),
        fs::read_to_string(fixture.labeled("auth.log.1")).unwrap()
    );
    assert!(!fixture.labeled("auth.log.partial").exists());
}

#[test]
fn test_rerun_overwrites_with_same_content() {
    let fixture = Fixture::new();
    fixture.ground_truth().run("casper-rw").unwrap();
    let first = fs::read_to_string(fixture.labeled("auth.log")).unwrap();

    // labeled dir already exists on the second run
    fixture.ground_truth().run("casper-rw").unwrap();
    assert_eq!(fs::read_to_string(fixture.labeled("auth.log")).unwrap(), first);
}

#[test]
fn test_label_map_persistence() {
    let fixture = Fixture::new();
    let report = fixture
        .ground_truth()
        .with_label_map_persistence(true)
        .run("casper-rw")
        .unwrap();

    let summary = report.files[0].result.as_ref().unwrap();
    let path = summary.label_map_file.as_ref().unwrap();
    assert_eq!(path, &fixture.labeled("auth.log.labels.json"));
    assert_eq!(fs::read_to_string(path).unwrap(), r#"{"1":0,"2":1,"3":-1}"#);
}

struct RecordingHook {
    calls: Arc<Mutex<Vec<(String, usize)>>>,
}

impl AbstractionHook for RecordingHook {
    fn aggregate(&self, ctx: &AggregationContext<'_>) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((ctx.log_type.to_string(), ctx.files.len()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[test]
fn test_hook_runs_once_per_log_type() {
    let fixture = Fixture::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    fixture
        .ground_truth()
        .with_hook(Box::new(RecordingHook {
            calls: Arc::clone(&calls),
        }))
        .run("casper-rw")
        .unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![("auth".to_string(), 2), ("syslog".to_string(), 0)]
    );
}

#[test]
fn test_labeled_dir_creation_failure_is_fatal() {
    let fixture = Fixture::new();
    // a plain file where the labeled directory's parent should be
    fs::write(fixture.root.join("labeled"), "not a directory").unwrap();

    let err = fixture.ground_truth().run("casper-rw").unwrap_err();
    assert!(matches!(err, GroundTruthError::Filesystem { .. }));
    assert!(fixture.root.join("labeled").is_file());
}
