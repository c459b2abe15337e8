/// Label assignment over a preprocessed bundle
///
/// Lines are visited in bundle order: message length group, then event,
/// then membership group, then line id. Output records follow that order,
/// not line order.
use crate::error::{GroundTruthError, Result};
use crate::keyword_matcher::{normalize, KeywordMatcher};
use crate::label::{LabelMap, LabelRecord, LabelStats};
use crate::preprocess::PreprocessedBundle;
use std::io::Write;

/// Target for unmatched-line diagnostics
pub const UNMATCHED_TARGET: &str = "groundtruth::unmatched";

#[derive(Debug, Clone, Default)]
pub struct LabelOutcome {
    pub labels: LabelMap,
    pub stats: LabelStats,
}

pub struct LabelAssigner<'a> {
    matcher: &'a KeywordMatcher,
}

impl<'a> LabelAssigner<'a> {
    pub fn new(matcher: &'a KeywordMatcher) -> Self {
        Self { matcher }
    }

    /// Label every line reachable through event membership and write one
    /// record per visit to `sink`.
    ///
    /// # Returns
    /// The line id -> label id map. A line id listed in several groups is
    /// written once per listing and keeps the label of its last visit.
    pub fn assign<W: Write>(&self, bundle: &PreprocessedBundle, sink: &mut W) -> Result<LabelMap> {
        self.assign_with_stats(bundle, sink).map(|outcome| outcome.labels)
    }

    pub fn assign_with_stats<W: Write>(
        &self,
        bundle: &PreprocessedBundle,
        sink: &mut W,
    ) -> Result<LabelOutcome> {
        let mut outcome = LabelOutcome::default();

        for (message_length, event_ids) in &bundle.message_length_group {
            for event_id in event_ids {
                let attributes = bundle.event_attributes.get(event_id).ok_or_else(|| {
                    GroundTruthError::DataConsistency(format!(
                        "event '{}' (message length {}) has no attributes",
                        event_id, message_length
                    ))
                })?;

                for line_ids in &attributes.member {
                    for line_id in line_ids {
                        let raw_text = bundle.raw_logs.get(line_id).ok_or_else(|| {
                            GroundTruthError::DataConsistency(format!(
                                "line '{}' of event '{}' has no raw text",
                                line_id, event_id
                            ))
                        })?;

                        let normalized = normalize(raw_text);
                        let label = self.matcher.label_normalized(&normalized);

                        if !label.is_matched() {
                            tracing::debug!(target: UNMATCHED_TARGET, "{}", normalized);
                        }

                        LabelRecord::write_fields(sink, &label, line_id, raw_text).map_err(|e| {
                            GroundTruthError::io(format!("writing record for line '{}'", line_id), e)
                        })?;

                        outcome.labels.insert(line_id.clone(), label.id());
                        outcome.stats.record(&label);
                    }
                }
            }
        }

        sink.flush()
            .map_err(|e| GroundTruthError::io("flushing labeled output", e))?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wordlist::Wordlist;

    fn matcher(words: &[&str]) -> KeywordMatcher {
        KeywordMatcher::new(Wordlist::from_keywords(words.iter().copied()))
    }

    #[test]
    fn test_traversal_order() {
        let bundle = PreprocessedBundle::new()
            .with_line("1", "sshd: Failed password for root\n")
            .with_line("2", "kernel: eth0 up\n")
            .with_line("3", "sshd: Accepted password for alice\n")
            .with_event(5, "E9", vec![vec!["3"], vec!["1"]])
            .with_event(2, "E1", vec![vec!["2"]]);

        let matcher = matcher(&["failed", "accepted"]);
        let mut out = Vec::new();
        let labels = LabelAssigner::new(&matcher).assign(&bundle, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1; accepted; 3; sshd: Accepted password for alice\n\
             0; failed; 1; sshd: Failed password for root\n\
             -1; other; 2; kernel: eth0 up\n"
        );
        assert_eq!(labels.len(), 3);
        assert_eq!(labels["2"], -1);
    }

    #[test]
    fn test_missing_raw_line() {
        let bundle = PreprocessedBundle::new()
            .with_line("1", "a\n")
            .with_event(1, "E1", vec![vec!["1", "404"]]);

        let matcher = matcher(&["a"]);
        let err = LabelAssigner::new(&matcher)
            .assign(&bundle, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, GroundTruthError::DataConsistency(_)));
    }

    #[test]
    fn test_missing_event_attributes() {
        let mut bundle = PreprocessedBundle::new().with_line("1", "a\n");
        bundle
            .message_length_group
            .entry(1)
            .or_default()
            .insert("ghost".to_string());

        let matcher = matcher(&["a"]);
        let err = LabelAssigner::new(&matcher)
            .assign(&bundle, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, GroundTruthError::DataConsistency(_)));
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure() {
        let bundle = PreprocessedBundle::new()
            .with_line("1", "a\n")
            .with_event(1, "E1", vec![vec!["1"]]);

        let matcher = matcher(&["a"]);
        let err = LabelAssigner::new(&matcher)
            .assign(&bundle, &mut FailingSink)
            .unwrap_err();
        assert!(matches!(err, GroundTruthError::Io { .. }));
    }

    #[test]
    fn test_stats() {
        let bundle = PreprocessedBundle::new()
            .with_line("1", "error one\n")
            .with_line("2", "fine\n")
            .with_event(1, "E1", vec![vec!["1", "2"], vec!["1"]]);

        let matcher = matcher(&["error"]);
        let outcome = LabelAssigner::new(&matcher)
            .assign_with_stats(&bundle, &mut Vec::new())
            .unwrap();

        assert_eq!(outcome.stats.records, 3);
        assert_eq!(outcome.stats.matched, 2);
        assert_eq!(outcome.stats.unmatched, 1);
        assert_eq!(outcome.labels.len(), 2);
    }
}
