use crate::keyword_matcher::Label;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

pub const FIELD_SEPARATOR: &str = "; ";

/// line id -> label id, last write wins
pub type LabelMap = BTreeMap<String, i64>;

/// One line of a labeled file: `label_id; token; line_id; raw_text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub label_id: i64,
    pub token: String,
    pub line_id: String,
    pub raw_text: String,
}

impl LabelRecord {
    pub fn new(label: &Label, line_id: &str, raw_text: &str) -> Self {
        Self {
            label_id: label.id(),
            token: label.token().to_string(),
            line_id: line_id.to_string(),
            raw_text: raw_text.to_string(),
        }
    }

    /// Write the record without allocating. The raw text carries its own
    /// line terminator, so nothing is appended after it.
    pub fn write_fields<W: Write>(
        out: &mut W,
        label: &Label,
        line_id: &str,
        raw_text: &str,
    ) -> io::Result<()> {
        write!(
            out,
            "{}{sep}{}{sep}{}{sep}{}",
            label.id(),
            label.token(),
            line_id,
            raw_text,
            sep = FIELD_SEPARATOR
        )
    }

    /// Read a record back from one line of a labeled file.
    ///
    /// Only the first three separators split fields; the raw text may
    /// contain the separator itself.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.splitn(4, FIELD_SEPARATOR);
        let label_id = parts.next()?.parse().ok()?;
        let token = parts.next()?.to_string();
        let line_id = parts.next()?.to_string();
        let raw_text = parts.next()?.to_string();

        Some(Self {
            label_id,
            token,
            line_id,
            raw_text,
        })
    }
}

impl fmt::Display for LabelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.label_id,
            self.token,
            self.line_id,
            self.raw_text,
            sep = FIELD_SEPARATOR
        )
    }
}

/// Counters gathered while labeling one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelStats {
    pub records: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub per_label: BTreeMap<i64, usize>,
}

impl LabelStats {
    pub fn record(&mut self, label: &Label) {
        self.records += 1;
        if label.is_matched() {
            self.matched += 1;
        } else {
            self.unmatched += 1;
        }
        *self.per_label.entry(label.id()).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &LabelStats) {
        self.records += other.records;
        self.matched += other.matched;
        self.unmatched += other.unmatched;
        for (label, count) in &other.per_label {
            *self.per_label.entry(*label).or_insert(0) += count;
        }
    }

    pub fn coverage(&self) -> f64 {
        if self.records == 0 {
            return 0.0;
        }
        self.matched as f64 / self.records as f64 * 100.0
    }
}
