//! Reader for the INI dialect used by dataset registry files.
//!
//! Follows the common `configparser` conventions: option names are
//! case-insensitive, values may span indented continuation lines,
//! `[DEFAULT]` entries show through every section and `%(name)s`
//! references are expanded on lookup.

use crate::error::{GroundTruthError, Result};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_SECTION: &str = "DEFAULT";
const MAX_INTERPOLATION_DEPTH: usize = 10;

type Options = IndexMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct IniDocument {
    defaults: Options,
    sections: IndexMap<String, Options>,
}

struct PendingOption {
    section: Option<String>,
    name: String,
    indent: usize,
    lines: Vec<String>,
    blank_run: usize,
}

impl IniDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = IniDocument::default();
        // None means the DEFAULT section
        let mut current: Option<Option<String>> = None;
        let mut pending: Option<PendingOption> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let stripped = raw_line.trim();

            if stripped.starts_with('#') || stripped.starts_with(';') {
                continue;
            }

            if stripped.is_empty() {
                if let Some(p) = pending.as_mut() {
                    p.blank_run += 1;
                }
                continue;
            }

            let indent = raw_line.len() - raw_line.trim_start().len();

            if let Some(p) = pending.as_mut() {
                if indent > p.indent {
                    for _ in 0..p.blank_run {
                        p.lines.push(String::new());
                    }
                    p.blank_run = 0;
                    p.lines.push(stripped.to_string());
                    continue;
                }
            }

            if let Some(p) = pending.take() {
                doc.store(p);
            }

            if stripped.starts_with('[') && stripped.ends_with(']') {
                let name = stripped[1..stripped.len() - 1].to_string();
                if name == DEFAULT_SECTION {
                    current = Some(None);
                } else {
                    if doc.sections.contains_key(&name) {
                        return Err(GroundTruthError::Configuration(format!(
                            "line {}: section '{}' already exists",
                            lineno, name
                        )));
                    }
                    doc.sections.insert(name.clone(), Options::new());
                    current = Some(Some(name));
                }
                continue;
            }

            let section = current.clone().ok_or_else(|| {
                GroundTruthError::Configuration(format!(
                    "line {}: option '{}' appears before any section header",
                    lineno, stripped
                ))
            })?;

            let delimiter = stripped.find(['=', ':']).ok_or_else(|| {
                GroundTruthError::Configuration(format!(
                    "line {}: expected 'key = value', got '{}'",
                    lineno, stripped
                ))
            })?;

            let name = stripped[..delimiter].trim().to_lowercase();
            if name.is_empty() {
                return Err(GroundTruthError::Configuration(format!(
                    "line {}: empty option name",
                    lineno
                )));
            }
            if doc.options(&section).contains_key(&name) {
                return Err(GroundTruthError::Configuration(format!(
                    "line {}: option '{}' already exists in section '{}'",
                    lineno,
                    name,
                    section.as_deref().unwrap_or(DEFAULT_SECTION)
                )));
            }

            let value = stripped[delimiter + 1..].trim().to_string();
            pending = Some(PendingOption {
                section,
                name,
                indent,
                lines: vec![value],
                blank_run: 0,
            });
        }

        if let Some(p) = pending.take() {
            doc.store(p);
        }

        Ok(doc)
    }

    fn options(&self, section: &Option<String>) -> &Options {
        match section {
            None => &self.defaults,
            // Sections are inserted before any of their options are read
            Some(name) => &self.sections[name.as_str()],
        }
    }

    fn store(&mut self, pending: PendingOption) {
        let value = pending.lines.join("\n").trim_end().to_string();
        let options = match &pending.section {
            None => &mut self.defaults,
            Some(name) => self.sections.entry(name.clone()).or_default(),
        };
        options.insert(pending.name, value);
    }

    /// Section names in file order, without `DEFAULT`.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(|s| s.as_str())
    }

    /// All options visible in `section`, defaults first, with references expanded.
    pub fn items(&self, section: &str) -> Result<Vec<(String, String)>> {
        let merged = self.merged(section)?;
        merged
            .iter()
            .map(|(name, value)| Ok((name.clone(), interpolate(section, name, value, &merged)?)))
            .collect()
    }

    /// A single option, with references expanded.
    pub fn get(&self, section: &str, option: &str) -> Result<Option<String>> {
        let merged = self.merged(section)?;
        let option = option.to_lowercase();
        match merged.get(&option) {
            Some(value) => Ok(Some(interpolate(section, &option, value, &merged)?)),
            None => Ok(None),
        }
    }

    fn merged(&self, section: &str) -> Result<Options> {
        let options = self.sections.get(section).ok_or_else(|| {
            GroundTruthError::Configuration(format!("no section named '{}'", section))
        })?;
        let mut merged = self.defaults.clone();
        for (name, value) in options {
            merged.insert(name.clone(), value.clone());
        }
        Ok(merged)
    }
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%%|%\(([^)]+)\)s|%").expect("static pattern"))
}

fn interpolate(section: &str, option: &str, value: &str, vars: &Options) -> Result<String> {
    let mut current = value.to_string();

    for _ in 0..MAX_INTERPOLATION_DEPTH {
        if !current.contains("%(") {
            break;
        }
        current = expand_once(section, option, &current, vars, true)?;
    }

    if current.contains("%(") {
        return Err(GroundTruthError::Configuration(format!(
            "option '{}' in section '{}' exceeds the interpolation depth of {}",
            option, section, MAX_INTERPOLATION_DEPTH
        )));
    }

    expand_once(section, option, &current, vars, false)
}

/// One substitution pass. References are resolved while `resolve` is set;
/// the final pass only turns `%%` into `%`.
fn expand_once(
    section: &str,
    option: &str,
    value: &str,
    vars: &Options,
    resolve: bool,
) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut last = 0;

    for caps in reference_pattern().captures_iter(value) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        out.push_str(&value[last..whole.start]);
        last = whole.end;

        match caps.get(1) {
            Some(name) if resolve => {
                let key = name.as_str().to_lowercase();
                let replacement = vars.get(&key).ok_or_else(|| {
                    GroundTruthError::Configuration(format!(
                        "option '{}' in section '{}' references unknown option '{}'",
                        option, section, key
                    ))
                })?;
                out.push_str(replacement);
            }
            Some(_) => out.push_str(&value[whole]),
            None if &value[whole.clone()] == "%%" => {
                // Keep escapes intact until the final pass
                out.push_str(if resolve { "%%" } else { "%" });
            }
            None => {
                return Err(GroundTruthError::Configuration(format!(
                    "option '{}' in section '{}': '%' must be followed by '%' or '('",
                    option, section
                )));
            }
        }
    }

    out.push_str(&value[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_and_continuations() {
        let doc = IniDocument::parse(
            "[casper-rw]\n\
             base_dir = /data/casper-rw/logs\n\
             Auth = auth.log\n    auth.log.1\n\n    auth.log.2\n\
             syslog: syslog\n\
             \n\
             [casper-rw-logtype]\n\
             logtype = auth\n  syslog\n",
        )
        .unwrap();

        let sections: Vec<_> = doc.sections().collect();
        assert_eq!(sections, vec!["casper-rw", "casper-rw-logtype"]);
        assert_eq!(
            doc.get("casper-rw", "auth").unwrap().unwrap(),
            "auth.log\nauth.log.1\n\nauth.log.2"
        );
        assert_eq!(doc.get("casper-rw", "syslog").unwrap().unwrap(), "syslog");
        assert_eq!(
            doc.get("casper-rw-logtype", "logtype").unwrap().unwrap(),
            "auth\nsyslog"
        );
    }

    #[test]
    fn test_comments_and_trailing_blanks() {
        let doc = IniDocument::parse(
            "# registry\n[a]\n; note\nfiles = one\n  # skipped\n  two\n\n\n[b]\nx = 1\n",
        )
        .unwrap();
        assert_eq!(doc.get("a", "files").unwrap().unwrap(), "one\ntwo");
        assert_eq!(doc.get("b", "x").unwrap().unwrap(), "1");
    }

    #[test]
    fn test_defaults_and_interpolation() {
        let doc = IniDocument::parse(
            "[DEFAULT]\nroot = /data\n\n[ds]\nbase_dir = %(root)s/ds/logs\nratio = 50%%\n",
        )
        .unwrap();

        assert_eq!(doc.get("ds", "base_dir").unwrap().unwrap(), "/data/ds/logs");
        assert_eq!(doc.get("ds", "ratio").unwrap().unwrap(), "50%");

        let items = doc.items("ds").unwrap();
        let names: Vec<_> = items.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["root", "base_dir", "ratio"]);
    }

    #[test]
    fn test_errors() {
        assert!(IniDocument::parse("key = value\n").is_err());
        assert!(IniDocument::parse("[a]\njust a line\n").is_err());
        assert!(IniDocument::parse("[a]\nx = 1\n[a]\n").is_err());
        assert!(IniDocument::parse("[a]\nx = 1\nX = 2\n").is_err());

        let doc = IniDocument::parse("[a]\nx = %(missing)s\ny = 5%\n").unwrap();
        assert!(doc.get("a", "x").is_err());
        assert!(doc.get("a", "y").is_err());
        assert!(doc.items("nope").is_err());
    }
}
