//! Build output classification.
//!
//! Turns a raw transcript into a structured [`BuildResult`]. Lines run
//! through an ordered recognizer chain: the built-in "warning:" and
//! "error:" substring rules and the failure banner first, then any
//! configured custom rules. The failure banner flips the classifier into
//! failure mode, where every remaining line is tagged an error whether it
//! matches or not.

use regex::Regex;
use serde::{Deserialize, Serialize};

use kiln_core::{BuildResult, ConfigError, LogEntry, Severity};

use crate::runner::{RunStatus, RunTranscript};

const FAILURE_BANNER: &str = "** BUILD FAILED **";

/// Custom recognizer settings: a regex mapped to a severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizerSpec {
    pub pattern: String,
    pub severity: Severity,
    /// When true, a match also flips the classifier into failure mode.
    #[serde(default)]
    pub fail_mode: bool,
}

/// A compiled custom recognizer.
#[derive(Debug, Clone)]
pub struct Recognizer {
    regex: Regex,
    severity: Severity,
    fail_mode: bool,
}

/// Compile custom recognizers, rejecting unparseable patterns.
pub fn compile_recognizers(
    plugin: &'static str,
    specs: &[RecognizerSpec],
) -> Result<Vec<Recognizer>, ConfigError> {
    specs
        .iter()
        .map(|spec| {
            let regex = Regex::new(&spec.pattern)
                .map_err(|e| ConfigError::invalid(plugin, "recognizers", e.to_string()))?;
            Ok(Recognizer {
                regex,
                severity: spec.severity,
                fail_mode: spec.fail_mode,
            })
        })
        .collect()
}

fn match_line(line: &str, custom: &[Recognizer]) -> Option<(Severity, bool)> {
    if line.contains("warning:") {
        return Some((Severity::Warn, false));
    }
    if line.contains("error:") {
        return Some((Severity::Error, false));
    }
    if line.contains(FAILURE_BANNER) {
        return Some((Severity::Error, true));
    }
    custom
        .iter()
        .find(|r| r.regex.is_match(line))
        .map(|r| (r.severity, r.fail_mode))
}

/// Classify every line of the transcript into log entries.
pub fn classify_lines(lines: &[String], custom: &[Recognizer]) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    let mut failure_mode = false;
    for line in lines {
        if failure_mode {
            entries.push(LogEntry::new(Severity::Error, line));
            continue;
        }
        if let Some((severity, flips)) = match_line(line, custom) {
            entries.push(LogEntry::new(severity, line));
            failure_mode |= flips;
        }
    }
    entries
}

/// Full classification: entries plus the overall verdict. Success is
/// false iff an error entry was produced or the run did not complete.
pub fn classify(transcript: &RunTranscript, custom: &[Recognizer]) -> BuildResult {
    let entries = classify_lines(&transcript.lines, custom);
    let has_errors = entries.iter().any(|e| e.severity == Severity::Error);
    let (timed_out, exit_code, error) = match transcript.status {
        RunStatus::Completed { exit_code } => (false, exit_code, None),
        RunStatus::TimedOut => (true, None, Some("build timed out".to_string())),
        RunStatus::Cancelled => (false, None, Some("build cancelled".to_string())),
    };
    BuildResult {
        success: !timed_out && error.is_none() && !has_errors,
        timed_out,
        elapsed_ms: transcript.elapsed.as_millis() as u64,
        exit_code,
        entries,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn transcript(status: RunStatus, lines: &[&str]) -> RunTranscript {
        RunTranscript {
            status,
            lines: lines.iter().map(|l| l.to_string()).collect(),
            elapsed: Duration::from_millis(1500),
        }
    }

    fn completed(lines: &[&str]) -> RunTranscript {
        transcript(RunStatus::Completed { exit_code: Some(0) }, lines)
    }

    #[test]
    fn plain_compile_lines_produce_no_entries() {
        let entries = classify_lines(
            &["CompileC build/parser.o src/parser.c".to_string()],
            &[],
        );
        assert!(entries.is_empty());
    }

    #[test]
    fn warning_and_error_markers_are_recognized() {
        let entries = classify_lines(
            &[
                "src/main.c:10: warning: unused variable 'x'".to_string(),
                "src/main.c:22: error: expected ';'".to_string(),
            ],
            &[],
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].severity, Severity::Warn);
        assert_eq!(entries[1].severity, Severity::Error);
    }

    #[test]
    fn failure_banner_flips_every_following_line_to_error() {
        let trailer = "The following build commands failed:";
        // before the banner the trailer matches nothing
        assert!(classify_lines(&[trailer.to_string()], &[]).is_empty());

        let entries = classify_lines(
            &[
                FAILURE_BANNER.to_string(),
                trailer.to_string(),
                "\tCompileC parser.o".to_string(),
            ],
            &[],
        );
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.severity == Severity::Error));
    }

    #[test]
    fn custom_recognizers_run_after_the_builtin_set() {
        let custom = compile_recognizers(
            "exec builder",
            &[RecognizerSpec {
                pattern: "^FAILED:".to_string(),
                severity: Severity::Error,
                fail_mode: false,
            }],
        )
        .unwrap();
        let entries = classify_lines(
            &[
                "FAILED: link kiln".to_string(),
                "ok: compile main".to_string(),
            ],
            &custom,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, Severity::Error);
    }

    #[test]
    fn custom_recognizer_can_flip_failure_mode() {
        let custom = compile_recognizers(
            "exec builder",
            &[RecognizerSpec {
                pattern: "^PANIC".to_string(),
                severity: Severity::Error,
                fail_mode: true,
            }],
        )
        .unwrap();
        let entries = classify_lines(
            &["PANIC at main.rs".to_string(), "stack backtrace:".to_string()],
            &custom,
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].severity, Severity::Error);
    }

    #[test]
    fn bad_custom_pattern_is_a_config_error() {
        let err = compile_recognizers(
            "exec builder",
            &[RecognizerSpec {
                pattern: "(unclosed".to_string(),
                severity: Severity::Warn,
                fail_mode: false,
            }],
        )
        .unwrap_err();
        assert!(err.to_string().contains("'recognizers'"));
    }

    #[test]
    fn clean_run_is_a_success() {
        let result = classify(&completed(&["CompileC parser.o", "link ok"]), &[]);
        assert!(result.success);
        assert!(!result.timed_out);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.elapsed_ms, 1500);
        assert!(result.entries.is_empty());
    }

    #[test]
    fn warnings_alone_do_not_fail_the_build() {
        let result = classify(&completed(&["x.c:1: warning: shadowed"]), &[]);
        assert!(result.success);
        assert_eq!(result.error_count(), 0);
    }

    #[test]
    fn any_error_entry_fails_the_build() {
        let result = classify(&completed(&["x.c:1: error: boom"]), &[]);
        assert!(!result.success);
        assert_eq!(result.error_count(), 1);
    }

    #[test]
    fn timeout_is_distinct_from_compile_failure() {
        let result = classify(&transcript(RunStatus::TimedOut, &["partial output"]), &[]);
        assert!(!result.success);
        assert!(result.timed_out);
        assert_eq!(result.error.as_deref(), Some("build timed out"));
        assert_eq!(result.exit_code, None);
    }

    #[test]
    fn cancellation_fails_without_the_timeout_marker() {
        let result = classify(&transcript(RunStatus::Cancelled, &[]), &[]);
        assert!(!result.success);
        assert!(!result.timed_out);
        assert_eq!(result.error.as_deref(), Some("build cancelled"));
    }
}
