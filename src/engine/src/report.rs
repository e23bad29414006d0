//! Per-file summaries for human-readable output.

use std::fmt;
use std::path::{Path, PathBuf};

use a3s_lock_core::error::LockError;

use crate::lock::{LockDecision, LockOutcome};

/// Instruction counts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockSummary {
    pub locked: usize,
    pub upgraded: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl LockSummary {
    pub fn from_decisions(decisions: &[LockDecision]) -> Self {
        let mut summary = Self::default();
        for decision in decisions {
            match decision.outcome {
                LockOutcome::Unchanged => summary.unchanged += 1,
                LockOutcome::Locked => summary.locked += 1,
                LockOutcome::Upgraded => summary.upgraded += 1,
                LockOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn changed(&self) -> usize {
        self.locked + self.upgraded
    }

    pub fn total(&self) -> usize {
        self.locked + self.upgraded + self.unchanged + self.failed
    }
}

impl fmt::Display for LockSummary {
    /// `one base image locked, 2 base images failed` or `no changes needed`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.locked, "locked"),
            (self.upgraded, "upgraded"),
            (self.failed, "failed"),
        ]
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, verb)| count_phrase(*count, verb))
        .collect();

        if parts.is_empty() {
            f.write_str("no changes needed")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

fn count_phrase(count: usize, verb: &str) -> String {
    match count {
        1 => format!("one base image {}", verb),
        n => format!("{} base images {}", n, verb),
    }
}

/// Outcome of processing one Dockerfile.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub decisions: Vec<LockDecision>,
    /// Whether the rewritten document was written back
    pub saved: bool,
    /// Set when the file could not be read or parsed
    pub error: Option<LockError>,
    /// Set when changes were decided but could not be written back
    pub save_error: Option<LockError>,
}

impl FileReport {
    pub fn new(path: impl Into<PathBuf>, decisions: Vec<LockDecision>, saved: bool) -> Self {
        Self {
            path: path.into(),
            decisions,
            saved,
            error: None,
            save_error: None,
        }
    }

    /// Report for a file that was skipped entirely.
    pub fn skipped(path: impl Into<PathBuf>, error: LockError) -> Self {
        Self {
            path: path.into(),
            decisions: Vec::new(),
            saved: false,
            error: Some(error),
            save_error: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary(&self) -> LockSummary {
        LockSummary::from_decisions(&self.decisions)
    }

    /// False if the file was skipped, not saved, or any instruction failed.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.save_error.is_none() && self.summary().failed == 0
    }

    /// Report lines: the summary, with `verbose` one line per changed or
    /// failed instruction, then `changes saved` or `changes not saved`.
    pub fn lines(&self, verbose: bool) -> Vec<String> {
        let path = self.path.display();

        if let Some(error) = &self.error {
            return vec![format!("{}: skipped: {}", path, error)];
        }

        let mut lines = vec![format!("{}: {}", path, self.summary())];
        if verbose {
            for decision in &self.decisions {
                match &decision.outcome {
                    LockOutcome::Unchanged => {}
                    LockOutcome::Locked | LockOutcome::Upgraded => lines.push(format!(
                        "  line {}: {} -> {}",
                        decision.line_number, decision.old, decision.new
                    )),
                    LockOutcome::Failed { kind, message } => lines.push(format!(
                        "  line {}: {} ({}: {})",
                        decision.line_number, decision.old, kind, message
                    )),
                }
            }
        }
        if let Some(error) = &self.save_error {
            lines.push(format!("{}: changes not saved: {}", path, error));
        } else if self.saved {
            lines.push(format!("{}: changes saved", path));
        }
        lines
    }
}
