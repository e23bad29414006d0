//! Report formatting helpers for CLI output.

use a3s_lock_engine::FileReport;

/// Render all reports, one line per entry, in input order.
pub fn render_reports(reports: &[FileReport], verbose: bool) -> String {
    let mut out = String::new();
    for report in reports {
        for line in report.lines(verbose) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Number of files that were skipped or had a failed instruction.
pub fn failed_files(reports: &[FileReport]) -> usize {
    reports.iter().filter(|r| !r.is_success()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use a3s_lock_core::error::{ErrorKind, LockError};
    use a3s_lock_engine::{LockDecision, LockOutcome};

    fn locked(line: usize) -> LockDecision {
        LockDecision {
            line_number: line,
            old: "alpine:3.18".to_string(),
            new: "alpine:3.18@sha256:ab".to_string(),
            outcome: LockOutcome::Locked,
        }
    }

    #[test]
    fn test_render_reports() {
        let reports = vec![
            FileReport::new("Dockerfile", vec![locked(1)], true),
            FileReport::new("other/Dockerfile", vec![], false),
        ];
        assert_eq!(
            render_reports(&reports, false),
            "Dockerfile: one base image locked\n\
             Dockerfile: changes saved\n\
             other/Dockerfile: no changes needed\n"
        );
        assert_eq!(failed_files(&reports), 0);
    }

    #[test]
    fn test_render_verbose() {
        let reports = vec![FileReport::new("Dockerfile", vec![locked(4)], false)];
        assert_eq!(
            render_reports(&reports, true),
            "Dockerfile: one base image locked\n  line 4: alpine:3.18 -> alpine:3.18@sha256:ab\n"
        );
    }

    #[test]
    fn test_failed_files() {
        let failed = LockDecision {
            line_number: 1,
            old: "private:1".to_string(),
            new: "private:1".to_string(),
            outcome: LockOutcome::Failed {
                kind: ErrorKind::Auth,
                message: "denied".to_string(),
            },
        };
        let reports = vec![
            FileReport::new("a", vec![failed], false),
            FileReport::skipped("b", LockError::IoError("missing".to_string())),
            FileReport::new("c", vec![locked(1)], true),
        ];
        assert_eq!(failed_files(&reports), 2);
    }
}
