use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// Offset added to a signal number when a stage is killed by that signal.
pub const SIGNAL_BASE: i32 = 128;

/// Status reported when a program cannot be found.
pub const NOT_FOUND: i32 = 127;

/// Status reported when a program exists but cannot be executed.
pub const NOT_EXECUTABLE: i32 = 126;

/// Maps a wait status onto the shell's single integer range.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        code
    } else if let Some(signal) = status.signal() {
        SIGNAL_BASE + signal
    } else {
        1
    }
}

/// Per-stage statuses of a finished pipeline, in spawn order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    statuses: Vec<i32>,
}

impl PipelineOutcome {
    pub fn new(statuses: Vec<i32>) -> Self {
        Self { statuses }
    }

    /// The pipeline's overall status: the first failing stage's status, or 0.
    pub fn status(&self) -> i32 {
        self.statuses
            .iter()
            .copied()
            .find(|&code| code != 0)
            .unwrap_or(0)
    }

    /// Status of the last stage alone.
    pub fn last(&self) -> i32 {
        self.statuses.last().copied().unwrap_or(0)
    }

    pub fn statuses(&self) -> &[i32] {
        &self.statuses
    }

    pub fn success(&self) -> bool {
        self.status() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_normal() {
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(exit_code(ExitStatus::from_raw(125 << 8)), 125);
    }

    #[test]
    fn test_exit_code_signal() {
        assert_eq!(exit_code(ExitStatus::from_raw(libc::SIGTERM)), 128 + libc::SIGTERM);
        assert_eq!(exit_code(ExitStatus::from_raw(libc::SIGKILL)), 137);
    }

    #[test]
    fn test_outcome_first_failure_wins() {
        let outcome = PipelineOutcome::new(vec![0, 2, 141, 0]);
        assert_eq!(outcome.status(), 2);
        assert_eq!(outcome.last(), 0);
        assert!(!outcome.success());
    }

    #[test]
    fn test_outcome_all_clean() {
        let outcome = PipelineOutcome::new(vec![0, 0]);
        assert_eq!(outcome.status(), 0);
        assert!(outcome.success());
    }
}
