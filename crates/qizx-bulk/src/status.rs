//! Exit statuses and max-severity aggregation

use std::fmt;

/// Outcome of a worker, the archive writer, or a whole pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExitStatus {
    #[default]
    Success,
    /// At least one document or property set failed
    DocumentFailed,
    /// Fatal error during the run
    Fatal,
    /// No client could be created
    NoClient,
    /// Aborted by user interrupt
    Interrupted,
}

impl ExitStatus {
    /// Process exit code.
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::DocumentFailed => 1,
            ExitStatus::Fatal => 2,
            ExitStatus::NoClient => 100,
            ExitStatus::Interrupted => -1,
        }
    }

    fn severity(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::DocumentFailed => 1,
            ExitStatus::Fatal => 2,
            ExitStatus::NoClient => 3,
            ExitStatus::Interrupted => 4,
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: ExitStatus) -> ExitStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Max-severity-wins over any number of statuses; empty input is success.
    pub fn aggregate(statuses: impl IntoIterator<Item = ExitStatus>) -> ExitStatus {
        statuses
            .into_iter()
            .fold(ExitStatus::Success, ExitStatus::worst)
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExitStatus::Success => "success",
            ExitStatus::DocumentFailed => "at least one document failed",
            ExitStatus::Fatal => "fatal error",
            ExitStatus::NoClient => "could not create client",
            ExitStatus::Interrupted => "interrupted",
        };
        write!(f, "{} ({})", text, self.code())
    }
}
