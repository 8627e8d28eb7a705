use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Coarse lane a submission is in, as reported under the `status` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Submitted, worker not started yet.
    Waiting,
    /// javac is running.
    Compiling,
    /// The compiled program is running.
    Running,
    /// A terminal result is available.
    Done,
}

impl Lifecycle {
    /// Integer used on the wire.
    pub fn code(self) -> i64 {
        match self {
            Lifecycle::Waiting => -1,
            Lifecycle::Compiling => 1,
            Lifecycle::Running => 3,
            Lifecycle::Done => 0,
        }
    }

    /// Inverse of [`Lifecycle::code`].
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Lifecycle::Waiting),
            1 => Some(Lifecycle::Compiling),
            3 => Some(Lifecycle::Running),
            0 => Some(Lifecycle::Done),
            _ => None,
        }
    }

    /// Progress line a polling driver prints for this lane.
    pub fn describe(self) -> &'static str {
        match self {
            Lifecycle::Waiting => "Waiting for compilation",
            Lifecycle::Compiling => "Compiling",
            Lifecycle::Running => "Running",
            Lifecycle::Done => "Done",
        }
    }
}

/// Fine-grained outcome, as reported under the `result` key.
///
/// The integer values match the remote judging protocol the polling API is
/// shaped after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    /// No outcome yet.
    NotRun,
    /// javac rejected the source.
    CompileFailed,
    /// The program exited non-zero.
    RuntimeError,
    /// The program was killed for running past the time limit.
    TimeLimitExceeded,
    /// The program exited zero within the time limit.
    Success,
    /// Reserved by the protocol, never produced locally.
    MemoryLimitExceeded,
    /// Reserved by the protocol, never produced locally.
    IllegalCall,
    /// javac or java could not be found.
    ToolchainMissing,
}

impl ResultCode {
    /// Integer used on the wire.
    pub fn code(self) -> i64 {
        match self {
            ResultCode::NotRun => 0,
            ResultCode::CompileFailed => 11,
            ResultCode::RuntimeError => 12,
            ResultCode::TimeLimitExceeded => 13,
            ResultCode::Success => 15,
            ResultCode::MemoryLimitExceeded => 17,
            ResultCode::IllegalCall => 19,
            ResultCode::ToolchainMissing => 20,
        }
    }

    /// Inverse of [`ResultCode::code`].
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ResultCode::NotRun),
            11 => Some(ResultCode::CompileFailed),
            12 => Some(ResultCode::RuntimeError),
            13 => Some(ResultCode::TimeLimitExceeded),
            15 => Some(ResultCode::Success),
            17 => Some(ResultCode::MemoryLimitExceeded),
            19 => Some(ResultCode::IllegalCall),
            20 => Some(ResultCode::ToolchainMissing),
            _ => None,
        }
    }

    /// Whether this code ends a submission.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ResultCode::NotRun)
    }

    /// Whether the program got past javac, whatever happened when it ran.
    pub fn compiled(self) -> bool {
        matches!(
            self,
            ResultCode::RuntimeError
                | ResultCode::TimeLimitExceeded
                | ResultCode::Success
                | ResultCode::MemoryLimitExceeded
                | ResultCode::IllegalCall
        )
    }
}

impl Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultCode::NotRun => "not run",
            ResultCode::CompileFailed => "compilation error",
            ResultCode::RuntimeError => "runtime error",
            ResultCode::TimeLimitExceeded => "time limit exceeded",
            ResultCode::Success => "success",
            ResultCode::MemoryLimitExceeded => "memory limit exceeded",
            ResultCode::IllegalCall => "illegal system call",
            ResultCode::ToolchainMissing => "toolchain missing",
        };
        f.write_str(s)
    }
}

/// States of one submission.
///
/// ```text
/// NotStarted -> Compiling -> CompileFailed
///                         -> Running -> RuntimeError | TimeLimitExceeded | Success
/// NotStarted | Compiling  -> ToolchainMissing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Worker not started.
    NotStarted,
    /// Compiling.
    Compiling,
    /// Compile failed.
    CompileFailed,
    /// Running.
    Running,
    /// Run exited non-zero.
    RuntimeError,
    /// Run killed after the budget.
    TimeLimitExceeded,
    /// Run exited zero.
    Success,
    /// Compiler or runtime missing.
    ToolchainMissing,
}

impl Phase {
    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (NotStarted, Compiling)
                | (NotStarted, ToolchainMissing)
                | (Compiling, ToolchainMissing)
                | (Compiling, CompileFailed)
                | (Compiling, Running)
                | (Running, RuntimeError)
                | (Running, TimeLimitExceeded)
                | (Running, Success)
        )
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::CompileFailed
                | Phase::RuntimeError
                | Phase::TimeLimitExceeded
                | Phase::Success
                | Phase::ToolchainMissing
        )
    }

    /// Lifecycle lane for this phase.
    pub fn lifecycle(self) -> Lifecycle {
        match self {
            Phase::NotStarted => Lifecycle::Waiting,
            Phase::Compiling => Lifecycle::Compiling,
            Phase::Running => Lifecycle::Running,
            _ => Lifecycle::Done,
        }
    }

    /// Result code for this phase.
    pub fn result(self) -> ResultCode {
        match self {
            Phase::NotStarted | Phase::Compiling | Phase::Running => ResultCode::NotRun,
            Phase::CompileFailed => ResultCode::CompileFailed,
            Phase::RuntimeError => ResultCode::RuntimeError,
            Phase::TimeLimitExceeded => ResultCode::TimeLimitExceeded,
            Phase::Success => ResultCode::Success,
            Phase::ToolchainMissing => ResultCode::ToolchainMissing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_round_trip() {
        for code in [0, 11, 12, 13, 15, 17, 19, 20] {
            assert_eq!(ResultCode::from_code(code).map(ResultCode::code), Some(code));
        }
        for code in [-1, 0, 1, 3] {
            assert_eq!(Lifecycle::from_code(code).map(Lifecycle::code), Some(code));
        }
        assert_eq!(ResultCode::from_code(14), None);
    }

    #[test]
    fn terminal_phases_have_no_exits() {
        let all = [
            Phase::NotStarted,
            Phase::Compiling,
            Phase::CompileFailed,
            Phase::Running,
            Phase::RuntimeError,
            Phase::TimeLimitExceeded,
            Phase::Success,
            Phase::ToolchainMissing,
        ];
        for from in all {
            if from.is_terminal() {
                assert!(all.iter().all(|to| !from.can_advance_to(*to)), "{from:?}");
                assert_eq!(from.lifecycle(), Lifecycle::Done);
                assert!(from.result().is_terminal());
            } else {
                assert!(!from.result().is_terminal());
            }
        }
    }

    #[test]
    fn compiled_codes() {
        for code in [12, 13, 15, 17, 19] {
            assert!(ResultCode::from_code(code).unwrap().compiled(), "{code}");
        }
        for code in [0, 11, 20] {
            assert!(!ResultCode::from_code(code).unwrap().compiled(), "{code}");
        }
    }

    #[test]
    fn no_backwards_edges() {
        assert!(!Phase::Running.can_advance_to(Phase::Compiling));
        assert!(!Phase::Running.can_advance_to(Phase::ToolchainMissing));
        assert!(!Phase::NotStarted.can_advance_to(Phase::Running));
        assert!(Phase::Compiling.can_advance_to(Phase::Running));
    }
}
