use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Local};
use uuid::Uuid;

use super::{
    snapshot::{DetailFlags, Snapshot},
    status::{Lifecycle, Phase, ResultCode},
};
use crate::{
    constants::{DATE_FORMAT, ERROR_OK, keys},
    java::{JavacDiagnostic, parse_javac_output, parse_stack_trace},
    types::LineRef,
};

/// What javac did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    /// Exit code; `None` if javac never ran to completion.
    pub code:   Option<i32>,
    /// Everything javac printed, stderr followed by stdout.
    pub output: String,
}

impl CompileOutcome {
    /// Whether javac exited zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// What the compiled program did.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    /// Exit code, or the signal number that terminated the process.
    pub code:    i32,
    /// Captured stdout.
    pub stdout:  String,
    /// Captured stderr.
    pub stderr:  String,
    /// Wall-clock time from spawn until exit or kill, capped at the budget
    /// for runs that finished on their own.
    pub elapsed: Duration,
    /// OS process id of the program while it ran.
    pub pid:     Option<u32>,
}

/// Mutable state of a submission. Only ever touched under the submission's
/// lock, so readers never see a phase without its matching outcome.
#[derive(Debug, Clone)]
pub struct SubmissionState {
    /// Where in the state machine the submission is.
    phase:     Phase,
    /// Set once javac has finished (or could not be run).
    compile:   Option<CompileOutcome>,
    /// Set once the program has finished; implies a successful compile.
    execution: Option<ExecutionOutcome>,
    /// Whether the run was killed for exceeding the time limit.
    timed_out: bool,
    /// Environment problem reported alongside the compiler output.
    note:      Option<String>,
}

impl Default for SubmissionState {
    fn default() -> Self {
        Self {
            phase:     Phase::NotStarted,
            compile:   None,
            execution: None,
            timed_out: false,
            note:      None,
        }
    }
}

impl SubmissionState {
    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Compile outcome, once known.
    pub fn compile(&self) -> Option<&CompileOutcome> {
        self.compile.as_ref()
    }

    /// Execution outcome, once known.
    pub fn execution(&self) -> Option<&ExecutionOutcome> {
        self.execution.as_ref()
    }

    /// Whether the run hit the time limit.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Moves to `next` if that is a legal edge; returns whether it did.
    pub(crate) fn advance(&mut self, next: Phase) -> bool {
        if self.phase.can_advance_to(next) {
            tracing::debug!("{:?} -> {:?}", self.phase, next);
            self.phase = next;
            true
        } else {
            tracing::warn!("Ignoring illegal transition {:?} -> {:?}", self.phase, next);
            false
        }
    }

    /// Records javac's outcome and moves to `next` in one step.
    pub(crate) fn finish_compile(&mut self, outcome: CompileOutcome, next: Phase) -> bool {
        if self.phase != Phase::Compiling || !self.advance(next) {
            return false;
        }
        self.compile = Some(outcome);
        true
    }

    /// Records the run's outcome and moves to `next` in one step.
    pub(crate) fn finish_run(&mut self, outcome: ExecutionOutcome, next: Phase) -> bool {
        let compiled = self.compile.as_ref().is_some_and(CompileOutcome::success);
        if self.phase != Phase::Running || !compiled || !self.advance(next) {
            return false;
        }
        self.timed_out = next == Phase::TimeLimitExceeded;
        self.execution = Some(outcome);
        true
    }

    /// Records a missing compiler or runtime and ends the submission. A
    /// missing runtime is only noticed after javac ran, so its output is kept.
    pub(crate) fn toolchain_missing(
        &mut self,
        note: String,
        compile: Option<CompileOutcome>,
    ) -> bool {
        if !self.advance(Phase::ToolchainMissing) {
            return false;
        }
        self.note = Some(note);
        self.compile = compile;
        true
    }

    /// Ends a submission whose worker died, from whatever phase it reached:
    /// a pending compile fails, a pending run becomes a runtime error.
    pub(crate) fn abort(&mut self, reason: &str) -> bool {
        match self.phase {
            Phase::NotStarted => self.advance(Phase::Compiling) && self.abort(reason),
            Phase::Compiling => self.finish_compile(
                CompileOutcome {
                    code:   None,
                    output: reason.to_string(),
                },
                Phase::CompileFailed,
            ),
            Phase::Running => self.finish_run(
                ExecutionOutcome {
                    code:    -1,
                    stdout:  String::new(),
                    stderr:  reason.to_string(),
                    elapsed: Duration::ZERO,
                    pid:     None,
                },
                Phase::RuntimeError,
            ),
            _ => false,
        }
    }

    /// Compiler output plus any environment note.
    fn cmpinfo(&self) -> String {
        let output = self.compile.as_ref().map(|c| c.output.as_str()).unwrap_or("");
        match &self.note {
            Some(note) if output.is_empty() => note.clone(),
            Some(note) => format!("{output}\n{note}"),
            None => output.to_string(),
        }
    }
}

/// Immutable data plus the lock-guarded state of one submission.
#[derive(Debug)]
struct Inner {
    /// Opaque identity.
    id:          Uuid,
    /// Submitted source text.
    source:      String,
    /// Class name the source is compiled and run as.
    entry_point: String,
    /// Stdin payload.
    input:       String,
    /// Workspace the submission was written to.
    workspace:   PathBuf,
    /// When `submit` was called.
    created:     DateTime<Local>,
    /// Everything the worker updates.
    state:       Mutex<SubmissionState>,
}

/// Handle to an in-flight or finished submission.
///
/// Cheap to clone; the background worker holds one clone and the caller
/// another.
#[derive(Debug, Clone)]
pub struct Submission(Arc<Inner>);

impl Submission {
    /// Creates a submission in the not-started state.
    pub(crate) fn new(
        source: String,
        entry_point: String,
        input: String,
        workspace: PathBuf,
    ) -> Self {
        Self(Arc::new(Inner {
            id: Uuid::new_v4(),
            source,
            entry_point,
            input,
            workspace,
            created: Local::now(),
            state: Mutex::new(SubmissionState::default()),
        }))
    }

    /// Locks the state, recovering it if a worker panicked mid-update.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SubmissionState> {
        self.0.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opaque identity of this submission.
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    /// Submitted source text.
    pub fn source(&self) -> &str {
        &self.0.source
    }

    /// Class name the source is compiled and run as.
    pub fn entry_point(&self) -> &str {
        &self.0.entry_point
    }

    /// Stdin payload.
    pub fn input(&self) -> &str {
        &self.0.input
    }

    /// Workspace the submission was written to.
    pub fn workspace(&self) -> &Path {
        &self.0.workspace
    }

    /// When the submission was created.
    pub fn created(&self) -> DateTime<Local> {
        self.0.created
    }

    /// Copy of the current state.
    pub fn state(&self) -> SubmissionState {
        self.lock().clone()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Whether a terminal state has been reached.
    pub fn is_done(&self) -> bool {
        self.phase().is_terminal()
    }

    /// `error`, `status` and `result`, read under one lock.
    pub fn status(&self) -> Snapshot {
        let phase = self.lock().phase;
        let mut snap = Snapshot::new();
        snap.insert(keys::ERROR, ERROR_OK)
            .insert(keys::STATUS, phase.lifecycle().code())
            .insert(keys::RESULT, phase.result().code());
        snap
    }

    /// Full detail record; optional fields follow `flags` and default to an
    /// empty string until the step producing them has finished.
    pub fn details(&self, flags: DetailFlags) -> Snapshot {
        let state = self.lock();
        let execution = state.execution.as_ref();

        let mut snap = Snapshot::new();
        snap.insert(keys::ERROR, ERROR_OK)
            .insert(
                keys::TIME,
                execution.map(|e| e.elapsed.as_secs_f64()).unwrap_or(0.0),
            )
            .insert(keys::STATUS, state.phase.lifecycle().code())
            .insert(keys::RESULT, state.phase.result().code())
            .insert(keys::MEMORY, 0)
            .insert(keys::SIGNAL, execution.map(|e| e.code).unwrap_or(0))
            .insert(keys::PUBLIC, false)
            .insert(keys::DATE, self.0.created.format(DATE_FORMAT).to_string());

        if flags.with_source {
            snap.insert(keys::SOURCE, self.0.source.as_str());
        }
        if flags.with_input {
            snap.insert(keys::INPUT, self.0.input.as_str());
        }
        if flags.with_output {
            snap.insert(keys::OUTPUT, execution.map(|e| e.stdout.as_str()).unwrap_or(""));
        }
        if flags.with_stderr {
            snap.insert(keys::STDERR, execution.map(|e| e.stderr.as_str()).unwrap_or(""));
        }
        if flags.with_cmpinfo {
            snap.insert(keys::CMPINFO, state.cmpinfo());
        }
        snap
    }

    /// Lifecycle lane.
    pub fn lifecycle(&self) -> Lifecycle {
        self.phase().lifecycle()
    }

    /// Result code.
    pub fn result(&self) -> ResultCode {
        self.phase().result()
    }

    /// javac diagnostics parsed from the compiler output.
    pub fn compile_diagnostics(&self) -> Vec<JavacDiagnostic> {
        self.lock()
            .compile
            .as_ref()
            .map(|c| parse_javac_output(&c.output))
            .unwrap_or_default()
    }

    /// Source locations named in the stack trace of a crashed run.
    pub fn runtime_line_refs(&self) -> Vec<LineRef> {
        self.lock()
            .execution
            .as_ref()
            .map(|e| parse_stack_trace(&e.stderr))
            .unwrap_or_default()
    }
}
