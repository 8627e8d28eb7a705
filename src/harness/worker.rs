use super::{
    status::Phase,
    submission::{CompileOutcome, ExecutionOutcome, Submission},
};
use crate::{
    config::HarnessConfig,
    java::util::{java_args, javac_args, source_path},
    process::{self, RunLimits, StdinSource},
    util::{is_toolchain_available, lossy},
};

/// Compiles and, if that succeeds, runs `submission`, recording every step in
/// its state. Never fails: problems end up as result codes.
pub(crate) async fn run(submission: Submission, config: HarnessConfig) {
    let id = submission.id();

    if !is_toolchain_available(config.compiler()) {
        tracing::info!("[{id}] compiler `{}` not found on PATH", config.compiler());
        submission.lock().toolchain_missing(
            format!("Java compiler {} could not be found", config.compiler()),
            None,
        );
        return;
    }

    if !submission.lock().advance(Phase::Compiling) {
        return;
    }

    let compiled = compile(&submission, &config).await;
    if !compiled.success() {
        tracing::info!("[{id}] compilation failed");
        submission.lock().finish_compile(compiled, Phase::CompileFailed);
        return;
    }

    if !is_toolchain_available(config.runtime()) {
        tracing::info!("[{id}] runtime `{}` not found on PATH", config.runtime());
        submission.lock().toolchain_missing(
            format!("Java VM {} could not be found", config.runtime()),
            Some(compiled),
        );
        return;
    }

    if !submission.lock().finish_compile(compiled, Phase::Running) {
        return;
    }

    let (outcome, next) = execute(&submission, &config).await;
    tracing::info!(
        "[{id}] finished as {:?} after {:.3}s",
        next,
        outcome.elapsed.as_secs_f64()
    );
    submission.lock().finish_run(outcome, next);
}

/// Runs javac and captures its output verbatim.
async fn compile(submission: &Submission, config: &HarnessConfig) -> CompileOutcome {
    let workspace = submission.workspace();
    let source = source_path(workspace, submission.entry_point());
    tracing::debug!("[{}] compiling {}", submission.id(), source.display());

    match process::run_collect(
        config.compiler(),
        &javac_args(workspace, &source),
        StdinSource::Null,
        Some(workspace),
        Some(config.compile_timeout()),
    )
    .await
    {
        Ok(out) => CompileOutcome {
            code:   out.status.code(),
            output: [lossy(&out.stderr), lossy(&out.stdout)].concat(),
        },
        Err(e) => CompileOutcome {
            code:   None,
            output: format!("{e:#}"),
        },
    }
}

/// Runs the compiled class under the time limit and classifies the result.
async fn execute(submission: &Submission, config: &HarnessConfig) -> (ExecutionOutcome, Phase) {
    let workspace = submission.workspace();
    let limits = RunLimits {
        time_limit:    config.time_limit(),
        poll_interval: config.poll_interval(),
        output_grace:  config.output_grace(),
    };
    tracing::debug!(
        "[{}] running {} with a {:.1}s budget",
        submission.id(),
        submission.entry_point(),
        limits.time_limit.as_secs_f64()
    );

    let run = process::run_time_boxed(
        config.runtime(),
        &java_args(workspace, submission.entry_point()),
        StdinSource::Bytes(submission.input().as_bytes().to_vec()),
        Some(workspace),
        limits,
    )
    .await;

    match run {
        Ok(run) => {
            let next = if run.timed_out {
                Phase::TimeLimitExceeded
            } else if run.success() {
                Phase::Success
            } else {
                Phase::RuntimeError
            };
            let outcome = ExecutionOutcome {
                code:    run.status.as_ref().map(process::exit_signal).unwrap_or(-1),
                stdout:  lossy(&run.stdout),
                stderr:  lossy(&run.stderr),
                elapsed: run.elapsed,
                pid:     run.pid,
            };
            (outcome, next)
        }
        Err(e) => {
            tracing::warn!("[{}] could not run: {e:#}", submission.id());
            let outcome = ExecutionOutcome {
                code:    -1,
                stdout:  String::new(),
                stderr:  format!("{e:#}"),
                elapsed: Default::default(),
                pid:     None,
            };
            (outcome, Phase::RuntimeError)
        }
    }
}
