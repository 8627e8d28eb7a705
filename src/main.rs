#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # automark
//!
//! Command line front end for the compile-and-run harness. `automark run
//! Main.java --input input.txt` compiles the file in a scratch workspace,
//! runs it with the given stdin under the time limit and reports what
//! happened.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use tabled::{Table, settings::Style};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

use automark::{
    DetailFlags, ExecHarness, HarnessConfig, ResultCode, Snapshot, Submission,
    constants::keys,
    util::resolve_executable,
};

/// How often `run` polls the submission status.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Arguments of the `run` subcommand.
#[derive(Debug, Clone)]
struct RunArgs {
    /// File whose contents become stdin.
    input:      Option<PathBuf>,
    /// Entry point class name; defaults to the file stem.
    class:      Option<String>,
    /// Workspace override.
    workspace:  Option<PathBuf>,
    /// Time limit override in seconds.
    time_limit: Option<f64>,
    /// Print the details snapshot as JSON.
    json:       bool,
    /// Java source file to submit.
    file:       PathBuf,
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Compile and run a file
    Run(RunArgs),
    /// Report whether javac and java can be found
    Toolchain,
}

/// Parsed command line.
#[derive(Debug, Clone)]
struct Opts {
    /// Log at debug level.
    verbose: bool,
    /// What to do.
    cmd:     Cmd,
}

/// Parse the command line arguments and return `Opts`
fn options() -> Opts {
    let input = long("input")
        .short('i')
        .help("File to feed to the program on stdin")
        .argument::<PathBuf>("PATH")
        .optional();
    let class = long("class")
        .short('c')
        .help("Entry point class name (defaults to the file name)")
        .argument::<String>("NAME")
        .optional();
    let workspace = long("workspace")
        .short('w')
        .help("Directory to compile and run in")
        .argument::<PathBuf>("DIR")
        .optional();
    let time_limit = long("time-limit")
        .short('t')
        .help("Wall-clock budget for the run, in seconds")
        .argument::<f64>("SECS")
        .optional();
    let json = long("json")
        .help("Print the result details as JSON")
        .switch();
    let file = positional::<PathBuf>("FILE").help("Java source file");

    let run_args = construct!(RunArgs {
        input,
        class,
        workspace,
        time_limit,
        json,
        file
    });

    let run = construct!(Cmd::Run(run_args))
        .to_options()
        .command("run")
        .help("Compile and run a Java file under the time limit");

    let toolchain = pure(Cmd::Toolchain)
        .to_options()
        .command("toolchain")
        .help("Check that javac and java are on PATH");

    let cmd = construct!([run, toolchain]);
    let verbose = short('v')
        .long("verbose")
        .help("Print debug logs")
        .switch();

    construct!(Opts { verbose, cmd })
        .to_options()
        .descr("Compile-and-run harness for Java submissions")
        .run()
}

/// Builds the harness configuration from the environment plus CLI overrides.
fn config_for(args: &RunArgs) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::from_env();
    if let Some(workspace) = &args.workspace {
        config = config.with_workspace(workspace);
    }
    if let Some(secs) = args.time_limit {
        let limit = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("Invalid time limit: {secs}"))?;
        config = config.with_time_limit(limit);
    }
    Ok(config)
}

/// Submits the file, waits for it, and prints the outcome.
async fn run_file(args: RunArgs) -> Result<()> {
    let source = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Could not read {}", args.file.display()))?;
    let stdin = match &args.input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Could not read {}", path.display()))?,
        None => String::new(),
    };
    let class = match &args.class {
        Some(class) => class.clone(),
        None => args
            .file
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .context("Could not work out a class name from the file name")?,
    };

    let harness = ExecHarness::new(config_for(&args)?);
    let submission = harness.submit(source, class, stdin)?;
    harness
        .wait_with(&submission, POLL_INTERVAL, |lane| {
            tracing::info!("{}", lane.describe())
        })
        .await;

    let details = harness.poll_details(&submission, DetailFlags::all());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        report(&submission, &details);
    }
    Ok(())
}

/// Human-readable summary of a finished submission.
fn report(submission: &Submission, details: &Snapshot) {
    let result = details.result().unwrap_or(ResultCode::NotRun);
    let label = match result {
        ResultCode::Success => result.to_string().green().bold(),
        ResultCode::ToolchainMissing => result.to_string().yellow().bold(),
        _ => result.to_string().red().bold(),
    };
    println!("Result: {label}");
    if result.is_terminal() {
        println!("Compiled: {}", if result.compiled() { "yes" } else { "no" });
    }

    match result {
        ResultCode::CompileFailed => {
            let diags = submission.compile_diagnostics();
            if diags.is_empty() {
                println!("{}", details.cmpinfo().unwrap_or_default());
            } else {
                println!("{}", Table::new(diags).with(Style::modern()));
            }
        }
        ResultCode::RuntimeError => {
            println!("Exit code: {}", details.get_i64(keys::SIGNAL).unwrap_or(-1));
            println!("{}", details.stderr().unwrap_or_default());
            for frame in submission.runtime_line_refs() {
                println!("  at {}.java:{}", frame.file_name(), frame.line_number);
            }
        }
        ResultCode::TimeLimitExceeded | ResultCode::Success => {
            println!("Time: {:.3}s", details.time().unwrap_or_default());
            print!("{}", details.output().unwrap_or_default());
        }
        ResultCode::ToolchainMissing => {
            println!("{}", details.cmpinfo().unwrap_or_default());
        }
        _ => println!("Internal error with the code checking system"),
    }
}

/// Prints where javac and java resolve to.
fn check_toolchain() {
    let config = HarnessConfig::from_env();
    for name in [config.compiler(), config.runtime()] {
        match resolve_executable(name) {
            Ok(path) => println!("{} {name}: {}", "found".green(), path.display()),
            Err(_) => println!("{} {name}", "missing".red()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let opts = options();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let level = if opts.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(fmt)
        .with(LevelFilter::from_level(level))
        .init();

    match opts.cmd {
        Cmd::Run(args) => run_file(args).await?,
        Cmd::Toolchain => check_toolchain(),
    }

    Ok(())
}
