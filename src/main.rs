//! Main entry point for rash.
//!
//! Spawns a shell in a PTY, creates a session root, optionally runs the
//! built-in self-test suite or a suite file, then hands the session to the
//! interactive loop until the user leaves.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use rash::config::{RashConfig, Timing};
use rash::exec::Executor;
use rash::repl::{self, ConsoleSink, RustylineSource};
use rash::session::{Session, SessionOptions};
use rash::suite::{self, ShellTest, SuiteReport};
use rash::transport::{LocalFileStore, PtyChannel, ShellExec};
use rash::utils;

#[derive(Parser, Debug)]
#[command(name = "rash", version, about = "Run shell commands one at a time over an interactive PTY")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shell program to spawn (overrides the config file and $SHELL).
    #[arg(long)]
    shell: Option<String>,

    /// Directory for log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Run the built-in shell self-test suite before anything else.
    #[arg(long)]
    self_test: bool,

    /// Run the tests of a TOML suite file.
    #[arg(long, value_name = "TOML")]
    suite: Option<PathBuf>,

    /// Write the suite results as JSON.
    #[arg(long, value_name = "JSON")]
    report: Option<PathBuf>,

    /// Skip the interactive loop.
    #[arg(long)]
    no_interactive: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = RashConfig::load(cli.config.as_deref())?;
    if let Some(shell) = cli.shell.clone() {
        config.shell = Some(shell);
    }
    if let Some(dir) = cli.log_dir.clone() {
        config.log_dir = Some(dir);
    }

    if let Some(path) = utils::logger::init_logging(config.log_dir.as_deref()) {
        println!("Logging to {}", path.display());
    }

    let outcome = run(&cli, &config).await;
    if let Err(e) = &outcome {
        error!("rash failed: {:#}", e);
    }
    outcome
}

async fn run(cli: &Cli, config: &RashConfig) -> Result<ExitCode> {
    let tests = collect_tests(cli)?;

    let program = config.shell_program();
    let timing = Timing::from(&config.timing);
    let exec = ShellExec::local();

    let channel = PtyChannel::spawn(&program)
        .with_context(|| format!("Failed to start shell '{}'", program))?;
    let options = SessionOptions {
        namespace: config.namespace.clone(),
        mkdir_settle: timing.mkdir_settle,
        probe_prompt: true,
        recv_chunk: timing.recv_chunk,
    };
    let session = Session::initialize(channel, LocalFileStore::new(), &exec, &options)
        .await
        .context("Failed to initialize session")?;
    println!("Session root: {}", session.root());
    if let Some(prompt) = session.prompt() {
        println!("Remote prompt: {}", prompt);
    }

    let mut executor = Executor::new(&session, timing);
    let mut sink = ConsoleSink;
    let mut stdout = std::io::stdout();
    let mut code = ExitCode::SUCCESS;

    if !tests.is_empty() {
        let report = suite::run_suite(
            &mut executor,
            &tests,
            config.match_policy,
            &mut sink,
            &mut stdout,
        )
        .await?;
        println!("\n{} passed, {} failed", report.passed(), report.failed());
        if let Some(path) = &cli.report {
            write_report(path, &report)?;
        }
        if report.failed() > 0 {
            code = ExitCode::FAILURE;
        }
    }

    if !cli.no_interactive {
        let mut lines = RustylineSource::new().context("Failed to open line editor")?;
        let summary = repl::run_interactive(
            &mut executor,
            &mut lines,
            &mut sink,
            &mut stdout,
            &config.exit_keywords,
        )
        .await?;
        info!(?summary, "Interactive loop ended");
    }

    drop(executor);
    if let Some(size) = session.close(&exec).await {
        println!("Total session directory size: {}", size);
    }
    Ok(code)
}

fn collect_tests(cli: &Cli) -> Result<Vec<ShellTest>> {
    let mut tests = Vec::new();
    if cli.self_test {
        tests.extend(suite::builtin_suite());
    }
    if let Some(path) = &cli.suite {
        tests.extend(suite::load_suite(path)?);
    }
    Ok(tests)
}

fn write_report(path: &Path, report: &SuiteReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to encode suite report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!("Suite report written to {}", path.display());
    Ok(())
}
