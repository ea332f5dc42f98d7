use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use mlogconfig::{Assembler, FileMode, PromptPolicy, Severity, logger_config};

/// Configurable logging setup: validates the log files and attaches every sink.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the log file.
    log_file_path: PathBuf,
    /// Path to the error log file.
    error_log_file_path: PathBuf,
    /// Minimum level to record.
    #[arg(long, default_value = "debug")]
    level: Severity,
    /// File mode: a (append), w (overwrite) or x (new file).
    #[arg(long, default_value = "a")]
    mode: FileMode,
    /// Ask on the terminal how to resolve log path conflicts.
    #[arg(long)]
    interactive: bool,
}

fn run(args: &Args) -> Result<()> {
    let config = logger_config(&args.log_file_path)
        .with_error_log(&args.error_log_file_path)
        .with_console(true)
        .with_syslog(true)
        .with_native_event_log(true)
        .with_level(args.level)
        .with_file_mode(args.mode);

    let ctx = if args.interactive {
        let mut policy = PromptPolicy::stdio();
        Assembler::new(&config)
            .with_conflict_policy(&mut policy)
            .assemble()?
    } else {
        config.setup()?
    };
    ctx.install_global()?;

    log::info!("Logging to {}", ctx.primary_path().display());
    if let Some(path) = ctx.error_path() {
        log::debug!("Errors also go to {}", path.display());
    }
    Ok(())
}

/// Last resort when logging itself could not be set up.
fn write_fallback_line(path: &Path, error: &anyhow::Error) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("could not open {}", path.display()))?;
    let time = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "{time} - ERROR: {error:#}")?;
    Ok(())
}

/// Runs the setup and, when it fails, records the failure in the error log before
/// handing it back.
fn run_or_record(args: &Args) -> Result<()> {
    run(args).inspect_err(|error| {
        if let Err(fallback) = write_fallback_line(&args.error_log_file_path, error) {
            eprintln!("could not write to the error log: {fallback:#}");
        }
    })
}

fn main() -> Result<()> {
    run_or_record(&Args::parse())
}
