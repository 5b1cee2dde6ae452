//! wheelhouse CLI - Download Python artifacts for offline installs.
//!
//! # Commands
//!
//! - `download` - Fetch artifacts for a requirement list
//! - `settings` - Show stored settings
//! - `targets` - List known OS names and platform tags
//! - `completions <shell>` - Generate shell completions

mod cli;
mod commands;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use wheelhouse_lib::ProcessSupervisor;

/// Exit status after an interrupt (128 + SIGINT).
const INTERRUPTED: i32 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, &cli.log_file);

    info!("wheelhouse v{} starting", wheelhouse_lib::VERSION);

    let Some(command) = cli.command else {
        print_usage();
        return ExitCode::SUCCESS;
    };

    match command {
        Commands::Download(args) => {
            debug!("cmd: download os={:?} python={:?}", args.os, args.python);
            let supervisor = Arc::new(ProcessSupervisor::new());
            install_interrupt_handler(Arc::clone(&supervisor));
            commands::cmd_download(&args, cli.settings.as_deref(), supervisor)
        }
        Commands::Settings => {
            debug!("cmd: settings");
            commands::cmd_settings(cli.settings.as_deref())
        }
        Commands::Targets => commands::cmd_targets(),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Level for a `-v` count. Tool output is logged at info, so `-v` shows pip.
fn level_for(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// `wheelhouse.log` beside the executable, or in the working directory.
fn default_log_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("wheelhouse.log")))
        .unwrap_or_else(|| PathBuf::from("wheelhouse.log"))
}

/// Set up env_logger: stderr by default, appended to a file with `--log`.
fn init_logging(verbosity: u8, log_file: &Option<Option<PathBuf>>) {
    use std::io::Write;

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_for(verbosity))
        .format(|buf, record| writeln!(buf, "[{} {}] {}", record.level(), record.target(), record.args()));

    let Some(requested) = log_file else {
        builder.init();
        return;
    };
    let path = requested.clone().unwrap_or_else(default_log_path);
    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            eprintln!("Logging to: {}", path.display());
        }
        Err(e) => eprintln!("Cannot open log file {}: {}; logging to stderr", path.display(), e),
    }
    builder.init();
}

/// Kill tracked tool children on Ctrl-C / SIGTERM, then exit.
fn install_interrupt_handler(supervisor: Arc<ProcessSupervisor>) {
    let result = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Interrupted, stopping running downloads...");
        let stopped = supervisor.terminate_all();
        info!("terminated {} tool processes", stopped);
        std::process::exit(INTERRUPTED);
    });
    if let Err(e) = result {
        warn!("Failed to set signal handler: {}", e);
    }
}

/// Print usage help.
fn print_usage() {
    if let Err(e) = Cli::command().print_long_help() {
        eprintln!("{}", e);
    }
}

/// Generate shell completions.
fn cmd_completions(shell: clap_complete::Shell) -> ExitCode {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "wheelhouse", &mut std::io::stdout());
    ExitCode::SUCCESS
}
