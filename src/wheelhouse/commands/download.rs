//! Download command.

use super::settings_path;
use crate::cli::DownloadArgs;
use log::{debug, error};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use wheelhouse_lib::{AcquisitionConfig, Orchestrator, ProcessSupervisor, RunReport, Session, Settings};

/// Fetch artifacts for the requirement list.
pub fn cmd_download(
    args: &DownloadArgs,
    explicit_settings: Option<&Path>,
    supervisor: Arc<ProcessSupervisor>,
) -> ExitCode {
    let path = settings_path(explicit_settings);
    let mut settings = match &path {
        Some(p) => match Settings::load(p) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };
    args.apply(&mut settings);

    if args.save_settings {
        match &path {
            Some(p) => {
                if let Err(e) = settings.save(p) {
                    eprintln!("Error saving settings: {}", e);
                    return ExitCode::FAILURE;
                }
                eprintln!("Settings saved to {}", p.display());
            }
            None => eprintln!("No config directory available; settings not saved"),
        }
    }

    let config = match AcquisitionConfig::from_settings(&settings) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!(
        "os={:?} python={:?} dest={} external_tool={}",
        config.os_list,
        config.python_versions,
        config.dest_dir.display(),
        config.use_external_tool
    );

    let mut session = Session::with_supervisor(supervisor);
    let report = match Orchestrator::new(&config, &session).and_then(|o| o.run(&mut session)) {
        Ok(r) => r,
        Err(e) => {
            error!("run aborted: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else {
        print_report(&report, &config.dest_dir);
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_report(report: &RunReport, dest: &Path) {
    println!("Destination: {}", dest.display());
    println!("  Fetched: {}", report.fetched.len());
    for name in &report.fetched {
        println!("    + {}", name);
    }
    println!("  Already present: {}", report.satisfied);
    if report.skipped_lines > 0 {
        println!("  Skipped lines: {}", report.skipped_lines);
    }
    if !report.failures.is_empty() {
        println!("  Failed: {}", report.failures.len());
        for f in &report.failures {
            println!("    - {} [{}]: {}", f.requirement, f.target, f.reason);
        }
    }
}
