//! Show stored settings command.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use wheelhouse_lib::Settings;

/// Settings file to use: explicit path, else the platform default.
pub fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(Settings::default_path)
}

/// Print stored settings as JSON.
pub fn cmd_settings(explicit: Option<&Path>) -> ExitCode {
    let Some(path) = settings_path(explicit) else {
        eprintln!("No config directory available; pass --settings PATH");
        return ExitCode::FAILURE;
    };

    let settings = match Settings::load(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    eprintln!("# {}", path.display());
    match serde_json::to_string_pretty(&settings) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
