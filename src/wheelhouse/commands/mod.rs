//! Command implementations for the wheelhouse CLI.

mod download;
mod settings;
mod targets;

pub use download::cmd_download;
pub use settings::{cmd_settings, settings_path};
pub use targets::cmd_targets;
