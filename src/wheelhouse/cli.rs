//! CLI definitions for the wheelhouse command.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;
use std::path::PathBuf;
use wheelhouse_lib::Settings;

/// wheelhouse - Offline mirror builder for Python artifacts
#[derive(Parser)]
#[command(name = "wheelhouse")]
#[command(author, version)]
#[command(help_template = "{about-section}\n{usage-heading} {usage}\n\n{all-args}\n\n{after-help}")]
#[command(about = "wheelhouse - Download wheels and sdists for offline installs.\n\n\
    Fetches every artifact a requirement list needs on the selected\n\
    platforms and Python versions, following dependencies.\n\n\
    EXAMPLES:\n\
    \x20 wheelhouse download -r requirements.txt -d wheels --os Windows --python 3.11\n\
    \x20 wheelhouse download -r reqs.txt -d out --os Linux --os macOS --python 3.10 --python 3.12\n\
    \x20 wheelhouse download -r reqs.txt -d out --os Windows --python 3.11 --method index\n\
    \x20 wheelhouse targets               Known OS names and platform tags\n\
    \x20 wheelhouse settings              Show stored settings")]
#[command(after_help = "Stored settings fill in any option not given on the command line.\n\
    Use 'wheelhouse download --save-settings ...' to store the current options.")]
pub struct Cli {
    /// Verbosity: -v (info), -vv (debug), -vvv (trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log to file (default: wheelhouse.log next to binary)
    #[arg(short = 'l', long = "log", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Settings file (default: <config dir>/wheelhouse/settings.json)
    #[arg(long = "settings", global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download artifacts for a requirement list
    #[command(visible_alias = "dl")]
    Download(DownloadArgs),

    /// Show stored settings as JSON
    Settings,

    /// List known OS names and their platform tags
    Targets,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: CompletionShell,
    },
}

/// Fetch strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Run `pip download`
    Pip,
    /// Query the package index directly
    Index,
}

#[derive(Args, Debug, Default)]
pub struct DownloadArgs {
    /// Target OS name or platform tag (can repeat)
    #[arg(short = 'o', long = "os")]
    pub os: Vec<String>,

    /// Target Python version, e.g. 3.11 (can repeat)
    #[arg(short = 'p', long = "python")]
    pub python: Vec<String>,

    /// Requirement list file
    #[arg(short = 'r', long = "requirements")]
    pub requirements: Option<PathBuf>,

    /// Destination directory
    #[arg(short = 'd', long = "dest")]
    pub dest: Option<PathBuf>,

    /// Fall back to source distributions
    #[arg(long, conflicts_with = "no_source")]
    pub include_source: bool,

    /// Never download source distributions
    #[arg(long)]
    pub no_source: bool,

    /// Follow declared dependencies
    #[arg(long, conflicts_with = "no_deps")]
    pub include_deps: bool,

    /// Do not follow declared dependencies
    #[arg(long)]
    pub no_deps: bool,

    /// Fetch strategy
    #[arg(short = 'm', long, value_enum)]
    pub method: Option<Method>,

    /// Package tool command (default: pip on PATH)
    #[arg(long = "pip")]
    pub pip: Option<String>,

    /// Package index URL (index method)
    #[arg(long)]
    pub index_url: Option<String>,

    /// Timeout for one pip run, in seconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Proxy server host
    #[arg(long)]
    pub proxy_server: Option<String>,

    /// Proxy server port
    #[arg(long)]
    pub proxy_port: Option<u16>,

    /// Proxy user name
    #[arg(long)]
    pub proxy_user: Option<String>,

    /// Proxy password (never stored)
    #[arg(long)]
    pub proxy_password: Option<String>,

    /// Store these options as the new defaults
    #[arg(long)]
    pub save_settings: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl DownloadArgs {
    /// Overlay the options given on the command line onto stored settings.
    pub fn apply(&self, settings: &mut Settings) {
        if !self.os.is_empty() {
            settings.os_list = self.os.clone();
        }
        if !self.python.is_empty() {
            settings.python_versions = self.python.clone();
        }
        if let Some(path) = &self.requirements {
            settings.requirements_path = Some(path.clone());
        }
        if let Some(dest) = &self.dest {
            settings.dest_dir = Some(dest.clone());
        }
        if self.include_source {
            settings.include_source = true;
        }
        if self.no_source {
            settings.include_source = false;
        }
        if self.include_deps {
            settings.include_deps = true;
        }
        if self.no_deps {
            settings.include_deps = false;
        }
        if let Some(method) = self.method {
            settings.use_external_tool = method == Method::Pip;
        }
        if let Some(pip) = &self.pip {
            settings.tool_path = Some(pip.clone());
        }
        if let Some(url) = &self.index_url {
            settings.index_url = Some(url.clone());
        }
        if let Some(secs) = self.timeout {
            settings.tool_timeout_secs = Some(secs);
        }
        if let Some(server) = &self.proxy_server {
            settings.proxy.server = Some(server.clone());
        }
        if let Some(port) = self.proxy_port {
            settings.proxy.port = Some(port);
        }
        if let Some(user) = &self.proxy_user {
            settings.proxy.user = Some(user.clone());
        }
        if let Some(password) = &self.proxy_password {
            settings.proxy.password = Some(password.clone());
        }
    }
}
