//! wheelhouse: offline Python artifact acquisition.
//!
//! Fills a flat directory with every wheel and sdist needed to install a
//! list of Python requirements on a set of target platforms and interpreter
//! versions, following declared dependencies transitively, so the directory
//! can later serve installs with no index connection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CLI (wheelhouse)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │   Config   │         Orchestrator          │    Session     │
//! ├────────────┼───────────────┬───────────────┼────────────────┤
//! │  Fetcher:  │  ToolFetcher  │ IndexFetcher  │    Expand      │
//! │            │   (process)   │    (index)    │   (metadata)   │
//! ├────────────┴───────────────┴───────────────┴────────────────┤
//! │  Requirement  │  Version  │  Artifact  │  Target  │  Error  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use wheelhouse_lib::{AcquisitionConfig, Orchestrator, Session, Settings};
//!
//! let mut settings = Settings::default();
//! settings.os_list = vec!["Windows".into(), "Linux".into()];
//! settings.python_versions = vec!["3.11".into()];
//! settings.requirements_path = Some("requirements.txt".into());
//! settings.dest_dir = Some("wheels".into());
//!
//! let config = AcquisitionConfig::from_settings(&settings)?;
//! let mut session = Session::new();
//! let report = Orchestrator::new(&config, &session)?.run(&mut session)?;
//! println!("{} fetched, {} failed", report.fetched.len(), report.failures.len());
//! ```
//!
//! # Modules
//!
//! - [`requirement`] - Requirement parsing
//! - [`version`] - Version normalisation and comparison
//! - [`artifact`] - Filename parsing and compatibility matching
//! - [`target`] - Target platforms and interpreter versions
//! - [`metadata`] - Dependency metadata inside artifacts
//! - [`expand`] - Dependency expansion
//! - [`session`] - Run history and queue
//! - [`process`] - External tool supervision
//! - [`index`] - Remote index client
//! - [`fetcher`] - Tiered fetch strategies
//! - [`orchestrator`] - Run driver
//! - [`config`] - Settings and run configuration
//! - [`error`] - Error types

pub mod artifact;
pub mod config;
pub mod error;
pub mod expand;
pub mod fetcher;
pub mod index;
pub mod metadata;
pub mod orchestrator;
pub mod process;
pub mod requirement;
pub mod session;
pub mod target;
pub mod version;

// Re-exports for convenience
pub use artifact::{already_satisfied, is_match, ArtifactInfo, ArtifactKind, Tag};
pub use config::{AcquisitionConfig, ProxySettings, Settings};
pub use error::{
    ConfigError, IndexError, MetadataError, RequirementError, ToolError, VersionError,
    WheelhouseError,
};
pub use fetcher::{Fetcher, IndexFetcher, Tier, ToolFetcher};
pub use index::{HttpIndex, IndexClient, IndexFile};
pub use orchestrator::{Failure, Orchestrator, RunReport};
pub use process::ProcessSupervisor;
pub use requirement::Requirement;
pub use session::Session;
pub use target::{Target, TargetSet};
pub use version::{compare, Operator, Version};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn integration_match_pipeline() {
        // Requirement, filename and target agree on a pinned universal wheel.
        let req = Requirement::parse("requests==2.31.0").unwrap();
        let info = ArtifactInfo::from_filename("requests-2.31.0-py3-none-any.whl");
        let targets = TargetSet::from(&Target::new("macosx_10_9_x86_64", "3.12"));

        assert!(is_match(&targets, &info));
        assert!(info.is_named(&req.name));
        assert!(req.accepts(&info.parsed_version().unwrap()).unwrap());
    }

    #[test]
    fn integration_version_ordering() {
        let req = Requirement::parse("numpy>=1.26.0").unwrap();
        assert!(req.accepts(&Version::normalize("1.26.4")).unwrap());
        assert!(!req.accepts(&Version::normalize("1.9")).unwrap());
        assert!(req.accepts(&Version::normalize("2")).unwrap());
    }
}
