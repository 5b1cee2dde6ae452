//! Error types for the wheelhouse library.
//!
//! This module defines all error types used throughout the crate.
//! Uses `thiserror` for ergonomic error handling and automatic `Display` impl.
//!
//! # Error Hierarchy
//!
//! - [`WheelhouseError`] - Top-level error enum, wraps all other errors
//! - [`RequirementError`] - Errors reading a requirement list
//! - [`VersionError`] - Errors from version comparison
//! - [`MetadataError`] - Errors opening artifact archives
//! - [`ToolError`] - Errors from the external package tool
//! - [`IndexError`] - Errors from the remote index and file downloads
//! - [`ConfigError`] - Errors building or persisting run configuration
//!
//! # Usage
//!
//! Errors from a single fetch attempt never escape the run: the orchestrator
//! logs them and moves on to the next tier or requirement. Only
//! [`ConfigError`] and [`RequirementError`] abort a run before it starts.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the wheelhouse library.
#[derive(Error, Debug)]
pub enum WheelhouseError {
    /// Error reading the requirement list
    #[error("requirement error: {0}")]
    Requirement(#[from] RequirementError),

    /// Error from version comparison
    #[error("version error: {0}")]
    Version(#[from] VersionError),

    /// Error reading artifact metadata
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Error from the external tool
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Error from the remote index
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Error from configuration
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// IO error (file operations)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reading a requirement list file.
#[derive(Error, Debug)]
pub enum RequirementError {
    /// The requirement list could not be read
    #[error("cannot read requirement list {path}: {source}")]
    Read {
        /// Path of the list
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Errors from [`Version`](crate::version::Version) comparison.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// A numeric and a textual component met at the same position.
    #[error("cannot compare '{left}' with '{right}': numeric and text components at position {position}")]
    Incomparable {
        /// Left version as written
        left: String,
        /// Right version as written
        right: String,
        /// Zero-based component index
        position: usize,
    },
}

/// Errors opening an artifact to read its metadata.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Zip (wheel) archive could not be read
    #[error("bad wheel archive {path}: {source}")]
    Zip {
        /// Artifact path
        path: PathBuf,
        /// Underlying zip error
        #[source]
        source: zip::result::ZipError,
    },

    /// Tar (sdist) archive could not be read
    #[error("bad sdist archive {path}: {source}")]
    Tar {
        /// Artifact path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from an external tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program path
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The tool exited with a non-zero status
    #[error("command failed: {command} (exit {code:?})")]
    CommandFailed {
        /// Command string
        command: String,
        /// Exit code (if available)
        code: Option<i32>,
    },

    /// The tool did not finish in time and was killed
    #[error("command timed out after {timeout:?}: {command}")]
    Timeout {
        /// Command string
        command: String,
        /// Configured bound
        timeout: std::time::Duration,
    },

    /// Shutdown was requested before or while the tool ran
    #[error("interrupted: {command}")]
    Interrupted {
        /// Command string
        command: String,
    },

    /// IO error while supervising the tool
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the remote index or a file download.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The index has no project of that name
    #[error("package '{0}' not found on index")]
    NotFound(String),

    /// HTTP transport or status error
    #[error("HTTP request to {url} failed: {reason}")]
    Http {
        /// Requested URL
        url: String,
        /// Error description
        reason: String,
    },

    /// The index returned a body that is not a simple-API listing
    #[error("unexpected index response from {url}: {reason}")]
    BadResponse {
        /// Requested URL
        url: String,
        /// Error description
        reason: String,
    },

    /// Nothing in the listing fits the requirement and target
    #[error("no matching file for {0}")]
    NoMatch(String),

    /// IO error while writing a download
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors building, loading or saving run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required option is missing or empty
    #[error("{0}")]
    Missing(String),

    /// An option value is malformed
    #[error("invalid {option}: {reason}")]
    Invalid {
        /// Option name
        option: String,
        /// Error description
        reason: String,
    },

    /// Settings file could not be read or written
    #[error("settings file {path}: {reason}")]
    Settings {
        /// Settings path
        path: PathBuf,
        /// Error description
        reason: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias using the top-level error.
pub type Result<T> = std::result::Result<T, WheelhouseError>;
