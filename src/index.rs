//! Remote package index client.
//!
//! Speaks the JSON form of the simple repository API:
//!
//! ```text
//! GET {index}/{project}/
//! Accept: application/vnd.pypi.simple.v1+json
//!
//! { "name": "six",
//!   "files": [ { "filename": "six-1.16.0-py2.py3-none-any.whl",
//!                "url": "https://files.example/.../six-1.16.0-py2.py3-none-any.whl" },
//!              ... ] }
//! ```
//!
//! Files are listed oldest first. Downloads stream into a temporary file in
//! the destination directory that is renamed into place once complete, so an
//! interrupted transfer never leaves a truncated artifact behind.

use crate::artifact::normalize_name;
use crate::error::IndexError;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Media type of the JSON simple API.
pub const SIMPLE_JSON: &str = "application/vnd.pypi.simple.v1+json";

/// Default public index.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple";

const USER_AGENT: &str = concat!("wheelhouse/", env!("CARGO_PKG_VERSION"));

/// One downloadable file of a project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexFile {
    /// Artifact filename.
    pub filename: String,
    /// Absolute download URL.
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ProjectPage {
    files: Vec<IndexFile>,
}

/// Lists the files available for a project.
pub trait IndexClient {
    /// All files of `project`, in index order (oldest first).
    fn list_files(&self, project: &str) -> Result<Vec<IndexFile>, IndexError>;
}

/// Downloads a file into a directory.
pub trait FileFetcher {
    /// Fetch `url` into `dest_dir`, returning the written path.
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, IndexError>;
}

/// HTTP implementation of [`IndexClient`] and [`FileFetcher`].
#[derive(Debug, Clone)]
pub struct HttpIndex {
    agent: ureq::Agent,
    base: String,
}

impl HttpIndex {
    /// Client for `index_url` with a per-request timeout and optional proxy URL.
    pub fn new(index_url: &str, timeout: Duration, proxy: Option<&str>) -> Result<Self, IndexError> {
        let mut builder = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT);
        if let Some(proxy) = proxy {
            let proxy = ureq::Proxy::new(proxy).map_err(|e| IndexError::Http {
                url: proxy.to_string(),
                reason: format!("bad proxy: {}", e),
            })?;
            builder = builder.proxy(proxy);
        }
        Ok(Self {
            agent: builder.build(),
            base: index_url.trim_end_matches('/').to_string(),
        })
    }

    /// Index base URL, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn project_url(&self, project: &str) -> String {
        format!("{}/{}/", self.base, normalize_name(project))
    }
}

fn http_error(url: &str, err: ureq::Error) -> IndexError {
    IndexError::Http {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

impl IndexClient for HttpIndex {
    fn list_files(&self, project: &str) -> Result<Vec<IndexFile>, IndexError> {
        let url = self.project_url(project);
        debug!("GET {}", url);

        let response = match self.agent.get(&url).set("Accept", SIMPLE_JSON).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(404, _)) => return Err(IndexError::NotFound(project.to_string())),
            Err(e) => return Err(http_error(&url, e)),
        };

        let page: ProjectPage = response.into_json().map_err(|e| IndexError::BadResponse {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        // File URLs may be relative to the project page.
        let page_url = Url::parse(&url).map_err(|e| IndexError::BadResponse {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let files = page
            .files
            .into_iter()
            .filter_map(|f| match page_url.join(&f.url) {
                Ok(abs) => Some(IndexFile {
                    filename: f.filename,
                    url: abs.to_string(),
                }),
                Err(e) => {
                    debug!("skipping {}: bad url {}: {}", f.filename, f.url, e);
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!("{}: {} files on index", project, files.len());
        Ok(files)
    }
}

/// Destination filename for a download URL: the last path segment.
pub fn url_basename(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

impl FileFetcher for HttpIndex {
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, IndexError> {
        let name = url_basename(url).ok_or_else(|| IndexError::BadResponse {
            url: url.to_string(),
            reason: "no filename in url".to_string(),
        })?;
        let dest = dest_dir.join(&name);

        info!("Downloading {}", name);
        let response = self.agent.get(url).call().map_err(|e| http_error(url, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".wheelhouse-")
            .suffix(".part")
            .tempfile_in(dest_dir)?;
        let bytes = std::io::copy(&mut response.into_reader(), tmp.as_file_mut())
            .map_err(|e| IndexError::Http {
                url: url.to_string(),
                reason: format!("transfer interrupted: {}", e),
            })?;
        tmp.persist(&dest).map_err(|e| IndexError::Io(e.error))?;

        debug!("wrote {} ({} bytes)", dest.display(), bytes);
        Ok(dest)
    }
}
