//! Fetch strategies.
//!
//! A [`Fetcher`] tries a requirement for one target in up to three tiers:
//!
//! | Tier             | External tool                                   | Index client             |
//! |------------------|-------------------------------------------------|--------------------------|
//! | `Binary`         | `download --only-binary=:all: --platform ...`   | newest matching wheel    |
//! | `Source`         | `download --no-binary=:all:`                    | newest matching sdist    |
//! | `SourceNoDeps`   | `download --no-binary=:all: --no-deps`          | -                        |
//!
//! Source tiers only run when source artifacts are allowed.

use crate::artifact::{is_match, normalize_name, ArtifactInfo, ArtifactKind};
use crate::config::AcquisitionConfig;
use crate::error::{ConfigError, IndexError, Result};
use crate::index::{url_basename, FileFetcher, IndexClient, IndexFile};
use crate::process::ProcessSupervisor;
use crate::requirement::Requirement;
use crate::target::{Target, TargetSet};
use log::{debug, trace};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One fallback step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Prebuilt artifact for the exact target.
    Binary,
    /// Source artifact.
    Source,
    /// Source artifact without letting the tool resolve dependencies.
    SourceNoDeps,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Binary => "binary",
            Tier::Source => "source",
            Tier::SourceNoDeps => "source (no deps)",
        })
    }
}

/// A way of getting artifacts into the destination directory.
pub trait Fetcher {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Tiers to try, in order.
    fn tiers(&self, include_source: bool) -> Vec<Tier>;

    /// Make one attempt. `Ok` means the strategy reports success; the
    /// caller still diffs the directory to learn what actually arrived.
    fn attempt(&self, tier: Tier, requirement: &Requirement, target: &Target) -> Result<()>;
}

/// Drives an external `pip`-compatible tool.
#[derive(Debug)]
pub struct ToolFetcher {
    program: String,
    base_args: Vec<String>,
    dest_dir: PathBuf,
    proxy: Option<String>,
    timeout: Duration,
    supervisor: Arc<ProcessSupervisor>,
}

impl ToolFetcher {
    /// Build from the run configuration. The tool path is split like a
    /// shell word list, so `python3 -m pip` works.
    pub fn new(
        config: &AcquisitionConfig,
        supervisor: Arc<ProcessSupervisor>,
    ) -> std::result::Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            option: "pip".to_string(),
            reason,
        };
        let mut words = shell_words::split(&config.tool_path).map_err(|e| invalid(e.to_string()))?;
        if words.is_empty() {
            return Err(invalid("empty command".to_string()));
        }
        let program = words.remove(0);

        Ok(Self {
            program,
            base_args: words,
            dest_dir: config.dest_dir.clone(),
            proxy: config.proxy.clone(),
            timeout: config.tool_timeout,
            supervisor,
        })
    }

    /// Tool arguments for a tier, after the base arguments.
    pub fn args(&self, tier: Tier, requirement: &Requirement, target: &Target) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("download".to_string());
        args.push(requirement.spec());

        match tier {
            Tier::Binary => {
                args.push("--only-binary=:all:".to_string());
                args.push(format!("--platform={}", target.platform));
                args.push(format!("--python-version={}", target.python_version));
                args.push(format!("--abi={}", target.abi));
            }
            Tier::Source | Tier::SourceNoDeps => {
                args.push("--no-binary=:all:".to_string());
            }
        }
        args.push(format!("--dest={}", self.dest_dir.display()));
        if let Some(proxy) = &self.proxy {
            args.push(format!("--proxy={}", proxy));
        }
        if tier == Tier::SourceNoDeps {
            args.push("--no-deps".to_string());
        }
        args
    }
}

impl Fetcher for ToolFetcher {
    fn name(&self) -> &'static str {
        "pip"
    }

    fn tiers(&self, include_source: bool) -> Vec<Tier> {
        if include_source {
            vec![Tier::Binary, Tier::Source, Tier::SourceNoDeps]
        } else {
            vec![Tier::Binary]
        }
    }

    fn attempt(&self, tier: Tier, requirement: &Requirement, target: &Target) -> Result<()> {
        let args = self.args(tier, requirement, target);
        self.supervisor.run(&self.program, &args, self.timeout)?;
        Ok(())
    }
}

/// Selects files from a remote index listing and downloads them.
///
/// Listings are fetched once per project and reused for every later tier
/// and target.
#[derive(Debug)]
pub struct IndexFetcher<C> {
    client: C,
    dest_dir: PathBuf,
    listings: RefCell<HashMap<String, Vec<IndexFile>>>,
}

impl<C: IndexClient + FileFetcher> IndexFetcher<C> {
    pub fn new(client: C, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            dest_dir: dest_dir.into(),
            listings: RefCell::new(HashMap::new()),
        }
    }

    /// Pick a file for `requirement` from the (cached) project listing.
    fn pick(
        &self,
        kind: ArtifactKind,
        requirement: &Requirement,
        target: &Target,
    ) -> std::result::Result<Option<IndexFile>, IndexError> {
        let key = normalize_name(&requirement.name);
        let mut listings = self.listings.borrow_mut();
        if !listings.contains_key(&key) {
            let files = self.client.list_files(&requirement.name)?;
            listings.insert(key.clone(), files);
        } else {
            trace!("{}: using cached listing", key);
        }
        let files = listings.get(&key).map(Vec::as_slice).unwrap_or_default();
        Ok(self.select(files, kind, requirement, target).cloned())
    }

    /// Newest listed file of `kind` that fits the requirement and target
    /// and is not already in the destination.
    pub fn select<'a>(
        &self,
        files: &'a [IndexFile],
        kind: ArtifactKind,
        requirement: &Requirement,
        target: &Target,
    ) -> Option<&'a IndexFile> {
        let targets = TargetSet::from(target);
        files.iter().rev().find(|file| {
            let info = ArtifactInfo::from_filename(&file.filename);
            if info.kind != kind || !is_match(&targets, &info) {
                return false;
            }
            if !version_fits(requirement, &info) {
                trace!("{}: version does not fit {}", file.filename, requirement);
                return false;
            }
            if destination(&self.dest_dir, file).exists() {
                trace!("{}: already present", file.filename);
                return false;
            }
            true
        })
    }
}

fn version_fits(requirement: &Requirement, info: &ArtifactInfo) -> bool {
    if !requirement.is_strict() {
        return true;
    }
    let Some(version) = info.parsed_version() else {
        return false;
    };
    match requirement.accepts(&version) {
        Ok(fits) => fits,
        Err(e) => {
            debug!("{}: {}", info.version, e);
            false
        }
    }
}

fn destination(dest_dir: &Path, file: &IndexFile) -> PathBuf {
    dest_dir.join(url_basename(&file.url).unwrap_or_else(|| file.filename.clone()))
}

impl<C: IndexClient + FileFetcher> Fetcher for IndexFetcher<C> {
    fn name(&self) -> &'static str {
        "index"
    }

    fn tiers(&self, include_source: bool) -> Vec<Tier> {
        if include_source {
            vec![Tier::Binary, Tier::Source]
        } else {
            vec![Tier::Binary]
        }
    }

    fn attempt(&self, tier: Tier, requirement: &Requirement, target: &Target) -> Result<()> {
        let kind = match tier {
            Tier::Binary => ArtifactKind::Binary,
            Tier::Source | Tier::SourceNoDeps => ArtifactKind::Source,
        };
        let file = self
            .pick(kind, requirement, target)?
            .ok_or_else(|| IndexError::NoMatch(format!("{} [{}] for {}", requirement, tier, target)))?;
        debug!("selected {} for {}", file.filename, requirement);
        self.client.fetch(&file.url, &self.dest_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn config(dest: &Path, tool: &str, proxy: Option<&str>) -> AcquisitionConfig {
        let settings = Settings {
            os_list: vec!["Windows".to_string()],
            python_versions: vec!["3.11".to_string()],
            requirements_path: Some(dest.join("requirements.txt")),
            dest_dir: Some(dest.to_path_buf()),
            use_external_tool: true,
            tool_path: Some(tool.to_string()),
            ..Settings::default()
        };
        let mut cfg = AcquisitionConfig::from_settings(&settings).unwrap();
        cfg.proxy = proxy.map(str::to_string);
        cfg
    }

    #[test]
    fn tool_binary_args() {
        let sup = Arc::new(ProcessSupervisor::new());
        let cfg = config(Path::new("/w"), "python3 -m pip", Some("http://p:1"));
        let f = ToolFetcher::new(&cfg, Arc::clone(&sup)).unwrap();
        let req = Requirement::parse("requests==2.31.0").unwrap();
        let args = f.args(Tier::Binary, &req, &Target::new("win_amd64", "3.11"));
        assert_eq!(
            args,
            [
                "-m",
                "pip",
                "download",
                "requests==2.31.0",
                "--only-binary=:all:",
                "--platform=win_amd64",
                "--python-version=3.11",
                "--abi=cp311",
                "--dest=/w",
                "--proxy=http://p:1",
            ]
        );
    }

    #[test]
    fn tool_source_args() {
        let sup = Arc::new(ProcessSupervisor::new());
        let cfg = config(Path::new("/w"), "pip", None);
        let f = ToolFetcher::new(&cfg, Arc::clone(&sup)).unwrap();
        let req = Requirement::any("six");
        let target = Target::new("win_amd64", "3.11");

        assert_eq!(f.args(Tier::Source, &req, &target), ["download", "six", "--no-binary=:all:", "--dest=/w"]);
        assert_eq!(f.args(Tier::SourceNoDeps, &req, &target).last().map(String::as_str), Some("--no-deps"));
        assert_eq!(f.tiers(false), [Tier::Binary]);
        assert_eq!(f.tiers(true).len(), 3);
    }

    #[test]
    fn tool_path_must_not_be_blank() {
        let sup = Arc::new(ProcessSupervisor::new());
        let mut cfg = config(Path::new("/w"), "pip", None);
        cfg.tool_path = "  ".to_string();
        assert!(ToolFetcher::new(&cfg, Arc::clone(&sup)).is_err());
    }

    /// In-memory index that records downloads.
    struct FakeIndex {
        files: Vec<IndexFile>,
        fetched: RefCell<Vec<String>>,
        listed: std::cell::Cell<usize>,
    }

    impl FakeIndex {
        fn new(names: &[&str]) -> Self {
            Self {
                files: names
                    .iter()
                    .map(|n| IndexFile {
                        filename: n.to_string(),
                        url: format!("https://files.example/{}", n),
                    })
                    .collect(),
                fetched: RefCell::new(Vec::new()),
                listed: std::cell::Cell::new(0),
            }
        }
    }

    impl IndexClient for FakeIndex {
        fn list_files(&self, _project: &str) -> std::result::Result<Vec<IndexFile>, IndexError> {
            self.listed.set(self.listed.get() + 1);
            Ok(self.files.clone())
        }
    }

    impl FileFetcher for FakeIndex {
        fn fetch(&self, url: &str, dest_dir: &Path) -> std::result::Result<PathBuf, IndexError> {
            let name = url_basename(url).unwrap();
            let path = dest_dir.join(&name);
            std::fs::write(&path, b"")?;
            self.fetched.borrow_mut().push(name);
            Ok(path)
        }
    }

    #[test]
    fn index_picks_newest_compatible_wheel() {
        let dir = TempDir::new().unwrap();
        let index = FakeIndex::new(&[
            "numpy-1.25.0-cp311-cp311-win_amd64.whl",
            "numpy-1.26.4-cp311-cp311-win_amd64.whl",
            "numpy-1.26.4-cp312-cp312-win_amd64.whl",
            "numpy-1.26.4-cp311-cp311-manylinux2014_x86_64.whl",
            "numpy-1.26.4.tar.gz",
        ]);
        let f = IndexFetcher::new(index, dir.path());
        let target = Target::new("win_amd64", "3.11");

        f.attempt(Tier::Binary, &Requirement::any("numpy"), &target).unwrap();
        assert_eq!(*f.client.fetched.borrow(), ["numpy-1.26.4-cp311-cp311-win_amd64.whl"]);

        // The newest is now present, so the next attempt moves down the listing.
        f.attempt(Tier::Binary, &Requirement::any("numpy"), &target).unwrap();
        assert_eq!(f.client.fetched.borrow()[1], "numpy-1.25.0-cp311-cp311-win_amd64.whl");
    }

    #[test]
    fn index_honours_pinned_version() {
        let dir = TempDir::new().unwrap();
        let f = IndexFetcher::new(
            FakeIndex::new(&["six-1.15.0-py2.py3-none-any.whl", "six-1.16.0-py2.py3-none-any.whl"]),
            dir.path(),
        );
        let req = Requirement::parse("six==1.15.0").unwrap();
        f.attempt(Tier::Binary, &req, &Target::new("win_amd64", "3.11")).unwrap();
        assert_eq!(*f.client.fetched.borrow(), ["six-1.15.0-py2.py3-none-any.whl"]);
    }

    #[test]
    fn index_source_tier_and_no_match() {
        let dir = TempDir::new().unwrap();
        let f = IndexFetcher::new(FakeIndex::new(&["pyyaml-6.0.1.tar.gz"]), dir.path());
        let req = Requirement::any("pyyaml");
        let target = Target::new("win_amd64", "3.11");

        let err = f.attempt(Tier::Binary, &req, &target).unwrap_err();
        assert!(err.to_string().contains("no matching file"));

        f.attempt(Tier::Source, &req, &target).unwrap();
        assert_eq!(*f.client.fetched.borrow(), ["pyyaml-6.0.1.tar.gz"]);
        assert_eq!(f.tiers(true), [Tier::Binary, Tier::Source]);
    }

    #[test]
    fn listing_fetched_once_per_project() {
        let dir = TempDir::new().unwrap();
        let f = IndexFetcher::new(
            FakeIndex::new(&["six-1.16.0-py2.py3-none-any.whl", "six-1.16.0.tar.gz"]),
            dir.path(),
        );
        let req = Requirement::any("six");

        f.attempt(Tier::Binary, &req, &Target::new("win_amd64", "3.11")).unwrap();
        assert!(f.attempt(Tier::Binary, &req, &Target::new("linux_x86_64", "3.12")).is_err());
        f.attempt(Tier::Source, &Requirement::any("Six"), &Target::new("linux_x86_64", "3.12"))
            .unwrap();

        assert_eq!(f.client.listed.get(), 1);
        assert_eq!(f.client.fetched.borrow().len(), 2);
    }
}
