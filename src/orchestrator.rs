//! Acquisition run driver.
//!
//! For every queued requirement and every target:
//!
//! ```text
//! already in dest? ──yes──> satisfied
//!        │ no
//!        v
//!   tier 1 ──fail──> tier 2 ──fail──> tier 3 ──fail──> reported
//!     │ ok             │ ok             │ ok
//!     └────────────────┴────────────────┴──> done
//! ```
//!
//! After each tier attempt, successful or not, the files that appeared in the
//! destination are recorded and their declared dependencies are queued.

use crate::artifact::already_satisfied;
use crate::config::AcquisitionConfig;
use crate::error::Result;
use crate::expand::expand;
use crate::fetcher::{Fetcher, IndexFetcher, ToolFetcher};
use crate::index::HttpIndex;
use crate::requirement::{parse_requirements_file, Requirement};
use crate::session::Session;
use crate::target::{expand_targets, Target};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Prefix of in-progress download files.
const PARTIAL_PREFIX: &str = ".wheelhouse-";

/// A requirement that could not be acquired for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub requirement: String,
    pub target: String,
    /// Error of the last tier tried.
    pub reason: String,
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Files that appeared in the destination, in arrival order.
    pub fetched: Vec<String>,
    /// (requirement, target) pairs already fulfilled by existing files.
    pub satisfied: usize,
    pub failures: Vec<Failure>,
    /// Malformed lines in the requirement list.
    pub skipped_lines: usize,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Names of the regular files in `dir`. Unreadable directories list empty.
pub fn list_dir(dir: &Path) -> BTreeSet<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return BTreeSet::new();
    };
    entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with(PARTIAL_PREFIX))
        .collect()
}

/// Runs the acquisition loop with one fetch strategy.
pub struct Orchestrator<'c> {
    config: &'c AcquisitionConfig,
    fetcher: Box<dyn Fetcher + 'c>,
    targets: Vec<Target>,
}

impl<'c> Orchestrator<'c> {
    /// Orchestrator with the strategy the configuration selects. Tool
    /// children are tracked by the session's supervisor.
    pub fn new(config: &'c AcquisitionConfig, session: &Session) -> Result<Self> {
        let fetcher: Box<dyn Fetcher> = if config.use_external_tool {
            Box::new(ToolFetcher::new(config, session.supervisor().clone())?)
        } else {
            let index = HttpIndex::new(&config.index_url, config.http_timeout, config.proxy.as_deref())?;
            Box::new(IndexFetcher::new(index, &config.dest_dir))
        };
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Orchestrator with an explicit strategy.
    pub fn with_fetcher(config: &'c AcquisitionConfig, fetcher: Box<dyn Fetcher + 'c>) -> Self {
        Self {
            targets: expand_targets(&config.os_list, &config.python_versions),
            config,
            fetcher,
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Read the requirement list, seed the session and drain its queue.
    pub fn run(&self, session: &mut Session) -> Result<RunReport> {
        self.config.prepare()?;
        let list = parse_requirements_file(&self.config.requirements_path)?;
        info!(
            "{} requirements, {} targets, strategy: {}",
            list.requirements.len(),
            self.targets.len(),
            self.fetcher.name()
        );

        let mut report = RunReport {
            skipped_lines: list.skipped,
            ..RunReport::default()
        };
        for req in list.requirements {
            session.enqueue(req);
        }

        while let Some(req) = session.dequeue() {
            for target in &self.targets {
                self.acquire(&req, target, session, &mut report);
            }
        }

        info!(
            "done: {} fetched, {} already present, {} failed",
            report.fetched.len(),
            report.satisfied,
            report.failures.len()
        );
        Ok(report)
    }

    /// Acquire one requirement for one target.
    fn acquire(&self, req: &Requirement, target: &Target, session: &mut Session, report: &mut RunReport) {
        let dest = &self.config.dest_dir;
        if already_satisfied(dest, req, target) {
            debug!("{} [{}]: already present", req, target);
            report.satisfied += 1;
            return;
        }

        let mut last_error = None;
        for tier in self.fetcher.tiers(self.config.include_source) {
            info!("{} [{}]: trying {}", req, target, tier);
            let before = list_dir(dest);
            let outcome = self.fetcher.attempt(tier, req, target);
            let arrived: Vec<String> = list_dir(dest).difference(&before).cloned().collect();

            if !arrived.is_empty() {
                debug!("{} [{}]: new files {:?}", req, target, arrived);
                report.fetched.extend(arrived.iter().cloned());
                if self.config.include_deps {
                    expand(&arrived, dest, session);
                }
            }

            match outcome {
                Ok(()) => return,
                Err(e) => {
                    warn!("{} [{}]: {} failed: {}", req, target, tier, e);
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error.map_or_else(|| "no tiers to try".to_string(), |e| e.to_string());
        error!("{} [{}]: not acquired: {}", req, target, reason);
        report.failures.push(Failure {
            requirement: req.to_string(),
            target: target.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::{IndexError, WheelhouseError};
    use crate::fetcher::Tier;
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Fake strategy: writes a canned wheel per package name on the given tier.
    struct Scripted {
        dest: PathBuf,
        wheels: HashMap<String, (Tier, String, Vec<String>)>,
    }

    impl Scripted {
        fn new(dest: &Path) -> Self {
            Self {
                dest: dest.to_path_buf(),
                wheels: HashMap::new(),
            }
        }

        fn wheel(mut self, name: &str, tier: Tier, filename: &str, requires: &[&str]) -> Self {
            self.wheels.insert(
                name.to_string(),
                (tier, filename.to_string(), requires.iter().map(|s| s.to_string()).collect()),
            );
            self
        }
    }

    impl Fetcher for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn tiers(&self, include_source: bool) -> Vec<Tier> {
            if include_source {
                vec![Tier::Binary, Tier::Source, Tier::SourceNoDeps]
            } else {
                vec![Tier::Binary]
            }
        }

        fn attempt(&self, tier: Tier, requirement: &Requirement, _target: &Target) -> Result<()> {
            match self.wheels.get(&requirement.name) {
                Some((t, filename, requires)) if *t == tier => {
                    let mut zip = zip::ZipWriter::new(File::create(self.dest.join(filename)).unwrap());
                    zip.start_file("x.dist-info/METADATA", zip::write::SimpleFileOptions::default())
                        .unwrap();
                    for r in requires {
                        writeln!(zip, "Requires-Dist: {}", r).unwrap();
                    }
                    zip.finish().unwrap();
                    Ok(())
                }
                _ => Err(WheelhouseError::Index(IndexError::NoMatch(requirement.to_string()))),
            }
        }
    }

    fn config(dir: &Path, requirements: &str, include_source: bool) -> AcquisitionConfig {
        let reqs = dir.join("requirements.txt");
        std::fs::write(&reqs, requirements).unwrap();
        AcquisitionConfig::from_settings(&Settings {
            os_list: vec!["Windows".to_string()],
            python_versions: vec!["3.11".to_string()],
            requirements_path: Some(reqs),
            dest_dir: Some(dir.join("out")),
            include_source,
            use_external_tool: false,
            ..Settings::default()
        })
        .unwrap()
    }

    #[test]
    fn fetches_dependencies_once() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path(), "a\nb\n", false);
        std::fs::create_dir_all(&cfg.dest_dir).unwrap();

        let fetcher = Scripted::new(&cfg.dest_dir)
            .wheel("a", Tier::Binary, "a-1.0.0-py3-none-any.whl", &["c==1.0.0"])
            .wheel("b", Tier::Binary, "b-1.0.0-py3-none-any.whl", &["c==1.0.0"])
            .wheel("c", Tier::Binary, "c-1.0.0-py3-none-any.whl", &[]);
        let orch = Orchestrator::with_fetcher(&cfg, Box::new(fetcher));

        let mut session = Session::new();
        let report = orch.run(&mut session).unwrap();
        assert!(report.is_success());
        assert_eq!(report.fetched.len(), 3);
        assert_eq!(session.history_len(), 3);
    }

    #[test]
    fn falls_back_to_source_tiers() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path(), "a\n", true);
        std::fs::create_dir_all(&cfg.dest_dir).unwrap();

        let fetcher = Scripted::new(&cfg.dest_dir).wheel("a", Tier::SourceNoDeps, "a-1.0.0-py3-none-any.whl", &[]);
        let orch = Orchestrator::with_fetcher(&cfg, Box::new(fetcher));
        let report = orch.run(&mut Session::new()).unwrap();
        assert!(report.is_success());
        assert_eq!(report.fetched, ["a-1.0.0-py3-none-any.whl"]);
    }

    #[test]
    fn exhausted_tiers_are_reported() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path(), "missing==1.0.0\nbad line!\n", false);
        let orch = Orchestrator::with_fetcher(&cfg, Box::new(Scripted::new(&cfg.dest_dir)));

        let report = orch.run(&mut Session::new()).unwrap();
        assert_eq!(report.skipped_lines, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].requirement, "missing==1.0.0");
        assert_eq!(report.failures[0].target, "win_amd64/py3.11/cp311");
        assert!(report.failures[0].reason.contains("no matching file"));
    }

    #[test]
    fn existing_artifacts_skip_fetching() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path(), "six==1.16.0\n", false);
        std::fs::create_dir_all(&cfg.dest_dir).unwrap();
        std::fs::write(cfg.dest_dir.join("six-1.16.0-py2.py3-none-any.whl"), b"").unwrap();

        let fetcher = Scripted::new(&cfg.dest_dir);
        let orch = Orchestrator::with_fetcher(&cfg, Box::new(fetcher));
        let report = orch.run(&mut Session::new()).unwrap();
        assert_eq!(report.satisfied, 1);
        assert!(report.fetched.is_empty());
    }

    #[test]
    fn list_dir_ignores_partial_downloads() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a-1.0.0.tar.gz"), b"").unwrap();
        std::fs::write(dir.path().join(".wheelhouse-x.part"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let listing: Vec<String> = list_dir(dir.path()).into_iter().collect();
        assert_eq!(listing, ["a-1.0.0.tar.gz"]);
    }
}
