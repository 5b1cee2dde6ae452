//! Dependency expansion of freshly fetched artifacts.

use crate::metadata::read_requires_dist;
use crate::requirement::Requirement;
use crate::session::Session;
use log::{debug, info, warn};
use std::path::Path;

/// Read the declared dependencies of `new_files` (names relative to
/// `dest_dir`) and enqueue the ones the session has not seen.
///
/// Returns the newly enqueued requirements in discovery order. Unreadable
/// archives and unparsable specifiers are logged and skipped.
pub fn expand(new_files: &[String], dest_dir: &Path, session: &mut Session) -> Vec<Requirement> {
    let mut added = Vec::new();

    for file in new_files {
        let path = dest_dir.join(file);
        let specs = match read_requires_dist(&path) {
            Ok(specs) => specs,
            Err(e) => {
                warn!("cannot read dependencies of {}: {}", file, e);
                continue;
            }
        };
        debug!("{}: {} declared dependencies", file, specs.len());

        for spec in specs {
            let Some(req) = Requirement::parse(&spec) else {
                warn!("{}: unparsable dependency '{}'", file, spec);
                continue;
            };
            if session.enqueue(req.clone()) {
                info!("{} requires {}", file, req);
                added.push(req);
            }
        }
    }

    added
}
