//! Dependency metadata from downloaded artifacts.
//!
//! Wheels are zip archives carrying `{name}-{version}.dist-info/METADATA`;
//! sdists are gzip tarballs carrying `{name}-{version}/PKG-INFO`. Both use the
//! same RFC 822 style header block, and dependencies are the
//! `Requires-Dist:` headers:
//!
//! ```text
//! Requires-Dist: charset-normalizer<4,>=2
//! Requires-Dist: idna<4,>=2.5
//! Requires-Dist: PySocks!=1.5.7,>=1.5.6; extra == "socks"
//! ```
//!
//! Optional (`extra ==`) dependencies are dropped and environment markers
//! after `;` are stripped.

use crate::artifact::{ArtifactInfo, ArtifactKind};
use crate::error::MetadataError;
use flate2::read::GzDecoder;
use log::{debug, trace};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const REQUIRES_DIST: &str = "Requires-Dist:";

/// Read the metadata text of an artifact.
///
/// Returns `Ok(None)` when the archive has no metadata entry or the file is
/// not a recognised distribution.
pub fn read_metadata(path: &Path) -> Result<Option<String>, MetadataError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    match ArtifactInfo::from_filename(&filename).kind {
        ArtifactKind::Binary => read_wheel_metadata(path),
        ArtifactKind::Source => read_sdist_metadata(path),
        ArtifactKind::Unknown => {
            debug!("not a distribution file, no metadata: {}", path.display());
            Ok(None)
        }
    }
}

fn read_wheel_metadata(path: &Path) -> Result<Option<String>, MetadataError> {
    let zip_err = |source| MetadataError::Zip {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let entry = names
        .iter()
        .find(|n| n.ends_with(".dist-info/METADATA"))
        .or_else(|| names.iter().find(|n| n.contains("METADATA")));

    let Some(entry) = entry else {
        debug!("no METADATA entry in {}", path.display());
        return Ok(None);
    };
    trace!("reading {} from {}", entry, path.display());

    let mut content = String::new();
    archive
        .by_name(entry)
        .map_err(zip_err)?
        .read_to_string(&mut content)?;
    Ok(Some(content))
}

fn read_sdist_metadata(path: &Path) -> Result<Option<String>, MetadataError> {
    let tar_err = |source| MetadataError::Tar {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

    for entry in archive.entries().map_err(tar_err)? {
        let mut entry = entry.map_err(tar_err)?;
        let is_pkg_info = entry
            .path()
            .map(|p| p.to_string_lossy().ends_with("PKG-INFO"))
            .unwrap_or(false);
        if !is_pkg_info {
            continue;
        }
        trace!("reading PKG-INFO from {}", path.display());
        let mut content = String::new();
        entry.read_to_string(&mut content).map_err(tar_err)?;
        return Ok(Some(content));
    }

    debug!("no PKG-INFO entry in {}", path.display());
    Ok(None)
}

/// Extract dependency specifiers from metadata text.
///
/// Keeps `Requires-Dist:` lines without an `extra ==` marker, with the
/// header name and any environment marker removed.
pub fn requires_dist(metadata: &str) -> Vec<String> {
    metadata
        .lines()
        .filter_map(|line| line.strip_prefix(REQUIRES_DIST))
        .filter(|value| !value.contains("extra =="))
        .map(|value| value.split(';').next().unwrap_or("").trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Dependency specifiers declared by an artifact.
pub fn read_requires_dist(path: &Path) -> Result<Vec<String>, MetadataError> {
    Ok(read_metadata(path)?
        .map(|content| requires_dist(&content))
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const METADATA: &str = "Metadata-Version: 2.1\n\
Name: requests\n\
Version: 2.31.0\n\
Requires-Dist: charset-normalizer<4,>=2\n\
Requires-Dist: idna <4,>=2.5 ; python_version >= \"3\"\n\
Requires-Dist: PySocks!=1.5.7,>=1.5.6; extra == \"socks\"\n";

    fn write_wheel(dir: &Path, filename: &str, entry: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(filename);
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file("requests/__init__.py", options).unwrap();
        zip.write_all(b"").unwrap();
        zip.start_file(entry, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
        zip.finish().unwrap();
        path
    }

    fn write_sdist(dir: &Path, filename: &str, entry: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(filename);
        let encoder = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, entry, content.as_bytes()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test]
    fn requires_dist_filters_extras_and_markers() {
        let deps = requires_dist(METADATA);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0], "charset-normalizer<4,>=2");
        assert_eq!(deps[1], "idna <4,>=2.5");
    }

    #[test]
    fn wheel_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_wheel(
            dir.path(),
            "requests-2.31.0-py3-none-any.whl",
            "requests-2.31.0.dist-info/METADATA",
            "Name: requests\nRequires-Dist: idna<4,>=2.5\n",
        );
        assert_eq!(read_requires_dist(&path).unwrap(), vec!["idna<4,>=2.5"]);
    }

    #[test]
    fn sdist_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write_sdist(
            dir.path(),
            "six-1.16.0.tar.gz",
            "six-1.16.0/PKG-INFO",
            "Name: six\nRequires-Dist: foo==1.0.0\n",
        );
        assert_eq!(read_requires_dist(&path).unwrap(), vec!["foo==1.0.0"]);
    }

    #[test]
    fn missing_entry_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write_wheel(dir.path(), "foo-1.0.0-py3-none-any.whl", "foo/README", "hi");
        assert!(read_metadata(&path).unwrap().is_none());
        assert!(read_requires_dist(&path).unwrap().is_empty());
    }

    #[test]
    fn corrupt_wheel_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foo-1.0.0-py3-none-any.whl");
        std::fs::write(&path, b"not a zip").unwrap();
        assert!(matches!(read_metadata(&path), Err(MetadataError::Zip { .. })));
    }

    #[test]
    fn unknown_file_has_no_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"Requires-Dist: foo").unwrap();
        assert!(read_metadata(&path).unwrap().is_none());
    }
}
