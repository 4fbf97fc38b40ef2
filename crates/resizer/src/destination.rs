//! Destination paths and file writes.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::ResizeError;
use crate::work::Outcome;

/// Extension of every output file.
pub const OUTPUT_EXTENSION: &str = "jpg";

/// `{output_dir}/{source stem}{suffix}.jpg`
///
/// The stem is the file name minus everything from its last dot, so a source
/// named `.png` has an empty stem.
pub fn destination_path(output_dir: &Path, source: &Path, suffix: &str) -> PathBuf {
    let file_name = source.file_name().unwrap_or_default();
    let stem = match source.file_stem() {
        Some(stem) if stem != file_name => stem,
        // `file_stem` keeps a lone leading dot as part of the name
        _ if file_name.as_encoded_bytes().starts_with(b".") => OsStr::new(""),
        _ => file_name,
    };

    let mut name = stem.to_os_string();
    name.push(suffix);
    name.push(".");
    name.push(OUTPUT_EXTENSION);
    output_dir.join(name)
}

/// What is currently at a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Vacant,
    Occupied,
}

pub async fn probe(path: &Path) -> Result<Probe, ResizeError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Probe::Occupied),
        Ok(_) => Err(ResizeError::DestinationPrep {
            path: path.to_path_buf(),
            reason: "exists and is not a regular file".to_string(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Probe::Vacant),
        Err(e) => Err(ResizeError::DestinationPrep {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Write `bytes` to `path`.
///
/// With `force` the file is created or truncated. Without it the file must not
/// exist yet; one that appeared since the probe is left alone and reported as
/// [`Outcome::SkippedExists`].
pub async fn write(path: &Path, bytes: &[u8], force: bool) -> Outcome {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let write_err = |source| {
        Outcome::Failed(ResizeError::Write {
            path: path.to_path_buf(),
            source,
        })
    };

    let mut file = match options.open(path).await {
        Ok(file) => file,
        Err(e) if !force && e.kind() == ErrorKind::AlreadyExists => {
            return Outcome::SkippedExists;
        }
        Err(e) => return write_err(e),
    };

    if let Err(e) = file.write_all(bytes).await {
        return write_err(e);
    }
    match file.flush().await {
        Ok(()) => Outcome::Saved,
        Err(e) => write_err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_replaces_extension_and_appends_suffix() {
        let path = destination_path(Path::new("out"), Path::new("in/photos/a.png"), "_sm");
        assert_eq!(path, Path::new("out/a_sm.jpg"));

        let path = destination_path(Path::new("out"), Path::new("archive.tar.png"), "");
        assert_eq!(path, Path::new("out/archive.tar.jpg"));

        let path = destination_path(Path::new("out"), Path::new("README"), "_lg");
        assert_eq!(path, Path::new("out/README_lg.jpg"));
    }

    #[test]
    fn dot_files_lose_their_whole_name_as_extension() {
        let path = destination_path(Path::new("out"), Path::new("in/.png"), "_sm");
        assert_eq!(path, Path::new("out/_sm.jpg"));

        let path = destination_path(Path::new("out"), Path::new("in/.hidden.png"), "_sm");
        assert_eq!(path, Path::new("out/.hidden_sm.jpg"));
    }

    #[tokio::test]
    async fn probe_classifies_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a_sm.jpg");
        assert_eq!(probe(&file).await.unwrap(), Probe::Vacant);

        std::fs::write(&file, b"x").unwrap();
        assert_eq!(probe(&file).await.unwrap(), Probe::Occupied);

        let nested = dir.path().join("a_lg.jpg");
        std::fs::create_dir(&nested).unwrap();
        assert!(matches!(
            probe(&nested).await,
            Err(ResizeError::DestinationPrep { .. })
        ));
    }

    #[tokio::test]
    async fn write_without_force_never_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a_sm.jpg");

        assert!(matches!(write(&file, b"first", false).await, Outcome::Saved));
        assert!(matches!(
            write(&file, b"second", false).await,
            Outcome::SkippedExists
        ));
        assert_eq!(std::fs::read(&file).unwrap(), b"first");

        assert!(matches!(write(&file, b"2nd", true).await, Outcome::Saved));
        assert_eq!(std::fs::read(&file).unwrap(), b"2nd");
    }
}
