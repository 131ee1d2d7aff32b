//! Tar extraction collaborator
//!
//! Extraction is delegated to the system `tar` binary, equivalent to
//! `tar -C <dest> -xf <archive>`.

use std::path::Path;
use std::process::Command;

use tracing::debug;
use vessel_core::{Error, Result};

/// Extract `archive` into `dest_dir`
///
/// The archive name must end in `tar`; anything else is rejected
/// before any process is spawned, so a bad name has no side effects.
///
/// # Errors
/// Returns error if the name is not a tarball, the `tar` binary cannot
/// be spawned, or extraction exits non-zero.
pub fn untar(archive: &Path, dest_dir: &Path) -> Result<()> {
    let archive_name = archive.to_string_lossy();

    if !archive_name.ends_with("tar") {
        return Err(Error::RootFs {
            message: format!("invalid tarball name: {archive_name}"),
        });
    }

    debug!(
        archive = %archive_name,
        dest = %dest_dir.display(),
        "extracting archive"
    );

    let status = Command::new("tar")
        .arg("-C")
        .arg(dest_dir)
        .arg("-xf")
        .arg(archive)
        .status()
        .map_err(|e| Error::RootFs {
            message: format!("failed to spawn tar: {e}"),
        })?;

    if !status.success() {
        return Err(Error::RootFs {
            message: format!("tar -xf {archive_name} exited with {status}"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_untar_rejects_non_tar_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("dest");
        fs::create_dir(&dest).unwrap();

        let result = untar(Path::new("image.tgz"), &dest);
        assert!(result.is_err());

        // Rejected before extraction: destination untouched
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_untar_extracts_archive() {
        let tmp = tempfile::tempdir().unwrap();

        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("hello.txt"), "hello").unwrap();

        let archive = tmp.path().join("image.tar");
        let status = Command::new("tar")
            .arg("-C")
            .arg(&src)
            .arg("-cf")
            .arg(&archive)
            .arg("hello.txt")
            .status()
            .unwrap();
        assert!(status.success());

        let dest = tmp.path().join("dest");
        fs::create_dir(&dest).unwrap();

        untar(&archive, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("hello.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_untar_missing_archive_fails() {
        let tmp = tempfile::tempdir().unwrap();

        let result = untar(&tmp.path().join("missing.tar"), tmp.path());
        assert!(result.is_err());
    }
}
