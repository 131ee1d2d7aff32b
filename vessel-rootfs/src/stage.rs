//! Root filesystem staging

use std::fs;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use tracing::{debug, info};
use vessel_core::{Error, Result};

use crate::archive::untar;
use crate::layout::{IMAGE_DIR, ROOTFS_DIR};

/// Verify the container directory layout
///
/// The container root, its `images/` subdirectory, and its `rootfs/`
/// subdirectory must all exist. A missing entry is a precondition
/// failure; nothing is created here.
///
/// # Errors
/// Returns error naming the first missing entry.
pub fn check_container_dir(dir: &Path) -> Result<()> {
    let entries = [
        dir.to_path_buf(),
        dir.join(ROOTFS_DIR),
        dir.join(IMAGE_DIR),
    ];

    for entry in &entries {
        if !entry.exists() {
            return Err(Error::RootFs {
                message: format!("container directory entry missing: {}", entry.display()),
            });
        }
    }

    debug!(dir = %dir.display(), "container directory layout verified");

    Ok(())
}

/// Stage a container root filesystem from a base image archive
///
/// `dest_dir` is destructively recreated: any prior contents are
/// removed before the archive is extracted, so re-staging the same
/// container always yields a clean tree. A failure leaves the run
/// fatal; a half-extracted root is unsafe to boot.
///
/// # Errors
/// Returns error if removal, creation, or extraction fails.
pub fn prepare_root_fs(image_path: &Path, dest_dir: &Path) -> Result<()> {
    if dest_dir.exists() {
        debug!(dest = %dest_dir.display(), "removing previous rootfs");
        fs::remove_dir_all(dest_dir)?;
    }

    fs::DirBuilder::new().mode(0o775).create(dest_dir)?;

    untar(image_path, dest_dir)?;

    info!(
        image = %image_path.display(),
        dest = %dest_dir.display(),
        "rootfs staged"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn make_container_dir() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join(IMAGE_DIR)).unwrap();
        fs::create_dir(tmp.path().join(ROOTFS_DIR)).unwrap();
        tmp
    }

    fn make_image(dir: &Path, name: &str) -> std::path::PathBuf {
        let src = dir.join("image-src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("etc-motd"), "welcome").unwrap();

        let archive = dir.join(name);
        let status = Command::new("tar")
            .arg("-C")
            .arg(&src)
            .arg("-cf")
            .arg(&archive)
            .arg("etc-motd")
            .status()
            .unwrap();
        assert!(status.success());
        archive
    }

    #[test]
    fn test_check_container_dir_ok() {
        let tmp = make_container_dir();
        assert!(check_container_dir(tmp.path()).is_ok());
    }

    #[test]
    fn test_check_container_dir_missing_base() {
        let tmp = tempfile::tempdir().unwrap();
        let gone = tmp.path().join("nope");
        assert!(check_container_dir(&gone).is_err());
    }

    #[test]
    fn test_check_container_dir_missing_images() {
        let tmp = make_container_dir();
        fs::remove_dir(tmp.path().join(IMAGE_DIR)).unwrap();
        assert!(check_container_dir(tmp.path()).is_err());
    }

    #[test]
    fn test_check_container_dir_missing_rootfs() {
        let tmp = make_container_dir();
        fs::remove_dir(tmp.path().join(ROOTFS_DIR)).unwrap();
        assert!(check_container_dir(tmp.path()).is_err());
    }

    #[test]
    fn test_prepare_root_fs_extracts_image() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = make_image(tmp.path(), "base.tar");
        let dest = tmp.path().join("rootfs-test");

        prepare_root_fs(&archive, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("etc-motd")).unwrap(), "welcome");
    }

    #[test]
    fn test_prepare_root_fs_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = make_image(tmp.path(), "base.tar");
        let dest = tmp.path().join("rootfs-test");

        prepare_root_fs(&archive, &dest).unwrap();

        // Leftovers from a previous run must not survive a re-stage
        fs::write(dest.join("stale-file"), "stale").unwrap();
        prepare_root_fs(&archive, &dest).unwrap();

        assert!(!dest.join("stale-file").exists());
        assert_eq!(fs::read_to_string(dest.join("etc-motd")).unwrap(), "welcome");
    }

    #[test]
    fn test_prepare_root_fs_bad_archive_name() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("rootfs-test");

        let result = prepare_root_fs(&tmp.path().join("image.zip"), &dest);
        assert!(result.is_err());
    }
}
