//! Mount-table surgery performed inside the new mount namespace
//!
//! Both operations here run in the re-executed child, before it execs
//! the container shell. Order matters: proc is mounted at the staged
//! rootfs path while the old root is still current, and the pivot
//! sequence must bind-mount before pivoting and chdir before
//! unmounting the old root.

use std::fs;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use nix::unistd::chdir;
use tracing::debug;
use vessel_core::{Error, Result};

use crate::layout::{PIVOT_DIR, PROC_DIR};

/// Mount a fresh proc filesystem at `<rootfs>/proc`
///
/// The new root is not yet pivoted, so the mount targets the staged
/// rootfs path rather than `/proc`.
///
/// # Errors
/// Returns error if the mount point cannot be created or mounted.
pub fn mount_proc(rootfs: &Path) -> Result<()> {
    let target = rootfs.join(PROC_DIR);
    fs::create_dir_all(&target)?;

    mount(
        Some(PROC_DIR),
        &target,
        Some(PROC_DIR),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|e| Error::RootFs {
        message: format!("failed to mount proc at {}: {e}", target.display()),
    })?;

    debug!(target = %target.display(), "proc mounted");

    Ok(())
}

/// Swap the process root for the staged rootfs
///
/// Sequence: make `/` private so the bind mount does not propagate to
/// the host table, bind-mount the rootfs onto itself (pivot_root
/// requires the new root not share a filesystem with the mount used to
/// reach it), create the `.pivot_root` stash directory, call the
/// kernel primitive, chdir to the new `/`, then lazily unmount and
/// remove the relocated old root.
///
/// # Errors
/// Returns error if any step fails; the mount table is left as-is.
pub fn pivot_root(rootfs: &Path) -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| Error::RootFs {
        message: format!("failed to make / private: {e}"),
    })?;

    mount(
        Some(rootfs),
        rootfs,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| Error::RootFs {
        message: format!("failed to bind mount rootfs {}: {e}", rootfs.display()),
    })?;

    let put_old = rootfs.join(PIVOT_DIR);
    if !put_old.exists() {
        fs::DirBuilder::new().mode(0o700).create(&put_old)?;
    }

    nix::unistd::pivot_root(rootfs, &put_old).map_err(|e| Error::RootFs {
        message: format!("pivot_root into {} failed: {e}", rootfs.display()),
    })?;

    chdir("/").map_err(|e| Error::RootFs {
        message: format!("chdir to new root failed: {e}"),
    })?;

    // The old root now lives at /.pivot_root
    let put_old = Path::new("/").join(PIVOT_DIR);
    umount2(&put_old, MntFlags::MNT_DETACH).map_err(|e| Error::RootFs {
        message: format!("failed to unmount old root: {e}"),
    })?;

    fs::remove_dir_all(&put_old)?;

    debug!(rootfs = %rootfs.display(), "pivoted into new root");

    Ok(())
}
