//! On-disk container directory conventions
//!
//! ```text
//! <container-dir>/images/<base-image>        source archive
//! <container-dir>/rootfs/<name>/             staged root, recreated per run
//! <container-dir>/rootfs/<name>/proc         proc mount point
//! <container-dir>/rootfs/<name>/.pivot_root  transient, removed after pivot
//! ```

use std::path::{Path, PathBuf};

use vessel_core::ContainerName;

/// Subdirectory holding base image archives
pub const IMAGE_DIR: &str = "images";

/// Subdirectory holding staged root filesystems
pub const ROOTFS_DIR: &str = "rootfs";

/// Default container directory
pub const DEFAULT_CONTAINER_DIR: &str = "/var/tmp/containers";

/// Default base image archive name
pub const DEFAULT_BASE_IMAGE: &str = "busybox.tar";

pub(crate) const PIVOT_DIR: &str = ".pivot_root";
pub(crate) const PROC_DIR: &str = "proc";

/// Resolved paths for one container instance
#[derive(Debug, Clone)]
pub struct ContainerLayout {
    container_dir: PathBuf,
    name: ContainerName,
}

impl ContainerLayout {
    /// Create a layout rooted at `container_dir` for the named container
    #[must_use]
    pub fn new(container_dir: impl Into<PathBuf>, name: ContainerName) -> Self {
        Self {
            container_dir: container_dir.into(),
            name,
        }
    }

    /// The container directory this layout is rooted at
    #[must_use]
    pub fn container_dir(&self) -> &Path {
        &self.container_dir
    }

    /// The container name
    #[must_use]
    pub fn name(&self) -> &ContainerName {
        &self.name
    }

    /// Path to a base image archive under `images/`
    #[must_use]
    pub fn image_path(&self, base_image: &str) -> PathBuf {
        self.container_dir.join(IMAGE_DIR).join(base_image)
    }

    /// Path to this container's staged root filesystem
    #[must_use]
    pub fn rootfs_dir(&self) -> PathBuf {
        self.container_dir.join(ROOTFS_DIR).join(self.name.as_str())
    }
}
