//! Root filesystem staging and mount surgery for Vessel
//!
//! This crate covers both sides of the container filesystem story:
//! host-side staging (validate the container directory, materialize a
//! rootfs from a tarball image) and the in-namespace mount work (proc
//! mount and pivot_root) performed by the re-executed child.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod layout;
pub mod mount;
pub mod stage;

pub use archive::untar;
pub use layout::{ContainerLayout, DEFAULT_BASE_IMAGE, DEFAULT_CONTAINER_DIR};
pub use mount::{mount_proc, pivot_root};
pub use stage::{check_container_dir, prepare_root_fs};
