//! Namespace management for container bring-up
//!
//! This crate provides the process side of Vessel's isolation:
//! - Namespace configuration and clone flags for the six namespace
//!   types (mount, UTS, IPC, PID, network, user)
//! - Spawning the re-executed child inside freshly-created namespaces
//!   with a single-entry uid/gid mapping
//! - Running a callback with the calling thread's network namespace
//!   temporarily switched to another process's

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod netns;
pub mod spawn;

pub use config::NamespaceConfig;
pub use netns::with_network_namespace;
pub use spawn::{spawn, wait};
