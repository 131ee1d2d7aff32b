//! Vessel Core - Foundation types and utilities
//!
//! This crate provides the core abstractions used throughout Vessel.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ContainerName, ProcessId};
