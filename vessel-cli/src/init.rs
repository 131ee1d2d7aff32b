//! In-namespace container bring-up
//!
//! This is the child half of `run`: it executes inside the freshly
//! created namespaces after the re-exec through /proc/self/exe. The
//! order is fixed — proc must be mounted before anything reads
//! /proc/self, the pivot must happen before the hostname and network
//! steps observe container paths, and the shell only starts once the
//! veth has shown up.
//!
//! On success this function never returns: the process image is
//! replaced by the container shell.

use std::ffi::CString;

use anyhow::{Context, Result, anyhow};
use nix::unistd::{execve, sethostname};
use tracing::{debug, info};
use vessel_core::ContainerName;
use vessel_net::{DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL, wait_for_network};
use vessel_rootfs::{ContainerLayout, mount_proc, pivot_root};

use crate::cli::InitArgs;

const CONTAINER_SHELL: &str = "/bin/sh";

pub fn execute(args: InitArgs) -> Result<()> {
    let name = ContainerName::new(&args.container_name).context("Invalid container name")?;
    let layout = ContainerLayout::new(&args.container_dir, name.clone());
    let rootfs = layout.rootfs_dir();

    debug!(rootfs = %rootfs.display(), "initializing container");

    mount_proc(&rootfs).context("Failed to mount proc")?;

    pivot_root(&rootfs).context("Failed to pivot root")?;

    sethostname(name.as_str()).context("Failed to set hostname")?;

    info!("⏳ Waiting for network...");
    wait_for_network(DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL)
        .context("Network was not ready in time")?;

    info!("🐚 Starting container shell");
    exec_shell(&name)
}

/// Replace this process with the container shell
///
/// Stdio is inherited from the parent, so the shell is interactive
/// whenever `run` was. The environment is reset to a single prompt
/// variable naming the container.
fn exec_shell(name: &ContainerName) -> Result<()> {
    let shell = CString::new(CONTAINER_SHELL)?;
    let argv = [shell.clone()];
    let env = [CString::new(format!("PS1=[{name}] # "))?];

    match execve(&shell, &argv, &env) {
        Err(e) => Err(anyhow!("Failed to exec {CONTAINER_SHELL}: {e}")),
        Ok(never) => match never {},
    }
}
