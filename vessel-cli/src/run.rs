//! Container run orchestration
//!
//! `run` is the host-side half of bring-up: stage the root filesystem,
//! clone a re-executed `init` child into fresh namespaces, build the
//! network fabric against the child's pid, then wait for the child to
//! terminate. The child performs its own mount/pivot/hostname work
//! concurrently (see `init.rs`); the only ordering constraint between
//! the two halves is the child's network readiness poll.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use vessel_core::ContainerName;
use vessel_namespace::{NamespaceConfig, spawn, wait};
use vessel_net::{NetworkSettings, apply_network};
use vessel_rootfs::{ContainerLayout, check_container_dir, prepare_root_fs};

use crate::cli::RunArgs;

/// Bring-up phases, in order; any phase may fall to `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    RootFsReady,
    ProcessSpawned,
    NetworkApplied,
    Running,
    Terminated,
    Failed,
}

struct Orchestrator {
    phase: Phase,
    layout: ContainerLayout,
    base_image: String,
    settings: NetworkSettings,
}

impl Orchestrator {
    fn advance(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
    }

    fn run(&mut self) -> Result<i32> {
        let name = self.layout.name().clone();

        info!("🦀 Starting Vessel Container Runtime");
        info!("📦 Container: {}", name);

        // === ROOT FILESYSTEM (must exist before the child pivots) ===
        check_container_dir(self.layout.container_dir())
            .context("Container directory check failed")?;

        info!("🗂️  Staging root filesystem...");
        prepare_root_fs(
            &self.layout.image_path(&self.base_image),
            &self.layout.rootfs_dir(),
        )
        .context("Failed to prepare root filesystem")?;
        self.advance(Phase::RootFsReady);

        // === NAMESPACED CHILD (re-exec as the hidden init subcommand) ===
        info!("🔒 Spawning namespaced child...");
        let argv = self.reexec_argv(&name)?;
        let pid = spawn(&NamespaceConfig::default(), &argv)
            .context("Failed to spawn namespaced child")?;
        self.advance(Phase::ProcessSpawned);

        info!("✅ Child spawned with pid {}", pid);

        // === NETWORK FABRIC (concurrent with the child's mount work) ===
        info!("🌐 Building network fabric...");
        apply_network(&self.settings, pid).context("Failed to set up network")?;
        self.advance(Phase::NetworkApplied);

        // Child is now past (or about to pass) its readiness poll
        self.advance(Phase::Running);
        info!("🚀 Container running, waiting for shell to exit...");

        let exit_code = wait(pid).context("Failed to wait for child")?;
        self.advance(Phase::Terminated);

        if exit_code == 0 {
            info!("✅ Container stopped successfully");
        } else {
            warn!("⚠️  Container exited with code: {}", exit_code);
        }

        Ok(exit_code)
    }

    /// Argument vector for the re-executed child: the same binary,
    /// dispatched to the hidden `init` subcommand
    fn reexec_argv(&self, name: &ContainerName) -> Result<Vec<CString>> {
        let argv = vec![
            CString::new("/proc/self/exe")?,
            CString::new("init")?,
            CString::new(name.as_str())?,
            CString::new("--container-dir")?,
            CString::new(self.layout.container_dir().as_os_str().as_bytes())?,
        ];
        Ok(argv)
    }
}

pub fn execute(args: RunArgs) -> Result<i32> {
    let name = ContainerName::new(&args.container_name).context("Invalid container name")?;

    let mut orchestrator = Orchestrator {
        phase: Phase::Init,
        layout: ContainerLayout::new(&args.container_dir, name),
        base_image: args.base_image,
        settings: NetworkSettings {
            bridge_name: args.bridge_name,
            bridge_cidr: args.bridge_cidr,
            container_cidr: args.container_cidr,
            veth_name_prefix: args.veth_name_prefix,
        },
    };

    orchestrator.run().inspect_err(|_| {
        orchestrator.advance(Phase::Failed);
    })
}
