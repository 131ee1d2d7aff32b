//! CLI argument definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vessel_net::config::{
    DEFAULT_BRIDGE_CIDR, DEFAULT_BRIDGE_NAME, DEFAULT_CONTAINER_CIDR, DEFAULT_VETH_PREFIX,
};
use vessel_rootfs::{DEFAULT_BASE_IMAGE, DEFAULT_CONTAINER_DIR};

#[derive(Parser)]
#[command(name = "vessel")]
#[command(about = "Vessel container runtime", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a container
    Run(RunArgs),

    /// Continue container bring-up inside the new namespaces.
    /// Invoked by `run` through /proc/self/exe, never by hand.
    #[command(hide = true)]
    Init(InitArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Container name (also used as hostname and rootfs directory)
    #[arg(long, default_value = "mycontainer")]
    pub container_name: String,

    /// Directory holding images/ and rootfs/
    #[arg(long, default_value = DEFAULT_CONTAINER_DIR)]
    pub container_dir: PathBuf,

    /// Base image archive under <container-dir>/images/
    #[arg(long, default_value = DEFAULT_BASE_IMAGE)]
    pub base_image: String,

    /// Bridge interface name
    #[arg(long, default_value = DEFAULT_BRIDGE_NAME)]
    pub bridge_name: String,

    /// Bridge address in CIDR notation
    #[arg(long, default_value = DEFAULT_BRIDGE_CIDR)]
    pub bridge_cidr: String,

    /// Container address in CIDR notation
    #[arg(long, default_value = DEFAULT_CONTAINER_CIDR)]
    pub container_cidr: String,

    /// Name prefix for the veth pair (<prefix>0 on the host, <prefix>1 in the container)
    #[arg(long, default_value = DEFAULT_VETH_PREFIX)]
    pub veth_name_prefix: String,
}

#[derive(Args)]
pub struct InitArgs {
    /// Container name
    pub container_name: String,

    /// Directory holding images/ and rootfs/
    #[arg(long, default_value = DEFAULT_CONTAINER_DIR)]
    pub container_dir: PathBuf,
}
