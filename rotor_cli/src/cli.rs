//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rotor", version, about = "Rotor rig sensing and control")]
pub struct Cli {
    /// Path to config TOML; every section falls back to the rig defaults
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results and errors as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins if set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, CPU affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode.\n\nLinux: SCHED_FIFO priority, pin to one CPU and mlockall. Needs CAP_SYS_NICE / CAP_IPC_LOCK (or root) and a large enough 'ulimit -l'. Failures are logged and the run continues."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority (Linux); clamped to the system range
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt
    #[arg(long, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin to (Linux); defaults to 0
    #[arg(long, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fly the simulated rig for a number of control cycles
    Run {
        /// Control cycles to run
        #[arg(long, default_value_t = 500)]
        cycles: u64,
        /// Target height index (0..=10) applied after the ground is captured
        #[arg(long, default_value_t = 0)]
        height: usize,
        /// Target yaw index (0..=23) applied after the ground is captured
        #[arg(long, default_value_t = 0)]
        yaw: usize,
        /// Turn the potentiometer to this code after the first cycle
        #[arg(long, value_name = "CODE", value_parser = clap::value_parser!(u32).range(0..=4095))]
        pot: Option<u32>,
        /// Write every handoff transition as CSV
        #[arg(long, value_name = "FILE")]
        trace: Option<PathBuf>,
        /// Write one CSV row per control cycle
        #[arg(long, value_name = "FILE")]
        record: Option<PathBuf>,
        /// Run sampler and control on their own threads
        #[arg(long, action = ArgAction::SetTrue)]
        threaded: bool,
        #[command(flatten)]
        rt: RtArgs,
    },
    /// Run a few parked cycles against the simulated rig
    SelfCheck,
    /// Load and validate the config, then exit
    CheckConfig,
}
