//! Real-time setup for the control process (Linux SCHED_FIFO, affinity,
//! mlockall; macOS mlockall only). Applied at most once per process; every
//! step that fails is logged and skipped.

use crate::cli::{RtArgs, RtLock};
use std::sync::OnceLock;

static RT_ONCE: OnceLock<()> = OnceLock::new();

pub fn setup_rt_once(args: &RtArgs) {
    if !args.rt {
        return;
    }
    let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
    RT_ONCE.get_or_init(|| {
        match lock_memory(lock) {
            Ok(()) => tracing::info!(?lock, "rt: memory lock applied"),
            Err(e) => tracing::warn!(error = %e, "rt: mlockall failed"),
        }
        apply_scheduling(args);
    });
}

fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
    // SAFETY: mlockall only takes flag bits and touches no Rust memory.
    let rc = unsafe { libc::mlockall(flags) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn lock_memory(lock: RtLock) -> eyre::Result<()> {
    let result = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => mlockall(libc::MCL_CURRENT),
        RtLock::All => mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE),
    };
    let Err(err) = result else {
        return Ok(());
    };
    let retryable = matches!(err.raw_os_error(), Some(c) if c == libc::EPERM || c == libc::ENOMEM);
    // Future pages may exceed the memlock limit; current pages alone often fit.
    if lock == RtLock::All && retryable && mlockall(libc::MCL_CURRENT).is_ok() {
        tracing::warn!(error = %err, "rt: mlockall(all) failed, locked current pages only");
        return Ok(());
    }
    if retryable {
        eyre::bail!("{err}; needs CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'");
    }
    Err(err.into())
}

#[cfg(target_os = "linux")]
fn apply_scheduling(args: &RtArgs) {
    if let Err(e) = fifo_priority(args.rt_prio) {
        tracing::warn!(prio = ?args.rt_prio, error = %e, "rt: SCHED_FIFO not applied");
    }
    if let Err(e) = pin_cpu(args.rt_cpu.unwrap_or(0)) {
        tracing::warn!(error = %e, "rt: affinity not applied");
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_scheduling(_args: &RtArgs) {
    tracing::warn!("rt: SCHED_FIFO and affinity are Linux only; memory lock applied alone");
}

#[cfg(target_os = "linux")]
fn fifo_priority(prio: Option<i32>) -> eyre::Result<()> {
    // SAFETY: plain syscalls on the current process with a stack-owned param.
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let param = libc::sched_param {
        sched_priority: prio.unwrap_or(max).clamp(min, max),
    };
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            eyre::bail!("{err}; needs CAP_SYS_NICE or root");
        }
        return Err(err.into());
    }
    tracing::info!(priority = param.sched_priority, "rt: SCHED_FIFO applied");
    Ok(())
}

#[cfg(target_os = "linux")]
fn pin_cpu(cpu: usize) -> eyre::Result<()> {
    let capacity = std::mem::size_of::<libc::cpu_set_t>() * 8;
    if cpu >= capacity {
        eyre::bail!("CPU {cpu} exceeds cpu_set_t capacity {capacity}");
    }
    // SAFETY: cpu_set_t is plain data; zeroed is its empty set and the
    // affinity calls only read/write the set we own.
    unsafe {
        let mut allowed: libc::cpu_set_t = std::mem::zeroed();
        if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut allowed) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        if !libc::CPU_ISSET(cpu, &allowed) {
            eyre::bail!("CPU {cpu} not permitted by current affinity mask");
        }
        let mut wanted: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut wanted);
        libc::CPU_SET(cpu, &mut wanted);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &wanted) != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
    }
    tracing::info!(cpu, "rt: pinned");
    Ok(())
}
