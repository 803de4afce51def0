//! Tick loop: RT setup, pacing and statistics.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` - lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` - optional pin to one CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)` - RT priority.
//!
//! Every step is best-effort: a failure is logged and the loop runs with
//! whatever the OS granted.
//!
//! ## Tick Loop
//! One [`TickInterpreter::tick`] followed by one relative sleep of the tick
//! period. The stop flag is checked once per tick.

use crate::controller::{Controller, LoopStatus};
use crate::error::CalibrationError;
use crate::interpreter::TickInterpreter;
use std::time::{Duration, Instant};
use stepr_common::config::RtConfig;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Ticks between two periodic statistics log lines.
const STATS_LOG_INTERVAL: u64 = 100_000;

/// Stack bytes touched before entering the loop.
const PREFAULT_STACK_BYTES: usize = 256 * 1024;

// ─── Tick Statistics ────────────────────────────────────────────────

/// O(1) per-tick timing statistics.
///
/// Measures the tick body only (interpreter work and pulse output), not the
/// inter-tick sleep. An overrun is a body longer than the nominal period.
#[derive(Debug, Clone)]
pub struct TickStats {
    /// Ticks recorded.
    pub tick_count: u64,
    /// Last body duration [ns].
    pub last_tick_ns: u64,
    /// Minimum body duration [ns].
    pub min_tick_ns: u64,
    /// Maximum body duration [ns].
    pub max_tick_ns: u64,
    /// Running sum for the average.
    pub sum_tick_ns: u128,
    /// Bodies longer than the tick period.
    pub overruns: u64,
}

impl TickStats {
    /// Zeroed stats.
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            last_tick_ns: 0,
            min_tick_ns: u64::MAX,
            max_tick_ns: 0,
            sum_tick_ns: 0,
            overruns: 0,
        }
    }

    /// Record one tick body. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: u64, budget_ns: u64) {
        self.tick_count += 1;
        self.last_tick_ns = duration_ns;
        self.min_tick_ns = self.min_tick_ns.min(duration_ns);
        self.max_tick_ns = self.max_tick_ns.max(duration_ns);
        self.sum_tick_ns += duration_ns as u128;
        if duration_ns > budget_ns {
            self.overruns += 1;
        }
    }

    /// Average body duration [ns] (0 if no ticks).
    #[inline]
    pub fn avg_tick_ns(&self) -> u64 {
        if self.tick_count == 0 {
            0
        } else {
            (self.sum_tick_ns / self.tick_count as u128) as u64
        }
    }
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// A single RT setup step that the OS refused.
#[derive(Debug, Error)]
pub enum RtSetupError {
    /// `mlockall` failed (usually missing `CAP_IPC_LOCK` / memlock limit).
    #[error("mlockall failed: {0}")]
    MemoryLock(nix::Error),

    /// CPU affinity could not be applied.
    #[error("sched_setaffinity({cpu}) failed: {source}")]
    Affinity {
        /// Requested core.
        cpu: usize,
        /// OS error.
        source: nix::Error,
    },

    /// SCHED_FIFO could not be applied.
    #[error("sched_setscheduler(SCHED_FIFO, {priority}) failed: {source}")]
    Scheduler {
        /// Requested priority.
        priority: i32,
        /// OS error.
        source: std::io::Error,
    },
}

/// What [`rt_setup`] achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtSetupReport {
    /// All pages locked.
    pub memory_locked: bool,
    /// Core the thread is pinned to.
    pub cpu_core: Option<usize>,
    /// SCHED_FIFO priority in effect.
    pub fifo_priority: Option<i32>,
}

fn rt_mlockall() -> Result<(), RtSetupError> {
    use nix::sys::mman::{MlockAllFlags, mlockall};
    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE).map_err(RtSetupError::MemoryLock)
}

/// Touch stack pages so the loop does not fault them in later.
fn prefault_stack() {
    let mut buf = [0u8; PREFAULT_STACK_BYTES];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid exclusive reference.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(target_os = "linux")]
fn rt_set_affinity(cpu: usize) -> Result<(), RtSetupError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|source| RtSetupError::Affinity { cpu, source })?;
    sched_setaffinity(Pid::from_raw(0), &cpuset).map_err(|source| RtSetupError::Affinity { cpu, source })
}

#[cfg(not(target_os = "linux"))]
fn rt_set_affinity(cpu: usize) -> Result<(), RtSetupError> {
    Err(RtSetupError::Affinity {
        cpu,
        source: nix::Error::ENOSYS,
    })
}

/// Highest SCHED_FIFO priority the OS supports.
pub fn max_fifo_priority() -> i32 {
    // SAFETY: plain syscall wrapper without pointer arguments.
    unsafe { libc::sched_get_priority_max(libc::SCHED_FIFO) }
}

fn rt_set_scheduler(priority: i32) -> Result<(), RtSetupError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        return Err(RtSetupError::Scheduler {
            priority,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// Apply the RT requests in `config` to the calling thread.
pub fn rt_setup(config: &RtConfig) -> RtSetupReport {
    let mut report = RtSetupReport::default();

    if config.lock_memory {
        match rt_mlockall() {
            Ok(()) => report.memory_locked = true,
            Err(e) => warn!("{e}; page faults may stall ticks"),
        }
    }

    prefault_stack();

    if let Some(cpu) = config.cpu_core {
        match rt_set_affinity(cpu) {
            Ok(()) => report.cpu_core = Some(cpu),
            Err(e) => warn!("{e}; tick thread not pinned"),
        }
    }

    if config.enabled {
        let priority = config.priority.unwrap_or_else(max_fifo_priority);
        match rt_set_scheduler(priority) {
            Ok(()) => report.fifo_priority = Some(priority),
            Err(e) => warn!("{e}; running on the default scheduler, expect jitter"),
        }
    }

    report
}

// ─── Pacing ─────────────────────────────────────────────────────────

/// Sleep one tick period (relative, `CLOCK_MONOTONIC`).
#[cfg(target_os = "linux")]
#[inline]
pub fn sleep_tick(period: Duration) {
    use nix::sys::time::TimeSpec;
    use nix::time::{ClockId, ClockNanosleepFlags, clock_nanosleep};

    let request = TimeSpec::from(period);
    // EINTR only shortens one tick.
    let _ = clock_nanosleep(ClockId::CLOCK_MONOTONIC, ClockNanosleepFlags::empty(), &request);
}

/// Sleep one tick period.
#[cfg(not(target_os = "linux"))]
#[inline]
pub fn sleep_tick(period: Duration) {
    std::thread::sleep(period);
}

// ─── Loop ───────────────────────────────────────────────────────────

/// Run the tick loop on the calling thread until a stop is requested.
///
/// Sets the controller status to `Terminated` on a clean exit and to
/// `Failed` when calibration fails.
pub fn run_tick_loop(controller: &Controller, rt: &RtConfig) -> Result<TickStats, CalibrationError> {
    let report = rt_setup(rt);
    info!(
        "Tick thread up: memory_locked={}, cpu={:?}, fifo_priority={:?}",
        report.memory_locked, report.cpu_core, report.fifo_priority
    );

    let period = controller.timing().tick_period();
    let budget_ns = controller.timing().tick_period_ns;
    let mut interpreter = TickInterpreter::new();
    let mut stats = TickStats::new();

    while controller.status() == LoopStatus::Running {
        let start = Instant::now();
        let tick = match interpreter.tick(controller) {
            Ok(tick) => tick,
            Err(e) => {
                error!("Tick loop failed: {e}");
                controller.park_outputs();
                controller.set_status(LoopStatus::Failed);
                return Err(e);
            }
        };

        if !tick.calibrated {
            stats.record(start.elapsed().as_nanos() as u64, budget_ns);
            if stats.tick_count % STATS_LOG_INTERVAL == 0 {
                debug!(
                    "Ticks: {} avg={}ns max={}ns overruns={}",
                    stats.tick_count,
                    stats.avg_tick_ns(),
                    stats.max_tick_ns,
                    stats.overruns
                );
            }
        }

        sleep_tick(period);
    }

    controller.set_status(LoopStatus::Terminated);
    info!(
        "Tick loop stopped after {} ticks: min={}ns avg={}ns max={}ns overruns={}",
        stats.tick_count,
        if stats.tick_count == 0 { 0 } else { stats.min_tick_ns },
        stats.avg_tick_ns(),
        stats.max_tick_ns,
        stats.overruns
    );
    Ok(stats)
}
