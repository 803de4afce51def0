//! Free-running microsecond counters.
//!
//! | Counter | Source | `is_hardware` |
//! |---------|--------|---------------|
//! | [`SystemTimerCounter`] | BCM2835 1 MHz system timer via `/dev/mem` | yes |
//! | [`MonotonicCounter`] | `std::time::Instant` | no |
//! | [`SimulationCounter`] | fixed advance per read | no |

use memmap2::{Mmap, MmapOptions};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use stepr_common::hal::config::{CounterKind, HardwareConfig};
use stepr_common::hal::driver::{FreeRunningCounter, HalError};
use tracing::{info, warn};

const DEV_MEM: &str = "/dev/mem";
const PAGE_SIZE: u64 = 4096;

/// Counter lower 32 bits.
const ST_CLO: usize = 0x04 / 4;
/// Counter upper 32 bits.
const ST_CHI: usize = 0x08 / 4;

// ─── System timer ───────────────────────────────────────────────────

/// BCM2835 system timer, mapped read-only from `/dev/mem`.
pub struct SystemTimerCounter {
    _map: Mmap,
    regs: *const u32,
}

// SAFETY: `regs` points into `_map`; the counter registers are only read.
unsafe impl Send for SystemTimerCounter {}
unsafe impl Sync for SystemTimerCounter {}

impl SystemTimerCounter {
    /// Map the timer page at physical address `base` and check that it ticks.
    ///
    /// # Errors
    /// - `HalError::ConfigError` if `base` is not page aligned
    /// - `HalError::HardwareUnavailable` if `/dev/mem` cannot be mapped or the
    ///   counter does not advance
    pub fn open(base: u64) -> Result<Self, HalError> {
        if base % PAGE_SIZE != 0 {
            return Err(HalError::ConfigError(format!(
                "system_timer_base {base:#x} is not page aligned"
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_SYNC)
            .open(DEV_MEM)
            .map_err(|e| HalError::HardwareUnavailable(format!("cannot open {DEV_MEM}: {e}")))?;

        // SAFETY: read-only mapping of device registers, accessed volatile.
        let map = unsafe {
            MmapOptions::new()
                .offset(base)
                .len(PAGE_SIZE as usize)
                .map(&file)
        }
        .map_err(|e| {
            HalError::HardwareUnavailable(format!("cannot map system timer at {base:#x}: {e}"))
        })?;
        let regs = map.as_ptr() as *const u32;

        let counter = Self { _map: map, regs };
        let first = counter.micros();
        std::thread::sleep(Duration::from_millis(1));
        let second = counter.micros();
        if second <= first {
            return Err(HalError::HardwareUnavailable(format!(
                "system timer at {base:#x} is not advancing ({first} -> {second})"
            )));
        }

        info!("Mapped system timer at {:#x}", base);
        Ok(counter)
    }

    #[inline]
    fn reg(&self, index: usize) -> u32 {
        // SAFETY: ST_CLO/ST_CHI are inside the mapped page.
        unsafe { core::ptr::read_volatile(self.regs.add(index)) }
    }
}

impl FreeRunningCounter for SystemTimerCounter {
    fn name(&self) -> &'static str {
        "system-timer"
    }

    #[inline]
    fn micros(&self) -> u64 {
        // CLO may wrap between the two halves; retry until CHI is stable.
        loop {
            let hi = self.reg(ST_CHI);
            let lo = self.reg(ST_CLO);
            if self.reg(ST_CHI) == hi {
                return ((hi as u64) << 32) | lo as u64;
            }
        }
    }
}

// ─── Software clocks ────────────────────────────────────────────────

/// `Instant`-based counter. Subject to OS clock resolution.
pub struct MonotonicCounter {
    origin: Instant,
}

impl MonotonicCounter {
    /// Counter starting at zero now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeRunningCounter for MonotonicCounter {
    fn name(&self) -> &'static str {
        "monotonic"
    }

    fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn is_hardware(&self) -> bool {
        false
    }
}

/// Deterministic counter for tests: every read returns the current value and
/// then advances it by `step_us`.
///
/// Two consecutive reads are therefore exactly `step_us` apart, which makes a
/// calibration over `K` ticks measure `K / step_us * 1e6` Hz.
pub struct SimulationCounter {
    now: AtomicU64,
    step_us: u64,
}

impl SimulationCounter {
    /// Counter at zero advancing `step_us` per read.
    pub fn new(step_us: u64) -> Self {
        Self {
            now: AtomicU64::new(0),
            step_us,
        }
    }

    /// Move the counter forward without a read.
    pub fn advance(&self, us: u64) {
        self.now.fetch_add(us, Ordering::Relaxed);
    }

    /// Current value without advancing.
    pub fn peek(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

impl FreeRunningCounter for SimulationCounter {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn micros(&self) -> u64 {
        self.now.fetch_add(self.step_us, Ordering::Relaxed)
    }

    fn is_hardware(&self) -> bool {
        false
    }
}

// ─── Selection ──────────────────────────────────────────────────────

/// Open the counter selected by `config.counter`.
///
/// A system timer that cannot be mapped is fatal unless
/// `allow_software_clock` is set, in which case the monotonic clock is used
/// and the degradation is logged.
pub fn open_counter(config: &HardwareConfig) -> Result<Arc<dyn FreeRunningCounter>, HalError> {
    match config.counter {
        CounterKind::SystemTimer => match SystemTimerCounter::open(config.system_timer_base) {
            Ok(counter) => Ok(Arc::new(counter)),
            Err(e) if config.allow_software_clock => {
                warn!(
                    "System timer unavailable ({}); falling back to monotonic clock, \
                     pulse timing precision is degraded",
                    e
                );
                Ok(Arc::new(MonotonicCounter::new()))
            }
            Err(e) => Err(e),
        },
        CounterKind::Monotonic => {
            warn!("Using monotonic software clock; pulse timing precision is degraded");
            Ok(Arc::new(MonotonicCounter::new()))
        }
    }
}
