//! Startup tick-frequency calibration.
//!
//! The tick loop sleeps a nominal period per tick, but the period the OS
//! actually delivers is longer and jittery. Calibration sleeps `ticks`
//! periods exactly the way the loop does and measures the elapsed time on
//! the free-running counter; every later duration → tick conversion uses the
//! measured frequency.

use crate::cycle::sleep_tick;
use crate::error::CalibrationError;
use std::time::Duration;
use stepr_common::hal::driver::FreeRunningCounter;

/// Measure the achieved tick frequency in Hz.
///
/// Blocks for roughly `ticks * period` plus scheduling overhead.
pub fn calibrate(
    counter: &dyn FreeRunningCounter,
    ticks: u32,
    period: Duration,
) -> Result<f64, CalibrationError> {
    if ticks == 0 {
        return Err(CalibrationError::ZeroTicks);
    }

    let start = counter.micros();
    for _ in 0..ticks {
        sleep_tick(period);
    }
    let elapsed_us = counter.micros().wrapping_sub(start) as i64;

    frequency_from_elapsed(ticks, elapsed_us).ok_or(CalibrationError::NoElapsedTime {
        counter: counter.name(),
        ticks,
        elapsed_us,
    })
}

/// `ticks / elapsed_us * 1e6`, or `None` for a non-positive elapsed time.
pub fn frequency_from_elapsed(ticks: u32, elapsed_us: i64) -> Option<f64> {
    (elapsed_us > 0).then(|| ticks as f64 / elapsed_us as f64 * 1_000_000.0)
}
