//! Queued motor commands and their per-tick state machines.
//!
//! Every command counts down in ticks ("cycles") to its next trigger event.
//! A [`MoveCmd`] emits one step per trigger and ramps its cycles-per-step
//! down towards the cruise value; a [`PauseCmd`] triggers once and keeps
//! the coil released while it waits; a [`LoopEndCmd`] jumps back to its loop start.
//!
//! Commands keep their initial values so a finished command is rewound in
//! place and replays identically on the next loop pass or after a reset.

use crate::error::EngineError;
use stepr_common::consts::RAMP_NUMERATOR;
use stepr_common::hal::config::MotorConfig;
use stepr_common::hal::driver::Level;

// ─── Direction / loop count ─────────────────────────────────────────

/// Travel direction of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Positive distance; direction pin high.
    Forward,
    /// Negative distance; direction pin low.
    Reverse,
}

impl Direction {
    /// Direction of a signed distance.
    pub fn of(distance: f64) -> Self {
        if distance < 0.0 {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }

    /// Level written to the direction pin.
    #[inline]
    pub const fn level(self) -> Level {
        match self {
            Direction::Forward => Level::High,
            Direction::Reverse => Level::Low,
        }
    }
}

/// Iteration count of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    /// Body runs exactly `n` times.
    Bounded(u32),
    /// Body repeats until the motor is stopped.
    Infinite,
}

impl LoopCount {
    /// Map a signed iteration count: negative is infinite, zero is rejected.
    pub fn from_iterations(iterations: i64) -> Result<Self, EngineError> {
        match iterations {
            0 => Err(EngineError::InvalidIterations),
            n if n < 0 => Ok(LoopCount::Infinite),
            n => u32::try_from(n)
                .map(LoopCount::Bounded)
                .map_err(|_| EngineError::InvalidIterations),
        }
    }
}

// ─── Ramp ───────────────────────────────────────────────────────────

/// Cycles-per-step for trigger number `ni` given the previous value.
///
/// `next = current - 2 * current / (4 * ni)`, truncated and clamped to `end`.
/// Never increases.
#[inline]
pub fn ramp_next(current: u64, ni: u32, end: u64) -> u64 {
    let c = current as f64;
    let next = (c - 2.0 * c / (4.0 * ni as f64)) as u64;
    next.min(current).max(end)
}

// ─── Move ───────────────────────────────────────────────────────────

/// Outcome of one tick of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTick {
    /// No step this tick.
    Wait,
    /// Step; more steps remain.
    Step,
    /// Final step; the move rewound itself.
    LastStep,
}

/// Ramped constant-direction move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveCmd {
    /// Steps left in this pass.
    pub trigger_counter: u32,
    /// Total steps.
    pub num_triggers: u32,
    /// Ticks left until the next step.
    pub cycle_counter: u64,
    /// Current ticks per step.
    pub num_cycles: u64,
    /// Ticks per step at the start of the ramp.
    pub init_num_cycles: u64,
    /// Cruise ticks per step.
    pub end_num_cycles: u64,
    /// Travel direction.
    pub dir: Direction,
}

impl MoveCmd {
    /// Build a move of `distance` mm over `duration` s for `motor`.
    ///
    /// # Errors
    /// Validation errors for non-finite or out-of-range inputs,
    /// `MoveTooShort` when the distance is below one step, and
    /// `NotCalibrated` when `tick_frequency` is not yet known.
    pub fn new(
        distance: f64,
        duration: f64,
        accel: f64,
        motor: &MotorConfig,
        tick_frequency: f64,
    ) -> Result<Self, EngineError> {
        if !distance.is_finite() || distance == 0.0 {
            return Err(EngineError::InvalidDistance(distance));
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(EngineError::InvalidDuration(duration));
        }
        if !accel.is_finite() || accel <= 0.0 {
            return Err(EngineError::InvalidAcceleration(accel));
        }
        if !tick_frequency.is_finite() || tick_frequency <= 0.0 {
            return Err(EngineError::NotCalibrated);
        }

        let distance_abs = distance.abs();
        let steps = (distance_abs * motor.steps_per_mm).round();
        if steps < 1.0 {
            return Err(EngineError::MoveTooShort {
                distance,
                steps_per_mm: motor.steps_per_mm,
            });
        }
        if steps > u32::MAX as f64 {
            return Err(EngineError::InvalidDistance(distance));
        }
        let num_triggers = steps as u32;

        let steps_per_sec = distance_abs / duration * motor.steps_per_mm;
        let end = ((tick_frequency / steps_per_sec).round() as u64)
            .max(motor.min_cycles_per_step as u64);
        let start = ((RAMP_NUMERATOR / accel).round() as u64).max(end);

        Ok(Self {
            trigger_counter: num_triggers,
            num_triggers,
            cycle_counter: 1,
            num_cycles: start,
            init_num_cycles: start,
            end_num_cycles: end,
            dir: Direction::of(distance),
        })
    }

    /// Advance one tick.
    pub fn tick(&mut self) -> MoveTick {
        self.cycle_counter = self.cycle_counter.saturating_sub(1);
        if self.cycle_counter > 0 {
            return MoveTick::Wait;
        }

        self.trigger_counter = self.trigger_counter.saturating_sub(1);
        if self.trigger_counter > 0 {
            let ni = self.num_triggers - self.trigger_counter + 1;
            self.num_cycles = ramp_next(self.num_cycles, ni, self.end_num_cycles);
            self.cycle_counter = self.num_cycles;
            MoveTick::Step
        } else {
            self.rewind();
            MoveTick::LastStep
        }
    }

    /// Restore the freshly queued state.
    pub fn rewind(&mut self) {
        self.num_cycles = self.init_num_cycles;
        self.cycle_counter = 1;
        self.trigger_counter = self.num_triggers;
    }
}

// ─── Pause ──────────────────────────────────────────────────────────

/// Timed wait with the coil released.
#[derive(Debug, Clone, PartialEq)]
pub struct PauseCmd {
    /// Triggers left (always 1 per pass).
    pub trigger_counter: u32,
    /// Total triggers.
    pub num_triggers: u32,
    /// Ticks left.
    pub cycle_counter: u64,
    /// Pause length in ticks.
    pub num_cycles: u64,
}

impl PauseCmd {
    /// Build a pause of `duration` seconds.
    ///
    /// # Errors
    /// `InvalidDuration` for non-positive durations, `NotCalibrated` before
    /// the tick frequency is known.
    pub fn new(duration: f64, tick_frequency: f64) -> Result<Self, EngineError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(EngineError::InvalidDuration(duration));
        }
        if !tick_frequency.is_finite() || tick_frequency <= 0.0 {
            return Err(EngineError::NotCalibrated);
        }
        let ticks = ((tick_frequency * duration).round() - 1.0).max(1.0) as u64;
        Ok(Self {
            trigger_counter: 1,
            num_triggers: 1,
            cycle_counter: ticks,
            num_cycles: ticks,
        })
    }

    /// Advance one tick; `true` once the pause has elapsed and rewound.
    pub fn tick(&mut self) -> bool {
        self.cycle_counter = self.cycle_counter.saturating_sub(1);
        if self.cycle_counter > 0 {
            return false;
        }

        self.cycle_counter = self.num_cycles;
        self.trigger_counter = self.trigger_counter.saturating_sub(1);
        if self.trigger_counter == 0 {
            self.trigger_counter = self.num_triggers;
            return true;
        }
        false
    }

    /// Restore the freshly queued state.
    pub fn rewind(&mut self) {
        self.cycle_counter = self.num_cycles;
        self.trigger_counter = self.num_triggers;
    }
}

// ─── Loop end ───────────────────────────────────────────────────────

/// Outcome of visiting a loop end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTick {
    /// Set the cursor to this queue index.
    Jump(usize),
    /// Loop finished; continue after it.
    Exit,
}

/// Jump back to a loop start a fixed or infinite number of times.
///
/// Triggers on every visit.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopEndCmd {
    /// Queue index of the matching loop start.
    pub start_index: usize,
    /// Configured iterations.
    pub count: LoopCount,
    /// Passes left in the current run of the loop (bounded loops only).
    pub remaining: u32,
}

impl LoopEndCmd {
    /// Loop end jumping back to `start_index`.
    pub fn new(start_index: usize, count: LoopCount) -> Self {
        let remaining = match count {
            LoopCount::Bounded(n) => n,
            LoopCount::Infinite => 0,
        };
        Self {
            start_index,
            count,
            remaining,
        }
    }

    /// Visit the loop end.
    pub fn tick(&mut self) -> LoopTick {
        match self.count {
            LoopCount::Infinite => LoopTick::Jump(self.start_index),
            LoopCount::Bounded(n) => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining > 0 {
                    LoopTick::Jump(self.start_index)
                } else {
                    self.remaining = n;
                    LoopTick::Exit
                }
            }
        }
    }

    /// Restore the freshly queued state.
    pub fn rewind(&mut self) {
        if let LoopCount::Bounded(n) = self.count {
            self.remaining = n;
        }
    }
}

// ─── Command ────────────────────────────────────────────────────────

/// One queued command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Ramped move.
    Move(MoveCmd),
    /// Timed pause with coil released.
    Pause(PauseCmd),
    /// Loop marker; skipped by the interpreter.
    LoopStart,
    /// Jump back to a loop start.
    LoopEnd(LoopEndCmd),
    /// Measure the achieved tick frequency over `ticks` tick periods.
    CalibrateFrequency {
        /// Tick periods to sleep.
        ticks: u32,
    },
}

impl Command {
    /// Total trigger events: steps for a move, 1 for a pause, iterations for
    /// a bounded loop end, 0 otherwise.
    pub fn num_triggers(&self) -> u32 {
        match self {
            Command::Move(m) => m.num_triggers,
            Command::Pause(p) => p.num_triggers,
            Command::LoopEnd(LoopEndCmd {
                count: LoopCount::Bounded(n),
                ..
            }) => *n,
            _ => 0,
        }
    }

    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Move(_) => "move",
            Command::Pause(_) => "pause",
            Command::LoopStart => "loop-start",
            Command::LoopEnd(_) => "loop-end",
            Command::CalibrateFrequency { .. } => "calibrate",
        }
    }

    /// Restore the freshly queued state.
    pub fn rewind(&mut self) {
        match self {
            Command::Move(m) => m.rewind(),
            Command::Pause(p) => p.rewind(),
            Command::LoopEnd(l) => l.rewind(),
            Command::LoopStart | Command::CalibrateFrequency { .. } => {}
        }
    }
}
