//! Property tests on the per-motor program state machine.

use proptest::prelude::*;
use stepr_common::hal::config::{MotorConfig, MotorPins};
use stepr_engine::command::{Command, LoopCount, LoopEndCmd, MoveCmd};
use stepr_engine::interpreter::advance_program;
use stepr_engine::motor::MotorProgram;

const FREQ: f64 = 43_478.26;

fn motor() -> MotorConfig {
    MotorConfig {
        name: "p".into(),
        pins: MotorPins {
            step: 17,
            dir: 18,
            enable: 2,
            limit_low: None,
            limit_high: None,
        },
        steps_per_mm: 441.0,
        min_cycles_per_step: 15,
    }
}

/// Run until the program is exhausted; returns the tick index of every step.
fn step_ticks(program: &mut MotorProgram, limit: u64) -> Vec<u64> {
    let mut ticks = Vec::new();
    for tick in 0..limit {
        let out = advance_program(program);
        if !out.active {
            return ticks;
        }
        if out.step.is_some() {
            ticks.push(tick);
        }
    }
    panic!("program still running after {limit} ticks");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn move_emits_exactly_its_step_count(
        distance in prop_oneof![-0.5f64..-0.01, 0.01f64..0.5],
        duration in 0.05f64..1.0,
        accel in 0.5f64..4.0,
    ) {
        let cmd = MoveCmd::new(distance, duration, accel, &motor(), FREQ).unwrap();
        let expected = (distance.abs() * 441.0).round() as usize;
        prop_assert_eq!(cmd.num_triggers as usize, expected);

        let mut program = MotorProgram::new();
        program.push(Command::Move(cmd));
        let steps = step_ticks(&mut program, 5_000_000);
        prop_assert_eq!(steps.len(), expected);
    }

    #[test]
    fn ramp_intervals_never_grow_and_respect_cruise(
        distance in 0.02f64..0.5,
        duration in 0.01f64..1.0,
        accel in 0.25f64..8.0,
    ) {
        let cmd = MoveCmd::new(distance, duration, accel, &motor(), FREQ).unwrap();
        let (start, end) = (cmd.init_num_cycles, cmd.end_num_cycles);
        prop_assert!(start >= end);
        prop_assert!(end >= 15);

        let mut program = MotorProgram::new();
        program.push(Command::Move(cmd));
        let steps = step_ticks(&mut program, 5_000_000);
        prop_assert_eq!(steps[0], 0);

        let intervals: Vec<u64> = steps.windows(2).map(|w| w[1] - w[0]).collect();
        for pair in intervals.windows(2) {
            prop_assert!(pair[1] <= pair[0], "interval grew: {:?}", pair);
        }
        for interval in &intervals {
            prop_assert!(*interval >= end && *interval <= start);
        }
    }

    #[test]
    fn bounded_loop_multiplies_steps(iterations in 1i64..6, distance in 0.01f64..0.05) {
        let move_cmd = MoveCmd::new(distance, 0.01, 1.0, &motor(), FREQ).unwrap();
        let per_pass = move_cmd.num_triggers as usize;

        let mut program = MotorProgram::new();
        let start = program.push(Command::LoopStart);
        program.push(Command::Move(move_cmd));
        let count = LoopCount::from_iterations(iterations).unwrap();
        program.push(Command::LoopEnd(LoopEndCmd::new(start, count)));

        let steps = step_ticks(&mut program, 5_000_000);
        prop_assert_eq!(steps.len(), per_pass * iterations as usize);
    }

    #[test]
    fn infinite_loop_never_exhausts(ticks in 1u64..20_000, negative in i64::MIN..0) {
        let mut program = MotorProgram::new();
        let start = program.push(Command::LoopStart);
        program.push(Command::Move(MoveCmd::new(0.01, 0.001, 1.0, &motor(), FREQ).unwrap()));
        let count = LoopCount::from_iterations(negative).unwrap();
        prop_assert_eq!(count, LoopCount::Infinite);
        program.push(Command::LoopEnd(LoopEndCmd::new(start, count)));

        for _ in 0..ticks {
            prop_assert!(advance_program(&mut program).active);
        }
        prop_assert!(!program.is_exhausted());
    }
}
