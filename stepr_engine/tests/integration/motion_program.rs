//! Moves, pauses and motor control, observed on the simulated pins.

use super::harness::{EXPECTED_HZ, Rig};
use stepr_common::hal::driver::Level;
use stepr_engine::{Command, EngineError, Program};

const TICK_LIMIT: u64 = 2_000_000;

#[test]
fn calibration_sets_tick_frequency() {
    let rig = Rig::calibrated();
    assert_eq!(rig.ctl.tick_frequency(), Some(EXPECTED_HZ));
    // Outputs untouched by calibration: coils released, steps low.
    assert!(!rig.coil_energized(0));
    assert!(!rig.coil_energized(1));
    assert_eq!(rig.steps(0), 0);
}

#[test]
fn reference_move_emits_every_step_forward() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(0, 10.0, 1.0, 1.0).unwrap();

    match &rig.ctl.commands(0).unwrap()[0] {
        Command::Move(m) => {
            assert_eq!(m.num_triggers, 4410);
            assert_eq!(m.init_num_cycles, 200);
            assert_eq!(m.end_num_cycles, 15);
        }
        other => panic!("expected a move, got {other:?}"),
    }

    rig.ctl.start_motor(0).unwrap();
    assert!(rig.coil_energized(0));
    rig.run_until_idle(TICK_LIMIT);

    assert_eq!(rig.steps(0), 4410);
    assert_eq!(rig.dir(0), Level::High);
    assert_eq!(rig.steps(1), 0);

    // The tick after the last step finds no work and releases the coil.
    assert!(rig.coil_energized(0));
    rig.tick();
    assert!(!rig.coil_energized(0));
}

#[test]
fn negative_distance_steps_in_reverse() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(1, -1.0, 0.5, 1.0).unwrap();
    rig.ctl.start_all();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(1), 441);
    assert_eq!(rig.dir(1), Level::Low);
}

#[test]
fn motors_pulse_in_the_same_tick() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(0, 0.1, 0.01, 1.0).unwrap();
    rig.ctl.queue_move(1, -0.1, 0.01, 1.0).unwrap();
    rig.ctl.start_all();

    // Both moves step on their first tick.
    let report = rig.tick();
    assert_eq!(report.pulses, 2);
    assert_eq!(rig.interp.last_pulses().len(), 2);

    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), 44);
    assert_eq!(rig.steps(1), 44);
    assert_eq!(rig.dir(0), Level::High);
    assert_eq!(rig.dir(1), Level::Low);
}

#[test]
fn start_all_skips_motors_without_work() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(0, 0.1, 0.01, 1.0).unwrap();
    rig.ctl.start_all();
    assert!(rig.ctl.is_stepping(0).unwrap());
    assert!(!rig.ctl.is_stepping(1).unwrap());
    assert!(!rig.coil_energized(1));
    rig.run_until_idle(TICK_LIMIT);
}

#[test]
fn pause_releases_coil_for_its_duration() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(0, 0.1, 0.01, 1.0).unwrap();
    rig.ctl.queue_pause(0, 0.01).unwrap();
    rig.ctl.queue_move(0, 0.1, 0.01, 1.0).unwrap();
    rig.ctl.start_motor(0).unwrap();

    while rig.ctl.cursor(0).unwrap() == 0 {
        rig.tick();
    }
    assert_eq!(rig.steps(0), 44);
    assert!(rig.coil_energized(0));

    // round(43478.26 * 0.01) - 1 = 434 ticks.
    let mut pause_ticks = 0;
    while rig.ctl.cursor(0).unwrap() == 1 {
        rig.tick();
        pause_ticks += 1;
        if rig.ctl.cursor(0).unwrap() == 1 {
            assert!(!rig.coil_energized(0), "coil held during pause tick {pause_ticks}");
        }
    }
    assert_eq!(pause_ticks, 434);
    assert!(rig.coil_energized(0));
    assert_eq!(rig.steps(0), 44);

    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), 88);
}

#[test]
fn restart_inside_pause_keeps_coil_released() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_pause(0, 0.01).unwrap();
    rig.ctl.start_motor(0).unwrap();
    for _ in 0..10 {
        rig.tick();
    }
    rig.ctl.stop_motor(0).unwrap();
    rig.ctl.start_motor(0).unwrap();
    assert!(rig.coil_energized(0));

    let mut pause_ticks = 10;
    while rig.ctl.cursor(0).unwrap() == 0 {
        rig.tick();
        pause_ticks += 1;
        if rig.ctl.cursor(0).unwrap() == 0 {
            assert!(!rig.coil_energized(0), "coil held during pause tick {pause_ticks}");
        }
    }
    assert_eq!(pause_ticks, 434);
    assert!(rig.coil_energized(0));
    assert_eq!(rig.steps(0), 0);
}

#[test]
fn work_queued_on_an_idle_stepping_motor_energizes_the_coil() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(0, 0.01, 0.001, 1.0).unwrap();
    rig.ctl.start_motor(0).unwrap();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), 4);
    rig.tick();
    assert!(!rig.coil_energized(0));
    assert!(rig.ctl.is_stepping(0).unwrap());

    rig.ctl.queue_move(0, 0.01, 0.001, 1.0).unwrap();
    for _ in 0..TICK_LIMIT {
        if rig.ctl.is_idle(0).unwrap() {
            break;
        }
        let before = rig.steps(0);
        rig.tick();
        if rig.steps(0) > before {
            assert!(rig.coil_energized(0), "step {} with coil released", rig.steps(0));
        }
    }
    assert_eq!(rig.steps(0), 8);
}

#[test]
fn stop_keeps_position_and_start_resumes() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(0, 1.0, 1.0, 1.0).unwrap();
    rig.ctl.start_motor(0).unwrap();
    for _ in 0..1_000 {
        rig.tick();
    }
    rig.ctl.stop_motor(0).unwrap();
    let partial = rig.steps(0);
    assert!(partial > 0 && partial < 441);
    assert!(!rig.coil_energized(0));
    assert!(rig.ctl.is_idle(0).unwrap());

    for _ in 0..100 {
        rig.tick();
    }
    assert_eq!(rig.steps(0), partial);

    rig.ctl.start_motor(0).unwrap();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), 441);
}

#[test]
fn reset_replays_from_the_first_command() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(0, 1.0, 1.0, 1.0).unwrap();
    rig.ctl.start_motor(0).unwrap();
    for _ in 0..1_000 {
        rig.tick();
    }
    rig.ctl.reset_motor(0).unwrap();
    let partial = rig.steps(0);
    assert_eq!(rig.ctl.cursor(0).unwrap(), 0);
    assert!(!rig.ctl.is_stepping(0).unwrap());
    assert_eq!(rig.ctl.queue_len(0).unwrap(), 1);

    rig.ctl.start_motor(0).unwrap();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), partial + 441);
}

#[test]
fn clear_drops_the_queue() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(0, 1.0, 1.0, 1.0).unwrap();
    rig.ctl.queue_pause(0, 0.5).unwrap();
    rig.ctl.start_motor(0).unwrap();
    rig.tick();
    rig.ctl.clear_motor(0).unwrap();
    assert_eq!(rig.ctl.queue_len(0).unwrap(), 0);
    assert_eq!(rig.ctl.cursor(0).unwrap(), 0);
    assert!(rig.ctl.is_idle(0).unwrap());
    assert!(!rig.coil_energized(0));

    // New work after a clear starts from scratch.
    rig.ctl.queue_move(0, 0.1, 0.01, 1.0).unwrap();
    rig.ctl.start_motor(0).unwrap();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), 1 + 44);
}

#[test]
fn rejected_commands_leave_the_queue_alone() {
    let rig = Rig::calibrated();
    assert!(matches!(
        rig.ctl.queue_move(0, 0.0001, 1.0, 1.0),
        Err(EngineError::MoveTooShort { .. })
    ));
    assert!(matches!(
        rig.ctl.queue_move(0, 1.0, 0.0, 1.0),
        Err(EngineError::InvalidDuration(_))
    ));
    assert!(matches!(
        rig.ctl.queue_move(0, 1.0, 1.0, -2.0),
        Err(EngineError::InvalidAcceleration(_))
    ));
    assert!(matches!(
        rig.ctl.queue_pause(5, 1.0),
        Err(EngineError::InvalidMotor { index: 5, count: 2 })
    ));
    assert!(matches!(
        rig.ctl.queue_loop_end(0, 0, 2),
        Err(EngineError::InvalidLoopStart { motor: 0, index: 0 })
    ));
    assert_eq!(rig.ctl.queue_len(0).unwrap(), 0);
}

#[test]
fn text_program_runs_on_one_motor() {
    let mut rig = Rig::calibrated();
    let program = Program::parse(
        "# two short strokes with a rest\n\
         loop 1 2\n\
         move 0.1 0.01\n\
         pause 0.001\n\
         endloop 1 2\n",
    )
    .unwrap();
    program.queue_on(&rig.ctl, 1).unwrap();
    assert_eq!(rig.ctl.queue_len(1).unwrap(), 4);

    rig.ctl.start_all();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(1), 88);
    assert_eq!(rig.steps(0), 0);
}

#[test]
fn text_program_appends_after_existing_commands() {
    let mut rig = Rig::calibrated();
    rig.ctl.queue_move(0, 0.1, 0.01, 1.0).unwrap();
    Program::parse("loop 9 3\nmove -0.1 0.01 2.0\nendloop 9 3")
        .unwrap()
        .queue_on(&rig.ctl, 0)
        .unwrap();

    rig.ctl.start_motor(0).unwrap();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), 44 * 4);
    assert_eq!(rig.dir(0), Level::Low);
}
