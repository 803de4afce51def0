//! Loop markers: bounded, nested, infinite.

use super::harness::Rig;

const TICK_LIMIT: u64 = 1_000_000;

/// 0.01 mm at 441 steps/mm = 4 steps.
fn queue_short_move(rig: &Rig, motor: usize) {
    rig.ctl.queue_move(motor, 0.01, 0.001, 1.0).unwrap();
}

#[test]
fn bounded_loop_runs_body_count_times() {
    let mut rig = Rig::calibrated();
    let start = rig.ctl.queue_loop_start(0).unwrap();
    queue_short_move(&rig, 0);
    rig.ctl.queue_loop_end(0, start, 3).unwrap();

    rig.ctl.start_motor(0).unwrap();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), 12);
}

#[test]
fn single_iteration_loop_is_a_plain_block() {
    let mut rig = Rig::calibrated();
    let start = rig.ctl.queue_loop_start(0).unwrap();
    queue_short_move(&rig, 0);
    rig.ctl.queue_loop_end(0, start, 1).unwrap();

    rig.ctl.start_motor(0).unwrap();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), 4);
}

#[test]
fn nested_loops_multiply() {
    let mut rig = Rig::calibrated();
    let outer = rig.ctl.queue_loop_start(0).unwrap();
    let inner = rig.ctl.queue_loop_start(0).unwrap();
    queue_short_move(&rig, 0);
    rig.ctl.queue_loop_end(0, inner, 3).unwrap();
    rig.ctl.queue_loop_end(0, outer, 2).unwrap();
    queue_short_move(&rig, 0);

    rig.ctl.start_motor(0).unwrap();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), 2 * 3 * 4 + 4);
}

#[test]
fn infinite_loop_runs_until_stopped() {
    let mut rig = Rig::calibrated();
    let start = rig.ctl.queue_loop_start(0).unwrap();
    queue_short_move(&rig, 0);
    rig.ctl.queue_loop_end(0, start, -1).unwrap();
    rig.ctl.start_motor(0).unwrap();

    let mut last = 0;
    for _ in 0..5 {
        for _ in 0..5_000 {
            rig.tick();
        }
        assert!(!rig.ctl.is_idle(0).unwrap());
        let steps = rig.steps(0);
        assert!(steps > last, "infinite loop stalled at {steps} steps");
        last = steps;
    }

    rig.ctl.stop_motor(0).unwrap();
    assert!(rig.ctl.is_idle(0).unwrap());
    for _ in 0..1_000 {
        rig.tick();
    }
    assert_eq!(rig.steps(0), last);
}

#[test]
fn reset_rearms_loop_counters() {
    let mut rig = Rig::calibrated();
    let start = rig.ctl.queue_loop_start(0).unwrap();
    queue_short_move(&rig, 0);
    rig.ctl.queue_loop_end(0, start, 5).unwrap();
    rig.ctl.start_motor(0).unwrap();

    // Stop somewhere inside the second pass.
    while rig.steps(0) < 6 {
        rig.tick();
    }
    rig.ctl.reset_motor(0).unwrap();
    let partial = rig.steps(0);

    rig.ctl.start_motor(0).unwrap();
    rig.run_until_idle(TICK_LIMIT);
    assert_eq!(rig.steps(0), partial + 20);
}

#[test]
fn program_replays_after_completion_with_reset() {
    let mut rig = Rig::calibrated();
    let start = rig.ctl.queue_loop_start(0).unwrap();
    queue_short_move(&rig, 0);
    rig.ctl.queue_loop_end(0, start, 2).unwrap();

    for round in 1..=3u64 {
        rig.ctl.start_motor(0).unwrap();
        rig.run_until_idle(TICK_LIMIT);
        assert_eq!(rig.steps(0), round * 8);
        rig.ctl.reset_motor(0).unwrap();
    }
}
