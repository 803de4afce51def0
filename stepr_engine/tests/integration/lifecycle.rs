//! Engine startup, background tick thread and teardown.

use super::harness::{ENABLE_PINS, EXPECTED_HZ, STEP_PINS, sim_hardware, test_config};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use stepr_common::hal::driver::{FreeRunningCounter, Hardware, Level};
use stepr_engine::{CalibrationError, Controller, Engine, EngineError, LoopStatus};
use stepr_hal::SimulationGpio;

fn wait_idle(ctl: &Controller, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !ctl.all_idle() {
        assert!(Instant::now() < deadline, "motors still busy after {timeout:?}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Counter that never moves.
struct FrozenCounter(AtomicU64);

impl FreeRunningCounter for FrozenCounter {
    fn name(&self) -> &'static str {
        "frozen"
    }

    fn micros(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[test]
fn start_calibrates_then_shutdown_parks_outputs() {
    let (hardware, gpio) = sim_hardware();
    let engine = Engine::start(&test_config(), hardware).unwrap();
    assert_eq!(engine.tick_frequency(), Some(EXPECTED_HZ));
    assert_eq!(engine.status(), LoopStatus::Running);

    engine.queue_move(0, 0.1, 0.01, 1.0).unwrap();
    engine.queue_move(1, -0.1, 0.01, 1.0).unwrap();
    engine.start_all();
    wait_idle(&engine, Duration::from_secs(20));

    let ctl = engine.controller();
    let stats = engine.shutdown().unwrap();
    assert!(stats.tick_count > 0);
    assert!(stats.min_tick_ns <= stats.max_tick_ns);

    assert_eq!(gpio.rising_edges(STEP_PINS[0]), 44);
    assert_eq!(gpio.rising_edges(STEP_PINS[1]), 44);
    for pin in STEP_PINS {
        assert_eq!(gpio.level(pin), Level::Low);
    }
    for pin in ENABLE_PINS {
        assert_eq!(gpio.level(pin), Level::High);
    }
    assert_eq!(ctl.status(), LoopStatus::Terminated);
    assert_eq!(ctl.queue_len(0).unwrap(), 0);
    assert_eq!(ctl.queue_len(1).unwrap(), 0);
}

#[test]
fn shutdown_mid_move_stops_pulses() {
    let (hardware, gpio) = sim_hardware();
    let engine = Engine::start(&test_config(), hardware).unwrap();
    engine.queue_move(0, 100.0, 100.0, 1.0).unwrap();
    engine.start_motor(0).unwrap();
    while gpio.rising_edges(STEP_PINS[0]) == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    engine.shutdown().unwrap();
    let steps = gpio.rising_edges(STEP_PINS[0]);
    assert!(steps < 44_100);
    assert_eq!(gpio.level(ENABLE_PINS[0]), Level::High);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(gpio.rising_edges(STEP_PINS[0]), steps);
}

#[test]
fn drop_tears_down_the_tick_thread() {
    let (hardware, gpio) = sim_hardware();
    let engine = Engine::start(&test_config(), hardware).unwrap();
    engine.queue_move(1, 100.0, 100.0, 1.0).unwrap();
    engine.start_motor(1).unwrap();
    while gpio.rising_edges(STEP_PINS[1]) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(gpio.level(ENABLE_PINS[1]), Level::Low);

    let ctl = engine.controller();
    drop(engine);
    assert_eq!(ctl.status(), LoopStatus::Terminated);
    assert_eq!(gpio.level(ENABLE_PINS[1]), Level::High);
}

#[test]
fn caller_threads_queue_while_ticking() {
    let (hardware, gpio) = sim_hardware();
    let engine = Engine::start(&test_config(), hardware).unwrap();

    let handles: Vec<_> = (0..2)
        .map(|motor| {
            let ctl = engine.controller();
            thread::spawn(move || {
                for _ in 0..3 {
                    ctl.queue_move(motor, 0.01, 0.001, 1.0).unwrap();
                }
                ctl.start_motor(motor).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    wait_idle(&engine, Duration::from_secs(20));
    engine.shutdown().unwrap();
    assert_eq!(gpio.rising_edges(STEP_PINS[0]), 12);
    assert_eq!(gpio.rising_edges(STEP_PINS[1]), 12);
}

#[test]
fn frozen_counter_fails_startup() {
    let gpio = Arc::new(SimulationGpio::new());
    let hardware = Hardware {
        gpio: gpio.clone(),
        counter: Arc::new(FrozenCounter(AtomicU64::new(42))),
    };
    let err = Engine::start(&test_config(), hardware).err().unwrap();
    assert!(matches!(
        err,
        EngineError::Calibration(CalibrationError::NoElapsedTime {
            counter: "frozen",
            elapsed_us: 0,
            ..
        })
    ));
    for pin in ENABLE_PINS {
        assert_eq!(gpio.level(pin), Level::High);
    }
}

#[test]
fn invalid_config_fails_before_touching_pins() {
    let (hardware, gpio) = sim_hardware();
    let mut config = test_config();
    config.motors.clear();
    let err = Engine::start(&config, hardware).err().unwrap();
    assert!(matches!(err, EngineError::Config(_)));
    assert!(!gpio.is_output(STEP_PINS[0]));
}
