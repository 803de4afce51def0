//! Engine lifecycle: owns the tick thread and tears it down.

use crate::controller::{Controller, LoopStatus};
use crate::cycle::{TickStats, run_tick_loop};
use crate::error::{CalibrationError, EngineError};
use std::ops::Deref;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use stepr_common::config::EngineConfig;
use stepr_common::hal::driver::Hardware;
use tracing::{error, info};

const TICK_THREAD_NAME: &str = "stepr-tick";
const CALIBRATION_POLL: Duration = Duration::from_millis(1);

type TickThread = JoinHandle<Result<TickStats, CalibrationError>>;

/// A running stepper engine.
///
/// Dereferences to [`Controller`] for queueing and control. Dropping the
/// engine stops the tick thread, parks every output and discards all queued
/// commands; it cannot be restarted.
pub struct Engine {
    controller: Arc<Controller>,
    thread: Option<TickThread>,
}

impl Engine {
    /// Validate `config`, spawn the tick thread and wait for the startup
    /// calibration to finish.
    ///
    /// # Errors
    /// Configuration and pin setup errors, `ThreadSpawn` if the thread
    /// cannot be created, `Calibration` / `CalibrationTimeout` if the tick
    /// frequency cannot be measured.
    pub fn start(config: &EngineConfig, hardware: Hardware) -> Result<Self, EngineError> {
        let controller = Arc::new(Controller::new(config, hardware)?);

        let rt = config.rt;
        let shared = Arc::clone(&controller);
        let handle = thread::Builder::new()
            .name(TICK_THREAD_NAME.to_string())
            .spawn(move || run_tick_loop(&shared, &rt))
            .map_err(EngineError::ThreadSpawn)?;

        let mut engine = Self {
            controller,
            thread: Some(handle),
        };
        engine.wait_calibrated(config.timing.calibration_timeout())?;

        info!(
            "Engine '{}' running at {:.1} Hz",
            config.shared.service_name,
            engine.controller.tick_frequency().unwrap_or(0.0)
        );
        Ok(engine)
    }

    fn wait_calibrated(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.controller.tick_frequency().is_some() {
                return Ok(());
            }
            if self.controller.status() == LoopStatus::Failed {
                return match self.join() {
                    Err(e) => Err(e),
                    Ok(_) => Err(EngineError::CalibrationTimeout(timeout)),
                };
            }
            if Instant::now() >= deadline {
                error!("Calibration did not finish within {:?}", timeout);
                return Err(EngineError::CalibrationTimeout(timeout));
            }
            thread::sleep(CALIBRATION_POLL);
        }
    }

    /// Shared handle to the facade, e.g. for a signal handler.
    pub fn controller(&self) -> Arc<Controller> {
        Arc::clone(&self.controller)
    }

    /// Stop the tick thread, park outputs and return the loop statistics.
    pub fn shutdown(mut self) -> Result<TickStats, EngineError> {
        self.stop()
    }

    fn join(&mut self) -> Result<TickStats, EngineError> {
        let Some(handle) = self.thread.take() else {
            return Ok(TickStats::new());
        };
        match handle.join() {
            Ok(result) => result.map_err(EngineError::from),
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(EngineError::TickThreadPanicked(msg))
            }
        }
    }

    fn stop(&mut self) -> Result<TickStats, EngineError> {
        self.controller.request_stop();
        let result = self.join();
        self.controller.park_outputs();
        self.controller.drop_queues();
        info!("Engine stopped");
        result
    }
}

impl Deref for Engine {
    type Target = Controller;

    fn deref(&self) -> &Controller {
        &self.controller
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.stop() {
                error!("Engine teardown: {e}");
            }
        }
    }
}
