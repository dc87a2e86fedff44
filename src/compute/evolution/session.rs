//! Batch worker ownership and progress publication.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use log::debug;

use super::driver::EvolutionDriver;
use super::error::EvolutionError;
use crate::history::GenerationRef;
use crate::schema::{BatchSummary, EvolutionConfig, GenerationStats, ProgressSnapshot, StepOutcome};

type BatchOutcome = (EvolutionDriver, Result<BatchSummary, EvolutionError>);

/// Front end for an evolution run.
///
/// Interactive commands act on the driver directly. A batch moves the
/// driver into a worker thread that publishes [`ProgressSnapshot`]s
/// between ticks; until the driver is reclaimed every interactive
/// command fails with [`EvolutionError::BatchActive`].
pub struct EvolutionSession {
    driver: Option<EvolutionDriver>,
    worker: Option<JoinHandle<BatchOutcome>>,
    updates: Option<Receiver<ProgressSnapshot>>,
    latest: ProgressSnapshot,
    cancel: Arc<AtomicBool>,
}

impl EvolutionSession {
    pub fn new(config: EvolutionConfig) -> Result<Self, EvolutionError> {
        let driver = EvolutionDriver::new(config)?;
        Ok(Self::from_driver(driver))
    }

    pub fn from_driver(driver: EvolutionDriver) -> Self {
        Self {
            cancel: driver.cancel_handle(),
            latest: driver.progress(),
            driver: Some(driver),
            worker: None,
            updates: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Run `generations` generations on a worker thread.
    ///
    /// Returns `false` and does nothing if a batch is already running.
    pub fn start_batch(&mut self, generations: usize) -> bool {
        if self.worker.is_some() {
            debug!("Batch already running, request for {generations} generations dropped");
            return false;
        }
        let Some(mut driver) = self.driver.take() else {
            return false;
        };

        self.cancel.store(false, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        self.worker = Some(thread::spawn(move || {
            let result = driver.run_batch(generations, |progress| {
                // The session may already have stopped listening.
                let _ = tx.send(ProgressSnapshot {
                    running: true,
                    ..*progress
                });
            });
            (driver, result)
        }));
        self.updates = Some(rx);
        self.latest.running = true;
        true
    }

    /// Drain pending progress and reclaim the driver if the worker is done.
    ///
    /// Returns the batch summary exactly once, on the poll that reclaims
    /// the driver.
    pub fn poll(&mut self) -> Result<Option<BatchSummary>, EvolutionError> {
        self.drain();
        match &self.worker {
            Some(handle) if handle.is_finished() => self.reclaim(),
            _ => Ok(None),
        }
    }

    /// Block until the running batch finishes on its own.
    pub fn join_batch(&mut self) -> Result<Option<BatchSummary>, EvolutionError> {
        self.reclaim()
    }

    /// Cancel the running batch at its next tick boundary and reclaim the driver.
    ///
    /// The interrupted generation is neither recorded nor reported.
    pub fn stop_batch(&mut self) -> Result<Option<BatchSummary>, EvolutionError> {
        if self.worker.is_none() {
            return Ok(None);
        }
        self.cancel.store(true, Ordering::Relaxed);
        self.reclaim()
    }

    fn drain(&mut self) {
        if let Some(rx) = &self.updates
            && let Some(last) = rx.try_iter().last()
        {
            self.latest = last;
        }
    }

    fn reclaim(&mut self) -> Result<Option<BatchSummary>, EvolutionError> {
        let Some(handle) = self.worker.take() else {
            return Ok(None);
        };
        let (driver, result) = match handle.join() {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        self.drain();
        self.updates = None;
        self.latest = driver.progress();
        self.driver = Some(driver);
        result.map(Some)
    }

    /// Latest published state. Reflects the live driver when no batch runs.
    pub fn progress(&self) -> ProgressSnapshot {
        match &self.driver {
            Some(driver) => driver.progress(),
            None => self.latest,
        }
    }

    /// The driver, unless a batch currently owns it.
    pub fn driver(&self) -> Result<&EvolutionDriver, EvolutionError> {
        self.driver.as_ref().ok_or(EvolutionError::BatchActive)
    }

    fn driver_mut(&mut self) -> Result<&mut EvolutionDriver, EvolutionError> {
        self.driver.as_mut().ok_or(EvolutionError::BatchActive)
    }

    pub fn step(&mut self) -> Result<StepOutcome, EvolutionError> {
        self.driver_mut()?.step_interactive()
    }

    pub fn force_next_generation(&mut self) -> Result<GenerationStats, EvolutionError> {
        self.driver_mut()?.force_next_generation()
    }

    pub fn reset_population(&mut self) -> Result<(), EvolutionError> {
        self.driver_mut()?.reset_population();
        Ok(())
    }

    pub fn load_generation(&mut self, at: GenerationRef) -> Result<(), EvolutionError> {
        self.driver_mut()?.load_generation(at)
    }

    pub fn replay_best(&mut self) -> Result<bool, EvolutionError> {
        self.driver_mut()?.replay_best()
    }

    pub fn save_history<W: Write>(&self, writer: &mut W) -> Result<(), EvolutionError> {
        self.driver()?.save_history(writer)
    }

    pub fn load_history<R: Read>(&mut self, reader: &mut R) -> Result<(), EvolutionError> {
        self.driver_mut()?.load_history(reader)
    }
}

impl Drop for EvolutionSession {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.cancel.store(true, Ordering::Relaxed);
            let _ = handle.join();
        }
    }
}
