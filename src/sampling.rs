//! # Sampling Modes
//!
//! State machine driving the three acquisition patterns on top of an
//! [`AcquisitionSession`]:
//!
//! - **Continuous**: a new session file is created on entry; every tick
//!   acquires one reading, appends it to the session list and rewrites the
//!   whole file. Runs until another mode is selected.
//! - **Single shot**: one reading persisted as a standalone record, then idle.
//! - **Averaging**: one reading per tick until the buffer holds the target
//!   number of samples; the average and its samples are persisted together,
//!   then idle.
//!
//! ## Mode changes and in-flight acquisitions
//!
//! An acquisition is never aborted. Every mode change bumps a generation
//! counter, and a reading acquired under an older generation is discarded
//! when it is recorded. Splitting a tick into [`Sampler::acquire`] and
//! [`Sampler::record`] lets a driver apply commands that arrived during the
//! acquisition before the reading is recorded.

use std::fmt;
use std::mem;
use std::path::PathBuf;

use chrono::Local;
use tracing::{debug, info};

use crate::config::{OutputConfig, SensorConfig};
use crate::error::SensorResult;
use crate::reading::{AverageRecord, Reading};
use crate::session::AcquisitionSession;
use crate::storage::RecordStore;
use crate::transport::SensorTransport;

/// Public view of the sampler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Continuous,
    Averaging,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => f.write_str("idle"),
            Mode::Continuous => f.write_str("continuous"),
            Mode::Averaging => f.write_str("averaging"),
        }
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Continuous { path: PathBuf, readings: Vec<Reading> },
    Averaging { samples: Vec<Reading> },
}

/// A reading acquired under a given mode generation, not yet recorded.
#[derive(Debug, Clone)]
pub struct PendingReading {
    generation: u64,
    reading: Reading,
}

impl PendingReading {
    pub fn reading(&self) -> &Reading {
        &self.reading
    }
}

/// What recording one scheduled reading produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// No scheduled mode is active
    Idle,
    /// Reading appended to the continuous session file
    Continuous {
        reading: Reading,
        path: PathBuf,
        count: usize,
    },
    /// Reading added to the averaging buffer
    AveragingProgress {
        reading: Reading,
        collected: usize,
        target: usize,
    },
    /// Buffer full; average persisted and sampler back to idle
    AverageSaved { record: AverageRecord, path: PathBuf },
    /// The mode changed while the reading was being acquired
    Discarded,
}

/// Owns the acquisition session and the active sampling mode.
pub struct Sampler<T: SensorTransport> {
    session: AcquisitionSession<T>,
    store: RecordStore,
    output: OutputConfig,
    average_samples: usize,
    state: State,
    generation: u64,
}

impl<T: SensorTransport> Sampler<T> {
    pub fn new(
        session: AcquisitionSession<T>,
        store: RecordStore,
        output: OutputConfig,
        average_samples: usize,
    ) -> Self {
        Self {
            session,
            store,
            output,
            average_samples: average_samples.max(1),
            state: State::Idle,
            generation: 0,
        }
    }

    /// Build a sampler over `transport` from a complete configuration.
    pub fn from_config(transport: T, config: &SensorConfig) -> Self {
        Self::new(
            AcquisitionSession::new(transport, config),
            RecordStore::new(config.output.directory.clone()),
            config.output.clone(),
            config.sampling.average_samples,
        )
    }

    pub fn mode(&self) -> Mode {
        match self.state {
            State::Idle => Mode::Idle,
            State::Continuous { .. } => Mode::Continuous,
            State::Averaging { .. } => Mode::Averaging,
        }
    }

    /// Readings held by the active mode
    pub fn collected(&self) -> usize {
        match &self.state {
            State::Idle => 0,
            State::Continuous { readings, .. } => readings.len(),
            State::Averaging { samples } => samples.len(),
        }
    }

    pub fn session(&self) -> &AcquisitionSession<T> {
        &self.session
    }

    fn enter(&mut self, state: State) {
        self.generation += 1;
        if !matches!(self.state, State::Idle) {
            debug!(
                "Leaving {} mode, discarding {} in-memory readings",
                self.mode(),
                self.collected()
            );
        }
        self.state = state;
    }

    /// Enter continuous mode with a fresh session file.
    pub fn start_continuous(&mut self) -> SensorResult<PathBuf> {
        self.enter(State::Idle);
        let path = self.store.create_session(&self.output.continuous_base)?;
        self.state = State::Continuous {
            path: path.clone(),
            readings: Vec::new(),
        };
        info!("Continuous mode, session file {}", path.display());
        Ok(path)
    }

    /// Enter averaging mode with an empty buffer.
    pub fn start_averaging(&mut self) {
        self.enter(State::Averaging {
            samples: Vec::with_capacity(self.average_samples),
        });
        info!("Averaging mode, collecting {} samples", self.average_samples);
    }

    /// Return to idle, dropping any in-memory progress.
    pub fn stop(&mut self) {
        self.enter(State::Idle);
    }

    /// Acquire one reading and persist it as a standalone record.
    ///
    /// Supersedes whatever mode was active; the sampler is idle afterwards.
    pub async fn single_shot(&mut self) -> SensorResult<(Reading, PathBuf)> {
        self.enter(State::Idle);
        let reading = self.session.acquire_reading().await;
        let path = self.store.save_reading(&self.output.single_base, &reading)?;
        Ok((reading, path))
    }

    /// Acquire a reading for the active scheduled mode, if any.
    pub async fn acquire(&mut self) -> Option<PendingReading> {
        if matches!(self.state, State::Idle) {
            return None;
        }
        let generation = self.generation;
        let reading = self.session.acquire_reading().await;
        Some(PendingReading {
            generation,
            reading,
        })
    }

    /// Record a reading produced by [`acquire`](Self::acquire).
    pub fn record(&mut self, pending: PendingReading) -> SensorResult<SampleOutcome> {
        if pending.generation != self.generation {
            debug!("Mode changed during acquisition, discarding reading");
            return Ok(SampleOutcome::Discarded);
        }
        let reading = pending.reading;

        match &mut self.state {
            State::Idle => Ok(SampleOutcome::Discarded),
            State::Continuous { path, readings } => {
                readings.push(reading.clone());
                self.store.rewrite_session(path, readings)?;
                Ok(SampleOutcome::Continuous {
                    reading,
                    path: path.clone(),
                    count: readings.len(),
                })
            }
            State::Averaging { samples } => {
                samples.push(reading.clone());
                let collected = samples.len();
                if collected < self.average_samples {
                    debug!("Averaging sample {}/{}", collected, self.average_samples);
                    return Ok(SampleOutcome::AveragingProgress {
                        reading,
                        collected,
                        target: self.average_samples,
                    });
                }

                let samples = mem::take(samples);
                self.enter(State::Idle);
                let record = AverageRecord::compute(samples, Local::now());
                let path = self.store.save_average(&self.output.single_base, &record)?;
                Ok(SampleOutcome::AverageSaved { record, path })
            }
        }
    }

    /// Acquire and record one scheduled reading.
    pub async fn tick(&mut self) -> SensorResult<SampleOutcome> {
        match self.acquire().await {
            Some(pending) => self.record(pending),
            None => Ok(SampleOutcome::Idle),
        }
    }

    /// Stop sampling and close the transport.
    pub async fn shutdown(&mut self) -> SensorResult<()> {
        self.stop();
        self.session.close().await
    }
}
