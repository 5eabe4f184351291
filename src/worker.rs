//! # Scheduled Sampler Worker
//!
//! Runs a [`Sampler`] on its own tokio task. Mode selection arrives as
//! [`SamplerCommand`]s over a channel; results leave as [`SamplerEvent`]s.
//!
//! ## Scheduling
//!
//! - Continuous mode ticks every interval, the first tick one interval after
//!   the mode was entered.
//! - Averaging takes its first sample immediately and schedules each next
//!   sample one interval after the previous one completed.
//!
//! The task owns the sampler, so a tick cannot start while the previous
//! acquisition is outstanding. Commands received during an acquisition are
//! applied before its reading is recorded; a reading whose mode was changed
//! in the meantime is discarded.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use crate::error::{SensorError, SensorResult};
use crate::reading::{AverageRecord, Reading};
use crate::sampling::{Mode, SampleOutcome, Sampler};
use crate::transport::SensorTransport;

/// Mode selection sent to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerCommand {
    Continuous,
    SingleShot,
    Average,
    Stop,
    /// Stop sampling, close the transport and end the task
    Shutdown,
}

/// Notification emitted by the worker
#[derive(Debug, Clone, PartialEq)]
pub enum SamplerEvent {
    ModeChanged { mode: Mode },
    SessionOpened { path: PathBuf },
    ReadingSaved {
        reading: Reading,
        path: PathBuf,
        count: usize,
    },
    SingleShotSaved { reading: Reading, path: PathBuf },
    AveragingProgress {
        reading: Reading,
        collected: usize,
        target: usize,
    },
    AverageSaved { record: AverageRecord, path: PathBuf },
    /// A reading was dropped because the mode changed while it was acquired
    ReadingDiscarded,
    Failed { message: String },
    Shutdown,
}

/// Handle to a running sampler task.
pub struct SamplerHandle {
    commands: mpsc::UnboundedSender<SamplerCommand>,
    task: JoinHandle<SensorResult<()>>,
}

impl SamplerHandle {
    /// Queue a command for the worker.
    pub fn send(&self, command: SamplerCommand) -> SensorResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SensorError::WorkerStopped)
    }

    /// Whether the worker task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Shut the worker down and wait for it to close the transport.
    pub async fn shutdown(self) -> SensorResult<()> {
        // The task may already be gone; its join result carries the outcome
        let _ = self.commands.send(SamplerCommand::Shutdown);
        self.task.await.map_err(|e| {
            error!("Sampler task failed: {}", e);
            SensorError::WorkerStopped
        })?
    }
}

/// Spawn `sampler` on a tokio task ticking every `interval`.
pub fn spawn<T>(
    sampler: Sampler<T>,
    interval: Duration,
) -> (SamplerHandle, mpsc::UnboundedReceiver<SamplerEvent>)
where
    T: SensorTransport + 'static,
{
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(run(sampler, command_rx, event_tx, interval));

    (
        SamplerHandle {
            commands: command_tx,
            task,
        },
        event_rx,
    )
}

enum Wake {
    Command(Option<SamplerCommand>),
    Tick(Instant),
}

/// What to do after a command was applied
enum Next {
    Schedule(Option<Instant>),
    Exit,
}

struct Worker<T: SensorTransport> {
    sampler: Sampler<T>,
    events: mpsc::UnboundedSender<SamplerEvent>,
    interval: Duration,
}

async fn run<T: SensorTransport>(
    sampler: Sampler<T>,
    mut commands: mpsc::UnboundedReceiver<SamplerCommand>,
    events: mpsc::UnboundedSender<SamplerEvent>,
    interval: Duration,
) -> SensorResult<()> {
    info!("Sampler worker started (interval: {:?})", interval);
    let mut worker = Worker {
        sampler,
        events,
        interval,
    };
    let mut next_due: Option<Instant> = None;

    loop {
        let wake = match next_due {
            Some(due) => tokio::select! {
                command = commands.recv() => Wake::Command(command),
                _ = sleep_until(due) => Wake::Tick(due),
            },
            None => Wake::Command(commands.recv().await),
        };

        match wake {
            Wake::Command(None) => {
                debug!("Command channel closed");
                break;
            }
            Wake::Command(Some(command)) => match worker.apply(command).await {
                Next::Schedule(due) => next_due = due,
                Next::Exit => break,
            },
            Wake::Tick(due) => {
                let Some(pending) = worker.sampler.acquire().await else {
                    next_due = None;
                    continue;
                };

                // Commands that arrived during the acquisition take effect first
                let mut rescheduled = None;
                let mut exit = false;
                while let Ok(command) = commands.try_recv() {
                    match worker.apply(command).await {
                        Next::Schedule(due) => rescheduled = Some(due),
                        Next::Exit => {
                            exit = true;
                            break;
                        }
                    }
                }
                if exit {
                    break;
                }

                let outcome = worker.sampler.record(pending);
                let follow_up = worker.report(outcome, due);
                next_due = rescheduled.unwrap_or(follow_up);
            }
        }
    }

    let result = worker.sampler.shutdown().await;
    if let Err(e) = &result {
        error!("Failed to close transport: {}", e);
    }
    worker.emit(SamplerEvent::Shutdown);
    info!("Sampler worker stopped");
    result
}

impl<T: SensorTransport> Worker<T> {
    fn emit(&self, event: SamplerEvent) {
        // Nobody listening is not an error for the worker
        let _ = self.events.send(event);
    }

    fn mode_changed(&self) {
        self.emit(SamplerEvent::ModeChanged {
            mode: self.sampler.mode(),
        });
    }

    fn fail(&self, error: SensorError) {
        error!("{}", error);
        self.emit(SamplerEvent::Failed {
            message: error.to_string(),
        });
    }

    async fn apply(&mut self, command: SamplerCommand) -> Next {
        debug!("Sampler command {:?}", command);
        match command {
            SamplerCommand::Continuous => {
                let due = match self.sampler.start_continuous() {
                    Ok(path) => {
                        self.emit(SamplerEvent::SessionOpened { path });
                        Some(Instant::now() + self.interval)
                    }
                    Err(e) => {
                        self.fail(e);
                        None
                    }
                };
                self.mode_changed();
                Next::Schedule(due)
            }
            SamplerCommand::Average => {
                self.sampler.start_averaging();
                self.mode_changed();
                Next::Schedule(Some(Instant::now()))
            }
            SamplerCommand::SingleShot => {
                let result = self.sampler.single_shot().await;
                self.mode_changed();
                match result {
                    Ok((reading, path)) => self.emit(SamplerEvent::SingleShotSaved { reading, path }),
                    Err(e) => self.fail(e),
                }
                Next::Schedule(None)
            }
            SamplerCommand::Stop => {
                self.sampler.stop();
                self.mode_changed();
                Next::Schedule(None)
            }
            SamplerCommand::Shutdown => Next::Exit,
        }
    }

    /// Publish a tick outcome and return when the next tick is due.
    fn report(&self, outcome: SensorResult<SampleOutcome>, due: Instant) -> Option<Instant> {
        match outcome {
            Ok(SampleOutcome::Idle) => None,
            Ok(SampleOutcome::Discarded) => {
                self.emit(SamplerEvent::ReadingDiscarded);
                None
            }
            Ok(SampleOutcome::Continuous {
                reading,
                path,
                count,
            }) => {
                self.emit(SamplerEvent::ReadingSaved {
                    reading,
                    path,
                    count,
                });
                Some(self.next_continuous_tick(due))
            }
            Ok(SampleOutcome::AveragingProgress {
                reading,
                collected,
                target,
            }) => {
                self.emit(SamplerEvent::AveragingProgress {
                    reading,
                    collected,
                    target,
                });
                Some(Instant::now() + self.interval)
            }
            Ok(SampleOutcome::AverageSaved { record, path }) => {
                self.emit(SamplerEvent::AverageSaved { record, path });
                self.mode_changed();
                None
            }
            Err(e) => {
                self.fail(e);
                match self.sampler.mode() {
                    Mode::Continuous => Some(self.next_continuous_tick(due)),
                    Mode::Averaging => Some(Instant::now() + self.interval),
                    Mode::Idle => {
                        self.mode_changed();
                        None
                    }
                }
            }
        }
    }

    /// Fixed cadence; ticks missed during a slow acquisition are skipped.
    fn next_continuous_tick(&self, due: Instant) -> Instant {
        let now = Instant::now();
        let mut next = due + self.interval;
        while next <= now {
            next += self.interval;
        }
        next
    }
}
