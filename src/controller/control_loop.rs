//! Fixed-frequency control loop driving one duty-cycled axis
//!
//! The sensing callback writes the latest [`AnalogInput`] into a watch
//! channel; the loop reads it on every tick and advances a [`DutyCycle`].
//!
//! # State Machine
//!
//! ```text
//! Configured ──► Running ──► Stopping ──► Stopped
//!                   │            ▲
//!                   └────────────┘
//!                (cancellation token)
//! ```
//!
//! Stopping releases whatever the loop still holds, so a shut down axis
//! never leaves a button pressed on the target.

use crate::command::channel::{emit, CommandSink};
use crate::mapping::duty_cycle::{AnalogInput, DutyCycle, DutyCycleSettings};
use crate::mapping::edge::AxisBinding;
use chrono::Local;
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ControlLoopError {
    #[error("Control loop task failed: {0}")]
    TaskError(String),
}

/// Timing observations of a running loop
///
/// The loop never corrects for late ticks, it only reports them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoopStats {
    pub ticks: u64,
    /// Ticks that started more than one tick length after their schedule
    pub late_ticks: u64,
    pub last_lag: Duration,
    pub max_lag: Duration,
}

#[state]
#[derive(Debug, Clone)]
pub enum ControlLoopState {
    Configured,
    Running,
    Stopping,
    Stopped,
}

#[machine]
pub struct ControlLoop<S: ControlLoopState> {
    name: String,
    settings: DutyCycleSettings,
    duty: DutyCycle,
    input_receiver: watch::Receiver<AnalogInput>,
    sink: Arc<dyn CommandSink>,
    stats_sender: watch::Sender<LoopStats>,
}

impl<S: ControlLoopState> ControlLoop<S> {
    pub fn get_name(&self) -> &str {
        &self.name
    }
}

impl ControlLoop<Configured> {
    pub fn create(
        name: String,
        binding: AxisBinding,
        settings: DutyCycleSettings,
        input_receiver: watch::Receiver<AnalogInput>,
        sink: Arc<dyn CommandSink>,
        stats_sender: watch::Sender<LoopStats>,
    ) -> Self {
        info!(
            "Configuring control loop {} at {:.1} Hz, {} ticks per cycle",
            name, settings.frequency_hz, settings.cycle_ticks
        );
        let duty = DutyCycle::new(binding, &settings);
        Self::new(name, settings, duty, input_receiver, sink, stats_sender)
    }

    pub fn start(self) -> ControlLoop<Running> {
        info!("Starting control loop: {}", self.name);
        self.transition()
    }
}

impl ControlLoop<Running> {
    /// Advances the duty cycle by one tick scheduled at `scheduled`
    fn tick(&mut self, scheduled: Instant) {
        let input = *self.input_receiver.borrow();
        let commands = self.duty.tick(input);
        if !commands.is_empty() {
            debug!("{}: {:?} for {:?}", self.name, commands, input);
        }
        emit(self.sink.as_ref(), commands);

        let lag = Instant::now().saturating_duration_since(scheduled);
        let late = lag > self.settings.tick_interval();
        self.stats_sender.send_modify(|stats| {
            stats.ticks += 1;
            stats.last_lag = lag;
            stats.max_lag = stats.max_lag.max(lag);
            if late {
                stats.late_ticks += 1;
            }
        });
    }

    /// Ticks until the token is cancelled
    pub async fn run_until_shutdown(mut self, shutdown: CancellationToken) -> ControlLoop<Stopping> {
        info!("Entering control loop: {}", self.name);
        let mut interval = tokio::time::interval(self.settings.tick_interval());

        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received for: {}", self.name);
                    break;
                }
                scheduled = interval.tick() => {
                    self.tick(scheduled);
                }
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let stats = self.stats_sender.borrow().clone();
                if stats.late_ticks > 0 {
                    warn!(
                        "{}: {} of {} ticks late, max lag {:?}",
                        self.name, stats.late_ticks, stats.ticks, stats.max_lag
                    );
                } else {
                    debug!("{}: {} ticks on time", self.name, stats.ticks);
                }
                last_stats_time = now;
            }
        }

        self.transition()
    }
}

impl ControlLoop<Stopping> {
    /// Releases any held button
    pub fn shutdown(mut self) -> ControlLoop<Stopped> {
        if let Some(command) = self.duty.release() {
            info!("{}: releasing held {} on shutdown", self.name, command);
            emit(self.sink.as_ref(), [command]);
        }
        info!("Control loop stopped: {}", self.name);
        self.transition()
    }
}

/// Cheap, cloneable writer of the analog target of one loop
#[derive(Clone, Debug)]
pub struct AnalogAxis {
    sender: Arc<watch::Sender<AnalogInput>>,
}

impl AnalogAxis {
    pub fn set(&self, input: AnalogInput) {
        self.sender.send_replace(input);
    }

    pub fn get(&self) -> AnalogInput {
        *self.sender.borrow()
    }
}

/// Owner of a control loop task
#[derive(Debug)]
pub struct ControlLoopHandle {
    pub name: String,
    axis: AnalogAxis,
    stats_receiver: watch::Receiver<LoopStats>,
    shutdown: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ControlLoopHandle {
    /// Spawns the loop on the current tokio runtime
    pub fn spawn(
        name: impl Into<String>,
        binding: AxisBinding,
        settings: DutyCycleSettings,
        sink: Arc<dyn CommandSink>,
        shutdown: CancellationToken,
    ) -> Self {
        let name = name.into();
        let (input_sender, input_receiver) = watch::channel(AnalogInput::NEUTRAL);
        let (stats_sender, stats_receiver) = watch::channel(LoopStats::default());

        let running = ControlLoop::create(
            name.clone(),
            binding,
            settings,
            input_receiver,
            sink,
            stats_sender,
        )
        .start();

        let token = shutdown.clone();
        let loop_name = name.clone();
        let task_handle = tokio::spawn(async move {
            let stopping = running.run_until_shutdown(token).await;
            let _stopped = stopping.shutdown();
            debug!("Control loop task finished: {}", loop_name);
        });

        Self {
            name,
            axis: AnalogAxis {
                sender: Arc::new(input_sender),
            },
            stats_receiver,
            shutdown,
            task_handle: Some(task_handle),
        }
    }

    pub fn axis(&self) -> AnalogAxis {
        self.axis.clone()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats_receiver.borrow().clone()
    }

    /// Cancels the loop and waits until it has released its button
    pub async fn shutdown(&mut self) -> Result<(), ControlLoopError> {
        debug!("Sending shutdown signal to control loop: {}", self.name);
        self.shutdown.cancel();

        match self.task_handle.take() {
            Some(handle) => handle.await.map_err(|e| {
                error!("Control loop task panicked: {} - {}", self.name, e);
                ControlLoopError::TaskError(e.to_string())
            }),
            None => {
                debug!("Control loop already shut down: {}", self.name);
                Ok(())
            }
        }
    }
}
