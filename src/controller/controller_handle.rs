//! Controller Handle - wiring of the source adapters to one command sink
//!
//! The handle owns everything that outlives a single reading: the pulse
//! scheduler and the duty-cycle control loops. Source adapters are built
//! from it and hold only cheap clones.
//!
//! ```text
//!                     ┌─► PulseScheduler ──────────┐
//! ControllerHandle ───┤                            ├──► CommandSink
//!                     └─► ControlLoop (per axis) ──┘
//! ```

use super::control_loop::{ControlLoopError, ControlLoopHandle, LoopStats};
use super::pulse::PulseScheduler;
use crate::command::channel::CommandSink;
use crate::config::AppConfig;
use crate::mapping::edge::AxisBinding;
use crate::sources::{FaceSource, MarkerSource, PedalSource, PhoneSource, VoiceSource};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Control loop error: {0}")]
    LoopError(#[from] ControlLoopError),
}

/// Factory and lifecycle owner for the source adapters
///
/// Must be created inside a tokio runtime; the adapters it hands out can be
/// used from any thread afterwards.
///
/// # Performance Impact
///
/// - Every call to [`ControllerHandle::phone`] spawns one more control loop
///   at `duty_cycle.frequency_hz`. Build one phone adapter per phone.
/// - The other adapters spawn nothing; their cost is per reading.
///
/// # Examples
///
/// ```rust,no_run
/// use multisense_kart::command::UdpCommandChannel;
/// use multisense_kart::config::AppConfig;
/// use multisense_kart::controller::ControllerHandle;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AppConfig::default();
/// let channel = UdpCommandChannel::connect(config.network.destination).await?;
/// let controller = ControllerHandle::spawn(config, Arc::new(channel))?;
///
/// let mut pedals = controller.pedals();
/// pedals.on_line("12#0");
///
/// // releases held buttons, stops the loops and flushes pending pulses
/// pedals.reset();
/// controller.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct ControllerHandle {
    config: AppConfig,
    sink: Arc<dyn CommandSink>,
    pulses: PulseScheduler,
    loops: Vec<ControlLoopHandle>,
    shutdown: CancellationToken,
}

impl ControllerHandle {
    /// Builds the pulse scheduler on the current runtime
    ///
    /// # Errors
    ///
    /// * [`ControllerError::InitializationError`] - called outside a tokio runtime
    pub fn spawn(config: AppConfig, sink: Arc<dyn CommandSink>) -> Result<Self, ControllerError> {
        info!("Initializing controller");
        let runtime = Handle::try_current()
            .map_err(|e| ControllerError::InitializationError(e.to_string()))?;

        let pulses = PulseScheduler::new(sink.clone(), runtime, &config.pulse);
        debug!("Pulse scheduler ready, release after {:?}", pulses.release_delay());

        Ok(Self {
            config,
            sink,
            pulses,
            loops: Vec::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pulses(&self) -> PulseScheduler {
        self.pulses.clone()
    }

    /// Phone adapter with its own duty-cycled steering loop
    pub fn phone(&mut self) -> PhoneSource {
        let steering = ControlLoopHandle::spawn(
            format!("phone-steering-{}", self.loops.len()),
            AxisBinding::steering(),
            self.config.duty_cycle.clone(),
            self.sink.clone(),
            self.shutdown.child_token(),
        );
        let axis = steering.axis();
        self.loops.push(steering);
        PhoneSource::new(&self.config.phone, axis, self.pulses.clone(), self.sink.clone())
    }

    pub fn face(&self) -> FaceSource {
        FaceSource::new(&self.config.face, self.sink.clone())
    }

    pub fn markers(&self) -> MarkerSource {
        MarkerSource::new(&self.config.markers, self.pulses.clone(), self.sink.clone())
    }

    pub fn pedals(&self) -> PedalSource {
        PedalSource::new(&self.config.pedals, self.sink.clone())
    }

    pub fn voice(&self) -> VoiceSource {
        VoiceSource::new(&self.config.voice, self.pulses.clone())
    }

    pub fn loop_stats(&self) -> Vec<(String, LoopStats)> {
        self.loops
            .iter()
            .map(|handle| (handle.name.clone(), handle.stats()))
            .collect()
    }

    /// Stops every control loop, waits for their releases, flushes pulses
    pub async fn shutdown(mut self) -> Result<(), ControllerError> {
        info!("Shutting down controller, {} control loops", self.loops.len());
        self.shutdown.cancel();

        let mut result = Ok(());
        for handle in &mut self.loops {
            if let Err(e) = handle.shutdown().await {
                error!("Failed to stop {}: {}", handle.name, e);
                result = Err(e.into());
            }
        }
        self.pulses.flush();
        info!("Controller shut down");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::channel::testing::RecordingSink;
    use crate::command::{Button, Command};
    use crate::sources::PhoneReading;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_everything() {
        let sink = RecordingSink::new();
        let mut controller = ControllerHandle::spawn(AppConfig::default(), sink.clone()).unwrap();

        let mut phone = controller.phone();
        phone.handle(PhoneReading::Roll(30.0));
        controller.pulses().fire(Button::Rescue);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stats = controller.loop_stats();
        assert_eq!(stats.len(), 1);
        assert!(stats[0].1.ticks > 0);

        controller.shutdown().await.unwrap();
        let commands = sink.take();
        assert_eq!(commands.len(), 4);
        assert!(commands.contains(&Command::Release(Button::Right)));
        assert!(commands.contains(&Command::Release(Button::Rescue)));
    }

    #[test]
    fn needs_a_runtime() {
        let sink = RecordingSink::new();
        assert!(matches!(
            ControllerHandle::spawn(AppConfig::default(), sink),
            Err(ControllerError::InitializationError(_))
        ));
    }
}
