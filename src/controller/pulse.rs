//! Momentary, self-releasing button presses
//!
//! A pulse presses a button now and releases it after a short delay. At most
//! one release is pending per button: firing again aborts the outstanding
//! release task before scheduling a new one, so rapid re-fires extend the
//! press instead of stacking releases. A release task that already woke up
//! when it was aborted is caught by its generation number.

use crate::command::channel::{emit, CommandSink};
use crate::command::{Button, Command};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseSettings {
    pub release_delay_ms: u64,
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            release_delay_ms: 200,
        }
    }
}

struct PendingRelease {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct PulseTable {
    next_generation: u64,
    pending: HashMap<Button, PendingRelease>,
}

struct PulseInner {
    sink: Arc<dyn CommandSink>,
    runtime: Handle,
    release_delay: Duration,
    table: Mutex<PulseTable>,
}

impl PulseInner {
    /// Sends the release scheduled as `generation`, unless a re-fire or a
    /// flush has replaced it since. Returns whether the release was sent.
    fn release_if_current(&self, button: Button, generation: u64) -> bool {
        let mut table = match self.table.lock() {
            Ok(table) => table,
            Err(e) => {
                error!("Pulse table poisoned, dropping release of {:?}: {}", button, e);
                return false;
            }
        };
        let current = table.pending.get(&button).map(|p| p.generation) == Some(generation);
        if !current {
            debug!("Stale release of {:?} skipped", button);
            return false;
        }
        table.pending.remove(&button);
        // sent under the lock so a concurrent fire cannot slip its press in first
        emit(self.sink.as_ref(), [Command::Release(button)]);
        true
    }
}

/// Schedules pulse releases on a tokio runtime
///
/// Cloning is cheap; clones share the pending releases. `fire` can be called
/// from any thread, including threads outside the runtime.
///
/// Every scheduled release carries a generation number. A release task that
/// wakes up after its button was re-fired or flushed finds a newer
/// generation (or none) in the table and sends nothing, so a stale `R_*`
/// never follows a fresh `P_*`.
///
/// # Performance Impact
///
/// - `release_delay_ms`: How long the target sees the button held. Too short
///   and a game polling slower than the delay may miss the press entirely.
///
/// # Examples
///
/// ```rust,no_run
/// use multisense_kart::command::{Button, UdpCommandChannel};
/// use multisense_kart::controller::{PulseScheduler, PulseSettings};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let channel = UdpCommandChannel::connect("127.0.0.1:6006".parse()?).await?;
/// let pulses = PulseScheduler::new(
///     Arc::new(channel),
///     tokio::runtime::Handle::current(),
///     &PulseSettings::default(),
/// );
///
/// // P_RESCUE now, R_RESCUE 200 ms later
/// pulses.fire(Button::Rescue);
///
/// // on shutdown, nothing stays held
/// pulses.flush();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PulseScheduler {
    inner: Arc<PulseInner>,
}

impl PulseScheduler {
    pub fn new(sink: Arc<dyn CommandSink>, runtime: Handle, settings: &PulseSettings) -> Self {
        Self {
            inner: Arc::new(PulseInner {
                sink,
                runtime,
                release_delay: Duration::from_millis(settings.release_delay_ms),
                table: Mutex::new(PulseTable::default()),
            }),
        }
    }

    pub fn release_delay(&self) -> Duration {
        self.inner.release_delay
    }

    /// Presses `button` and schedules its release, replacing any pending one
    pub fn fire(&self, button: Button) {
        let mut table = match self.inner.table.lock() {
            Ok(table) => table,
            Err(e) => {
                error!("Pulse table poisoned, dropping pulse for {:?}: {}", button, e);
                return;
            }
        };

        if let Some(previous) = table.pending.remove(&button) {
            debug!("Re-fire of {:?}, cancelling pending release", button);
            previous.task.abort();
        }

        emit(self.inner.sink.as_ref(), [Command::Press(button)]);

        table.next_generation += 1;
        let generation = table.next_generation;
        let inner = Arc::clone(&self.inner);
        let delay = self.inner.release_delay;
        let task = self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.release_if_current(button, generation);
        });
        table
            .pending
            .insert(button, PendingRelease { generation, task });
    }

    /// Number of releases that have not fired yet
    pub fn pending(&self) -> usize {
        self.inner
            .table
            .lock()
            .map(|table| table.pending.len())
            .unwrap_or(0)
    }

    /// Sends every outstanding release immediately
    pub fn flush(&self) {
        let mut table = match self.inner.table.lock() {
            Ok(table) => table,
            Err(e) => {
                error!("Pulse table poisoned, cannot flush: {}", e);
                return;
            }
        };

        for (button, pending) in table.pending.drain() {
            pending.task.abort();
            debug!("Flushing pending release of {:?}", button);
            emit(self.inner.sink.as_ref(), [Command::Release(button)]);
        }
    }
}

impl std::fmt::Debug for PulseScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseScheduler")
            .field("release_delay", &self.inner.release_delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::channel::testing::RecordingSink;

    fn scheduler(sink: Arc<RecordingSink>) -> PulseScheduler {
        PulseScheduler::new(sink, Handle::current(), &PulseSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn press_then_release_after_delay() {
        let sink = RecordingSink::new();
        let pulses = scheduler(sink.clone());

        pulses.fire(Button::Rescue);
        assert_eq!(sink.commands(), vec![Command::Press(Button::Rescue)]);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sink.commands().len(), 1);
        assert_eq!(pulses.pending(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            sink.commands(),
            vec![Command::Press(Button::Rescue), Command::Release(Button::Rescue)]
        );
        assert_eq!(pulses.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refire_keeps_a_single_release() {
        let sink = RecordingSink::new();
        let pulses = scheduler(sink.clone());

        pulses.fire(Button::Fire);
        tokio::time::sleep(Duration::from_millis(100)).await;
        pulses.fire(Button::Fire);
        tokio::time::sleep(Duration::from_millis(150)).await;
        // the first release was cancelled
        assert_eq!(
            sink.commands(),
            vec![Command::Press(Button::Fire), Command::Press(Button::Fire)]
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        let releases = sink.commands().iter().filter(|c| c.is_release()).count();
        assert_eq!(releases, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn buttons_pulse_independently() {
        let sink = RecordingSink::new();
        let pulses = scheduler(sink.clone());

        pulses.fire(Button::Fire);
        pulses.fire(Button::Rescue);
        tokio::time::sleep(Duration::from_millis(250)).await;

        let commands = sink.commands();
        assert!(commands.contains(&Command::Release(Button::Fire)));
        assert!(commands.contains(&Command::Release(Button::Rescue)));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_releases_immediately() {
        let sink = RecordingSink::new();
        let pulses = scheduler(sink.clone());

        pulses.fire(Button::Nitro);
        pulses.flush();
        assert_eq!(
            sink.commands(),
            vec![Command::Press(Button::Nitro), Command::Release(Button::Nitro)]
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(sink.commands().len(), 2);
    }

    fn generation_of(pulses: &PulseScheduler, button: Button) -> u64 {
        pulses.inner.table.lock().unwrap().pending[&button].generation
    }

    #[tokio::test(start_paused = true)]
    async fn late_release_after_refire_is_dropped() {
        let sink = RecordingSink::new();
        let pulses = scheduler(sink.clone());

        pulses.fire(Button::Fire);
        let first = generation_of(&pulses, Button::Fire);
        pulses.fire(Button::Fire);
        let second = generation_of(&pulses, Button::Fire);
        assert_ne!(first, second);

        // a release task that woke up before the re-fire aborted it
        assert!(!pulses.inner.release_if_current(Button::Fire, first));
        assert_eq!(
            sink.commands(),
            vec![Command::Press(Button::Fire), Command::Press(Button::Fire)]
        );
        assert_eq!(pulses.pending(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(sink.commands().last(), Some(&Command::Release(Button::Fire)));
        assert_eq!(pulses.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_release_after_flush_is_dropped() {
        let sink = RecordingSink::new();
        let pulses = scheduler(sink.clone());

        pulses.fire(Button::Rescue);
        let generation = generation_of(&pulses, Button::Rescue);
        pulses.flush();

        assert!(!pulses.inner.release_if_current(Button::Rescue, generation));
        assert_eq!(
            sink.commands(),
            vec![Command::Press(Button::Rescue), Command::Release(Button::Rescue)]
        );
    }

    #[test]
    fn fires_from_outside_the_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let sink = RecordingSink::new();
        let pulses = PulseScheduler::new(
            sink.clone(),
            runtime.handle().clone(),
            &PulseSettings {
                release_delay_ms: 10,
            },
        );

        pulses.fire(Button::Rescue);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(
            sink.commands(),
            vec![Command::Press(Button::Rescue), Command::Release(Button::Rescue)]
        );
    }
}
