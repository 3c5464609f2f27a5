//! Online/offline tracking and reconciliation scheduling.
//!
//! # Responsibility
//! - Merge platform connectivity notifications and a periodic poll into one
//!   online/offline signal.
//! - Trigger a reconciliation pass whenever the signal reports online.
//!
//! # Invariants
//! - At most one reconciliation pass is in flight per monitor.
//! - A trigger that arrives while a pass is running is dropped, not queued;
//!   the next poll picks up whatever it missed.
//! - Going offline never starts a pass.

use crate::state::{StateEvent, StateStore};
use crate::sync::engine::{SyncEngine, SyncReport};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Platform connectivity check used by the poll.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Probe whose answer is set explicitly.
#[derive(Debug, Default)]
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for StaticProbe {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorMessage {
    Connectivity(bool),
    Shutdown,
}

/// Producer side for platform connectivity-change notifications.
#[derive(Debug, Clone)]
pub struct ConnectivityHandle {
    sender: mpsc::UnboundedSender<MonitorMessage>,
}

impl ConnectivityHandle {
    /// Reports a platform connectivity change.
    ///
    /// Returns `false` when the monitor loop has already stopped.
    pub fn notify(&self, online: bool) -> bool {
        self.sender
            .send(MonitorMessage::Connectivity(online))
            .is_ok()
    }

    /// Stops the monitor loop. Passes already running finish on their own.
    pub fn shutdown(&self) -> bool {
        self.sender.send(MonitorMessage::Shutdown).is_ok()
    }
}

/// Releases the in-flight flag when the pass ends, including on panic.
struct PassGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Connectivity monitor with a single-slot reentrancy guard.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    engine: Arc<SyncEngine>,
    state: Arc<StateStore>,
    poll_interval: Duration,
    in_flight: Arc<AtomicBool>,
    passes_started: Arc<AtomicU64>,
    triggers_dropped: Arc<AtomicU64>,
}

impl ConnectivityMonitor {
    pub fn new(engine: Arc<SyncEngine>, state: Arc<StateStore>, poll_interval: Duration) -> Self {
        Self {
            engine,
            state,
            poll_interval,
            in_flight: Arc::new(AtomicBool::new(false)),
            passes_started: Arc::new(AtomicU64::new(0)),
            triggers_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Applies one online/offline signal from either producer.
    ///
    /// Online publishes the status and starts a pass in the background unless
    /// one is already running. Returns the handle of the started pass.
    pub fn handle_signal(&self, online: bool) -> Option<JoinHandle<SyncReport>> {
        let changed = self.state.dispatch(StateEvent::SetOnlineStatus(online));
        if changed {
            info!(
                "event=connectivity_changed module=monitor status=ok online={}",
                online
            );
        }

        if !online {
            return None;
        }
        self.trigger_pass()
    }

    /// Starts a background pass unless one is in flight.
    pub fn trigger_pass(&self) -> Option<JoinHandle<SyncReport>> {
        let guard = self.try_acquire()?;
        let engine = Arc::clone(&self.engine);
        Some(tokio::spawn(async move {
            let _guard = guard;
            engine.sync_all().await
        }))
    }

    /// Runs a pass on the caller's task unless one is in flight.
    ///
    /// Returns `None` when the call was dropped by the guard.
    pub async fn run_pass(&self) -> Option<SyncReport> {
        let _guard = self.try_acquire()?;
        Some(self.engine.sync_all().await)
    }

    pub fn is_pass_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Passes admitted by the guard since construction.
    pub fn passes_started(&self) -> u64 {
        self.passes_started.load(Ordering::SeqCst)
    }

    /// Triggers dropped because a pass was already running.
    pub fn triggers_dropped(&self) -> u64 {
        self.triggers_dropped.load(Ordering::SeqCst)
    }

    /// Spawns the monitor loop.
    ///
    /// The loop checks `probe` immediately, then every poll interval, and
    /// consumes notifications sent through the returned handle. It stops on
    /// `shutdown` or once every handle is dropped.
    pub fn start(&self, probe: Arc<dyn ConnectivityProbe>) -> (ConnectivityHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let monitor = self.clone();
        let task = tokio::spawn(async move { monitor.run(probe, receiver).await });
        (ConnectivityHandle { sender }, task)
    }

    async fn run(
        self,
        probe: Arc<dyn ConnectivityProbe>,
        mut receiver: mpsc::UnboundedReceiver<MonitorMessage>,
    ) {
        info!(
            "event=monitor_start module=monitor status=ok poll_interval_ms={}",
            self.poll_interval.as_millis()
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.handle_signal(probe.is_online());
                }
                message = receiver.recv() => match message {
                    Some(MonitorMessage::Connectivity(online)) => {
                        self.handle_signal(online);
                    }
                    Some(MonitorMessage::Shutdown) | None => break,
                },
            }
        }

        info!("event=monitor_stop module=monitor status=ok");
    }

    fn try_acquire(&self) -> Option<PassGuard> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.triggers_dropped.fetch_add(1, Ordering::SeqCst);
            debug!("event=sync_trigger module=monitor status=skipped reason=pass_in_flight");
            return None;
        }
        self.passes_started.fetch_add(1, Ordering::SeqCst);
        Some(PassGuard {
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}
