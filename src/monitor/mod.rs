//! Supervisory (HMI) side of the bus.
//!
//! [`Monitor::start`] spawns two tasks around a shared [`link::BusLink`]: the
//! reconnect task and the [`poller::PollLoop`]. Dispatched commands get a task
//! each. Everything the presentation layer needs arrives on the returned event
//! channel, in production order.

pub mod connection;
pub mod dispatcher;
pub mod history;
pub mod link;
pub mod poller;
pub mod presenter;

pub use connection::{ConnectionState, LinkEvent};
pub use dispatcher::{Command, CommandDispatcher, CommandHandle, CommandOutcome, DispatchError};
pub use history::{TrendHistory, TrendSnapshot, HISTORY_LEN};
pub use presenter::{run_presenter, Presenter};

use crate::config::MonitorConfig;
use link::{run_reconnector, BusLink, Readings};
use poller::PollLoop;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

pub const PRESSURE_ALARM: u16 = 80;
pub const TEMPERATURE_CRITICAL: u16 = 100;

/// One successful poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub sequence: u64,
    pub timestamp_ms: i64,
    pub pressure: u16,
    pub temperature: u16,
    pub pump_on: bool,
    pub override_active: bool,
}

impl Sample {
    pub(crate) fn from_readings(sequence: u64, readings: Readings) -> Self {
        Self {
            sequence,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            pressure: readings.pressure,
            temperature: readings.temperature,
            pump_on: readings.pump_on,
            override_active: readings.override_active,
        }
    }

    pub fn pressure_alarm(&self) -> bool {
        self.pressure > PRESSURE_ALARM
    }

    pub fn temperature_critical(&self) -> bool {
        self.temperature > TEMPERATURE_CRITICAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    Info,
    Accepted,
    Rejected,
    Error,
}

/// Event log entry, stamped with local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub time: String,
    pub kind: LogKind,
    pub message: String,
}

impl LogLine {
    pub fn now(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            time: chrono::Local::now().format("%H:%M:%S").to_string(),
            kind,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for LogLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} > {}", self.time, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Sample { sample: Sample, trend: TrendSnapshot },
    Connection(ConnectionState),
    Log(LogLine),
}

pub type MonitorEvents = mpsc::UnboundedReceiver<MonitorEvent>;

pub struct Monitor {
    link: Arc<BusLink>,
    dispatcher: CommandDispatcher,
    latest: watch::Receiver<Option<Sample>>,
    running: Arc<AtomicBool>,
    poller: JoinHandle<()>,
    reconnector: JoinHandle<()>,
}

impl Monitor {
    /// Spawn the reconnect and poll tasks. Must be called inside a Tokio runtime.
    pub fn start(config: MonitorConfig) -> (Self, MonitorEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let endpoint = config.endpoint;
        let link = Arc::new(BusLink::new(config, events_tx));
        let running = Arc::new(AtomicBool::new(true));
        let (latest_tx, latest) = watch::channel(None);

        let reconnector = tokio::spawn(run_reconnector(Arc::clone(&link)));
        let poller = tokio::spawn(PollLoop::new(Arc::clone(&link), Arc::clone(&running), latest_tx).run());
        info!("🖥️  Monitor started against {}", endpoint);

        let monitor = Self {
            dispatcher: CommandDispatcher::new(Arc::clone(&link)),
            link,
            latest,
            running,
            poller,
            reconnector,
        };
        (monitor, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.link.subscribe()
    }

    /// Wait until the link reaches `target`; `false` on timeout.
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> bool {
        let mut states = self.link.subscribe();
        let reached = tokio::time::timeout(timeout, states.wait_for(|state| *state == target)).await;
        matches!(reached, Ok(Ok(_)))
    }

    pub fn latest_sample(&self) -> Option<Sample> {
        self.latest.borrow().clone()
    }

    /// Wait for the next sample produced after this call.
    pub async fn next_sample(&self, timeout: Duration) -> Option<Sample> {
        let mut latest = self.latest.clone();
        latest.mark_unchanged();
        match tokio::time::timeout(timeout, latest.changed()).await {
            Ok(Ok(())) => latest.borrow().clone(),
            _ => None,
        }
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        self.dispatcher.clone()
    }

    pub fn dispatch(&self, command: Command) -> Result<CommandHandle, DispatchError> {
        self.dispatcher.dispatch(command)
    }

    /// Stop polling. The poll loop notices within one cadence.
    pub async fn shutdown(self) {
        self.running.store(false, Ordering::SeqCst);
        self.reconnector.abort();
        let _ = self.poller.await;
        info!("🛑 Monitor stopped");
    }
}
