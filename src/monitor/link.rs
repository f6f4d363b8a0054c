//! Bus connection shared by the poll loop and the command dispatcher.
//!
//! The link owns the polling client context and the [`ConnectionState`].
//! Coil writes open a short-lived context each, so they never queue behind
//! or break the polling transport.
//! Reconnecting happens on a dedicated task ([`run_reconnector`]) so that a
//! slow or hanging connect never delays a scheduled poll.

use super::connection::{ConnectionState, LinkEvent};
use super::{LogKind, LogLine, MonitorEvent};
use crate::config::MonitorConfig;
use crate::error::BusError;
use crate::map::{
    CONTROL_COIL_COUNT, CONTROL_COIL_START, OVERRIDE_COIL, PUMP_COIL, TELEMETRY_REGISTER_COUNT,
    TELEMETRY_REGISTER_START,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::time;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

/// One decoded poll: both telemetry registers and the control coils.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readings {
    pub pressure: u16,
    pub temperature: u16,
    pub pump_on: bool,
    pub override_active: bool,
}

pub struct BusLink {
    config: MonitorConfig,
    ctx: Mutex<Option<Context>>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<MonitorEvent>,
    wake: Notify,
}

impl BusLink {
    pub fn new(config: MonitorConfig, events: mpsc::UnboundedSender<MonitorEvent>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            ctx: Mutex::new(None),
            state,
            events,
            wake: Notify::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Feed an event through the state machine, announcing real transitions.
    pub fn apply(&self, event: LinkEvent) -> ConnectionState {
        let mut next = ConnectionState::Disconnected;
        let changed = self.state.send_if_modified(|state| {
            next = state.on(event);
            if next == *state {
                false
            } else {
                *state = next;
                true
            }
        });

        if changed {
            info!("🔌 Link {} ({:?})", next, event);
            self.emit(MonitorEvent::Connection(next));
        }
        next
    }

    pub fn emit(&self, event: MonitorEvent) {
        // the presenter may already be gone during shutdown
        let _ = self.events.send(event);
    }

    pub fn log(&self, kind: LogKind, message: impl Into<String>) {
        self.emit(MonitorEvent::Log(LogLine::now(kind, message)));
    }

    pub async fn has_transport(&self) -> bool {
        self.ctx.lock().await.is_some()
    }

    /// Single connect attempt bounded by the request timeout.
    async fn connect(&self) -> Result<Context, BusError> {
        let endpoint = self.config.endpoint;
        let attempt = time::timeout(
            self.config.request_timeout(),
            tcp::connect_slave(endpoint, Slave(self.config.unit_id)),
        )
        .await;

        match attempt {
            Ok(Ok(ctx)) => Ok(ctx),
            Ok(Err(e)) => Err(BusError::Connection(format!("connect to {} failed: {}", endpoint, e))),
            Err(_) => Err(BusError::Connection(format!("connect to {} timed out", endpoint))),
        }
    }

    /// Establish the polling transport.
    pub async fn try_connect(&self) -> Result<(), BusError> {
        match self.connect().await {
            Ok(ctx) => {
                *self.ctx.lock().await = Some(ctx);
                self.apply(LinkEvent::ConnectSucceeded);
                self.log(
                    LogKind::Info,
                    format!("Connected to PLC Controller at {}.", self.config.endpoint),
                );
                Ok(())
            }
            Err(e) => {
                self.apply(LinkEvent::ConnectFailed);
                Err(e)
            }
        }
    }

    pub async fn read_telemetry(&self) -> Result<Readings, BusError> {
        let mut guard = self.ctx.lock().await;
        let Some(ctx) = guard.as_mut() else {
            return Err(BusError::Connection("no transport".into()));
        };

        let timeout = self.config.request_timeout();
        let result = async {
            let registers = bounded(
                timeout,
                ctx.read_holding_registers(TELEMETRY_REGISTER_START, TELEMETRY_REGISTER_COUNT),
            )
            .await?;
            let coils = bounded(timeout, ctx.read_coils(CONTROL_COIL_START, CONTROL_COIL_COUNT)).await?;
            decode(&registers, &coils)
        }
        .await;

        if let Err(e) = &result {
            if e.breaks_transport() {
                self.drop_transport(&mut guard);
            }
        }
        result
    }

    /// One coil write on a connection of its own. The polling transport and
    /// the link state are never touched, so an unanswered write cannot hold
    /// up a poll.
    pub async fn write_coil(&self, address: u16, value: bool) -> Result<(), BusError> {
        let mut ctx = self.connect().await?;
        bounded(self.config.request_timeout(), ctx.write_single_coil(address, value)).await
    }

    fn drop_transport(&self, guard: &mut Option<Context>) {
        // a context that timed out may still deliver a stale reply, never reuse it
        *guard = None;
        self.apply(LinkEvent::TransportFailed);
        self.wake.notify_one();
    }
}

async fn bounded<T, F>(timeout: Duration, request: F) -> Result<T, BusError>
where
    F: Future<Output = tokio_modbus::Result<T>>,
{
    match time::timeout(timeout, request).await {
        Err(_) => Err(BusError::Connection(format!(
            "no response within {} ms",
            timeout.as_millis()
        ))),
        Ok(Err(e)) => Err(e.into()),
        Ok(Ok(Err(code))) => Err(BusError::exception(code)),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

fn decode(registers: &[u16], coils: &[bool]) -> Result<Readings, BusError> {
    let pump = usize::from(PUMP_COIL - CONTROL_COIL_START);
    let override_coil = usize::from(OVERRIDE_COIL - CONTROL_COIL_START);
    match (registers, coils.get(pump), coils.get(override_coil)) {
        ([pressure, temperature, ..], Some(&pump_on), Some(&override_active)) => Ok(Readings {
            pressure: *pressure,
            temperature: *temperature,
            pump_on,
            override_active,
        }),
        _ => Err(BusError::Protocol(format!(
            "short reply: {} registers, {} coils",
            registers.len(),
            coils.len()
        ))),
    }
}

/// Exponential reconnect delay, doubling from `min` up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            current: min,
            attempts: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        self.attempts += 1;
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Keep the link connected: connect at start, then again after each
/// transport failure, backing off between failed attempts.
pub async fn run_reconnector(link: Arc<BusLink>) {
    let config = link.config();
    let mut backoff = Backoff::new(
        Duration::from_millis(config.reconnect_min_ms),
        Duration::from_millis(config.reconnect_max_ms),
    );

    loop {
        if link.has_transport().await {
            link.wake.notified().await;
            continue;
        }

        match link.try_connect().await {
            Ok(()) => backoff.reset(),
            Err(e) => {
                if backoff.attempts() == 0 {
                    warn!("❌ {}", e);
                    link.log(LogKind::Error, format!("Connection Failed: {}", e));
                }
                let delay = backoff.next_delay();
                debug!("Retrying connection in {} ms", delay.as_millis());
                time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.attempts(), 5);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_decode_picks_pump_and_override() {
        let readings = decode(&[52, 71], &[false, true, false, false, false]).unwrap();
        assert_eq!(readings.pressure, 52);
        assert_eq!(readings.temperature, 71);
        assert!(readings.override_active);
        assert!(!readings.pump_on);
    }

    #[test]
    fn test_decode_short_reply_is_protocol_error() {
        let err = decode(&[52], &[false; 5]).unwrap_err();
        assert!(matches!(err, BusError::Protocol(_)));
        let err = decode(&[52, 70], &[false, true]).unwrap_err();
        assert!(matches!(err, BusError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_transitions_are_announced_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let link = BusLink::new(MonitorConfig::default(), tx);

        assert_eq!(link.apply(LinkEvent::ConnectFailed), ConnectionState::Disconnected);
        assert_eq!(link.apply(LinkEvent::ConnectSucceeded), ConnectionState::Connected);
        assert_eq!(link.apply(LinkEvent::ReadSucceeded), ConnectionState::Connected);

        match rx.try_recv() {
            Ok(MonitorEvent::Connection(state)) => assert_eq!(state, ConnectionState::Connected),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
