//! Plant side of the bus: the tick loop driving the process model and the
//! Modbus/TCP service exposing the store.
//!
//! The tick loop owns the [`Plant`] exclusively. The store is the only state
//! shared with request handling, and it is shared through per-bank locks.

use crate::config::PlcConfig;
use crate::map::{
    CONTROL_COIL_COUNT, CONTROL_COIL_START, OVERRIDE_COIL, PUMP_COIL, TELEMETRY_REGISTER_START,
};
use crate::model::{Alert, ControlInputs, Plant, ProcessState};
use crate::store::{Bank, DataStore, StoreError};
use std::future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};
use tracing::{debug, error, info, warn};

/// Model plus store, advanced one tick at a time.
pub struct PlcSimulator {
    store: Arc<DataStore>,
    plant: Plant,
}

impl PlcSimulator {
    pub fn new(store: Arc<DataStore>, plant: Plant) -> Self {
        Self { store, plant }
    }

    pub fn from_config(store: Arc<DataStore>, config: &PlcConfig) -> Result<Self, StoreError> {
        let initial = ProcessState::new(
            config.initial_pressure,
            config.initial_temperature,
            config.initial_pump_on,
        );
        store.set_bits(Bank::Coils, PUMP_COIL, &[config.initial_pump_on])?;
        let simulator = Self::new(store, Plant::new(initial, config.seed));
        simulator.publish()?;
        Ok(simulator)
    }

    /// Scan the control coils, step the model and publish the new readings.
    pub fn tick(&mut self) -> Result<Option<Alert>, StoreError> {
        let coils = self
            .store
            .get_bits(Bank::Coils, CONTROL_COIL_START, usize::from(CONTROL_COIL_COUNT))?;
        let inputs = ControlInputs {
            override_active: coils[usize::from(OVERRIDE_COIL - CONTROL_COIL_START)],
            pump_on: coils[usize::from(PUMP_COIL - CONTROL_COIL_START)],
        };

        let alert = self.plant.tick(inputs);
        self.publish()?;
        Ok(alert)
    }

    fn publish(&self) -> Result<(), StoreError> {
        let state = self.plant.state();
        self.store.set(
            Bank::HoldingRegisters,
            TELEMETRY_REGISTER_START,
            &[state.pressure_register(), state.temperature_register()],
        )
    }

    pub fn state(&self) -> &ProcessState {
        self.plant.state()
    }

    pub fn ticks(&self) -> u64 {
        self.plant.ticks()
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }
}

/// Drive the simulator at a fixed period until the task is dropped.
pub async fn run_tick_loop(mut simulator: PlcSimulator, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match simulator.tick() {
            Ok(Some(Alert::Overheating { temperature })) => {
                warn!("🔥 ALERT: OVERHEATING! Temp: {}C", temperature.round());
            }
            Ok(None) => {
                let state = simulator.state();
                debug!(
                    "⚙️  tick {}: pressure={:.2} temperature={:.2} pump={} override={}",
                    simulator.ticks(),
                    state.pressure,
                    state.temperature,
                    state.pump_on,
                    state.override_active
                );
            }
            Err(e) => {
                error!("❌ Tick failed: {}", e);
                break;
            }
        }
    }
}

/// Modbus request handler over the shared store.
#[derive(Clone)]
pub struct PlcService {
    store: Arc<DataStore>,
}

impl PlcService {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self { store }
    }

    fn handle(&self, req: Request<'static>) -> Result<Response, ExceptionCode> {
        match req {
            Request::ReadCoils(addr, cnt) => self
                .store
                .get_bits(Bank::Coils, addr, usize::from(cnt))
                .map(Response::ReadCoils)
                .map_err(illegal_address),
            Request::ReadDiscreteInputs(addr, cnt) => self
                .store
                .get_bits(Bank::DiscreteInputs, addr, usize::from(cnt))
                .map(Response::ReadDiscreteInputs)
                .map_err(illegal_address),
            Request::ReadHoldingRegisters(addr, cnt) => self
                .store
                .get(Bank::HoldingRegisters, addr, usize::from(cnt))
                .map(Response::ReadHoldingRegisters)
                .map_err(illegal_address),
            Request::ReadInputRegisters(addr, cnt) => self
                .store
                .get(Bank::InputRegisters, addr, usize::from(cnt))
                .map(Response::ReadInputRegisters)
                .map_err(illegal_address),
            Request::WriteSingleCoil(addr, value) => {
                info!("✍️  Write coil {} = {}", addr, value);
                self.store
                    .set_bits(Bank::Coils, addr, &[value])
                    .map(|()| Response::WriteSingleCoil(addr, value))
                    .map_err(illegal_address)
            }
            Request::WriteMultipleCoils(addr, values) => {
                info!("✍️  Write {} coils from {}", values.len(), addr);
                self.store
                    .set_bits(Bank::Coils, addr, &values)
                    .map(|()| Response::WriteMultipleCoils(addr, values.len() as u16))
                    .map_err(illegal_address)
            }
            Request::WriteSingleRegister(addr, value) => self
                .store
                .set(Bank::HoldingRegisters, addr, &[value])
                .map(|()| Response::WriteSingleRegister(addr, value))
                .map_err(illegal_address),
            Request::WriteMultipleRegisters(addr, values) => self
                .store
                .set(Bank::HoldingRegisters, addr, &values)
                .map(|()| Response::WriteMultipleRegisters(addr, values.len() as u16))
                .map_err(illegal_address),
            _ => {
                warn!("Unsupported function code in request: {:?}", req);
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

fn illegal_address(err: StoreError) -> ExceptionCode {
    warn!("Rejected request: {}", err);
    ExceptionCode::IllegalDataAddress
}

impl tokio_modbus::server::Service for PlcService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("📨 Received request: {:?}", req);
        future::ready(self.handle(req))
    }
}

/// Bound listener plus the simulator it will drive.
pub struct PlcServer {
    listener: TcpListener,
    simulator: PlcSimulator,
    tick_period: Duration,
}

impl PlcServer {
    pub async fn bind(config: &PlcConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let store = Arc::new(DataStore::new());
        let simulator = PlcSimulator::from_config(store, config)?;
        let listener = TcpListener::bind(config.bind).await?;
        Ok(Self {
            listener,
            simulator,
            tick_period: config.tick_period(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn store(&self) -> Arc<DataStore> {
        Arc::clone(self.simulator.store())
    }

    /// Start the tick loop and serve bus requests until the listener fails.
    pub async fn run(self) -> std::io::Result<()> {
        let store = Arc::clone(self.simulator.store());
        let tick_task = tokio::spawn(run_tick_loop(self.simulator, self.tick_period));

        let result = serve(self.listener, store).await;
        tick_task.abort();
        result
    }
}

/// Answer Modbus/TCP requests against `store`, one session per client.
pub async fn serve(listener: TcpListener, store: Arc<DataStore>) -> std::io::Result<()> {
    info!("🏭 PLC simulator listening on {}", listener.local_addr()?);

    let server = Server::new(listener);
    let on_connected = move |stream: tokio::net::TcpStream, socket_addr: SocketAddr| {
        let store = Arc::clone(&store);
        async move {
            info!("🔗 New client connected: {}", socket_addr);
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(PlcService::new(Arc::clone(&store))))
            })
        }
    };
    let on_process_error = |err: std::io::Error| {
        warn!("Client session error: {}", err);
    };

    server.serve(&on_connected, on_process_error).await
}
