//! # SCADA Plant Simulator
//!
//! A small supervisory-control deployment in one crate: a simulated reactor
//! plant ("PLC") exposing its state over Modbus/TCP, and a supervisory monitor
//! ("HMI") that polls it, keeps a bounded trend history, and issues coil
//! commands.
//!
//! ## Features
//!
//! - **Deterministic process model**: pressure random walk, cooling dead-band,
//!   runaway heating and an emergency override
//! - **Addressable store**: coils, discrete inputs, holding and input registers
//! - **Modbus/TCP server**: plant tick loop decoupled from request handling
//! - **Poll loop**: fixed cadence, 60-sample trend history, explicit link state
//! - **Command dispatch**: non-blocking coil writes with accept/reject reporting
//!
//! ## Quick Start
//!
//! ```rust
//! use scadasim::model::{ControlInputs, Plant, ProcessState};
//!
//! let mut plant = Plant::new(ProcessState::default(), Some(7));
//! for _ in 0..10 {
//!     plant.tick(ControlInputs { override_active: false, pump_on: true });
//! }
//! assert_eq!(plant.state().temperature, 70.0);
//! ```
//!
//! ## Architecture
//!
//! - [`map`] - Fixed coil/register address map
//! - [`store`] - Four-bank addressable store
//! - [`model`] - Process model and plant state
//! - [`server`] - Plant tick loop and Modbus service
//! - [`monitor`] - Poll loop, command dispatcher, presentation hooks
//! - [`config`] - JSON-backed configuration

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod error;
pub mod map;
pub mod model;
pub mod monitor;
pub mod server;
pub mod store;

// Re-export main public types for convenience
pub use config::{Config, MonitorConfig, PlcConfig};
pub use error::BusError;
pub use model::{ControlInputs, Plant, ProcessState};
pub use monitor::{Command, CommandOutcome, ConnectionState, Monitor, MonitorEvent, Sample};
pub use server::{PlcServer, PlcSimulator};
pub use store::{Bank, DataStore, StoreError};
