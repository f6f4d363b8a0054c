//! Reactor process model.
//!
//! [`step`] is a pure transition: it takes the current physical state and the
//! control coils and returns the state one tick later. Pressure noise is drawn
//! from the caller's RNG so runs can be replayed with a seeded generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub const INITIAL_PRESSURE: f64 = 50.0;
pub const INITIAL_TEMPERATURE: f64 = 75.0;

pub const PRESSURE_MIN: f64 = 0.0;
pub const PRESSURE_MAX: f64 = 100.0;
/// Largest per-tick pressure excursion of the random walk.
pub const PRESSURE_JITTER: f64 = 1.0;

pub const SAFE_PRESSURE: f64 = 0.0;
pub const SAFE_TEMPERATURE: f64 = 20.0;

/// Centre of the cooling dead-band.
pub const TARGET_TEMPERATURE: f64 = 70.0;
pub const COOLING_RATE: f64 = 0.5;
pub const WARMING_RATE: f64 = 0.2;
/// Heating rate with the cooling pump off.
pub const RUNAWAY_RATE: f64 = 1.5;
pub const TEMPERATURE_MAX: f64 = 120.0;
pub const OVERHEAT_ALERT_TEMPERATURE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub pressure: f64,
    pub temperature: f64,
    /// Mirrors coil 1 as of the last tick.
    pub override_active: bool,
    /// Mirrors coil 3 as of the last tick.
    pub pump_on: bool,
}

impl ProcessState {
    pub fn new(pressure: f64, temperature: f64, pump_on: bool) -> Self {
        Self {
            pressure,
            temperature,
            override_active: false,
            pump_on,
        }
    }

    /// Readings as published to the holding registers.
    pub fn pressure_register(&self) -> u16 {
        to_register(self.pressure)
    }

    pub fn temperature_register(&self) -> u16 {
        to_register(self.temperature)
    }
}

impl Default for ProcessState {
    fn default() -> Self {
        Self::new(INITIAL_PRESSURE, INITIAL_TEMPERATURE, true)
    }
}

/// Control coils sampled at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlInputs {
    pub override_active: bool,
    pub pump_on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Alert {
    Overheating { temperature: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub state: ProcessState,
    /// Observability only, never fed back into the state.
    pub alert: Option<Alert>,
}

pub fn step<R: Rng>(state: &ProcessState, inputs: ControlInputs, rng: &mut R) -> StepResult {
    if inputs.override_active {
        return StepResult {
            state: ProcessState {
                pressure: SAFE_PRESSURE,
                temperature: SAFE_TEMPERATURE,
                override_active: true,
                pump_on: inputs.pump_on,
            },
            alert: None,
        };
    }

    let temperature = next_temperature(state.temperature, inputs.pump_on);
    let jitter = rng.random_range(-PRESSURE_JITTER..PRESSURE_JITTER);
    let pressure = (state.pressure + jitter).clamp(PRESSURE_MIN, PRESSURE_MAX);

    debug_assert!(
        (PRESSURE_MIN..=PRESSURE_MAX).contains(&pressure),
        "Pressure {} escaped its bounds",
        pressure
    );

    let alert = (!inputs.pump_on && temperature > OVERHEAT_ALERT_TEMPERATURE)
        .then_some(Alert::Overheating { temperature });

    StepResult {
        state: ProcessState {
            pressure,
            temperature,
            override_active: false,
            pump_on: inputs.pump_on,
        },
        alert,
    }
}

fn next_temperature(temperature: f64, pump_on: bool) -> f64 {
    if pump_on {
        if temperature > TARGET_TEMPERATURE {
            temperature - COOLING_RATE
        } else if temperature < TARGET_TEMPERATURE {
            temperature + WARMING_RATE
        } else {
            temperature
        }
    } else {
        (temperature + RUNAWAY_RATE).min(TEMPERATURE_MAX)
    }
}

fn to_register(value: f64) -> u16 {
    // float-to-int `as` saturates, so NaN and negatives land on 0
    value.round() as u16
}

/// Stateful wrapper that owns the process state and its noise source.
#[derive(Debug)]
pub struct Plant {
    state: ProcessState,
    rng: StdRng,
    ticks: u64,
}

impl Plant {
    pub fn new(initial: ProcessState, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            state: initial,
            rng,
            ticks: 0,
        }
    }

    pub fn tick(&mut self, inputs: ControlInputs) -> Option<Alert> {
        let result = step(&self.state, inputs, &mut self.rng);
        self.state = result.state;
        self.ticks += 1;
        result.alert
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
