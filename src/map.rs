//! Fixed field-bus address map shared by the plant simulator and the monitor.

use static_assertions::const_assert;

/// Slots per bank (discrete inputs, coils, holding registers, input registers).
pub const BANK_SIZE: usize = 100;

/// Modbus unit identifier the plant answers to.
pub const UNIT_ID: u8 = 1;

/// Emergency override / kill switch. Writing `true` forces the safe state.
pub const OVERRIDE_COIL: u16 = 1;
/// "Normal cycling" command. Accepted and logged, no modeled physical effect.
pub const CYCLE_COIL: u16 = 2;
/// Cooling pump enable.
pub const PUMP_COIL: u16 = 3;

/// First coil the plant scans each tick, and how many.
pub const CONTROL_COIL_START: u16 = 0;
pub const CONTROL_COIL_COUNT: u16 = 5;

/// Current pressure, integer 0-100.
pub const PRESSURE_REGISTER: u16 = 10;
/// Current temperature, integer 20-120 under normal rules.
pub const TEMPERATURE_REGISTER: u16 = 11;

/// Pressure and temperature are published as one contiguous block.
pub const TELEMETRY_REGISTER_START: u16 = PRESSURE_REGISTER;
pub const TELEMETRY_REGISTER_COUNT: u16 = 2;

const_assert!(TEMPERATURE_REGISTER == PRESSURE_REGISTER + 1);
const_assert!((TELEMETRY_REGISTER_START + TELEMETRY_REGISTER_COUNT) as usize <= BANK_SIZE);
const_assert!((CONTROL_COIL_START + CONTROL_COIL_COUNT) as usize <= BANK_SIZE);
const_assert!(PUMP_COIL < CONTROL_COIL_START + CONTROL_COIL_COUNT);
const_assert!(OVERRIDE_COIL < CONTROL_COIL_START + CONTROL_COIL_COUNT);

/// Human-readable label for a coil of the control map.
pub fn coil_label(address: u16) -> &'static str {
    match address {
        OVERRIDE_COIL => "EMERGENCY OVERRIDE",
        CYCLE_COIL => "NORMAL CYCLING",
        PUMP_COIL => "COOLING PUMP",
        _ => "UNMAPPED",
    }
}
