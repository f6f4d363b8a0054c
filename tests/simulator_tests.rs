use scadasim::config::PlcConfig;
use scadasim::map::*;
use scadasim::model::Alert;
use scadasim::server::PlcSimulator;
use scadasim::store::{Bank, DataStore};
use std::sync::Arc;

fn simulator(config: PlcConfig) -> (Arc<DataStore>, PlcSimulator) {
    let store = Arc::new(DataStore::new());
    let simulator = PlcSimulator::from_config(Arc::clone(&store), &config).unwrap();
    (store, simulator)
}

fn seeded() -> PlcConfig {
    PlcConfig {
        seed: Some(42),
        ..PlcConfig::default()
    }
}

fn registers(store: &DataStore) -> (u16, u16) {
    let block = store.get(Bank::HoldingRegisters, PRESSURE_REGISTER, 2).unwrap();
    (block[0], block[1])
}

#[test]
fn test_initial_state_published_before_first_tick() {
    let (store, simulator) = simulator(seeded());

    assert_eq!(registers(&store), (50, 75));
    assert_eq!(store.get_bits(Bank::Coils, PUMP_COIL, 1).unwrap(), vec![true]);
    assert_eq!(store.get_bits(Bank::Coils, OVERRIDE_COIL, 1).unwrap(), vec![false]);
    assert_eq!(simulator.ticks(), 0);
}

#[test]
fn test_ten_ticks_cool_to_target() {
    let (store, mut simulator) = simulator(seeded());

    for _ in 0..10 {
        assert!(simulator.tick().unwrap().is_none());
    }

    assert_eq!(simulator.state().temperature, 70.0);
    let (pressure, temperature) = registers(&store);
    assert_eq!(temperature, 70);
    assert!(pressure <= 100);
    assert_eq!(pressure, simulator.state().pressure_register());
}

#[test]
fn test_override_coil_applies_on_next_tick() {
    let (store, mut simulator) = simulator(seeded());
    simulator.tick().unwrap();

    store.set_bits(Bank::Coils, OVERRIDE_COIL, &[true]).unwrap();
    simulator.tick().unwrap();

    assert_eq!(registers(&store), (0, 20));
    assert!(simulator.state().override_active);

    store.set_bits(Bank::Coils, OVERRIDE_COIL, &[false]).unwrap();
    simulator.tick().unwrap();
    assert!(!simulator.state().override_active);
    assert_eq!(registers(&store).1, 20);
}

#[test]
fn test_pump_coil_drives_runaway() {
    let (store, mut simulator) = simulator(seeded());
    store.set_bits(Bank::Coils, PUMP_COIL, &[false]).unwrap();

    let mut alerts = 0;
    for _ in 0..40 {
        if let Some(Alert::Overheating { temperature }) = simulator.tick().unwrap() {
            assert!(temperature > 100.0);
            alerts += 1;
        }
    }

    assert_eq!(registers(&store).1, 120);
    assert!(!simulator.state().pump_on);
    // 100.5 is reached on tick 17, every later tick alerts too
    assert_eq!(alerts, 24);
}

#[test]
fn test_cycle_coil_has_no_physical_effect() {
    let (store_a, mut a) = simulator(seeded());
    let (_, mut b) = simulator(seeded());
    store_a.set_bits(Bank::Coils, CYCLE_COIL, &[true]).unwrap();

    for _ in 0..20 {
        a.tick().unwrap();
        b.tick().unwrap();
    }
    assert_eq!(a.state(), b.state());
}

#[test]
fn test_initial_pump_off_from_config() {
    let config = PlcConfig {
        initial_pump_on: false,
        initial_temperature: 90.0,
        ..seeded()
    };
    let (store, mut simulator) = simulator(config);

    assert_eq!(store.get_bits(Bank::Coils, PUMP_COIL, 1).unwrap(), vec![false]);
    simulator.tick().unwrap();
    assert_eq!(simulator.state().temperature, 91.5);
}
