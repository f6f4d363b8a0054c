use rand::rngs::StdRng;
use rand::SeedableRng;
use scadasim::model::*;

const PUMP_ON: ControlInputs = ControlInputs {
    override_active: false,
    pump_on: true,
};

const PUMP_OFF: ControlInputs = ControlInputs {
    override_active: false,
    pump_on: false,
};

const OVERRIDE: ControlInputs = ControlInputs {
    override_active: true,
    pump_on: true,
};

#[test]
fn test_default_state() {
    let state = ProcessState::default();
    assert_eq!(state.pressure, 50.0);
    assert_eq!(state.temperature, 75.0);
    assert!(state.pump_on);
    assert!(!state.override_active);
}

#[test]
fn test_cooling_settles_at_target() {
    let mut plant = Plant::new(ProcessState::default(), Some(1));

    for _ in 0..10 {
        plant.tick(PUMP_ON);
    }
    assert_eq!(plant.state().temperature, 70.0);
    assert_eq!(plant.state().temperature_register(), 70);

    // exactly on target the pump holds it there
    for _ in 0..20 {
        plant.tick(PUMP_ON);
        assert_eq!(plant.state().temperature, 70.0);
    }
}

#[test]
fn test_warming_below_target() {
    let mut rng = StdRng::seed_from_u64(3);
    let state = ProcessState::new(50.0, 69.0, true);

    let next = step(&state, PUMP_ON, &mut rng).state;
    assert!((next.temperature - 69.2).abs() < 1e-9);
}

#[test]
fn test_pump_off_heats_and_caps() {
    let mut plant = Plant::new(ProcessState::default(), Some(2));

    plant.tick(PUMP_OFF);
    assert_eq!(plant.state().temperature, 76.5);
    assert!(!plant.state().pump_on);

    for _ in 0..40 {
        plant.tick(PUMP_OFF);
    }
    assert_eq!(plant.state().temperature, 120.0);

    plant.tick(PUMP_OFF);
    assert_eq!(plant.state().temperature, 120.0);
    assert_eq!(plant.state().temperature_register(), 120);
}

#[test]
fn test_overheat_alert_only_above_threshold_with_pump_off() {
    let mut plant = Plant::new(ProcessState::default(), Some(4));

    // 75 + 16 * 1.5 = 99.0, still quiet
    for _ in 0..16 {
        assert!(plant.tick(PUMP_OFF).is_none());
    }
    assert_eq!(plant.state().temperature, 99.0);

    match plant.tick(PUMP_OFF) {
        Some(Alert::Overheating { temperature }) => assert_eq!(temperature, 100.5),
        other => panic!("expected overheating alert, got {:?}", other),
    }

    // turning the pump back on silences the alert even while hot
    assert!(plant.tick(PUMP_ON).is_none());
    assert_eq!(plant.state().temperature, 100.0);
}

#[test]
fn test_alert_does_not_alter_state() {
    let mut rng_a = StdRng::seed_from_u64(9);
    let mut rng_b = StdRng::seed_from_u64(9);
    let hot = ProcessState::new(40.0, 110.0, false);
    let cool = ProcessState::new(40.0, 60.0, false);

    let hot_next = step(&hot, PUMP_OFF, &mut rng_a);
    let cool_next = step(&cool, PUMP_OFF, &mut rng_b);

    assert!(hot_next.alert.is_some());
    assert!(cool_next.alert.is_none());
    assert_eq!(hot_next.state.pressure, cool_next.state.pressure);
    assert_eq!(hot_next.state.temperature, 111.5);
}

#[test]
fn test_override_forces_safe_state() {
    let mut plant = Plant::new(ProcessState::new(87.0, 115.0, false), Some(5));

    assert!(plant.tick(OVERRIDE).is_none());
    let state = plant.state();
    assert_eq!(state.pressure, 0.0);
    assert_eq!(state.temperature, 20.0);
    assert!(state.override_active);
    assert_eq!(state.pressure_register(), 0);
    assert_eq!(state.temperature_register(), 20);

    // held every tick while the coil stays set
    for _ in 0..5 {
        plant.tick(OVERRIDE);
        assert_eq!(plant.state().pressure, 0.0);
        assert_eq!(plant.state().temperature, 20.0);
    }
}

#[test]
fn test_release_override_resumes_model() {
    let mut plant = Plant::new(ProcessState::default(), Some(6));
    plant.tick(OVERRIDE);

    plant.tick(PUMP_ON);
    let state = plant.state();
    assert!(!state.override_active);
    assert!((state.temperature - 20.2).abs() < 1e-9);
    assert!(state.pressure >= 0.0 && state.pressure < 1.0);
}

#[test]
fn test_pressure_walk_stays_in_bounds() {
    let mut plant = Plant::new(ProcessState::new(99.5, 70.0, true), Some(11));
    let mut previous = plant.state().pressure;

    for _ in 0..10_000 {
        plant.tick(PUMP_ON);
        let pressure = plant.state().pressure;
        assert!((PRESSURE_MIN..=PRESSURE_MAX).contains(&pressure));
        assert!((pressure - previous).abs() <= PRESSURE_JITTER);
        assert!(plant.state().pressure_register() <= 100);
        previous = pressure;
    }
    assert_eq!(plant.ticks(), 10_000);
}

#[test]
fn test_pressure_clamps_at_floor() {
    let mut plant = Plant::new(ProcessState::new(0.0, 70.0, true), Some(12));
    for _ in 0..1_000 {
        plant.tick(PUMP_ON);
        assert!(plant.state().pressure >= 0.0);
    }
}

#[test]
fn test_seeded_plants_replay_identically() {
    let mut a = Plant::new(ProcessState::default(), Some(42));
    let mut b = Plant::new(ProcessState::default(), Some(42));

    for i in 0..200 {
        let inputs = if i % 50 < 25 { PUMP_ON } else { PUMP_OFF };
        a.tick(inputs);
        b.tick(inputs);
        assert_eq!(a.state(), b.state());
    }
}
