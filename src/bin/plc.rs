use clap::{App, Arg};
use scadasim::config::{Config, DEFAULT_PLC_ADDR};
use scadasim::map::{BANK_SIZE, OVERRIDE_COIL, PRESSURE_REGISTER, PUMP_COIL, TEMPERATURE_REGISTER};
use scadasim::server::PlcServer;
use std::net::SocketAddr;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let matches = App::new("scadasim-plc")
        .version("0.1.0")
        .about("🏭 Reactor PLC simulator - Modbus/TCP plant with a live process model")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("bind")
                .short("b")
                .long("bind")
                .value_name("ADDR")
                .help("Listen address (default 127.0.0.1:5020)")
                .takes_value(true)
                .validator(|v| match v.parse::<SocketAddr>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Bind address must look like 127.0.0.1:5020".into()),
                }),
        )
        .arg(
            Arg::with_name("tick-ms")
                .short("t")
                .long("tick-ms")
                .value_name("MS")
                .help("Process model tick period in milliseconds")
                .takes_value(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(ms) if ms > 0 => Ok(()),
                    _ => Err("Tick period must be a positive number".into()),
                }),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .value_name("SEED")
                .help("Seed for the pressure random walk (reproducible runs)")
                .takes_value(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Seed must be a valid number".into()),
                }),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(bind) = matches.value_of("bind") {
        config.plc.bind = bind.parse()?;
    }
    if let Some(tick_ms) = matches.value_of("tick-ms") {
        config.plc.tick_ms = tick_ms.parse()?;
    }
    if let Some(seed) = matches.value_of("seed") {
        config.plc.seed = Some(seed.parse()?);
    }
    config.validate()?;

    println!("🏭 Factory Controller (PLC) Simulator");
    println!("=====================================");

    let server = match PlcServer::bind(&config.plc).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start PLC on {}: {}", config.plc.bind, e);
            let e: Box<dyn std::error::Error> = e;
            return Err(e);
        }
    };

    println!("[-] Running on {} (default {})", server.local_addr()?, DEFAULT_PLC_ADDR);
    println!("[-] Data store initialized ({} coils/registers per bank)", BANK_SIZE);
    println!(
        "[-] Map: coil {} override, coil {} pump, HR {} pressure, HR {} temperature",
        OVERRIDE_COIL, PUMP_COIL, PRESSURE_REGISTER, TEMPERATURE_REGISTER
    );
    info!(
        "Initial state: pressure={} temperature={} pump={} tick={}ms",
        config.plc.initial_pressure,
        config.plc.initial_temperature,
        config.plc.initial_pump_on,
        config.plc.tick_ms
    );

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("PLC server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n[!] PLC Simulation Stopped.");
        }
    }

    Ok(())
}
