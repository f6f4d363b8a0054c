use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use scadasim::config::{Config, MonitorConfig};
use scadasim::map::{coil_label, CYCLE_COIL, OVERRIDE_COIL, PUMP_COIL};
use scadasim::monitor::{
    run_presenter, Command, CommandOutcome, ConnectionState, LogKind, LogLine, Monitor, Presenter,
    Sample, TrendSnapshot,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Table,
    Json,
    Compact,
}

impl Format {
    fn parse(value: &str) -> Self {
        match value {
            "json" => Format::Json,
            "compact" => Format::Compact,
            _ => Format::Table,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("scadasim")
        .version("0.1.0")
        .author("Process Control Engineering Team")
        .about("🖥️  SCADA HMI - Reactor core monitor and control console")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Gateway/PLC host address (default 127.0.0.1)")
                .takes_value(true)
                .global(true)
                .validator(|v| match v.parse::<IpAddr>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Host must be an IP address".into()),
                }),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Gateway/PLC port (default 502, the validating gateway; the PLC itself is on 5020)")
                .takes_value(true)
                .global(true)
                .validator(|v| match v.parse::<u16>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Port must be between 0 and 65535".into()),
                }),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose output")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("monitor")
                .about("📈 Live reactor telemetry with trend history")
                .long_about("Polls pressure, temperature and pump state every poll cadence and keeps the last 60 samples per channel")
                .arg(
                    Arg::with_name("duration")
                        .short("d")
                        .long("duration")
                        .value_name("SECONDS")
                        .help("Monitor duration in seconds (default: until Ctrl+C)")
                        .takes_value(true)
                        .validator(|v| match v.parse::<u64>() {
                            Ok(_) => Ok(()),
                            Err(_) => Err("Duration must be a number of seconds".into()),
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("override")
                .about("🛑 EMERGENCY OVERRIDE - force the plant into its safe state")
                .long_about("Writes coil 1. The plant resets pressure to 0 and temperature to 20 on its next tick. A validating gateway is expected to block this write.")
                .arg(
                    Arg::with_name("confirm")
                        .long("confirm")
                        .help("Confirm the emergency override")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("cycle")
                .about("🔁 NORMAL CYCLING command (coil 2)"),
        )
        .subcommand(
            SubCommand::with_name("pump")
                .about("💧 Cooling pump control (coil 3)")
                .arg(
                    Arg::with_name("state")
                        .help("Pump state")
                        .required(true)
                        .possible_values(&["on", "off", "toggle"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("coil")
                .about("✍️  Write any coil")
                .arg(
                    Arg::with_name("address")
                        .help("Coil address")
                        .required(true)
                        .validator(|v| match v.parse::<u16>() {
                            Ok(_) => Ok(()),
                            Err(_) => Err("Coil address must be a number".into()),
                        }),
                )
                .arg(
                    Arg::with_name("state")
                        .help("Coil value")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .get_matches();

    let format = Format::parse(matches.value_of("format").unwrap_or("table"));
    let verbose = matches.is_present("verbose");
    init_tracing(verbose);

    let config = monitor_config(&matches)?;
    if verbose {
        println!("{}", "🖥️  SCADA HMI // REACTOR CONTROL SYSTEM".bright_blue().bold());
        println!("{} {}", "Connecting to".dimmed(), config.endpoint);
    }

    match matches.subcommand() {
        ("monitor", Some(sub_matches)) => {
            let duration = sub_matches
                .value_of("duration")
                .and_then(|d| d.parse::<u64>().ok())
                .map(Duration::from_secs);
            handle_monitor(config, format, duration).await?;
        }
        ("override", Some(_)) => {
            handle_command(config, Command::new(OVERRIDE_COIL, true), format).await?;
        }
        ("cycle", _) => {
            handle_command(config, Command::new(CYCLE_COIL, true), format).await?;
        }
        ("pump", Some(sub_matches)) => {
            let state = sub_matches.value_of("state").unwrap_or("toggle");
            handle_pump(config, state, format).await?;
        }
        ("coil", Some(sub_matches)) => {
            let address: u16 = sub_matches.value_of("address").unwrap_or("0").parse()?;
            let value = sub_matches.value_of("state") == Some("on");
            handle_command(config, Command::new(address, value), format).await?;
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn monitor_config(matches: &ArgMatches<'_>) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
    let config = match matches.value_of("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let mut monitor = config.monitor;

    let host: IpAddr = match matches.value_of("host") {
        Some(host) => host.parse()?,
        None => monitor.endpoint.ip(),
    };
    let port: u16 = match matches.value_of("port") {
        Some(port) => port.parse()?,
        None => monitor.endpoint.port(),
    };
    monitor.endpoint = SocketAddr::new(host, port);
    Ok(monitor)
}

/// Connect budget for one-shot commands: first attempt plus one retry.
fn connect_budget(config: &MonitorConfig) -> Duration {
    config.request_timeout() * 2 + Duration::from_millis(config.reconnect_min_ms)
}

async fn handle_monitor(
    config: MonitorConfig,
    format: Format,
    duration: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    if format == Format::Table {
        println!("{}", "::: REACTOR CORE MONITOR ::: (Press Ctrl+C to stop)".bright_cyan().bold());
        println!("{}", "┌──────────┬──────────┬─────────────────┬──────────┬──────────┬────────────────────────┐".bright_white());
        println!("{}", "│ Time     │ Pressure │ Temp (C)        │ Pump     │ Override │ Trend P / T (min-max)  │".bright_white());
        println!("{}", "├──────────┼──────────┼─────────────────┼──────────┼──────────┼────────────────────────┤".bright_white());
    }

    let endpoint = config.endpoint;
    let (monitor, events) = Monitor::start(config);
    let presenter = tokio::spawn(run_presenter(events, ConsolePresenter::new(format, endpoint)));

    match duration {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
        }
    }

    monitor.shutdown().await;
    let presenter = presenter.await?;
    if format == Format::Table {
        println!("{}", "└──────────┴──────────┴─────────────────┴──────────┴──────────┴────────────────────────┘".bright_white());
        println!("{} {} samples received", "📊".bright_blue(), presenter.samples);
        print_trend_summary(&presenter.trend);
    }
    Ok(())
}

async fn handle_pump(config: MonitorConfig, state: &str, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let value = match state {
        "on" => true,
        "off" => false,
        _ => {
            // toggling needs the pump state the plant currently reports
            let budget = connect_budget(&config) + config.poll_period() * 2;
            let (monitor, events) = Monitor::start(config.clone());
            drop(events);
            let current = match monitor.latest_sample() {
                Some(sample) => Some(sample),
                None => monitor.next_sample(budget).await,
            };
            monitor.shutdown().await;

            match current {
                Some(sample) => !sample.pump_on,
                None => {
                    eprintln!("{} Could not read current pump state from {}", "❌".red(), config.endpoint);
                    return Err("pump state unavailable".into());
                }
            }
        }
    };

    handle_command(config, Command::new(PUMP_COIL, value), format).await
}

async fn handle_command(config: MonitorConfig, command: Command, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let budget = connect_budget(&config);
    let endpoint = config.endpoint;
    let (monitor, events) = Monitor::start(config);
    let presenter = tokio::spawn(run_presenter(events, LogPresenter { format }));

    if !monitor.wait_for_state(ConnectionState::Connected, budget).await {
        eprintln!("{} PLC Disconnected: no link to {}", "❌".red(), endpoint.to_string().bright_white());
        eprintln!("{} Start the plant with {}", "💡".yellow(), "scadasim-plc".bright_cyan());
        eprintln!("{} Or point the HMI straight at it with {}", "💡".yellow(), "--port 5020".bright_cyan());
    }

    let result = match monitor.dispatch(command) {
        Ok(handle) => {
            let outcome = handle.outcome().await;
            print_command_result(command, &outcome, format);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "❌".red(), e.to_string().bright_red());
            Err(e.into())
        }
    };

    monitor.shutdown().await;
    let _ = presenter.await;
    result
}

fn print_command_result(command: Command, outcome: &CommandOutcome, format: Format) {
    let action = coil_label(command.coil);
    let value = if command.value { "ON" } else { "OFF" };
    match format {
        Format::Json => {
            let json = serde_json::json!({
                "coil": command.coil,
                "value": command.value,
                "outcome": outcome,
            });
            println!("{}", json);
        }
        Format::Compact => match outcome {
            CommandOutcome::Accepted => println!("{}", "OK".bright_green()),
            CommandOutcome::Rejected(_) => println!("{}", "REJECTED".bright_red()),
            CommandOutcome::Failed(_) => println!("{}", "FAILED".yellow()),
        },
        Format::Table => match outcome {
            CommandOutcome::Accepted => {
                println!("{} {} (coil {}) set to {}", "✅".green(), action.bright_white(), command.coil, value.bright_cyan());
            }
            CommandOutcome::Rejected(reason) => {
                println!("{} {} (coil {}) rejected: {}", "❌".red(), action.bright_white(), command.coil, reason.bright_red());
            }
            CommandOutcome::Failed(reason) => {
                println!("{} {} (coil {}) failed: {}", "⚠️".yellow(), action.bright_white(), command.coil, reason.bright_red());
                if command.coil == OVERRIDE_COIL {
                    println!("{} A validating gateway drops override writes; no reply is expected through it", "💡".yellow());
                }
            }
        },
    }
}

/// Event-log only presenter for one-shot commands.
struct LogPresenter {
    format: Format,
}

impl Presenter for LogPresenter {
    fn on_sample(&mut self, _sample: &Sample, _trend: &TrendSnapshot) {}

    fn on_log(&mut self, line: &LogLine) {
        if self.format == Format::Table {
            println!("{}", colorize_log(line));
        }
    }
}

/// Terminal rendition of the HMI display.
struct ConsolePresenter {
    format: Format,
    endpoint: SocketAddr,
    samples: u64,
    trend: TrendSnapshot,
}

impl ConsolePresenter {
    fn new(format: Format, endpoint: SocketAddr) -> Self {
        Self {
            format,
            endpoint,
            samples: 0,
            trend: TrendSnapshot::default(),
        }
    }
}

impl Presenter for ConsolePresenter {
    fn on_sample(&mut self, sample: &Sample, trend: &TrendSnapshot) {
        self.samples += 1;
        self.trend = trend.clone();
        match self.format {
            Format::Json => {
                let json = serde_json::json!({ "sample": sample, "trend": trend });
                println!("{}", json);
            }
            Format::Compact => {
                let status = if sample.override_active {
                    "SAFE".bright_blue()
                } else if sample.temperature_critical() || sample.pressure_alarm() {
                    "ALARM".red()
                } else {
                    "OK".green()
                };
                println!(
                    "[{}] {} | P={} | T={}C | {}",
                    sample.sequence,
                    status,
                    sample.pressure,
                    sample.temperature,
                    if sample.pump_on { "PUMP_ON" } else { "PUMP_OFF" }
                );
            }
            Format::Table => {
                let time = chrono::Local::now().format("%H:%M:%S").to_string();
                let pressure = format!("{:>8}", sample.pressure);
                let pressure = if sample.pressure_alarm() { pressure.red() } else { pressure.bright_green() };
                let temperature = if sample.temperature_critical() {
                    format!("{:>4} (CRITICAL)", sample.temperature).red()
                } else {
                    format!("{:>15}", sample.temperature).bright_green()
                };
                let pump = if sample.pump_on { "      ON".bright_green() } else { "     OFF".bright_red() };
                let override_str = if sample.override_active { "  ACTIVE".bright_red() } else { "  NORMAL".bright_green() };
                let trend_str = match (trend.pressure_range(), trend.temperature_range()) {
                    (Some((p_min, p_max)), Some((t_min, t_max))) => {
                        format!("{:>3}-{:<3} / {:>3}-{:<3} ({:>2})", p_min, p_max, t_min, t_max, trend.len())
                    }
                    _ => String::from("-"),
                };

                println!(
                    "│ {} │ {} │ {:<15} │ {} │ {} │ {:<22} │",
                    time, pressure, temperature, pump, override_str, trend_str
                );
            }
        }
    }

    fn on_connection(&mut self, state: ConnectionState) {
        if self.format != Format::Table {
            return;
        }
        let text = match state {
            ConnectionState::Connected => format!("{}: {}", state, self.endpoint).bright_green(),
            ConnectionState::ReadError => state.to_string().yellow(),
            ConnectionState::Disconnected => state.to_string().bright_red(),
        };
        println!("{} {}", "🔌".bright_white(), text);
    }

    fn on_log(&mut self, line: &LogLine) {
        if self.format == Format::Table {
            println!("{}", colorize_log(line));
        }
    }
}

fn print_trend_summary(trend: &TrendSnapshot) {
    let (Some((pressure, temperature)), Some((p_min, p_max)), Some((t_min, t_max))) =
        (trend.latest(), trend.pressure_range(), trend.temperature_range())
    else {
        return;
    };
    println!(
        "{} Last {} samples: pressure {} ({}-{}), temperature {}C ({}-{})",
        "📈".bright_blue(),
        trend.len(),
        pressure.to_string().bright_white(),
        p_min,
        p_max,
        temperature.to_string().bright_white(),
        t_min,
        t_max
    );
}

fn colorize_log(line: &LogLine) -> ColoredString {
    let text = line.to_string();
    match line.kind {
        LogKind::Info => text.dimmed(),
        LogKind::Accepted => text.bright_green(),
        LogKind::Rejected => text.bright_red(),
        LogKind::Error => text.yellow(),
    }
}
