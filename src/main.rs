//! Binary entrypoint for the Meshrelay CLI.
//!
//! Commands:
//! - `start [--port <path>]` - run the relay, connecting to a device
//! - `init` - create a starter `config.toml`
//! - `status` - print station configuration and journal summary
//! - `check-alerts` - one-shot probe of the NWS alert feed
//!
//! See the library crate docs for module-level details: `meshrelay::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use meshrelay::config::Config;
use meshrelay::relay::alerts;
use meshrelay::relay::RelayServer;

#[derive(Parser)]
#[command(name = "meshrelay")]
#[command(about = "An emergency text relay and weather-alert beacon for Meshtastic mesh networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay
    Start {
        /// Meshtastic device port (e.g., /dev/ttyUSB0); overrides the config
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Initialize a new relay configuration
    Init,
    /// Show relay status and journal summary
    Status,
    /// Probe the NWS alert feed once and print the result
    CheckAlerts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes it)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { port } => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting Meshrelay v{}", env!("CARGO_PKG_VERSION"));

            let configured_port = config.meshtastic.port.clone();
            let require_device = config.meshtastic.require_device_at_startup;
            let mut server = RelayServer::new(config).await?;

            // CLI overrides config; fallback to config when CLI absent
            let chosen_port = match port {
                Some(cli_port) => Some(cli_port),
                None => {
                    if !configured_port.is_empty() {
                        Some(configured_port)
                    } else {
                        None
                    }
                }
            };

            match chosen_port {
                Some(port_path) => match server.connect_device(&port_path).await {
                    Ok(()) => info!("Connected to Meshtastic device on {}", port_path),
                    Err(e) if require_device => {
                        return Err(anyhow!(
                            "Failed to connect to device on {}: {}",
                            port_path,
                            e
                        ));
                    }
                    Err(e) => {
                        warn!(
                            "Failed to connect to device on {}: {} (relay continuing without device)",
                            port_path, e
                        );
                    }
                },
                None if require_device => {
                    return Err(anyhow!(
                        "No --port specified and no configured device port set"
                    ));
                }
                None => {
                    info!("No --port specified and no configured device port set; starting without device.");
                }
            }

            info!("Relay starting...");
            server.run().await?;
        }
        Commands::Init => {
            info!("Initializing new relay configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let server = RelayServer::new(config).await?;
            server.show_status().await?;
        }
        Commands::CheckAlerts => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let client = alerts::feed_client();
            match alerts::fetch_active(&client, &config.alerts).await {
                Ok(feed) => {
                    match alerts::build_alert_message(&feed, config.alerts.description_limit) {
                        Some(text) => println!("{}", text),
                        None => println!(
                            "\u{1F7E2} No active weather alerts for zone {}",
                            config.alerts.zone
                        ),
                    }
                }
                Err(e) => {
                    eprintln!("Alert feed check failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity; the config level applies when quiet
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(file) = config.as_ref().and_then(|c| c.logging.file.clone()) {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));

            // When stdout is a terminal, echo log lines to the console as
            // well as the file; when redirected, the file is authoritative.
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }

                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        } else {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
