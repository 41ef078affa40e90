//! Relay server: constructs and wires every component, drives the operator
//! console, and coordinates shutdown.

use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::message::OutboundMessage;
use crate::meshtastic::{self, MeshtasticDevice, NullTransport};
use crate::metrics;
use crate::relay::alerts::AlertPoller;
use crate::relay::beacon::{station_ident, BeaconScheduler};
use crate::relay::dispatch::{start_dispatcher, DispatcherHandle};
use crate::relay::display::{self, DisplayEvent, DisplaySender};
use crate::relay::listener::InboundListener;
use crate::storage::MessageLog;

/// # Relay Server - Core Application Controller
///
/// Owns the lifecycle of the relay: the message journal, the display
/// channel, the dispatcher actor, and the background tasks (inbound
/// listener, alert poller, beacon scheduler, serial reader).
///
/// ## Event flow
///
/// ```text
/// console ──┐
/// alerts  ──┼──> Dispatcher ──> Transport (radio)
/// beacon  ──┘        │
///                    └──> journal + display
///
/// radio ──> reader ──> InboundListener ──> journal + display
/// ```
///
/// All outbound producers converge on the dispatcher; the listener runs
/// independently off the receive side. A failure in any background task
/// never halts the others.
///
/// ## Usage
///
/// ```rust,no_run
/// use meshrelay::config::Config;
/// use meshrelay::relay::RelayServer;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = Config::load("config.toml").await?;
///     let mut server = RelayServer::new(config).await?;
///     server.connect_device("/dev/ttyUSB0").await?;
///     server.run().await
/// }
/// ```
pub struct RelayServer {
    config: Config,
    journal: Arc<MessageLog>,
    display_tx: DisplaySender,
    display_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    device: Option<MeshtasticDevice>,
    dispatcher: Option<DispatcherHandle>,
    alerts: Option<AlertPoller>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayServer {
    pub async fn new(config: Config) -> Result<Self> {
        let journal = Arc::new(MessageLog::open(&config.storage.journal_file).await?);
        let (display_tx, display_rx) = display::channel();
        let display_task = display::spawn_console(display_rx);
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            journal,
            display_tx,
            display_task: Some(display_task),
            shutdown_tx,
            device: None,
            dispatcher: None,
            alerts: None,
            tasks: Vec::new(),
        })
    }

    /// Open the radio link. The caller decides whether a failure is fatal
    /// (`require_device_at_startup`).
    pub async fn connect_device(&mut self, port: &str) -> Result<()> {
        let device = MeshtasticDevice::connect(port, self.config.meshtastic.baud_rate).await?;
        self.device = Some(device);
        Ok(())
    }

    /// Run the relay until ctrl-c or an operator `/quit`.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Relay '{}' ({}) starting",
            self.config.station.name, self.config.station.callsign
        );

        // Inbound path: serial reader -> bounded event channel -> listener.
        let (event_tx, event_rx) = meshtastic::event_channel();

        // Outbound path: the dispatcher actor takes exclusive ownership of
        // the transport. Without a device every send fails recoverably.
        let dispatcher = match self.device.take() {
            Some(device) => {
                let reader = device.start_reader(event_tx, self.shutdown_tx.subscribe());
                self.tasks.push(reader);
                let (handle, task) = start_dispatcher(
                    device,
                    self.journal.clone(),
                    self.display_tx.clone(),
                    self.config.meshtastic.max_payload_bytes,
                );
                self.tasks.push(task);
                handle
            }
            None => {
                warn!("No device attached; outbound sends will fail until restart");
                drop(event_tx);
                let (handle, task) = start_dispatcher(
                    NullTransport,
                    self.journal.clone(),
                    self.display_tx.clone(),
                    self.config.meshtastic.max_payload_bytes,
                );
                self.tasks.push(task);
                handle
            }
        };
        self.dispatcher = Some(dispatcher.clone());

        let listener =
            InboundListener::new(event_rx, self.journal.clone(), self.display_tx.clone());
        self.tasks.push(listener.spawn(self.shutdown_tx.subscribe()));

        if self.config.alerts.enabled {
            let poller = AlertPoller::new(
                self.config.alerts.clone(),
                dispatcher.clone(),
                self.display_tx.clone(),
            );
            self.alerts = Some(poller.clone());
            self.tasks.push(poller.spawn(self.shutdown_tx.subscribe()));
        } else {
            info!("Alert polling disabled by configuration");
        }

        let beacon = BeaconScheduler::new(
            self.config.beacon.clone(),
            self.config.station.clone(),
            dispatcher.clone(),
        );
        self.tasks.push(beacon.spawn(self.shutdown_tx.subscribe()));

        let _ = self.display_tx.send(DisplayEvent::Status(format!(
            "{} online - type a message to broadcast, /help for commands",
            self.config.station.callsign
        )));

        // Operator console: the interactive send path.
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        loop {
            tokio::select! {
                line = lines.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) => {
                            if !self.handle_console_line(line.trim()).await {
                                info!("Operator requested shutdown");
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!("stdin closed; console input disabled");
                            stdin_open = false;
                        }
                        Err(e) => {
                            warn!("console read error: {}", e);
                            stdin_open = false;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.stop(dispatcher).await
    }

    /// Handle one console line. Returns false to shut the relay down.
    async fn handle_console_line(&self, line: &str) -> bool {
        match line {
            "" => {}
            "/quit" | "/exit" => return false,
            "/help" => {
                let _ = self.display_tx.send(DisplayEvent::Status(
                    "commands: <text> broadcast | /alert | /clear | /id | /wx | /status | /quit"
                        .to_string(),
                ));
            }
            "/alert" => {
                self.submit_user(format!(
                    "\u{1F6A8} EMERGENCY ALERT from {}!",
                    self.config.station.name
                ))
                .await;
            }
            "/clear" => {
                self.submit_user("\u{2705} ALERT SUSPENDED: All Clear.".to_string())
                    .await;
            }
            "/id" => {
                self.submit_user(station_ident(&self.config.station)).await;
            }
            "/wx" => match &self.alerts {
                Some(poller) => poller.check_once().await,
                None => {
                    let _ = self.display_tx.send(DisplayEvent::Status(
                        "alert polling is disabled".to_string(),
                    ));
                }
            },
            "/status" => {
                let snap = metrics::snapshot();
                let _ = self.display_tx.send(DisplayEvent::Status(format!(
                    "sent={} errors={} rx_text={} rx_other={} polls={} alerts={} beacons={}",
                    snap.sends_ok,
                    snap.send_errors,
                    snap.inbound_text,
                    snap.inbound_other,
                    snap.alert_polls,
                    snap.alert_broadcasts,
                    snap.beacons_sent,
                )));
            }
            text => {
                self.submit_user(format!("\u{1F4E8} {}", text)).await;
            }
        }
        true
    }

    async fn submit_user(&self, text: String) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        if let Err(e) = dispatcher.send(OutboundMessage::user(text)).await {
            // The dispatcher already journaled and displayed the failure.
            debug!("console send failed: {}", e);
        }
    }

    /// Signal shutdown, drain the dispatcher, and join every task.
    async fn stop(mut self, dispatcher: DispatcherHandle) -> Result<()> {
        let _ = self
            .display_tx
            .send(DisplayEvent::Status("shutting down".to_string()));
        let _ = self.shutdown_tx.send(true);
        dispatcher.shutdown().await;
        drop(dispatcher);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("background task ended abnormally: {}", e);
            }
        }
        // Every display sender is gone after this destructure, which lets
        // the console drain finish.
        let RelayServer {
            display_tx,
            display_task,
            ..
        } = self;
        drop(display_tx);
        if let Some(task) = display_task {
            let _ = task.await;
        }
        info!("Relay stopped");
        Ok(())
    }

    /// Print a status summary (the `status` subcommand).
    pub async fn show_status(&self) -> Result<()> {
        let entries = self.journal.entry_count().await.unwrap_or(0);
        println!(
            "Station:   {} ({})",
            self.config.station.name, self.config.station.callsign
        );
        println!("Device:    {}", self.config.meshtastic.port);
        println!(
            "Alerts:    {} (zone {}, every {}s)",
            if self.config.alerts.enabled {
                "enabled"
            } else {
                "disabled"
            },
            self.config.alerts.zone,
            self.config.alerts.poll_interval_secs
        );
        println!(
            "Beacon:    {} (every {})",
            if self.config.beacon.enabled {
                "enabled"
            } else {
                "disabled"
            },
            self.config.beacon.frequency
        );
        println!(
            "Journal:   {} ({} entries)",
            self.journal.path().display(),
            entries
        );
        Ok(())
    }
}
