//! Station-identification beacon.
//!
//! A coarse, self-debouncing scheduler rather than a precise cron: every
//! [`SAMPLE_INTERVAL`] it samples local wall-clock time and fires only when
//! the time sits on a configured boundary (default: minute 0 of an hour
//! divisible by 4). After firing it sleeps [`REFRACTORY`], longer than the
//! sampling window, so the same boundary minute cannot fire twice; a
//! boundary-minute dedupe key guards against double fires regardless of
//! sleep jitter. Drift up to the sampling granularity is acceptable.

use chrono::{DateTime, Local, TimeZone, Timelike};
use log::{debug, info, warn};
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::config::{BeaconConfig, StationConfig};
use crate::message::OutboundMessage;
use crate::metrics;
use crate::relay::dispatch::DispatcherHandle;

/// How often wall-clock time is sampled while waiting for a boundary.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(30);

/// Pause after a fire, long enough to leave the boundary minute behind.
const REFRACTORY: Duration = Duration::from_secs(60);

/// Quotes rotated through the ident broadcast.
const QUOTES: &[&str] = &[
    "\"You have power over your mind - not outside events. Realize this, and you will find strength.\" - Marcus Aurelius",
    "\"We suffer more often in imagination than in reality.\" - Seneca",
    "\"It is not that we have a short time to live, but that we waste a lot of it.\" - Seneca",
    "\"The impediment to action advances action. What stands in the way becomes the way.\" - Marcus Aurelius",
    "\"No man is free who is not master of himself.\" - Epictetus",
    "\"When you arise in the morning, think of what a precious privilege it is to be alive.\" - Marcus Aurelius",
];

/// Decides when a boundary sample should fire, deduplicating within the
/// boundary minute. Pure state machine over supplied timestamps, so the
/// schedule is testable under a simulated clock.
pub struct BeaconGate {
    frequency_minutes: u32,
    last_boundary_minute: Option<i64>,
}

impl BeaconGate {
    pub fn new(frequency_minutes: u32) -> Self {
        Self {
            frequency_minutes,
            last_boundary_minute: None,
        }
    }

    /// Feed one wall-clock sample; true means fire now.
    pub fn observe<Tz: TimeZone>(&mut self, now: DateTime<Tz>) -> bool {
        let minute = now.minute();
        let hour = now.hour();
        let on_boundary = match self.frequency_minutes {
            5 => minute % 5 == 0,
            15 => minute % 15 == 0,
            30 => minute % 30 == 0,
            60 => minute == 0,
            120 => minute == 0 && hour % 2 == 0,
            240 => minute == 0 && hour % 4 == 0,
            _ => minute == 0 && hour % 4 == 0,
        };
        if !on_boundary {
            return false;
        }
        // Dedupe key: unix-minute of this sample.
        let boundary_minute = now.timestamp() / 60;
        if self.last_boundary_minute == Some(boundary_minute) {
            return false;
        }
        self.last_boundary_minute = Some(boundary_minute);
        true
    }
}

/// Compose the station-identification broadcast.
pub fn station_ident(station: &StationConfig) -> String {
    let quote = QUOTES[rand::thread_rng().gen_range(0..QUOTES.len())];
    format!(
        "\u{1F4E1} {} ({}) is active.\n\u{1F9E0} {}",
        station.callsign, station.name, quote
    )
}

pub struct BeaconScheduler {
    config: BeaconConfig,
    station: StationConfig,
    dispatcher: DispatcherHandle,
}

impl BeaconScheduler {
    pub fn new(config: BeaconConfig, station: StationConfig, dispatcher: DispatcherHandle) -> Self {
        Self {
            config,
            station,
            dispatcher,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut gate = BeaconGate::new(self.config.frequency_minutes());
        let mut pause = SAMPLE_INTERVAL;
        loop {
            tokio::select! {
                _ = sleep(pause) => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            pause = SAMPLE_INTERVAL;
            if !self.config.enabled {
                continue;
            }
            if gate.observe(Local::now()) {
                let text = station_ident(&self.station);
                match self.dispatcher.send(OutboundMessage::beacon(text)).await {
                    Ok(()) => {
                        metrics::inc_beacons_sent();
                        info!("Sent station ident beacon");
                    }
                    Err(e) => warn!("station ident send failed: {}", e),
                }
                pause = REFRACTORY;
            }
        }
        debug!("beacon scheduler terminated");
    }
}
