//! Minimal relay counters, surfaced by `meshrelay status` and periodic
//! debug logging.
use std::sync::atomic::{AtomicU64, Ordering};

static SENDS_OK: AtomicU64 = AtomicU64::new(0);
static SEND_ERRORS: AtomicU64 = AtomicU64::new(0);
static INBOUND_TEXT: AtomicU64 = AtomicU64::new(0);
static INBOUND_OTHER: AtomicU64 = AtomicU64::new(0);
static ALERT_POLLS: AtomicU64 = AtomicU64::new(0);
static ALERT_BROADCASTS: AtomicU64 = AtomicU64::new(0);
static BEACONS_SENT: AtomicU64 = AtomicU64::new(0);

pub fn inc_sends_ok() {
    SENDS_OK.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_send_errors() {
    SEND_ERRORS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_inbound_text() {
    INBOUND_TEXT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_inbound_other() {
    INBOUND_OTHER.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_alert_polls() {
    ALERT_POLLS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_alert_broadcasts() {
    ALERT_BROADCASTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_beacons_sent() {
    BEACONS_SENT.fetch_add(1, Ordering::Relaxed);
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Snapshot {
    pub sends_ok: u64,
    pub send_errors: u64,
    pub inbound_text: u64,
    pub inbound_other: u64,
    pub alert_polls: u64,
    pub alert_broadcasts: u64,
    pub beacons_sent: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        sends_ok: SENDS_OK.load(Ordering::Relaxed),
        send_errors: SEND_ERRORS.load(Ordering::Relaxed),
        inbound_text: INBOUND_TEXT.load(Ordering::Relaxed),
        inbound_other: INBOUND_OTHER.load(Ordering::Relaxed),
        alert_polls: ALERT_POLLS.load(Ordering::Relaxed),
        alert_broadcasts: ALERT_BROADCASTS.load(Ordering::Relaxed),
        beacons_sent: BEACONS_SENT.load(Ordering::Relaxed),
    }
}
