//! Inbound listener behavior: sender derivation, non-text notices, and
//! journal/display output for received packets.

use std::sync::Arc;
use std::time::Duration;

use meshrelay::meshtastic::{self, TextEvent};
use meshrelay::relay::display::{self, DisplayEvent};
use meshrelay::relay::listener::InboundListener;
use meshrelay::storage::MessageLog;
use tempfile::TempDir;
use tokio::sync::watch;

fn event(
    from_id: Option<&str>,
    long_name: Option<&str>,
    content: Option<&str>,
) -> TextEvent {
    TextEvent {
        from_id: from_id.map(str::to_string),
        long_name: long_name.map(str::to_string),
        content: content.map(str::to_string),
    }
}

#[tokio::test]
async fn text_packets_are_journaled_under_derived_sender() {
    let dir = TempDir::new().expect("tempdir");
    let journal = Arc::new(
        MessageLog::open(dir.path().join("journal.txt"))
            .await
            .expect("journal"),
    );
    let (display_tx, mut display_rx) = display::channel();
    let (event_tx, event_rx) = meshtastic::event_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = InboundListener::new(event_rx, journal.clone(), display_tx);
    let task = listener.spawn(shutdown_rx);

    event_tx
        .send(event(Some("!ab12"), Some("Base"), Some("checking in")))
        .await
        .unwrap();
    event_tx
        .send(event(Some("!cd34"), None, Some("🚨 ALERT upstream")))
        .await
        .unwrap();
    event_tx
        .send(event(None, None, Some("anonymous ping")))
        .await
        .unwrap();
    event_tx
        .send(event(Some("!ef56"), None, None))
        .await
        .unwrap();

    // Close the channel so the listener drains and exits.
    drop(event_tx);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("listener exits")
        .expect("listener task");
    let _ = shutdown_tx.send(true);

    let content = tokio::fs::read_to_string(journal.path()).await.unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("] Base (!ab12): checking in"));
    assert!(lines[1].contains("] !cd34: "));
    assert!(lines[2].contains("] Unknown: anonymous ping"));
    assert!(lines[3].contains("] ReceiveInfo: Non-text packet from !ef56"));

    // Three display events (non-text packets produce none); the alert is
    // flagged urgent.
    let mut messages = Vec::new();
    while let Ok(event) = display_rx.try_recv() {
        if let DisplayEvent::Message {
            sender,
            alert_priority,
            ..
        } = event
        {
            messages.push((sender, alert_priority));
        }
    }
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], ("Base (!ab12)".to_string(), false));
    assert_eq!(messages[1], ("!cd34".to_string(), true));
    assert_eq!(messages[2], ("Unknown".to_string(), false));
}

#[tokio::test]
async fn listener_stops_on_shutdown_signal() {
    let dir = TempDir::new().expect("tempdir");
    let journal = Arc::new(
        MessageLog::open(dir.path().join("journal.txt"))
            .await
            .expect("journal"),
    );
    let (display_tx, _display_rx) = display::channel();
    let (_event_tx, event_rx) = meshtastic::event_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = InboundListener::new(event_rx, journal, display_tx);
    let task = listener.spawn(shutdown_rx);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("listener exits on shutdown")
        .expect("listener task");
}
