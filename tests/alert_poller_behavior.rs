//! Alert poller end-to-end behavior against a local feed stub: exactly one
//! broadcast per poll built from the first feature, the all-clear notice on
//! empty feeds, and error isolation on feed failures.

use std::sync::{Arc, Mutex};

use meshrelay::config::AlertsConfig;
use meshrelay::meshtastic::{Transport, TransportError};
use meshrelay::relay::alerts::AlertPoller;
use meshrelay::relay::dispatch::start_dispatcher;
use meshrelay::relay::display::{self, DisplayEvent};
use meshrelay::storage::MessageLog;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<String>>>,
}

impl Transport for RecordingTransport {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Serve `body` as an HTTP 200 response on an ephemeral local port.
async fn serve_feed(body: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/geo+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

fn config_for(base_url: String) -> AlertsConfig {
    AlertsConfig {
        feed_base_url: base_url,
        zone: "ARC119".into(),
        timeout_secs: 5,
        ..Default::default()
    }
}

async fn poller_fixture(
    dir: &TempDir,
    base_url: String,
) -> (
    AlertPoller,
    RecordingTransport,
    Arc<MessageLog>,
    display::DisplayReceiver,
    meshrelay::relay::dispatch::DispatcherHandle,
) {
    let journal = Arc::new(
        MessageLog::open(dir.path().join("journal.txt"))
            .await
            .expect("journal"),
    );
    let (display_tx, display_rx) = display::channel();
    let transport = RecordingTransport::default();
    let (dispatcher, _task) =
        start_dispatcher(transport.clone(), journal.clone(), display_tx.clone(), 220);
    let poller = AlertPoller::new(config_for(base_url), dispatcher.clone(), display_tx);
    (poller, transport, journal, display_rx, dispatcher)
}

#[tokio::test]
async fn two_features_produce_one_broadcast_from_the_first() {
    let body = r#"{"features": [
        {"properties": {"headline": "Tornado Warning issued for Pulaski County", "description": "A confirmed tornado was observed. Take cover immediately in a basement or interior room away from windows and stay there until the warning expires or is cancelled."}},
        {"properties": {"headline": "Severe Thunderstorm Watch", "description": "Should not be broadcast."}}
    ]}"#;
    let dir = TempDir::new().expect("tempdir");
    let base = serve_feed(body).await;
    let (poller, transport, journal, _display_rx, dispatcher) =
        poller_fixture(&dir, base).await;

    poller.check_once().await;
    dispatcher.shutdown().await;

    let sent = transport.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1, "exactly one broadcast per poll");
    assert!(sent[0].contains("NWS ALERT: Tornado Warning issued for Pulaski County"));
    assert!(!sent[0].contains("Severe Thunderstorm Watch"));
    // description was trimmed to 120 chars before the payload clamp
    let description_line = sent[0].lines().nth(1).expect("description line");
    assert!(description_line.ends_with("..."));
    assert_eq!(
        description_line.chars().count(),
        120 + "...".chars().count()
    );

    let content = tokio::fs::read_to_string(journal.path()).await.unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("] Alert: "));
}

#[tokio::test]
async fn empty_feed_reports_all_clear_without_sending() {
    let dir = TempDir::new().expect("tempdir");
    let base = serve_feed(r#"{"features": []}"#).await;
    let (poller, transport, journal, mut display_rx, dispatcher) =
        poller_fixture(&dir, base).await;

    poller.check_once().await;
    dispatcher.shutdown().await;

    assert!(transport.sent.lock().unwrap().is_empty());
    let content = tokio::fs::read_to_string(journal.path()).await.unwrap();
    assert_eq!(content.lines().count(), 0);

    match display_rx.try_recv().expect("status event") {
        DisplayEvent::Status(text) => {
            assert!(text.contains("No active weather alerts"));
            assert!(text.contains("ARC119"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_feed_surfaces_error_and_skips_dispatcher() {
    let dir = TempDir::new().expect("tempdir");
    // Nothing listens here; connection is refused immediately.
    let (poller, transport, _journal, mut display_rx, dispatcher) =
        poller_fixture(&dir, "http://127.0.0.1:9".into()).await;

    poller.check_once().await;
    dispatcher.shutdown().await;

    assert!(transport.sent.lock().unwrap().is_empty());
    match display_rx.try_recv().expect("error event") {
        DisplayEvent::Error { context, .. } => assert_eq!(context, "NWS"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_feed_surfaces_error() {
    let dir = TempDir::new().expect("tempdir");
    let base = serve_feed(r#"{"features": [{"properties": {}}]}"#).await;
    let (poller, transport, _journal, mut display_rx, dispatcher) =
        poller_fixture(&dir, base).await;

    poller.check_once().await;
    dispatcher.shutdown().await;

    assert!(transport.sent.lock().unwrap().is_empty());
    assert!(matches!(
        display_rx.try_recv().expect("error event"),
        DisplayEvent::Error { .. }
    ));
}
