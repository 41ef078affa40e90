//! Display events and the console surface that drains them.
//!
//! Background tasks never touch the presentation context directly: they push
//! [`DisplayEvent`]s onto a thread-safe queue and the presentation task
//! renders them on its own loop. The console drain is the operator-facing
//! surface; the alert-priority flag maps to a terminal bell as the audible
//! notification.

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum DisplayEvent {
    /// A relayed message (sent or received).
    Message {
        sender: String,
        body: String,
        alert_priority: bool,
    },
    /// Informational status line ("no active alerts", shutdown notices).
    Status(String),
    /// A recovered error worth the operator's attention.
    Error { context: String, detail: String },
}

pub type DisplaySender = mpsc::UnboundedSender<DisplayEvent>;
pub type DisplayReceiver = mpsc::UnboundedReceiver<DisplayEvent>;

pub fn channel() -> (DisplaySender, DisplayReceiver) {
    mpsc::unbounded_channel()
}

/// Terminal bell, rung for alert-priority traffic.
const BELL: char = '\u{7}';

/// Spawn the console drain. Runs until the sender side is dropped.
pub fn spawn_console(mut rx: DisplayReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let stamp = Local::now().format("%H:%M:%S");
            match event {
                DisplayEvent::Message {
                    sender,
                    body,
                    alert_priority,
                } => {
                    if alert_priority {
                        println!("[{}] {}: {}{}", stamp, sender, body, BELL);
                    } else {
                        println!("[{}] {}: {}", stamp, sender, body);
                    }
                }
                DisplayEvent::Status(text) => {
                    println!("[{}] -- {}", stamp, text);
                }
                DisplayEvent::Error { context, detail } => {
                    println!("[{}] !! {}: {}{}", stamp, context, detail, BELL);
                }
            }
        }
    })
}
