//! Inbound packet listener.
//!
//! Consumes the transport reader's event channel, derives a display sender
//! for each packet, journals text payloads, and emits display events. Runs
//! entirely off the send path: nothing here ever touches the dispatcher.
//!
//! Per-event failures (journal I/O, malformed packets) are recorded under
//! "ReceiveError" and never stop the listener.

use std::sync::Arc;

use anyhow::Result;
use log::{debug, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::logutil::preview;
use crate::message::is_alert_priority;
use crate::meshtastic::TextEvent;
use crate::metrics;
use crate::relay::display::{DisplayEvent, DisplaySender};
use crate::storage::MessageLog;

/// Derive the sender string shown for an inbound packet: `"name (id)"` when
/// both are known, whichever is present otherwise, else "Unknown".
pub fn derive_sender(from_id: Option<&str>, long_name: Option<&str>) -> String {
    match (long_name, from_id) {
        (Some(name), Some(id)) => format!("{} ({})", name, id),
        (Some(name), None) => name.to_string(),
        (None, Some(id)) => id.to_string(),
        (None, None) => "Unknown".to_string(),
    }
}

pub struct InboundListener {
    events: mpsc::Receiver<TextEvent>,
    journal: Arc<MessageLog>,
    display: DisplaySender,
}

impl InboundListener {
    pub fn new(
        events: mpsc::Receiver<TextEvent>,
        journal: Arc<MessageLog>,
        display: DisplaySender,
    ) -> Self {
        Self {
            events,
            journal,
            display,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        debug!("Inbound event channel closed");
                        break;
                    };
                    if let Err(e) = self.handle(event).await {
                        let detail = format!("{e:#}");
                        if let Err(je) = self.journal.append("ReceiveError", &detail).await {
                            warn!("journal write failed for receive error: {je:#}");
                        }
                        let _ = self.display.send(DisplayEvent::Error {
                            context: "receive".to_string(),
                            detail,
                        });
                    }
                }
            }
        }
        debug!("inbound listener terminated");
    }

    async fn handle(&self, event: TextEvent) -> Result<()> {
        let sender = derive_sender(event.from_id.as_deref(), event.long_name.as_deref());
        match event.content {
            None => {
                metrics::inc_inbound_other();
                self.journal
                    .append("ReceiveInfo", &format!("Non-text packet from {}", sender))
                    .await?;
                Ok(())
            }
            Some(text) => {
                metrics::inc_inbound_text();
                debug!("Text from {}: {}", sender, preview(&text, 120));
                self.journal.append(&sender, &text).await?;
                let _ = self.display.send(DisplayEvent::Message {
                    sender,
                    body: text.clone(),
                    alert_priority: is_alert_priority(&text),
                });
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::derive_sender;

    #[test]
    fn prefers_name_with_id() {
        assert_eq!(derive_sender(Some("!ab12"), Some("Base")), "Base (!ab12)");
    }

    #[test]
    fn falls_back_to_whichever_is_present() {
        assert_eq!(derive_sender(Some("!ab12"), None), "!ab12");
        assert_eq!(derive_sender(None, Some("Base")), "Base");
    }

    #[test]
    fn unknown_when_neither_is_present() {
        assert_eq!(derive_sender(None, None), "Unknown");
    }
}
