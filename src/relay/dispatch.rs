//! Central outbound dispatcher.
//!
//! Every outbound send (operator console, alert poller, beacon scheduler)
//! funnels through a single actor task that exclusively owns the radio
//! transport. The single-consumer command channel is the mutual exclusion:
//! exactly one send is in flight at any time, sends complete strictly in
//! order of arrival, and the journal entries written for distinct sends
//! never interleave. There is no priority queue; all producers are peers.
//!
//! Per message the actor clamps the payload to the link budget, performs the
//! send, classifies the result for notification urgency, journals it, and
//! emits a display event. Transport failures are wrapped into [`SendError`],
//! journaled under "ERROR", and surfaced; they are never retried and never
//! fatal.

use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::message::{clamp_payload, is_alert_priority, OutboundMessage};
use crate::meshtastic::{Transport, TransportError};
use crate::metrics;
use crate::relay::display::{DisplayEvent, DisplaySender};
use crate::storage::MessageLog;

/// Depth of the dispatcher command queue. Producers are few and slow.
const COMMAND_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("transport send failed: {0}")]
    Transport(#[from] TransportError),
    #[error("dispatcher is not running")]
    Closed,
}

enum Command {
    Send {
        message: OutboundMessage,
        done: oneshot::Sender<Result<(), SendError>>,
    },
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle submitting messages to the dispatcher actor.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    /// Submit a message and wait for the outcome of its send.
    pub async fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Send {
                message,
                done: done_tx,
            })
            .await
            .map_err(|_| SendError::Closed)?;
        done_rx.await.map_err(|_| SendError::Closed)?
    }

    /// Stop the actor after it finishes the commands already queued.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

/// Start the dispatcher actor. The transport moves into the task and is
/// never reachable any other way.
pub fn start_dispatcher<T: Transport + 'static>(
    mut transport: T,
    journal: Arc<MessageLog>,
    display: DisplaySender,
    max_payload_bytes: usize,
) -> (DispatcherHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Command>(COMMAND_QUEUE_DEPTH);
    let handle = DispatcherHandle { tx };

    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Send { message, done } => {
                    let outcome = process_send(
                        &mut transport,
                        &journal,
                        &display,
                        max_payload_bytes,
                        message,
                    )
                    .await;
                    let _ = done.send(outcome);
                }
                Command::Shutdown(ack) => {
                    let _ = ack.send(());
                    break;
                }
            }
        }
        debug!("dispatcher loop terminated");
    });

    (handle, task)
}

async fn process_send<T: Transport>(
    transport: &mut T,
    journal: &MessageLog,
    display: &DisplaySender,
    max_payload_bytes: usize,
    message: OutboundMessage,
) -> Result<(), SendError> {
    let text = clamp_payload(&message.text, max_payload_bytes);
    match transport.send_text(&text) {
        Ok(()) => {
            metrics::inc_sends_ok();
            let label = message.origin.sender_label();
            if let Err(e) = journal.append(label, &text).await {
                warn!("journal write failed after send: {e:#}");
            }
            let _ = display.send(DisplayEvent::Message {
                sender: label.to_string(),
                body: text.clone(),
                alert_priority: is_alert_priority(&text),
            });
            Ok(())
        }
        Err(e) => {
            metrics::inc_send_errors();
            let detail = e.to_string();
            if let Err(je) = journal.append("ERROR", &detail).await {
                warn!("journal write failed for send error: {je:#}");
            }
            let _ = display.send(DisplayEvent::Error {
                context: "send".to_string(),
                detail,
            });
            Err(SendError::Transport(e))
        }
    }
}
