//! Weather-alert poller.
//!
//! Polls the NWS active-alert feed for the configured zone on a fixed
//! interval (the first poll fires immediately at startup). When the feed
//! reports at least one active alert, only the first feature is broadcast
//! through the dispatcher: headline plus a trimmed description. An empty
//! feed produces a status display event, not a send.
//!
//! The poller holds no cross-poll memory, so a still-active alert is
//! re-broadcast every interval until it leaves the feed.
//!
//! Feed failures (network, timeout, non-2xx, malformed JSON) surface as
//! display events and the loop simply waits for the next tick; they never
//! reach the dispatcher and never stop the other background tasks.

use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};

use crate::config::AlertsConfig;
use crate::message::OutboundMessage;
use crate::metrics;
use crate::relay::dispatch::DispatcherHandle;
use crate::relay::display::{DisplayEvent, DisplaySender};

/// NWS active-alert feed response structures (GeoJSON).
#[derive(Debug, Deserialize)]
pub struct AlertFeed {
    #[serde(default)]
    pub features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
pub struct AlertFeature {
    pub properties: AlertProperties,
}

#[derive(Debug, Deserialize)]
pub struct AlertProperties {
    pub headline: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("feed returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Build the broadcast text for the current poll, taking only the first
/// feature and trimming its description to `description_limit` characters.
/// Returns `None` when no alerts are active.
pub fn build_alert_message(feed: &AlertFeed, description_limit: usize) -> Option<String> {
    let first = feed.features.first()?;
    let description: String = first
        .properties
        .description
        .chars()
        .take(description_limit)
        .collect();
    Some(format!(
        "\u{1F329}\u{FE0F} NWS ALERT: {}\n{}...",
        first.properties.headline, description
    ))
}

/// Fetch the active-alert feed once, bounded by the configured timeout.
pub async fn fetch_active(
    client: &reqwest::Client,
    config: &AlertsConfig,
) -> Result<AlertFeed, FeedError> {
    let url = config.feed_url();
    debug!("Fetching alerts from {}", url);
    let response = timeout(
        Duration::from_secs(config.timeout_secs),
        client.get(&url).send(),
    )
    .await
    .map_err(|_| FeedError::Timeout(config.timeout_secs))??;

    if !response.status().is_success() {
        return Err(FeedError::Status(response.status()));
    }
    Ok(response.json::<AlertFeed>().await?)
}

/// Construct the HTTP client used against the feed. The NWS API rejects
/// requests without a User-Agent.
pub fn feed_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("meshrelay/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct AlertPoller {
    config: AlertsConfig,
    client: reqwest::Client,
    dispatcher: DispatcherHandle,
    display: DisplaySender,
}

impl AlertPoller {
    pub fn new(config: AlertsConfig, dispatcher: DispatcherHandle, display: DisplaySender) -> Self {
        Self {
            config,
            client: feed_client(),
            dispatcher,
            display,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_once().await;
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("alert poller terminated");
    }

    /// One full poll cycle: fetch, then either broadcast the first active
    /// alert or report the all-clear.
    pub async fn check_once(&self) {
        metrics::inc_alert_polls();
        match fetch_active(&self.client, &self.config).await {
            Ok(feed) => {
                let active = feed.features.len();
                match build_alert_message(&feed, self.config.description_limit) {
                    Some(text) => {
                        if active > 1 {
                            debug!("{} active alerts; broadcasting the first only", active);
                        }
                        metrics::inc_alert_broadcasts();
                        if let Err(e) = self.dispatcher.send(OutboundMessage::alert(text)).await {
                            warn!("alert broadcast failed: {}", e);
                        }
                    }
                    None => {
                        let _ = self.display.send(DisplayEvent::Status(format!(
                            "\u{1F7E2} No active weather alerts for zone {}",
                            self.config.zone
                        )));
                    }
                }
            }
            Err(e) => {
                warn!("alert feed poll failed: {}", e);
                let _ = self.display.send(DisplayEvent::Error {
                    context: "NWS".to_string(),
                    detail: e.to_string(),
                });
            }
        }
    }
}
