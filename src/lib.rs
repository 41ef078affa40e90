//! # Meshrelay - Emergency Text Relay for Meshtastic Networks
//!
//! Meshrelay turns a single Meshtastic node into an emergency relay
//! station: it broadcasts operator messages, watches the NWS alert feed for
//! the configured zone, identifies itself on a fixed schedule, and journals
//! every message that crosses the link.
//!
//! ## Features
//!
//! - **Serialized Dispatch**: every outbound send funnels through one actor
//!   that owns the radio, so the half-duplex link never sees overlapping
//!   sends and the journal never interleaves entries.
//! - **Payload Contract**: outbound text is clamped to the link's 220-byte
//!   budget with UTF-8 safe truncation.
//! - **Weather Alerts**: periodic NWS active-alert polling with bounded
//!   timeouts; active alerts are broadcast, failures are surfaced and
//!   retried on the next cycle.
//! - **Station Ident**: wall-clock scheduled identification beacon with a
//!   rotating quote.
//! - **Message Journal**: append-only, timestamped record of all traffic.
//! - **Async Design**: built with Tokio; each background activity is an
//!   isolated task that cannot take down the others.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshrelay::config::Config;
//! use meshrelay::relay::RelayServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut server = RelayServer::new(config).await?;
//!     server.connect_device("/dev/ttyUSB0").await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`relay`] - dispatch engine, background schedulers, operator console
//! - [`meshtastic`] - device communication and inbound frame parsing
//! - [`message`] - outbound message model, payload clamp, classifier
//! - [`storage`] - append-only message journal
//! - [`config`] - configuration management
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │ ← lifecycle + operator console
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Dispatcher    │ ← serialized send path
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Meshtastic    │ ← device communication
//! │   Transport     │
//! └─────────────────┘
//! ```

pub mod config;
pub mod logutil;
pub mod message;
pub mod meshtastic;
pub mod metrics;
pub mod relay;
pub mod storage;
