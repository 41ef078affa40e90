//! # Relay Core Module
//!
//! The message dispatch and alerting engine: everything with real
//! concurrency and protocol-boundary concerns lives here.
//!
//! ## Components
//!
//! - [`server`] - lifecycle management and the operator console
//! - [`dispatch`] - the serialized outbound send path
//! - [`listener`] - inbound packet handling
//! - [`alerts`] - NWS weather-alert polling
//! - [`beacon`] - periodic station identification
//! - [`display`] - presentation-layer event queue
//!
//! ## Control flow
//!
//! The alert poller, the beacon scheduler, and the operator console all
//! submit through the [`dispatch::DispatcherHandle`]; the dispatcher actor
//! serializes access to the single radio. The inbound listener is driven by
//! the transport reader's channel and never touches the send path.

pub mod alerts;
pub mod beacon;
pub mod dispatch;
pub mod display;
pub mod listener;
pub mod server;

pub use server::RelayServer;
