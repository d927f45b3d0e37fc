//! # chorus-server
//!
//! Axum HTTP + `WebSocket` dialogue relay.
//!
//! - `WebSocket` gateway (`/ws?user_id=`): one session per client id, newer
//!   channels take over older ones
//! - Shared dialogue replicated to every channel as full `update_dialogue`
//!   snapshots
//! - Idle reaper evicting sessions without inbound traffic
//! - Administrative HTTP API, health check and Prometheus metrics
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod admin;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ServerError;
pub use relay::{MessageSource, Relay};
pub use server::ChorusServer;
