//! WebSocket channel layer: connection handles, the session registry,
//! broadcast fan-out, the idle reaper and the per-channel session loop.

pub mod broadcast;
pub mod connection;
pub mod reaper;
pub mod registry;
pub mod session;
