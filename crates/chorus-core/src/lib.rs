//! # chorus-core
//!
//! Shared types for the Chorus dialogue relay.
//!
//! - [`ids::SessionId`]: client-supplied session identifier
//! - [`messages::Message`] / [`messages::Role`]: one dialogue entry
//! - [`frames::InboundFrame`]: decoded client → server frames
//! - [`frames::ServerEvent`]: server → client frames

#![deny(unsafe_code)]

pub mod errors;
pub mod frames;
pub mod ids;
pub mod messages;

pub use errors::FrameError;
pub use frames::{InboundFrame, ServerEvent};
pub use ids::SessionId;
pub use messages::{Message, Role};
