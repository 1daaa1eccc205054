//! # lyricline-server
//!
//! Fuses heterogeneous media sources into one authoritative "now playing"
//! state, races lyrics/art providers with caching, and serves the result
//! to browser clients over HTTP and WebSocket.

pub mod api;
pub mod art;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod fuser;
pub mod lifecycle;
pub mod lyrics;
pub mod settings;
pub mod sources;
pub mod state;

pub use error::{Result, ServerError};
