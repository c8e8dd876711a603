//! scib-room - realtime investigation room feed
//!
//! An append-only, deduplicated feed per room with live fan-out over
//! Server-Sent Events, plus per-account unlock tracking that announces each
//! recovered evidence package in the feed exactly once.
//!
//! ## Services
//!
//! - **Feed**: store, publisher and client-side subscriber merge
//! - **Presence**: unlock flags with a signature guard against re-emission
//! - **Journal**: the same feed kept client-side in a keyed state store
//! - **Client**: reqwest client for the HTTP surface, usable as a feed source

pub mod client;
pub mod config;
pub mod feed;
pub mod journal;
pub mod logging;
pub mod persist;
pub mod presence;
pub mod routes;
pub mod server;
pub mod sse;
pub mod types;

pub use config::Args;
pub use server::{run, serve, AppState};
pub use types::{Result, RoomError};
