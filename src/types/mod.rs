//! Shared types

pub mod api;
pub mod error;

pub use error::{Result, RoomError};
