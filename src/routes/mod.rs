//! HTTP routes for the room server

pub mod health;
pub mod identity;
pub mod join;
pub mod room;
pub mod unlocks;

pub use health::health_check;
pub use identity::{resolve_identity, validate_username, MAX_USERNAME_CHARS, USERNAME_COOKIE};
pub use join::handle_join;
pub use room::{handle_publish, handle_snapshot, handle_stream};
pub use unlocks::{handle_get_unlocks, handle_unlock};
