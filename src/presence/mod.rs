//! Presence / unlock tracking
//!
//! Monotonic flags for the recovered-evidence packages, persisted per room
//! (and per account on the server), with a signature guard so each unlock is
//! announced in the feed exactly once.

pub mod tracker;
pub mod unlock_set;

pub use tracker::{check_key, UnlockTracker};
pub use unlock_set::{signature_keys, solved, UnlockSet, CASE01_KEYS};
