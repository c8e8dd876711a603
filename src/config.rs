//! Configuration for the room server
//!
//! CLI arguments and environment variable handling using clap.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::feed::{validate_room_id, FeedConfig};
use crate::logging::LogFormat;

/// scib-room - realtime investigation room feed
#[derive(Parser, Debug, Clone)]
#[command(name = "scib-room")]
#[command(about = "Append-only realtime feed server for investigation rooms")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Longest accepted post body, in characters
    #[arg(long, env = "MAX_BODY_CHARS", default_value = "1200")]
    pub max_body_chars: usize,

    /// Entries kept per room; older ones are dropped. 0 keeps every entry.
    #[arg(long, env = "MAX_FEED_ENTRIES", default_value = "0")]
    pub max_feed_entries: usize,

    /// Broadcast buffer per room. Slow stream readers beyond this skip entries.
    #[arg(long, env = "STREAM_CAPACITY", default_value = "256")]
    pub stream_capacity: usize,

    /// Seconds between SSE keep-alive comments
    #[arg(long, env = "STREAM_KEEPALIVE_SECS", default_value = "15")]
    pub stream_keepalive_secs: u64,

    /// Unlock trackers kept open; idle ones are dropped past this
    #[arg(long, env = "MAX_TRACKERS", default_value = "1024")]
    pub max_trackers: usize,

    /// Directory for unlock state. In-memory when unset.
    #[arg(long, env = "STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Comma-separated retrieval keys tracked per room
    #[arg(long, env = "UNLOCK_KEYS", default_value = "REC-01,REC-02,REC-03,REC-04")]
    pub unlock_keys: String,

    /// Comma-separated rooms to serve; any other room is not found
    #[arg(long, env = "ROOMS", default_value = "case01")]
    pub rooms: String,
}

impl Args {
    /// Parse a comma-separated unlock key list
    pub fn unlock_key_list(&self) -> Vec<String> {
        split_list(&self.unlock_keys)
    }

    /// Parse a comma-separated room list
    pub fn room_list(&self) -> Vec<String> {
        split_list(&self.rooms)
    }

    /// Feed limits for every room store
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            max_entries: self.max_feed_entries,
            channel_capacity: self.stream_capacity,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_body_chars == 0 {
            return Err("MAX_BODY_CHARS must be greater than 0".to_string());
        }

        if self.max_trackers == 0 {
            return Err("MAX_TRACKERS must be greater than 0".to_string());
        }

        if self.stream_capacity == 0 {
            return Err("STREAM_CAPACITY must be greater than 0".to_string());
        }

        if self.stream_keepalive_secs == 0 {
            return Err("STREAM_KEEPALIVE_SECS must be greater than 0".to_string());
        }

        if self.unlock_key_list().is_empty() {
            return Err("UNLOCK_KEYS must name at least one key".to_string());
        }

        if self.room_list().is_empty() {
            return Err("ROOMS must name at least one room".to_string());
        }

        for room in self.room_list() {
            validate_room_id(&room).map_err(|e| format!("ROOMS: {}", e))?;
        }

        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
