//! Logging infrastructure for the room server
//!
//! Tracing subscriber setup plus structured room activity records.

pub mod activity;

pub use activity::{ActivityKind, RoomActivity};

use clap::ValueEnum;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. Calling this twice is harmless;
/// the second install is ignored.
pub fn init(log_level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("scib_room={},info", log_level).into());

    let (text, json) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init();
}
