//! Configuration Module
//!
//! Configuration loading for the tick stream client.

mod settings;

pub use settings::{
    ConfigError, Credentials, DEFAULT_STREAM_URL, QueueSettings, StreamConfig, StreamSettings,
};
