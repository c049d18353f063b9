//! Market Data Streaming Types
//!
//! Core domain types for the tick feed: decoded ticks, market depth and the
//! lifecycle state of a streaming connection. These types are codec-agnostic
//! and represent the canonical internal representation of market data.

mod state;
mod tick;

pub use state::ConnectionState;
pub use tick::{DEPTH_LEVELS, DepthLevel, MarketDepth, NetChangeIndicator, Tick, Token};
