//! Domain Layer - Core streaming types and business logic.
//!
//! This layer contains the tick data model, connection state and the
//! subscription registry. Nothing here performs I/O.

/// Tick records, market depth and connection state.
pub mod streaming;

/// Subscription tracking and control messages.
pub mod subscription;
