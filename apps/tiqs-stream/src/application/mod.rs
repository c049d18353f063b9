//! Application Layer - Port definitions.
//!
//! This layer contains the port interfaces that define how the streaming
//! client interacts with the network.

/// Port interfaces for feed transports.
pub mod ports;
