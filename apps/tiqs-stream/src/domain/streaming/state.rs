//! Connection lifecycle state.

use std::fmt;

/// Lifecycle state of a streaming connection.
///
/// ```text
/// Disconnected ──connect──► Connecting ──dial ok──► Connected
///      ▲                        │  ▲                    │
///      └──retries exhausted─────┘  └────read error──────┘
///
/// any state ──close──► Closed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No socket and no dial in progress.
    #[default]
    Disconnected,
    /// Dialing, including the delay between attempts.
    Connecting,
    /// Socket open and receive loop running.
    Connected,
    /// Closed by the caller. Terminal.
    Closed,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Disconnected)
                | (Self::Connected, Self::Connecting)
                | (Self::Disconnected | Self::Connecting | Self::Connected, Self::Closed)
        )
    }

    /// Whether the state is terminal.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Numeric code used for the state gauge.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Connected => 2.0,
            Self::Closed => 3.0,
        }
    }

    /// Lowercase state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
