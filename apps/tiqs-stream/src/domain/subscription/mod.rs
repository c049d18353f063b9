//! Subscription Registry
//!
//! Domain types for tracking which instrument tokens are subscribed and in
//! which mode.
//!
//! # Design
//!
//! The registry keeps one mode per token: a later subscribe for the same
//! token overwrites its mode rather than adding a second entry. It is the
//! source of truth for resubscription after a reconnect, so it is updated
//! before any control message is sent and never rolled back when the send
//! fails.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::domain::streaming::Token;

// =============================================================================
// Types
// =============================================================================

/// Subscription granularity defined by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    /// Last traded price only.
    Ltp,
    /// Quote without depth.
    Quote,
    /// Full quote with five-level depth.
    Full,
}

impl Mode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ltp => "ltp",
            Self::Quote => "quote",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ltp" => Ok(Self::Ltp),
            "quote" => Ok(Self::Quote),
            "full" => Ok(Self::Full),
            other => Err(ModeError::Unknown(other.to_string())),
        }
    }
}

/// Mode parsing error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    /// The string is not one of the feed's modes.
    #[error("unknown subscription mode: {0}")]
    Unknown(String),
}

/// Control action sent to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    /// Start streaming the listed tokens.
    Subscribe,
    /// Stop streaming the listed tokens.
    Unsubscribe,
}

impl SubscriptionAction {
    /// Wire code of the action.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Subscribe => "sub",
            Self::Unsubscribe => "unsub",
        }
    }
}

// =============================================================================
// Subscription Request
// =============================================================================

/// A control message for the feed.
///
/// Serializes to `{"code":"sub","mode":"full","full":[3045,26000]}`; the
/// token list is keyed by the mode name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    /// Subscribe or unsubscribe.
    pub action: SubscriptionAction,
    /// Mode the tokens are listed under.
    pub mode: Mode,
    /// Tokens in the order given by the caller.
    pub tokens: Vec<Token>,
}

impl SubscriptionRequest {
    /// Create a subscribe request.
    #[must_use]
    pub fn subscribe(mode: Mode, tokens: Vec<Token>) -> Self {
        Self {
            action: SubscriptionAction::Subscribe,
            mode,
            tokens,
        }
    }

    /// Create an unsubscribe request.
    #[must_use]
    pub fn unsubscribe(mode: Mode, tokens: Vec<Token>) -> Self {
        Self {
            action: SubscriptionAction::Unsubscribe,
            mode,
            tokens,
        }
    }

    /// Serialize to the JSON text frame sent over the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for SubscriptionRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("code", self.action.code())?;
        map.serialize_entry("mode", self.mode.as_str())?;
        map.serialize_entry(self.mode.as_str(), &self.tokens)?;
        map.end()
    }
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe map from token to its current mode.
///
/// # Example
///
/// ```rust
/// use tiqs_stream::domain::subscription::{Mode, SubscriptionRegistry};
///
/// let registry = SubscriptionRegistry::new();
/// registry.subscribe(&[1, 2], Mode::Full);
/// registry.subscribe(&[2], Mode::Ltp);
///
/// assert_eq!(registry.mode_of(1), Some(Mode::Full));
/// assert_eq!(registry.mode_of(2), Some(Mode::Ltp));
///
/// let snapshot = registry.snapshot_by_mode();
/// assert_eq!(snapshot[&Mode::Full], vec![1]);
/// assert_eq!(snapshot[&Mode::Ltp], vec![2]);
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<Token, Mode>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tokens` under `mode`, overwriting any previous mode.
    ///
    /// Returns the subscribe request to send.
    pub fn subscribe(&self, tokens: &[Token], mode: Mode) -> SubscriptionRequest {
        let mut entries = self.entries.write();
        for token in tokens {
            entries.insert(*token, mode);
        }
        SubscriptionRequest::subscribe(mode, tokens.to_vec())
    }

    /// Remove `tokens` regardless of the mode they were stored under.
    ///
    /// Returns the unsubscribe request to send.
    pub fn unsubscribe(&self, tokens: &[Token], mode: Mode) -> SubscriptionRequest {
        let mut entries = self.entries.write();
        for token in tokens {
            entries.remove(token);
        }
        SubscriptionRequest::unsubscribe(mode, tokens.to_vec())
    }

    /// Current contents grouped by mode, tokens ascending.
    #[must_use]
    pub fn snapshot_by_mode(&self) -> BTreeMap<Mode, Vec<Token>> {
        let mut grouped: BTreeMap<Mode, Vec<Token>> = BTreeMap::new();
        for (token, mode) in self.entries.read().iter() {
            grouped.entry(*mode).or_default().push(*token);
        }
        for tokens in grouped.values_mut() {
            tokens.sort_unstable();
        }
        grouped
    }

    /// One subscribe request per mode currently present.
    #[must_use]
    pub fn resubscribe_requests(&self) -> Vec<SubscriptionRequest> {
        self.snapshot_by_mode()
            .into_iter()
            .map(|(mode, tokens)| SubscriptionRequest::subscribe(mode, tokens))
            .collect()
    }

    /// Mode a token is subscribed under.
    #[must_use]
    pub fn mode_of(&self, token: Token) -> Option<Mode> {
        self.entries.read().get(&token).copied()
    }

    /// Number of subscribed tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Token counts per mode.
    #[must_use]
    pub fn stats(&self) -> SubscriptionStats {
        let mut stats = SubscriptionStats::default();
        for mode in self.entries.read().values() {
            match mode {
                Mode::Ltp => stats.ltp += 1,
                Mode::Quote => stats.quote += 1,
                Mode::Full => stats.full += 1,
            }
        }
        stats
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Token counts per mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Tokens in LTP mode.
    pub ltp: usize,
    /// Tokens in quote mode.
    pub quote: usize,
    /// Tokens in full mode.
    pub full: usize,
}

impl SubscriptionStats {
    /// Total subscribed tokens.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.ltp + self.quote + self.full
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn later_subscribe_overwrites_mode() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(&[1, 2], Mode::Full);
        registry.subscribe(&[2], Mode::Ltp);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.mode_of(1), Some(Mode::Full));
        assert_eq!(registry.mode_of(2), Some(Mode::Ltp));
    }

    #[test]
    fn subscribe_returns_request_for_given_tokens() {
        let registry = SubscriptionRegistry::new();
        let request = registry.subscribe(&[26000, 3045], Mode::Quote);

        assert_eq!(request.action, SubscriptionAction::Subscribe);
        assert_eq!(request.mode, Mode::Quote);
        assert_eq!(request.tokens, vec![26000, 3045]);
    }

    #[test]
    fn unsubscribe_ignores_stored_mode() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(&[1], Mode::Full);
        registry.subscribe(&[2], Mode::Ltp);

        let request = registry.unsubscribe(&[1, 2], Mode::Quote);

        assert!(registry.is_empty());
        assert_eq!(request.action, SubscriptionAction::Unsubscribe);
        assert_eq!(request.mode, Mode::Quote);
        assert_eq!(request.tokens, vec![1, 2]);
    }

    #[test]
    fn unsubscribe_unknown_token_is_noop() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(&[1], Mode::Full);
        registry.unsubscribe(&[99], Mode::Full);
        assert_eq!(registry.mode_of(1), Some(Mode::Full));
    }

    #[test]
    fn snapshot_groups_by_mode() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(&[5, 3, 1], Mode::Full);
        registry.subscribe(&[4, 2], Mode::Ltp);
        registry.subscribe(&[3], Mode::Ltp);

        let snapshot = registry.snapshot_by_mode();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&Mode::Full], vec![1, 5]);
        assert_eq!(snapshot[&Mode::Ltp], vec![2, 3, 4]);
        assert!(!snapshot.contains_key(&Mode::Quote));
    }

    #[test]
    fn resubscribe_requests_one_per_mode() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(&[1, 2], Mode::Full);
        registry.subscribe(&[3], Mode::Quote);

        let requests = registry.resubscribe_requests();
        assert_eq!(requests.len(), 2);
        assert!(
            requests
                .iter()
                .all(|r| r.action == SubscriptionAction::Subscribe)
        );
        assert!(requests.contains(&SubscriptionRequest::subscribe(Mode::Full, vec![1, 2])));
        assert!(requests.contains(&SubscriptionRequest::subscribe(Mode::Quote, vec![3])));
    }

    #[test]
    fn empty_registry_has_no_resubscribe_requests() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.resubscribe_requests().is_empty());
    }

    #[test]
    fn stats_count_per_mode() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(&[1, 2, 3], Mode::Full);
        registry.subscribe(&[4], Mode::Ltp);

        let stats = registry.stats();
        assert_eq!(stats.full, 3);
        assert_eq!(stats.ltp, 1);
        assert_eq!(stats.quote, 0);
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn request_wire_format() {
        let request = SubscriptionRequest::subscribe(Mode::Full, vec![3045, 26000]);
        let value: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"code": "sub", "mode": "full", "full": [3045, 26000]})
        );

        let request = SubscriptionRequest::unsubscribe(Mode::Ltp, vec![7]);
        let value: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"code": "unsub", "mode": "ltp", "ltp": [7]})
        );
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("ltp".parse::<Mode>(), Ok(Mode::Ltp));
        assert_eq!("QUOTE".parse::<Mode>(), Ok(Mode::Quote));
        assert_eq!(" full ".parse::<Mode>(), Ok(Mode::Full));
        assert_eq!(
            "depth".parse::<Mode>(),
            Err(ModeError::Unknown("depth".to_string()))
        );
    }

    #[test]
    fn concurrent_mutation() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for token in (i * 100)..(i * 100 + 100) {
                        registry.subscribe(&[token], Mode::Full);
                        let _ = registry.snapshot_by_mode();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 800);
    }
}
