//! Tick and market depth records.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Integer identifier of a tradable instrument.
pub type Token = i32;

/// Number of price levels on each side of the book.
pub const DEPTH_LEVELS: usize = 5;

/// Direction of the last traded price relative to the previous close.
///
/// The feed encodes this as an ASCII sentinel byte, and it serializes as
/// that byte's integer value (43, 45 or 32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetChangeIndicator {
    /// LTP above previous close (`+`).
    Plus,
    /// LTP below previous close (`-`).
    Minus,
    /// LTP equal to previous close (space).
    Space,
}

impl NetChangeIndicator {
    /// Compare a last traded price against the previous close.
    #[must_use]
    pub const fn from_prices(ltp: i32, close: i32) -> Self {
        if ltp > close {
            Self::Plus
        } else if ltp < close {
            Self::Minus
        } else {
            Self::Space
        }
    }

    /// The sentinel byte used on the wire.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Plus => b'+',
            Self::Minus => b'-',
            Self::Space => b' ',
        }
    }
}

impl Serialize for NetChangeIndicator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_byte())
    }
}

/// One price level on one side of the order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DepthLevel {
    /// Resting quantity.
    pub quantity: i64,
    /// Level price.
    pub price: i32,
    /// Number of orders at this level.
    pub orders: i16,
}

/// Five bid levels and five ask levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MarketDepth {
    /// Bid levels, best first.
    pub bids: [DepthLevel; DEPTH_LEVELS],
    /// Ask levels, best first.
    pub asks: [DepthLevel; DEPTH_LEVELS],
}

/// One decoded market-data snapshot for one instrument.
///
/// Prices are in the exchange's integer units (paise). Fields that the
/// source frame did not carry are left at zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Tick {
    /// Instrument token.
    pub token: Token,
    /// Last traded price.
    pub ltp: i32,
    /// Direction of LTP against the previous close (quote frames only).
    pub net_change_indicator: Option<NetChangeIndicator>,
    /// Percentage change against the previous close, truncated.
    pub net_change: i32,
    /// Last traded quantity.
    pub ltq: i32,
    /// Average traded price.
    pub avg_price: i32,
    /// Total pending buy quantity.
    pub total_buy_qty: i64,
    /// Total pending sell quantity.
    pub total_sell_qty: i64,
    /// Session open.
    pub open: i32,
    /// Session high.
    pub high: i32,
    /// Previous close (quote frames) or session close (full frames).
    pub close: i32,
    /// Session low.
    pub low: i32,
    /// Cumulative traded volume.
    pub volume: i64,
    /// Last trade time, epoch seconds.
    pub ltt: i32,
    /// Exchange timestamp, epoch seconds.
    pub time: i32,
    /// Open interest.
    pub oi: i32,
    /// Open interest day high.
    pub oi_day_high: i32,
    /// Open interest day low.
    pub oi_day_low: i32,
    /// Lower circuit limit.
    pub lower_limit: i32,
    /// Upper circuit limit.
    pub upper_limit: i32,
    /// Five-level book, present only on full depth frames.
    pub market_depth: Option<MarketDepth>,
}

impl Tick {
    /// Create a tick carrying only a token.
    #[must_use]
    pub fn with_token(token: Token) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }

    /// Whether the tick carries a five-level book.
    #[must_use]
    pub const fn has_depth(&self) -> bool {
        self.market_depth.is_some()
    }

    /// Last trade time as a UTC timestamp, if populated.
    #[must_use]
    pub fn last_trade_time(&self) -> Option<DateTime<Utc>> {
        epoch_seconds(self.ltt)
    }

    /// Exchange time as a UTC timestamp, if populated.
    #[must_use]
    pub fn exchange_time(&self) -> Option<DateTime<Utc>> {
        epoch_seconds(self.time)
    }
}

fn epoch_seconds(secs: i32) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(i64::from(secs), 0)
}
