//! Tick Frame Codec
//!
//! Decodes the binary frames of the Tiqs tick feed.
//!
//! # Frame Layout
//!
//! Frames carry no type tag; the variant is selected by length alone. All
//! integers are big-endian two's-complement.
//!
//! ```text
//! len == 1     token (single byte)
//! len 17..=80  token[0..4] ltp[4..8] close[13..17]
//! len >= 81    token[0..4] ltp[4..8] avg[17..21] buy_qty[21..29] sell_qty[29..37]
//!              open[37..41] high[41..45] close[45..49] low[49..53]
//!              volume[53..61] ltt[61..65] time[65..69]
//!              oi[69..73] oi_high[73..77] oi_low[77..81]
//! len == 229   ... lower[81..85] upper[85..89]
//!              5 bids then 5 asks from 89, 14 bytes each:
//!              quantity(8) price(4) orders(2)
//! ```
//!
//! Lengths 0 and 2..=16 are rejected. Lengths between the thresholds decode
//! the fields of the highest threshold they reach and ignore the rest.

use crate::domain::streaming::{
    DEPTH_LEVELS, DepthLevel, MarketDepth, NetChangeIndicator, Tick, Token,
};

/// Length of a keep-alive frame carrying only a token byte.
pub const KEEPALIVE_FRAME_LEN: usize = 1;

/// Minimum length of a quote frame.
pub const QUOTE_FRAME_LEN: usize = 17;

/// Minimum length of a frame carrying the extended session fields.
pub const EXTENDED_FRAME_LEN: usize = 81;

/// Exact length of a frame carrying circuit limits and market depth.
pub const DEPTH_FRAME_LEN: usize = 229;

/// Offset of the first depth level.
const DEPTH_OFFSET: usize = 89;

/// Size of one encoded depth level.
const DEPTH_LEVEL_LEN: usize = 14;

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Frame length does not match any variant.
    #[error("malformed frame: invalid data length {0}")]
    MalformedFrame(usize),

    /// A field extends past the end of the frame.
    #[error("frame truncated: need {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        /// Field offset.
        offset: usize,
        /// Field width.
        needed: usize,
        /// Frame length.
        len: usize,
    },
}

/// Which variant a frame length selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Single-byte keep-alive.
    KeepAlive,
    /// Token, LTP and previous close.
    Quote,
    /// Quote plus session, volume and open interest fields.
    Extended,
    /// Extended plus circuit limits and five-level depth.
    Depth,
}

impl FrameKind {
    /// Classify a frame by its length.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedFrame`] for lengths no variant accepts.
    pub const fn classify(len: usize) -> Result<Self, CodecError> {
        match len {
            KEEPALIVE_FRAME_LEN => Ok(Self::KeepAlive),
            DEPTH_FRAME_LEN => Ok(Self::Depth),
            n if n >= EXTENDED_FRAME_LEN => Ok(Self::Extended),
            n if n >= QUOTE_FRAME_LEN => Ok(Self::Quote),
            n => Err(CodecError::MalformedFrame(n)),
        }
    }

    /// Metric label for the variant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepAlive => "keepalive",
            Self::Quote => "quote",
            Self::Extended => "extended",
            Self::Depth => "depth",
        }
    }
}

/// Binary codec for tick frames.
#[derive(Debug, Default, Clone)]
pub struct TickCodec;

impl TickCodec {
    /// Create a new tick codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one binary frame into a tick.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedFrame`] when the length selects no
    /// variant.
    pub fn decode(&self, data: &[u8]) -> Result<Tick, CodecError> {
        decode_frame(data)
    }
}

/// Decode one binary frame into a tick.
///
/// # Errors
///
/// Returns [`CodecError::MalformedFrame`] when the length selects no variant.
pub fn decode_frame(data: &[u8]) -> Result<Tick, CodecError> {
    let kind = FrameKind::classify(data.len())?;

    if kind == FrameKind::KeepAlive {
        return Ok(Tick::with_token(Token::from(data[0])));
    }

    let frame = FrameReader::new(data);
    let mut tick = Tick {
        token: frame.i32_at(0)?,
        ltp: frame.i32_at(4)?,
        ..Tick::default()
    };

    match kind {
        FrameKind::Quote => decode_quote(&frame, &mut tick)?,
        FrameKind::Extended => decode_extended(&frame, &mut tick)?,
        FrameKind::Depth => {
            decode_extended(&frame, &mut tick)?;
            decode_depth(&frame, &mut tick)?;
        }
        FrameKind::KeepAlive => {}
    }

    Ok(tick)
}

fn decode_quote(frame: &FrameReader<'_>, tick: &mut Tick) -> Result<(), CodecError> {
    tick.close = frame.i32_at(13)?;
    tick.net_change = net_change_percent(tick.ltp, tick.close);
    tick.net_change_indicator = Some(NetChangeIndicator::from_prices(tick.ltp, tick.close));
    Ok(())
}

fn decode_extended(frame: &FrameReader<'_>, tick: &mut Tick) -> Result<(), CodecError> {
    tick.avg_price = frame.i32_at(17)?;
    tick.total_buy_qty = frame.i64_at(21)?;
    tick.total_sell_qty = frame.i64_at(29)?;
    tick.open = frame.i32_at(37)?;
    tick.high = frame.i32_at(41)?;
    tick.close = frame.i32_at(45)?;
    tick.low = frame.i32_at(49)?;
    tick.volume = frame.i64_at(53)?;
    tick.ltt = frame.i32_at(61)?;
    tick.time = frame.i32_at(65)?;
    tick.oi = frame.i32_at(69)?;
    tick.oi_day_high = frame.i32_at(73)?;
    tick.oi_day_low = frame.i32_at(77)?;
    Ok(())
}

fn decode_depth(frame: &FrameReader<'_>, tick: &mut Tick) -> Result<(), CodecError> {
    tick.lower_limit = frame.i32_at(81)?;
    tick.upper_limit = frame.i32_at(85)?;

    let mut depth = MarketDepth::default();
    let mut offset = DEPTH_OFFSET;
    for level in &mut depth.bids {
        *level = frame.depth_level_at(offset)?;
        offset += DEPTH_LEVEL_LEN;
    }
    for level in &mut depth.asks {
        *level = frame.depth_level_at(offset)?;
        offset += DEPTH_LEVEL_LEN;
    }
    debug_assert_eq!(offset, DEPTH_OFFSET + 2 * DEPTH_LEVELS * DEPTH_LEVEL_LEN);

    tick.market_depth = Some(depth);
    Ok(())
}

/// Percentage change of `ltp` against `close`, truncated toward zero.
///
/// The difference wraps at 32 bits before the floating point division. A
/// zero close saturates instead of panicking.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn net_change_percent(ltp: i32, close: i32) -> i32 {
    let diff = f64::from(ltp.wrapping_sub(close));
    (diff / f64::from(close) * 100.0) as i32
}

/// Bounds-checked big-endian field reader.
struct FrameReader<'a> {
    data: &'a [u8],
}

impl<'a> FrameReader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn field<const N: usize>(&self, offset: usize) -> Result<[u8; N], CodecError> {
        self.data
            .get(offset..offset + N)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(CodecError::Truncated {
                offset,
                needed: N,
                len: self.data.len(),
            })
    }

    fn i16_at(&self, offset: usize) -> Result<i16, CodecError> {
        self.field(offset).map(i16::from_be_bytes)
    }

    fn i32_at(&self, offset: usize) -> Result<i32, CodecError> {
        self.field(offset).map(i32::from_be_bytes)
    }

    fn i64_at(&self, offset: usize) -> Result<i64, CodecError> {
        self.field(offset).map(i64::from_be_bytes)
    }

    fn depth_level_at(&self, offset: usize) -> Result<DepthLevel, CodecError> {
        Ok(DepthLevel {
            quantity: self.i64_at(offset)?,
            price: self.i32_at(offset + 8)?,
            orders: self.i16_at(offset + 12)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    /// Build a quote-sized frame with token, LTP and close.
    fn quote_frame(len: usize, token: i32, ltp: i32, close: i32) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[0..4].copy_from_slice(&token.to_be_bytes());
        data[4..8].copy_from_slice(&ltp.to_be_bytes());
        data[13..17].copy_from_slice(&close.to_be_bytes());
        data
    }

    fn put_i32(data: &mut [u8], offset: usize, value: i32) {
        data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    fn put_i64(data: &mut [u8], offset: usize, value: i64) {
        data[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
    }

    fn extended_frame(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        put_i32(&mut data, 0, 256_265);
        put_i32(&mut data, 4, 2_245_050);
        put_i32(&mut data, 17, 2_240_000);
        put_i64(&mut data, 21, 5_000_000_000);
        put_i64(&mut data, 29, 4_000_000_000);
        put_i32(&mut data, 37, 2_230_000);
        put_i32(&mut data, 41, 2_250_000);
        put_i32(&mut data, 45, 2_220_000);
        put_i32(&mut data, 49, 2_225_000);
        put_i64(&mut data, 53, 12_345_678_901);
        put_i32(&mut data, 61, 1_700_000_000);
        put_i32(&mut data, 65, 1_700_000_005);
        put_i32(&mut data, 69, 900);
        put_i32(&mut data, 73, 950);
        put_i32(&mut data, 77, 850);
        data
    }

    fn depth_frame() -> Vec<u8> {
        let mut data = extended_frame(DEPTH_FRAME_LEN);
        put_i32(&mut data, 81, 2_000_000);
        put_i32(&mut data, 85, 2_500_000);
        let mut offset = DEPTH_OFFSET;
        for i in 0..10i32 {
            put_i64(&mut data, offset, i64::from(1000 + i));
            put_i32(&mut data, offset + 8, 2_245_000 + i);
            data[offset + 12..offset + 14].copy_from_slice(&(i16::try_from(i).unwrap() + 1).to_be_bytes());
            offset += DEPTH_LEVEL_LEN;
        }
        data
    }

    #[test_case(0, 0 ; "zero")]
    #[test_case(7, 7 ; "small")]
    #[test_case(200, 200 ; "high bit set")]
    #[test_case(255, 255 ; "max byte")]
    fn keepalive_frame_carries_token_only(byte: u8, expected: i32) {
        let tick = decode_frame(&[byte]).unwrap();
        assert_eq!(tick, Tick::with_token(expected));
    }

    #[test_case(105, 5, NetChangeIndicator::Plus ; "up")]
    #[test_case(95, -5, NetChangeIndicator::Minus ; "down")]
    #[test_case(100, 0, NetChangeIndicator::Space ; "flat")]
    fn quote_frame_derives_net_change(ltp: i32, change: i32, indicator: NetChangeIndicator) {
        let tick = decode_frame(&quote_frame(QUOTE_FRAME_LEN, 3045, ltp, 100)).unwrap();
        assert_eq!(tick.token, 3045);
        assert_eq!(tick.ltp, ltp);
        assert_eq!(tick.close, 100);
        assert_eq!(tick.net_change, change);
        assert_eq!(tick.net_change_indicator, Some(indicator));
    }

    #[test]
    fn net_change_truncates_toward_zero() {
        // 2.9% and -2.9%
        assert_eq!(net_change_percent(10_290, 10_000), 2);
        assert_eq!(net_change_percent(9_710, 10_000), -2);
        assert_eq!(net_change_percent(150, 100), 50);
    }

    #[test_case(i32::MIN, i32::MAX, 0 ; "difference wraps to one")]
    #[test_case(i32::MAX, i32::MIN, 0 ; "difference wraps to minus one")]
    #[test_case(i32::MIN, 1, i32::MAX ; "min ltp wraps positive")]
    #[test_case(i32::MAX, -1, i32::MAX ; "max ltp over negative close")]
    fn net_change_difference_wraps(ltp: i32, close: i32, expected: i32) {
        assert_eq!(net_change_percent(ltp, close), expected);
    }

    #[test]
    fn net_change_with_zero_close_does_not_panic() {
        assert_eq!(net_change_percent(0, 0), 0);
        assert_eq!(net_change_percent(10, 0), i32::MAX);
        assert_eq!(net_change_percent(-10, 0), i32::MIN);
    }

    #[test_case(0 ; "empty")]
    #[test_case(2 ; "two")]
    #[test_case(8 ; "eight")]
    #[test_case(16 ; "sixteen")]
    fn short_frames_are_malformed(len: usize) {
        let err = decode_frame(&vec![1u8; len]).unwrap_err();
        assert_eq!(err, CodecError::MalformedFrame(len));
    }

    #[test_case(18 ; "eighteen")]
    #[test_case(44 ; "forty four")]
    #[test_case(80 ; "eighty")]
    fn intermediate_frames_decode_quote_fields_only(len: usize) {
        let mut data = quote_frame(len, 11, 110, 100);
        // Garbage past the quote fields must be ignored.
        for byte in &mut data[17..] {
            *byte = 0xAB;
        }

        let tick = decode_frame(&data).unwrap();
        assert_eq!(tick.token, 11);
        assert_eq!(tick.ltp, 110);
        assert_eq!(tick.close, 100);
        assert_eq!(tick.net_change, 10);
        assert_eq!(tick.net_change_indicator, Some(NetChangeIndicator::Plus));
        assert_eq!(tick.avg_price, 0);
        assert_eq!(tick.total_buy_qty, 0);
        assert_eq!(tick.volume, 0);
        assert_eq!(tick.oi, 0);
        assert!(tick.market_depth.is_none());
    }

    #[test_case(81 ; "minimum")]
    #[test_case(120 ; "between")]
    #[test_case(228 ; "one short of depth")]
    #[test_case(230 ; "one past depth")]
    fn extended_frames_decode_session_fields(len: usize) {
        let tick = decode_frame(&extended_frame(len)).unwrap();
        assert_eq!(tick.token, 256_265);
        assert_eq!(tick.ltp, 2_245_050);
        assert_eq!(tick.avg_price, 2_240_000);
        assert_eq!(tick.total_buy_qty, 5_000_000_000);
        assert_eq!(tick.total_sell_qty, 4_000_000_000);
        assert_eq!(tick.open, 2_230_000);
        assert_eq!(tick.high, 2_250_000);
        assert_eq!(tick.close, 2_220_000);
        assert_eq!(tick.low, 2_225_000);
        assert_eq!(tick.volume, 12_345_678_901);
        assert_eq!(tick.ltt, 1_700_000_000);
        assert_eq!(tick.time, 1_700_000_005);
        assert_eq!(tick.oi, 900);
        assert_eq!(tick.oi_day_high, 950);
        assert_eq!(tick.oi_day_low, 850);
        assert_eq!(tick.net_change_indicator, None);
        assert_eq!(tick.lower_limit, 0);
        assert_eq!(tick.upper_limit, 0);
        assert!(tick.market_depth.is_none());
    }

    #[test]
    fn depth_frame_decodes_limits_and_levels_in_order() {
        let tick = decode_frame(&depth_frame()).unwrap();
        assert_eq!(tick.lower_limit, 2_000_000);
        assert_eq!(tick.upper_limit, 2_500_000);
        assert_eq!(tick.volume, 12_345_678_901);

        let depth = tick.market_depth.unwrap();
        for i in 0..DEPTH_LEVELS {
            let n = i32::try_from(i).unwrap();
            assert_eq!(
                depth.bids[i],
                DepthLevel {
                    quantity: i64::from(1000 + n),
                    price: 2_245_000 + n,
                    orders: i16::try_from(n + 1).unwrap(),
                }
            );
            let m = n + 5;
            assert_eq!(
                depth.asks[i],
                DepthLevel {
                    quantity: i64::from(1000 + m),
                    price: 2_245_000 + m,
                    orders: i16::try_from(m + 1).unwrap(),
                }
            );
        }
    }

    #[test]
    fn depth_levels_read_negative_values() {
        let mut data = depth_frame();
        put_i64(&mut data, DEPTH_OFFSET, -1);
        data[DEPTH_OFFSET + 12..DEPTH_OFFSET + 14].copy_from_slice(&(-2i16).to_be_bytes());

        let depth = decode_frame(&data).unwrap().market_depth.unwrap();
        assert_eq!(depth.bids[0].quantity, -1);
        assert_eq!(depth.bids[0].orders, -2);
        assert_eq!(depth.bids[1].quantity, 1001);
    }

    #[test]
    fn classify_lengths() {
        assert_eq!(FrameKind::classify(1), Ok(FrameKind::KeepAlive));
        assert_eq!(FrameKind::classify(17), Ok(FrameKind::Quote));
        assert_eq!(FrameKind::classify(80), Ok(FrameKind::Quote));
        assert_eq!(FrameKind::classify(81), Ok(FrameKind::Extended));
        assert_eq!(FrameKind::classify(229), Ok(FrameKind::Depth));
        assert_eq!(FrameKind::classify(500), Ok(FrameKind::Extended));
        assert_eq!(FrameKind::classify(3), Err(CodecError::MalformedFrame(3)));
    }

    #[test]
    fn codec_delegates_to_decode_frame() {
        let codec = TickCodec::new();
        assert_eq!(codec.decode(&[9]).unwrap().token, 9);
    }

    proptest! {
        #[test]
        fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..400)) {
            let result = decode_frame(&data);
            let len = data.len();
            if len == 0 || (2..QUOTE_FRAME_LEN).contains(&len) {
                prop_assert_eq!(result, Err(CodecError::MalformedFrame(len)));
            } else {
                let tick = result.unwrap();
                prop_assert_eq!(tick.market_depth.is_some(), len == DEPTH_FRAME_LEN);
            }
        }
    }
}
