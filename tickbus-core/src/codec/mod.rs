//! Fixed-layout binary frames shared by every tickbus process.
//!
//! All frames are little-endian. String fields travel in fixed-width slots
//! padded with zeroes, with the used length carried in a header field; a
//! string may fill its slot completely. Encoding rejects oversized fields
//! instead of truncating them.
//!
//! Order frame (128 bytes):
//!
//! ```text
//! offset  size  field
//!      0     8  timestamp_us (u64)
//!      8     4  sequence (u32)
//!     12     4  cl_ord_id_len (u32)
//!     16     4  exch_len (u32)
//!     20     4  symbol_len (u32)
//!     24     4  side (u32, 0 = buy, 1 = sell)
//!     28     4  is_market (u32, 0 or 1)
//!     32    32  cl_ord_id
//!     64    16  exch
//!     80    32  symbol
//!    112     8  qty (f64)
//!    120     8  price (f64)
//! ```
//!
//! Order event frame (196 bytes): identical header through offset 24, then
//! `event_type` (u32) at 24, a reserved u32 at 28 (written as zero, ignored
//! on decode), the same three string slots, `fill_qty`/`fill_price` at
//! 112/120, `text_len` at 128 and a 64 byte text slot at 132.
//!
//! Book frame (variable): `timestamp_us`, `sequence`, `symbol_len`, the
//! symbol bytes, `bid_count`, `ask_count`, then one `(price, qty)` f64 pair
//! per level, bids before asks. See [`calculate_size`].

use tickbus::{BookLevel, Order, OrderBookSnapshot, OrderEvent, OrderEventType, OrderType, Side};
use thiserror::Error;

/// Byte length of an encoded order frame.
pub const ORDER_SIZE: usize = 128;
/// Byte length of an encoded order event frame.
pub const ORDER_EVENT_SIZE: usize = 196;

/// Slot width for client order ids.
pub const CL_ORD_ID_CAP: usize = 32;
/// Slot width for exchange names.
pub const EXCH_CAP: usize = 16;
/// Slot width for instrument symbols.
pub const SYMBOL_CAP: usize = 32;
/// Slot width for event free text.
pub const TEXT_CAP: usize = 64;

const BOOK_HEADER_LEN: usize = 16;
const LEVEL_SIZE: usize = 16;

/// Errors raised while encoding or decoding wire frames.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("{field} is {len} bytes but the wire slot holds {cap}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        cap: usize,
    },
    #[error("expected a {expected} byte frame, got {actual}")]
    FrameSize { expected: usize, actual: usize },
    #[error("{field} length {len} exceeds its slot of {cap}")]
    CorruptLength {
        field: &'static str,
        len: usize,
        cap: usize,
    },
    #[error("{field} carries invalid wire value {value}")]
    BadDiscriminant { field: &'static str, value: u32 },
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("frame of {actual} bytes is shorter than the {needed} byte header")]
    Truncated { needed: usize, actual: usize },
}

impl From<CodecError> for tickbus::Error {
    fn from(err: CodecError) -> Self {
        tickbus::Error::Protocol(err.to_string())
    }
}

/// Encodes an order into its fixed 128 byte frame.
///
/// The `sequence` is assigned by the publishing side; it is not part of the
/// order itself.
pub fn encode_order(order: &Order, sequence: u32) -> Result<[u8; ORDER_SIZE], CodecError> {
    let mut frame = [0u8; ORDER_SIZE];
    put_u64(&mut frame, 0, order.created_us as u64);
    put_u32(&mut frame, 8, sequence);
    let cl_len = put_str(&mut frame, 32, CL_ORD_ID_CAP, &order.cl_ord_id, "cl_ord_id")?;
    let exch_len = put_str(&mut frame, 64, EXCH_CAP, &order.exch, "exch")?;
    let symbol_len = put_str(&mut frame, 80, SYMBOL_CAP, &order.symbol, "symbol")?;
    put_u32(&mut frame, 12, cl_len);
    put_u32(&mut frame, 16, exch_len);
    put_u32(&mut frame, 20, symbol_len);
    put_u32(&mut frame, 24, side_to_wire(order.side));
    put_u32(&mut frame, 28, u32::from(order.order_type.is_market()));
    put_f64(&mut frame, 112, order.qty);
    put_f64(&mut frame, 120, order.price);
    Ok(frame)
}

/// Decodes a 128 byte order frame.
///
/// Rejects frames of any other size, corrupt length fields, unknown
/// discriminants and non-UTF-8 string slots.
pub fn decode_order(data: &[u8]) -> Result<Order, CodecError> {
    if data.len() != ORDER_SIZE {
        return Err(CodecError::FrameSize {
            expected: ORDER_SIZE,
            actual: data.len(),
        });
    }
    let created_us = get_u64(data, 0) as i64;
    let cl_len = get_u32(data, 12);
    let exch_len = get_u32(data, 16);
    let symbol_len = get_u32(data, 20);
    let side = match get_u32(data, 24) {
        0 => Side::Buy,
        1 => Side::Sell,
        value => {
            return Err(CodecError::BadDiscriminant {
                field: "side",
                value,
            })
        }
    };
    let order_type = match get_u32(data, 28) {
        0 => OrderType::Limit,
        1 => OrderType::Market,
        value => {
            return Err(CodecError::BadDiscriminant {
                field: "is_market",
                value,
            })
        }
    };
    Ok(Order {
        cl_ord_id: get_str(data, 32, CL_ORD_ID_CAP, cl_len, "cl_ord_id")?,
        exch: get_str(data, 64, EXCH_CAP, exch_len, "exch")?,
        symbol: get_str(data, 80, SYMBOL_CAP, symbol_len, "symbol")?,
        side,
        order_type,
        qty: get_f64(data, 112),
        price: get_f64(data, 120),
        created_us,
    })
}

/// Encodes an order event into its fixed 196 byte frame.
///
/// The exchange-assigned order id never travels on the wire; it lives only
/// in the order table of the process that learned it.
pub fn encode_order_event(
    event: &OrderEvent,
    sequence: u32,
) -> Result<[u8; ORDER_EVENT_SIZE], CodecError> {
    let mut frame = [0u8; ORDER_EVENT_SIZE];
    put_u64(&mut frame, 0, event.timestamp_us as u64);
    put_u32(&mut frame, 8, sequence);
    let cl_len = put_str(&mut frame, 32, CL_ORD_ID_CAP, &event.cl_ord_id, "cl_ord_id")?;
    let exch_len = put_str(&mut frame, 64, EXCH_CAP, &event.exch, "exch")?;
    let symbol_len = put_str(&mut frame, 80, SYMBOL_CAP, &event.symbol, "symbol")?;
    let text_len = put_str(&mut frame, 132, TEXT_CAP, &event.text, "text")?;
    put_u32(&mut frame, 12, cl_len);
    put_u32(&mut frame, 16, exch_len);
    put_u32(&mut frame, 20, symbol_len);
    put_u32(&mut frame, 24, event_type_to_wire(event.event_type));
    put_f64(&mut frame, 112, event.fill_qty);
    put_f64(&mut frame, 120, event.fill_price);
    put_u32(&mut frame, 128, text_len);
    Ok(frame)
}

/// Decodes a 196 byte order event frame.
pub fn decode_order_event(data: &[u8]) -> Result<OrderEvent, CodecError> {
    if data.len() != ORDER_EVENT_SIZE {
        return Err(CodecError::FrameSize {
            expected: ORDER_EVENT_SIZE,
            actual: data.len(),
        });
    }
    let timestamp_us = get_u64(data, 0) as i64;
    let cl_len = get_u32(data, 12);
    let exch_len = get_u32(data, 16);
    let symbol_len = get_u32(data, 20);
    let event_type = match get_u32(data, 24) {
        0 => OrderEventType::Ack,
        1 => OrderEventType::Fill,
        2 => OrderEventType::Reject,
        3 => OrderEventType::Cancel,
        value => {
            return Err(CodecError::BadDiscriminant {
                field: "event_type",
                value,
            })
        }
    };
    let text_len = get_u32(data, 128);
    Ok(OrderEvent {
        cl_ord_id: get_str(data, 32, CL_ORD_ID_CAP, cl_len, "cl_ord_id")?,
        exchange_order_id: String::new(),
        exch: get_str(data, 64, EXCH_CAP, exch_len, "exch")?,
        symbol: get_str(data, 80, SYMBOL_CAP, symbol_len, "symbol")?,
        event_type,
        fill_qty: get_f64(data, 112),
        fill_price: get_f64(data, 120),
        text: get_str(data, 132, TEXT_CAP, text_len, "text")?,
        timestamp_us,
    })
}

/// Exact byte length of a book frame with the given symbol length and level
/// counts.
pub fn calculate_size(symbol_len: usize, n_bids: usize, n_asks: usize) -> usize {
    BOOK_HEADER_LEN + symbol_len + 8 + LEVEL_SIZE * (n_bids + n_asks)
}

/// Encodes a book snapshot into its variable-length frame.
///
/// Bids are written in the order they appear in the snapshot (best first),
/// then asks.
pub fn encode_book(book: &OrderBookSnapshot) -> Result<Vec<u8>, CodecError> {
    let symbol = book.symbol.as_bytes();
    if symbol.len() > SYMBOL_CAP {
        return Err(CodecError::FieldTooLong {
            field: "symbol",
            len: symbol.len(),
            cap: SYMBOL_CAP,
        });
    }
    let mut frame = Vec::with_capacity(calculate_size(symbol.len(), book.bids.len(), book.asks.len()));
    frame.extend_from_slice(&(book.timestamp_us as u64).to_le_bytes());
    frame.extend_from_slice(&book.sequence.to_le_bytes());
    frame.extend_from_slice(&(symbol.len() as u32).to_le_bytes());
    frame.extend_from_slice(symbol);
    frame.extend_from_slice(&(book.bids.len() as u32).to_le_bytes());
    frame.extend_from_slice(&(book.asks.len() as u32).to_le_bytes());
    for level in book.bids.iter().chain(book.asks.iter()) {
        frame.extend_from_slice(&level.price.to_le_bytes());
        frame.extend_from_slice(&level.qty.to_le_bytes());
    }
    Ok(frame)
}

/// Decodes a book frame.
///
/// The frame length must match [`calculate_size`] for the counts it carries
/// exactly; anything shorter or longer is rejected.
pub fn decode_book(data: &[u8]) -> Result<OrderBookSnapshot, CodecError> {
    if data.len() < BOOK_HEADER_LEN {
        return Err(CodecError::Truncated {
            needed: BOOK_HEADER_LEN,
            actual: data.len(),
        });
    }
    let timestamp_us = get_u64(data, 0) as i64;
    let sequence = get_u32(data, 8);
    let symbol_len = get_u32(data, 12) as usize;
    if symbol_len > SYMBOL_CAP {
        return Err(CodecError::CorruptLength {
            field: "symbol",
            len: symbol_len,
            cap: SYMBOL_CAP,
        });
    }
    let counts_at = BOOK_HEADER_LEN + symbol_len;
    if data.len() < counts_at + 8 {
        return Err(CodecError::Truncated {
            needed: counts_at + 8,
            actual: data.len(),
        });
    }
    let symbol = String::from_utf8(data[BOOK_HEADER_LEN..counts_at].to_vec())
        .map_err(|_| CodecError::InvalidUtf8 { field: "symbol" })?;
    let n_bids = get_u32(data, counts_at) as usize;
    let n_asks = get_u32(data, counts_at + 4) as usize;
    let expected = calculate_size(symbol_len, n_bids, n_asks);
    if data.len() != expected {
        return Err(CodecError::FrameSize {
            expected,
            actual: data.len(),
        });
    }
    let mut offset = counts_at + 8;
    let mut read_levels = |count: usize| {
        let mut levels = Vec::with_capacity(count);
        for _ in 0..count {
            levels.push(BookLevel::new(get_f64(data, offset), get_f64(data, offset + 8)));
            offset += LEVEL_SIZE;
        }
        levels
    };
    let bids = read_levels(n_bids);
    let asks = read_levels(n_asks);
    Ok(OrderBookSnapshot {
        symbol,
        sequence,
        timestamp_us,
        bids,
        asks,
    })
}

/// Clips a string to at most `cap` bytes without splitting a UTF-8 sequence.
///
/// Used when free text has to fit a fixed wire slot.
pub fn clip_str(value: &str, cap: usize) -> &str {
    if value.len() <= cap {
        return value;
    }
    let mut end = cap;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn side_to_wire(side: Side) -> u32 {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

fn event_type_to_wire(event_type: OrderEventType) -> u32 {
    match event_type {
        OrderEventType::Ack => 0,
        OrderEventType::Fill => 1,
        OrderEventType::Reject => 2,
        OrderEventType::Cancel => 3,
    }
}

fn put_str(
    frame: &mut [u8],
    offset: usize,
    cap: usize,
    value: &str,
    field: &'static str,
) -> Result<u32, CodecError> {
    let bytes = value.as_bytes();
    if bytes.len() > cap {
        return Err(CodecError::FieldTooLong {
            field,
            len: bytes.len(),
            cap,
        });
    }
    frame[offset..offset + bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len() as u32)
}

fn get_str(
    data: &[u8],
    offset: usize,
    cap: usize,
    len: u32,
    field: &'static str,
) -> Result<String, CodecError> {
    let len = len as usize;
    if len > cap {
        return Err(CodecError::CorruptLength { field, len, cap });
    }
    String::from_utf8(data[offset..offset + len].to_vec())
        .map_err(|_| CodecError::InvalidUtf8 { field })
}

fn put_u32(frame: &mut [u8], offset: usize, value: u32) {
    frame[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(frame: &mut [u8], offset: usize, value: u64) {
    frame[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn put_f64(frame: &mut [u8], offset: usize, value: f64) {
    frame[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(data: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn get_u64(data: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

fn get_f64(data: &[u8], offset: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[offset..offset + 8]);
    f64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order::limit(
            "TEST1",
            "BINANCE",
            "BTCUSDT",
            Side::Buy,
            0.1,
            50000.0,
            1_700_000_000_000_000,
        )
    }

    #[test]
    fn order_round_trip() {
        let order = sample_order();
        let frame = encode_order(&order, 7).unwrap();
        assert_eq!(frame.len(), ORDER_SIZE);
        assert_eq!(get_u32(&frame, 8), 7);
        assert_eq!(get_u32(&frame, 24), 0);
        assert_eq!(get_u32(&frame, 28), 0);
        let decoded = decode_order(&frame).unwrap();
        assert_eq!(decoded, order);
    }

    #[test]
    fn market_order_round_trip() {
        let order = Order::market("M1", "SIM", "ETHUSDT", Side::Sell, 2.5, 1_700_000_000_000_001);
        let frame = encode_order(&order, 1).unwrap();
        assert_eq!(get_u32(&frame, 24), 1);
        assert_eq!(get_u32(&frame, 28), 1);
        let decoded = decode_order(&frame).unwrap();
        assert_eq!(decoded.order_type, OrderType::Market);
        assert_eq!(decoded.price, 0.0);
        assert_eq!(decoded, order);
    }

    #[test]
    fn order_frames_have_exactly_one_size() {
        let frame = encode_order(&sample_order(), 0).unwrap();
        assert_eq!(
            decode_order(&frame[..127]),
            Err(CodecError::FrameSize {
                expected: ORDER_SIZE,
                actual: 127
            })
        );
        let mut long = frame.to_vec();
        long.push(0);
        assert_eq!(
            decode_order(&long),
            Err(CodecError::FrameSize {
                expected: ORDER_SIZE,
                actual: 129
            })
        );
    }

    #[test]
    fn full_width_fields_round_trip() {
        let order = Order::limit(
            "a".repeat(32),
            "b".repeat(16),
            "c".repeat(32),
            Side::Sell,
            1.0,
            10.0,
            1,
        );
        let decoded = decode_order(&encode_order(&order, 0).unwrap()).unwrap();
        assert_eq!(decoded, order);
    }

    #[test]
    fn oversized_fields_are_rejected_not_truncated() {
        let order = Order::limit("x".repeat(33), "SIM", "BTCUSDT", Side::Buy, 1.0, 1.0, 0);
        assert_eq!(
            encode_order(&order, 0),
            Err(CodecError::FieldTooLong {
                field: "cl_ord_id",
                len: 33,
                cap: CL_ORD_ID_CAP
            })
        );
        let order = Order::limit("A", "e".repeat(17), "BTCUSDT", Side::Buy, 1.0, 1.0, 0);
        assert!(matches!(
            encode_order(&order, 0),
            Err(CodecError::FieldTooLong { field: "exch", .. })
        ));
    }

    #[test]
    fn corrupt_length_field_is_rejected() {
        let mut frame = encode_order(&sample_order(), 0).unwrap();
        put_u32(&mut frame, 12, 33);
        assert_eq!(
            decode_order(&frame),
            Err(CodecError::CorruptLength {
                field: "cl_ord_id",
                len: 33,
                cap: CL_ORD_ID_CAP
            })
        );
    }

    #[test]
    fn codec_errors_convert_to_protocol_errors() {
        let err = decode_order(&[0u8; 5]).unwrap_err();
        let converted: tickbus::Error = err.into();
        assert!(matches!(&converted, tickbus::Error::Protocol(text) if text.contains("128")));
    }

    #[test]
    fn unknown_side_is_rejected() {
        let mut frame = encode_order(&sample_order(), 0).unwrap();
        put_u32(&mut frame, 24, 2);
        assert_eq!(
            decode_order(&frame),
            Err(CodecError::BadDiscriminant {
                field: "side",
                value: 2
            })
        );
    }

    #[test]
    fn non_boolean_is_market_is_rejected() {
        let mut frame = encode_order(&sample_order(), 0).unwrap();
        put_u32(&mut frame, 28, 7);
        assert_eq!(
            decode_order(&frame),
            Err(CodecError::BadDiscriminant {
                field: "is_market",
                value: 7
            })
        );
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut frame = encode_order(&sample_order(), 0).unwrap();
        frame[32] = 0xff;
        frame[33] = 0xfe;
        assert_eq!(
            decode_order(&frame),
            Err(CodecError::InvalidUtf8 { field: "cl_ord_id" })
        );
    }

    #[test]
    fn event_round_trip_with_text() {
        let event = OrderEvent::reject(
            "TEST1",
            "BINANCE",
            "BTCUSDT",
            "Rate limit exceeded",
            1_700_000_000_000_123,
        );
        let frame = encode_order_event(&event, 42).unwrap();
        assert_eq!(frame.len(), ORDER_EVENT_SIZE);
        assert_eq!(get_u32(&frame, 8), 42);
        assert_eq!(get_u32(&frame, 24), 2);
        assert_eq!(get_u32(&frame, 28), 0);
        let decoded = decode_order_event(&frame).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn exchange_order_id_stays_off_the_wire() {
        let event = OrderEvent::ack("TEST1", "SIM-77", "SIM", "BTCUSDT", 5);
        let decoded = decode_order_event(&encode_order_event(&event, 0).unwrap()).unwrap();
        assert_eq!(decoded.exchange_order_id, "");
        assert_eq!(decoded.cl_ord_id, "TEST1");
        assert_eq!(decoded.event_type, OrderEventType::Ack);
    }

    #[test]
    fn event_frames_have_exactly_one_size() {
        let event = OrderEvent::cancel("TEST1", "SIM", "BTCUSDT", 0);
        let frame = encode_order_event(&event, 0).unwrap();
        assert!(matches!(
            decode_order_event(&frame[..ORDER_SIZE]),
            Err(CodecError::FrameSize { .. })
        ));
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let event = OrderEvent::fill("TEST1", "SIM", "BTCUSDT", 1.0, 10.0, 0);
        let mut frame = encode_order_event(&event, 0).unwrap();
        put_u32(&mut frame, 24, 9);
        assert_eq!(
            decode_order_event(&frame),
            Err(CodecError::BadDiscriminant {
                field: "event_type",
                value: 9
            })
        );
    }

    #[test]
    fn oversized_event_text_is_rejected() {
        let event = OrderEvent::reject("TEST1", "SIM", "BTCUSDT", "y".repeat(65), 0);
        assert_eq!(
            encode_order_event(&event, 0),
            Err(CodecError::FieldTooLong {
                field: "text",
                len: 65,
                cap: TEXT_CAP
            })
        );
    }

    #[test]
    fn book_round_trip_preserves_level_order() {
        let mut book = OrderBookSnapshot::new("BTCUSDT", 9, 1_700_000_000_000_000);
        book.bids = vec![
            BookLevel::new(50000.0, 1.5),
            BookLevel::new(49999.5, 2.0),
            BookLevel::new(49999.0, 0.25),
        ];
        book.asks = vec![BookLevel::new(50000.5, 1.0), BookLevel::new(50001.0, 3.0)];
        let frame = encode_book(&book).unwrap();
        assert_eq!(frame.len(), calculate_size(7, 3, 2));
        let decoded = decode_book(&frame).unwrap();
        assert_eq!(decoded, book);
    }

    #[test]
    fn empty_book_round_trips() {
        let book = OrderBookSnapshot::new("ETHUSDT", 0, 1);
        let frame = encode_book(&book).unwrap();
        assert_eq!(frame.len(), calculate_size(7, 0, 0));
        assert_eq!(decode_book(&frame).unwrap(), book);
    }

    #[test]
    fn book_frame_length_must_match_counts() {
        let mut book = OrderBookSnapshot::new("BTCUSDT", 1, 2);
        book.bids = vec![BookLevel::new(10.0, 1.0)];
        let frame = encode_book(&book).unwrap();
        assert!(matches!(
            decode_book(&frame[..frame.len() - 1]),
            Err(CodecError::FrameSize { .. })
        ));
        let mut long = frame.clone();
        long.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            decode_book(&long),
            Err(CodecError::FrameSize { .. })
        ));
    }

    #[test]
    fn truncated_book_header_is_rejected() {
        assert_eq!(
            decode_book(&[0u8; 10]),
            Err(CodecError::Truncated {
                needed: BOOK_HEADER_LEN,
                actual: 10
            })
        );
    }

    #[test]
    fn oversized_book_symbol_is_rejected() {
        let book = OrderBookSnapshot::new("s".repeat(33), 0, 0);
        assert!(matches!(
            encode_book(&book),
            Err(CodecError::FieldTooLong { field: "symbol", .. })
        ));
    }

    #[test]
    fn calculate_size_matches_layout() {
        assert_eq!(calculate_size(0, 0, 0), 24);
        assert_eq!(calculate_size(7, 3, 2), 24 + 7 + 80);
    }

    #[test]
    fn clip_str_respects_char_boundaries() {
        assert_eq!(clip_str("short", 64), "short");
        assert_eq!(clip_str("abcdef", 3), "abc");
        // One four-byte scalar; a naive cut at 6 would split it.
        assert_eq!(clip_str("ab\u{1F600}cd", 5), "ab");
        assert_eq!(clip_str("ab\u{1F600}cd", 6), "ab\u{1F600}");
    }
}
