//! Vendor description: where to fetch a quote and how to read the reply

use std::collections::HashMap;
use url::form_urlencoded;

/// Everything the client needs to know about a quote vendor.
///
/// `field_map` maps canonical field names (the keys the formatter reads) to
/// the vendor's own key names. Vendors whose payload already uses canonical
/// names return an identity map.
pub trait QuoteSource: Send + Sync + std::fmt::Debug {
    /// Request URL for a single symbol, with the symbol percent-encoded
    fn url_for(&self, symbol: &str) -> String;

    /// Literal byte sequence locating the JSON array of records. It must end
    /// with the array's opening bracket.
    fn payload_sentinel(&self) -> &[u8];

    fn field_map(&self) -> HashMap<&'static str, &'static str>;
}

const XUEQIU_QUOTE_URL: &str = "https://stock.xueqiu.com/v5/stock/realtime/quotec.json";

/// Bytes preceding the record array in a Xueqiu reply
pub const XUEQIU_SENTINEL: &[u8] = br#"data":["#;

/// Canonical fields understood by the formatter
pub const CANONICAL_FIELDS: [&str; 15] = [
    "symbol",
    "current",
    "percent",
    "chg",
    "volume",
    "amount",
    "market_capital",
    "float_market_capital",
    "turnover_rate",
    "amplitude",
    "open",
    "last_close",
    "high",
    "low",
    "avg_price",
];

/// Xueqiu realtime quote endpoint (CN vendor)
#[derive(Debug, Clone, Default)]
pub struct XueqiuSource;

impl QuoteSource for XueqiuSource {
    fn url_for(&self, symbol: &str) -> String {
        with_symbol_query(XUEQIU_QUOTE_URL, symbol)
    }

    fn payload_sentinel(&self) -> &[u8] {
        XUEQIU_SENTINEL
    }

    fn field_map(&self) -> HashMap<&'static str, &'static str> {
        CANONICAL_FIELDS.iter().map(|field| (*field, *field)).collect()
    }
}

/// Append `?symbol=<symbol>` to `base`, form-urlencoding the symbol
pub fn with_symbol_query(base: &str, symbol: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(symbol.as_bytes()).collect();
    format!("{base}?symbol={encoded}")
}
