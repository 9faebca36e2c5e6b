//! Quote retrieval
//!
//! Provides:
//! - `QuoteSource` capability describing a vendor (URL, payload sentinel, field map)
//! - `QuoteClient` performing one HTTP request per symbol
//! - `QuoteRecord` generic key/value record

mod client;
mod record;
mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{decode_payload, FetchOutcome, QuoteClient, DEFAULT_REQUEST_TIMEOUT};
pub use record::{QuoteRecord, REQUIRED_FIELDS};
pub use source::{QuoteSource, XueqiuSource, CANONICAL_FIELDS, XUEQIU_SENTINEL};
