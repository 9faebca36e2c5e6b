/// Stock Monitor - terminal stock watchlist
///
/// The library holds everything the `stock-monitor` binary drives:
/// - Quote retrieval from the vendor endpoint
/// - Formatting and the render buffer behind the table view
/// - The refresh engine (timers, background worker, freshness guard)
/// - Watchlist, persisted config and the host-side command layer
pub mod app;
pub mod config;
pub mod error;
pub mod quote;
pub mod refresh;
pub mod status;
pub mod view;
pub mod watchlist;

// Re-export commonly used types for convenience
pub use app::{App, Command, InputMode};
pub use config::Config;
pub use error::{ConfigError, FetchFailure, FormatError};
pub use quote::{FetchOutcome, QuoteClient, QuoteRecord, QuoteSource, XueqiuSource};
pub use refresh::{Batch, BatchDisposition, Engine, EngineConfig, RefreshMode};
pub use status::StatusLog;
pub use view::{format_record, ColorPolicy, DisplayRow, PriceColor, RenderBuffer};
pub use watchlist::Watchlist;
