//! Periodic refresh pipeline
//!
//! Provides:
//! - `PeriodicTimer` polled by the foreground loop (fetch tick, reaper tick)
//! - Background `Worker` fetching a watchlist snapshot under a hard deadline
//! - `Engine` applying the freshness guard and repainting the view

mod engine;
mod timer;
mod worker;

pub use engine::{
    BatchDisposition, Engine, EngineConfig, RefreshMode, TickOutcome, FETCH_PERIOD, INVALID_DATA,
    OUTDATED_DATA, REAPER_PERIOD,
};
pub use timer::PeriodicTimer;
pub use worker::{fetch_batch, Batch, BatchOrigin, Worker};
