//! Refresh scheduler
//!
//! The engine owns the refresh state (latest rendered rows, data timestamp,
//! the fetch and reaper timers) and the in-flight workers. Everything here
//! runs on the foreground; workers only ever talk back through the batch
//! channel, which is drained once per UI loop iteration.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::timer::PeriodicTimer;
use super::worker::{fetch_batch, Batch, BatchOrigin, Worker};
use crate::config::Config;
use crate::quote::QuoteClient;
use crate::status::StatusLog;
use crate::view::{format_record, ColorPolicy, DisplayRow, RenderBuffer};
use crate::watchlist::Watchlist;

pub const FETCH_PERIOD: Duration = Duration::from_secs(10);
pub const REAPER_PERIOD: Duration = Duration::from_secs(10 * 6 * 3);

pub const OUTDATED_DATA: &str = "Outdated data received";
pub const INVALID_DATA: &str = "Invalid data received";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub fetch_period: Duration,
    pub reaper_period: Duration,
    /// Hard cap on a background worker's lifetime
    pub worker_deadline: Duration,
    pub color_policy: ColorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            fetch_period: FETCH_PERIOD,
            reaper_period: REAPER_PERIOD,
            worker_deadline: config.worker_deadline(),
            color_policy: config.color_policy(),
        }
    }
}

impl EngineConfig {
    pub fn with_fetch_period(mut self, period: Duration) -> Self {
        self.fetch_period = period;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Fetch on the calling task and render before returning
    Inline,
    /// Spawn a worker; its batch is rendered when drained
    Background,
}

/// What happened to a batch handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDisposition {
    /// Repainted with this many rows
    Rendered(usize),
    /// Accepted but no row survived formatting; view left as is
    Empty,
    /// Dispatched before the data currently shown
    Outdated,
    /// Arrived after refresh was stopped
    Stopped,
}

/// Timers fired by one [`Engine::tick`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub dispatched: bool,
    pub reaped: usize,
}

#[derive(Debug, Default)]
struct RefreshState {
    latest_data: Vec<DisplayRow>,
    data_timestamp: Option<DateTime<Utc>>,
    fetch_timer: Option<PeriodicTimer>,
    reaper_timer: Option<PeriodicTimer>,
}

#[derive(Debug)]
pub struct Engine {
    client: QuoteClient,
    config: EngineConfig,
    state: RefreshState,
    status: StatusLog,
    workers: Vec<Worker>,
    next_worker_id: u64,
    batch_tx: mpsc::UnboundedSender<Batch>,
    batch_rx: mpsc::UnboundedReceiver<Batch>,
}

impl Engine {
    pub fn new(client: QuoteClient, config: EngineConfig, status: StatusLog) -> Self {
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        Self {
            client,
            config,
            state: RefreshState::default(),
            status,
            workers: Vec::new(),
            next_worker_id: 0,
            batch_tx,
            batch_rx,
        }
    }

    pub fn client(&self) -> &QuoteClient {
        &self.client
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> &StatusLog {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusLog {
        &mut self.status
    }

    /// Whether the fetch timer is active
    pub fn is_running(&self) -> bool {
        self.state.fetch_timer.is_some()
    }

    pub fn data_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.data_timestamp
    }

    pub fn latest_data(&self) -> &[DisplayRow] {
        &self.state.latest_data
    }

    pub fn in_flight(&self) -> usize {
        self.workers.len()
    }

    /// Enter the running state: (re)create both timers, then fetch once inline.
    pub async fn start(&mut self, now: Instant, watchlist: &Watchlist, view: &mut RenderBuffer) {
        self.cancel_timers();
        self.state.fetch_timer = Some(PeriodicTimer::start(now, self.config.fetch_period));
        self.state.reaper_timer = Some(PeriodicTimer::start(now, self.config.reaper_period));
        info!(
            fetch_secs = self.config.fetch_period.as_secs(),
            reaper_secs = self.config.reaper_period.as_secs(),
            "Auto-refresh started"
        );

        self.redraw(view);
        self.refresh(RefreshMode::Inline, watchlist, view).await;
    }

    /// Cancel both timers and redraw the last batch with the header showing OFF
    pub fn stop(&mut self, view: &mut RenderBuffer) {
        if self.cancel_timers() {
            info!("Auto-refresh stopped");
        }
        self.redraw(view);
    }

    /// View is closing: stop and abort every in-flight worker
    pub fn shutdown(&mut self, view: &mut RenderBuffer) {
        self.stop(view);
        for worker in self.workers.drain(..) {
            worker.abort();
        }
        while self.batch_rx.try_recv().is_ok() {}
    }

    fn cancel_timers(&mut self) -> bool {
        let was_running = self.state.fetch_timer.is_some();
        self.state.fetch_timer = None;
        self.state.reaper_timer = None;
        was_running
    }

    /// Repaint the latest rows so the header matches the timer state
    fn redraw(&self, view: &mut RenderBuffer) {
        let refreshed_at = self
            .state
            .data_timestamp
            .map(|time| time.with_timezone(&Local))
            .or(view.refreshed_at())
            .unwrap_or_else(Local::now);
        view.repaint(self.state.latest_data.clone(), refreshed_at, self.is_running());
    }

    /// Refresh the watchlist, either inline or on a background worker.
    pub async fn refresh(&mut self, mode: RefreshMode, watchlist: &Watchlist, view: &mut RenderBuffer) {
        match mode {
            RefreshMode::Inline => {
                let symbols = watchlist.snapshot();
                let dispatched_at = Utc::now();
                let (records, failures) = fetch_batch(&self.client, &symbols).await;
                let batch = Batch {
                    origin: BatchOrigin::Inline,
                    dispatched_at,
                    records,
                    failures,
                };
                self.on_batch(batch, view);
            }
            RefreshMode::Background => self.dispatch(watchlist, Instant::now()),
        }
    }

    /// Spawn a worker for the current watchlist snapshot
    pub fn dispatch(&mut self, watchlist: &Watchlist, now: Instant) {
        let symbols = watchlist.snapshot();
        if symbols.is_empty() {
            debug!("Watchlist empty, nothing to fetch");
            return;
        }

        self.next_worker_id += 1;
        let worker = Worker::spawn(
            self.next_worker_id,
            self.client.detached(),
            symbols,
            Utc::now(),
            self.config.worker_deadline,
            self.batch_tx.clone(),
            now,
        );
        debug!(worker = worker.id(), in_flight = self.workers.len() + 1, "Dispatched worker");
        self.workers.push(worker);
    }

    /// Poll both timers
    pub fn tick(&mut self, now: Instant, watchlist: &Watchlist) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if self.state.fetch_timer.as_mut().is_some_and(|timer| timer.poll(now)) {
            self.dispatch(watchlist, now);
            outcome.dispatched = true;
        }
        if self.state.reaper_timer.as_mut().is_some_and(|timer| timer.poll(now)) {
            outcome.reaped = self.reap(now);
        }

        outcome
    }

    /// Drop finished workers and abort those past their deadline.
    ///
    /// Returns how many workers were aborted.
    pub fn reap(&mut self, now: Instant) -> usize {
        let deadline = self.config.worker_deadline;
        let before = self.workers.len();
        let mut aborted = 0;

        self.workers.retain(|worker| {
            if worker.is_finished() {
                return false;
            }
            if worker.is_overdue(now, deadline) {
                warn!(worker = worker.id(), "Reaping hung worker");
                worker.abort();
                aborted += 1;
                return false;
            }
            true
        });

        debug!(before, after = self.workers.len(), aborted, "Reaper pass");
        aborted
    }

    /// Hand every batch returned by workers so far to [`on_batch`](Self::on_batch)
    pub fn drain_batches(&mut self, view: &mut RenderBuffer) -> Vec<BatchDisposition> {
        let mut dispositions = Vec::new();
        while let Ok(batch) = self.batch_rx.try_recv() {
            dispositions.push(self.on_batch(batch, view));
        }
        dispositions
    }

    /// Foreground callback for a finished batch, guarded by the data timestamp.
    pub fn on_batch(&mut self, batch: Batch, view: &mut RenderBuffer) -> BatchDisposition {
        if batch.origin == BatchOrigin::Background && !self.is_running() {
            debug!(dispatched_at = %batch.dispatched_at, "Refresh stopped, discarding batch");
            return BatchDisposition::Stopped;
        }

        if self
            .state
            .data_timestamp
            .is_some_and(|shown| batch.dispatched_at < shown)
        {
            warn!(dispatched_at = %batch.dispatched_at, "{}", OUTDATED_DATA);
            self.status.push(OUTDATED_DATA);
            return BatchDisposition::Outdated;
        }
        self.state.data_timestamp = Some(batch.dispatched_at);

        for (symbol, failure) in &batch.failures {
            self.status.push(format!("{symbol}: {failure}"));
        }

        let rows: Vec<DisplayRow> = batch
            .records
            .iter()
            .filter_map(|record| match format_record(record, self.config.color_policy) {
                Ok(row) => Some(row),
                Err(_) => {
                    self.status.push(INVALID_DATA);
                    None
                }
            })
            .collect();

        if rows.is_empty() {
            debug!("Empty batch, keeping previous view");
            return BatchDisposition::Empty;
        }

        let count = rows.len();
        self.state.latest_data = rows.clone();
        view.repaint(rows, batch.dispatched_at.with_timezone(&Local), self.is_running());
        BatchDisposition::Rendered(count)
    }

    /// Append a row added by the user, keeping the latest batch in step with the view.
    ///
    /// Batches dispatched before the edit carry the old watchlist and become outdated.
    pub fn append_row(&mut self, row: DisplayRow, view: &mut RenderBuffer) {
        self.mark_edited();
        self.state.latest_data.push(row.clone());
        view.append_row(row);
    }

    /// Remove a row by symbol from both the latest batch and the view
    pub fn remove_row(&mut self, symbol: &str, view: &mut RenderBuffer) -> bool {
        self.mark_edited();
        if let Some(index) = self
            .state
            .latest_data
            .iter()
            .position(|row| row.matches_symbol(symbol))
        {
            self.state.latest_data.remove(index);
        }
        view.remove_row_by_symbol(symbol)
    }

    /// Advance the data timestamp to now, never backwards
    fn mark_edited(&mut self) {
        let now = Utc::now();
        self.state.data_timestamp = Some(self.state.data_timestamp.map_or(now, |shown| shown.max(now)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::testing::{quote_body, LocalSource, MockReply, MockServer};
    use crate::quote::QuoteRecord;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Arc;

    fn record(symbol: &str, chg: f64) -> QuoteRecord {
        serde_json::from_value(json!({
            "symbol": symbol, "current": 85.10, "percent": 1.23, "chg": chg,
            "volume": 12345678, "amount": 1050000000, "market_capital": 220000000000u64,
            "float_market_capital": 210000000000u64, "turnover_rate": 0.45,
            "amplitude": 2.10, "open": 84.00, "last_close": 84.05, "high": 85.50,
            "low": 83.80, "avg_price": 84.70
        }))
        .unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn engine_with(client: QuoteClient) -> Engine {
        Engine::new(client, EngineConfig::default(), StatusLog::new(true))
    }

    fn running_engine() -> Engine {
        running_engine_at(QuoteClient::new(), Instant::now())
    }

    fn running_engine_at(client: QuoteClient, now: Instant) -> Engine {
        let mut engine = engine_with(client);
        engine.state.fetch_timer = Some(PeriodicTimer::start(now, FETCH_PERIOD));
        engine.state.reaper_timer = Some(PeriodicTimer::start(now, REAPER_PERIOD));
        engine
    }

    fn row(symbol: &str) -> DisplayRow {
        format_record(&record(symbol, 1.0), ColorPolicy::default()).unwrap()
    }

    #[test]
    fn test_late_batch_is_discarded() {
        let mut engine = running_engine();
        let mut view = RenderBuffer::new();

        let b = Batch::background(at(101), vec![record("BBB", 1.0)]);
        let a = Batch::background(at(100), vec![record("AAA", 1.0)]);

        assert_eq!(engine.on_batch(b, &mut view), BatchDisposition::Rendered(1));
        assert_eq!(engine.on_batch(a, &mut view), BatchDisposition::Outdated);

        assert_eq!(engine.data_timestamp(), Some(at(101)));
        assert_eq!(view.symbols(), vec!["BBB"]);
        assert_eq!(engine.status().count(OUTDATED_DATA), 1);
    }

    #[test]
    fn test_equal_timestamp_is_accepted() {
        let mut engine = running_engine();
        let mut view = RenderBuffer::new();

        engine.on_batch(Batch::background(at(100), vec![record("AAA", 1.0)]), &mut view);
        let disposition = engine.on_batch(Batch::background(at(100), vec![record("BBB", 1.0)]), &mut view);

        assert_eq!(disposition, BatchDisposition::Rendered(1));
        assert_eq!(view.symbols(), vec!["BBB"]);
    }

    #[test]
    fn test_empty_batch_keeps_view() {
        let mut engine = running_engine();
        let mut view = RenderBuffer::new();
        engine.on_batch(Batch::background(at(100), vec![record("AAA", 1.0)]), &mut view);

        let mut invalid = record("BBB", 1.0);
        invalid.insert("high", serde_json::Value::Null);
        let disposition = engine.on_batch(Batch::background(at(101), vec![invalid]), &mut view);

        assert_eq!(disposition, BatchDisposition::Empty);
        assert_eq!(view.symbols(), vec!["AAA"]);
        assert_eq!(engine.status().count(INVALID_DATA), 1);
        // timestamp only moves forward
        assert_eq!(engine.data_timestamp(), Some(at(101)));
    }

    #[test]
    fn test_background_batch_after_stop_is_ignored() {
        let mut engine = running_engine();
        let mut view = RenderBuffer::new();
        engine.on_batch(Batch::background(at(100), vec![record("AAA", 1.0)]), &mut view);

        engine.stop(&mut view);
        assert!(!view.is_auto_refresh());
        assert_eq!(view.symbols(), vec!["AAA"]);

        let disposition = engine.on_batch(Batch::background(at(200), vec![record("BBB", 1.0)]), &mut view);
        assert_eq!(disposition, BatchDisposition::Stopped);
        assert_eq!(view.symbols(), vec!["AAA"]);
        assert_eq!(engine.data_timestamp(), Some(at(100)));
    }

    #[test]
    fn test_rows_colored_by_policy() {
        let mut engine = running_engine();
        let mut view = RenderBuffer::new();

        engine.on_batch(
            Batch::background(at(1), vec![record("UP", 1.05), record("DOWN", -0.5)]),
            &mut view,
        );

        let colors: Vec<_> = view.rows().iter().map(|row| row.color).collect();
        assert_eq!(colors, vec![crate::view::PriceColor::Red, crate::view::PriceColor::Green]);
    }

    #[tokio::test]
    async fn test_start_fetches_inline_and_shows_on() {
        let server = MockServer::start(|symbol| MockReply::ok(quote_body(symbol, 1.05, 1.23))).await;
        let mut engine = engine_with(QuoteClient::with_source(Arc::new(LocalSource::new(server.addr()))));
        let mut view = RenderBuffer::new();
        let watchlist = Watchlist::new(["BABA", "0700.HK"]);

        engine.start(Instant::now(), &watchlist, &mut view).await;

        assert!(engine.is_running());
        assert!(view.is_auto_refresh());
        assert_eq!(view.symbols(), vec!["BABA", "0700.HK"]);
        assert_eq!(view.rows()[0].cells[4], "12,345,678");
    }

    #[tokio::test]
    async fn test_partial_failure_renders_remaining_rows() {
        let server = MockServer::start(|symbol| match symbol {
            "BBB" => MockReply::Stall,
            other => MockReply::ok(quote_body(other, 1.0, 1.0)),
        })
        .await;
        let client = QuoteClient::with_source(Arc::new(LocalSource::new(server.addr())))
            .with_timeout(Duration::from_millis(200));
        let mut engine = engine_with(client);
        let mut view = RenderBuffer::new();
        let watchlist = Watchlist::new(["AAA", "BBB", "CCC"]);

        engine.start(Instant::now(), &watchlist, &mut view).await;

        assert_eq!(view.symbols(), vec!["AAA", "CCC"]);
        assert_eq!(watchlist.symbols(), ["AAA", "BBB", "CCC"]);
        assert_eq!(engine.status().count("BBB: request timed out"), 1);
    }

    #[tokio::test]
    async fn test_tick_dispatches_worker_and_drain_renders() {
        let server = MockServer::start(|symbol| MockReply::ok(quote_body(symbol, -0.5, -0.6))).await;
        let mut engine = engine_with(QuoteClient::with_source(Arc::new(LocalSource::new(server.addr()))));
        let mut view = RenderBuffer::new();
        let watchlist = Watchlist::new(["BABA"]);

        let start = Instant::now();
        engine.start(start, &watchlist, &mut view).await;
        let first = engine.data_timestamp().unwrap();

        let outcome = engine.tick(start + FETCH_PERIOD, &watchlist);
        assert!(outcome.dispatched);
        assert_eq!(engine.in_flight(), 1);

        let mut attempts = 0;
        let dispositions = loop {
            let drained = engine.drain_batches(&mut view);
            attempts += 1;
            if !drained.is_empty() || attempts == 100 {
                break drained;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        };

        assert_eq!(dispositions, vec![BatchDisposition::Rendered(1)]);
        assert!(engine.data_timestamp().unwrap() >= first);
    }

    #[tokio::test]
    async fn test_reaper_aborts_hung_worker() {
        let server = MockServer::start(|_| MockReply::Stall).await;
        let mut engine = engine_with(QuoteClient::with_source(Arc::new(LocalSource::new(server.addr()))));
        let watchlist = Watchlist::new(["BABA"]);

        let start = Instant::now();
        engine.dispatch(&watchlist, start);
        assert_eq!(engine.in_flight(), 1);

        // not yet overdue
        assert_eq!(engine.reap(start + Duration::from_secs(1)), 0);
        assert_eq!(engine.in_flight(), 1);

        let deadline = engine.config().worker_deadline;
        assert_eq!(engine.reap(start + deadline), 1);
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn test_batch_dispatched_before_append_is_outdated() {
        let mut engine = running_engine();
        let mut view = RenderBuffer::new();
        let dispatched = Utc::now() - chrono::Duration::seconds(1);
        engine.on_batch(Batch::background(at(100), vec![record("BABA", 1.0)]), &mut view);

        engine.append_row(row("0700.HK"), &mut view);
        assert!(engine.data_timestamp() >= Some(dispatched));

        let stale = Batch::background(dispatched, vec![record("BABA", 1.0)]);
        assert_eq!(engine.on_batch(stale, &mut view), BatchDisposition::Outdated);
        assert_eq!(view.symbols(), vec!["BABA", "0700.HK"]);
        assert_eq!(engine.latest_data().len(), 2);
    }

    #[test]
    fn test_batch_dispatched_before_remove_is_outdated() {
        let mut engine = running_engine();
        let mut view = RenderBuffer::new();
        engine.on_batch(
            Batch::background(at(100), vec![record("BABA", 1.0), record("AAPL", 1.0)]),
            &mut view,
        );
        let dispatched = Utc::now() - chrono::Duration::seconds(1);

        assert!(engine.remove_row("baba", &mut view));

        let stale = Batch::background(dispatched, vec![record("BABA", 1.0), record("AAPL", 1.0)]);
        assert_eq!(engine.on_batch(stale, &mut view), BatchDisposition::Outdated);
        assert_eq!(view.symbols(), vec!["AAPL"]);
        assert_eq!(engine.latest_data().len(), 1);
    }

    #[test]
    fn test_edit_never_moves_timestamp_backwards() {
        let mut engine = running_engine();
        let mut view = RenderBuffer::new();
        let future = Utc::now() + chrono::Duration::hours(1);
        engine.on_batch(Batch::background(future, vec![record("BABA", 1.0)]), &mut view);

        engine.append_row(row("AAPL"), &mut view);
        assert_eq!(engine.data_timestamp(), Some(future));
    }

    #[tokio::test]
    async fn test_reaper_tick_aborts_hung_worker() {
        let server = MockServer::start(|_| MockReply::Stall).await;
        let client = QuoteClient::with_source(Arc::new(LocalSource::new(server.addr())));
        let start = Instant::now();
        let mut engine = running_engine_at(client, start);
        let watchlist = Watchlist::new(["BABA"]);

        engine.dispatch(&watchlist, start);
        assert!(engine.config().worker_deadline <= REAPER_PERIOD);

        let early = engine.tick(start + Duration::from_secs(1), &watchlist);
        assert_eq!(early, TickOutcome::default());

        // fetch timer fires first and dispatches a fresh worker, then the
        // reaper collects the one spawned at `start`
        let outcome = engine.tick(start + REAPER_PERIOD, &watchlist);
        assert_eq!(outcome, TickOutcome { dispatched: true, reaped: 1 });
        assert_eq!(engine.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_start_with_huge_fetch_period() {
        let config = EngineConfig::default().with_fetch_period(Duration::from_secs(u64::MAX));
        let mut engine = Engine::new(QuoteClient::new(), config, StatusLog::new(true));
        let mut view = RenderBuffer::new();

        engine.start(Instant::now(), &Watchlist::default(), &mut view).await;

        assert!(engine.is_running());
        assert_eq!(engine.tick(Instant::now(), &Watchlist::new(["BABA"])), TickOutcome::default());
    }

    #[test]
    fn test_stopped_engine_ticks_nothing() {
        let mut engine = engine_with(QuoteClient::new());
        let outcome = engine.tick(Instant::now() + REAPER_PERIOD, &Watchlist::new(["BABA"]));
        assert_eq!(outcome, TickOutcome::default());
    }
}
