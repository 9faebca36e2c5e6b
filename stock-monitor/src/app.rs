//! Host side of the monitor: keymap, watchlist commands, persistence and lifecycle

use std::path::PathBuf;
use std::time::Instant;

use crossterm::event::KeyCode;
use tracing::{info, warn};

use crate::config::Config;
use crate::quote::{FetchOutcome, QuoteClient};
use crate::refresh::{Engine, EngineConfig, INVALID_DATA};
use crate::status::StatusLog;
use crate::view::{format_record, Footer, RenderBuffer};
use crate::watchlist::Watchlist;

/// Commands reachable from the keymap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Add,
    Remove,
    CursorUp,
    CursorDown,
    Quit,
}

impl Command {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char('g') => Some(Command::Start),
            KeyCode::Char('s') => Some(Command::Stop),
            KeyCode::Char('a') => Some(Command::Add),
            KeyCode::Char('d') => Some(Command::Remove),
            KeyCode::Char('p') | KeyCode::Up => Some(Command::CursorUp),
            KeyCode::Char('n') | KeyCode::Down => Some(Command::CursorDown),
            KeyCode::Char('q') | KeyCode::Esc => Some(Command::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Prompt for a new symbol, holding the text typed so far
    AddSymbol(String),
}

pub struct App {
    engine: Engine,
    view: RenderBuffer,
    watchlist: Watchlist,
    config: Config,
    config_path: Option<PathBuf>,
    input: InputMode,
    quit: bool,
}

impl App {
    /// `config_path` of `None` keeps watchlist changes in memory only
    pub fn new(config: Config, config_path: Option<PathBuf>, client: QuoteClient, engine_config: EngineConfig) -> Self {
        let mut watchlist = config.list_of_stocks.clone();
        watchlist.normalise();

        Self {
            engine: Engine::new(client, engine_config, StatusLog::new(config.enable_log)),
            view: RenderBuffer::new(),
            watchlist,
            config,
            config_path,
            input: InputMode::Normal,
            quit: false,
        }
    }

    pub fn view(&self) -> &RenderBuffer {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut RenderBuffer {
        &mut self.view
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn input(&self) -> &InputMode {
        &self.input
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub async fn start(&mut self, now: Instant) {
        self.engine.start(now, &self.watchlist, &mut self.view).await;
    }

    pub fn stop(&mut self) {
        self.engine.stop(&mut self.view);
    }

    /// Fire due timers and render whatever workers have returned
    pub fn tick(&mut self, now: Instant) {
        self.engine.tick(now, &self.watchlist);
        self.engine.drain_batches(&mut self.view);
    }

    /// Fetch `symbol` once and, on success, append it to both table and watchlist
    pub async fn add_symbol(&mut self, symbol: &str) -> bool {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return false;
        }
        if self.watchlist.contains(symbol) {
            self.engine.status_mut().push(format!("{symbol} is already watched"));
            return false;
        }

        let outcome = self.engine.client().fetch(symbol).await;
        let record = match outcome {
            FetchOutcome::Record(record) => record,
            FetchOutcome::Failure(failure) => {
                self.engine.status_mut().push(format!("{symbol}: {failure}"));
                return false;
            }
        };

        let row = match format_record(&record, self.engine.config().color_policy) {
            Ok(row) => row,
            Err(_) => {
                self.engine.status_mut().push(INVALID_DATA);
                return false;
            }
        };

        self.engine.append_row(row, &mut self.view);
        self.watchlist.add(symbol);
        info!(%symbol, "Added to watchlist");
        self.persist();
        true
    }

    /// Remove the row under the cursor and its symbol. Returns the removed symbol.
    pub fn remove_at_cursor(&mut self) -> Option<String> {
        let symbol = self.view.symbol_at_cursor()?.to_string();
        self.watchlist.remove(&symbol);
        self.engine.remove_row(&symbol, &mut self.view);
        info!(%symbol, "Removed from watchlist");
        self.persist();
        Some(symbol)
    }

    pub async fn handle_key(&mut self, code: KeyCode, now: Instant) {
        if let InputMode::AddSymbol(buffer) = &mut self.input {
            match code {
                KeyCode::Char(c) => buffer.push(c),
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Esc => self.input = InputMode::Normal,
                KeyCode::Enter => {
                    let symbol = std::mem::take(buffer);
                    self.input = InputMode::Normal;
                    self.add_symbol(&symbol).await;
                }
                _ => {}
            }
            return;
        }

        if let Some(command) = Command::from_key(code) {
            self.run(command, now).await;
        }
    }

    pub async fn run(&mut self, command: Command, now: Instant) {
        match command {
            Command::Start => self.start(now).await,
            Command::Stop => self.stop(),
            Command::Add => self.input = InputMode::AddSymbol(String::new()),
            Command::Remove => {
                self.remove_at_cursor();
            }
            Command::CursorUp => self.view.cursor_up(),
            Command::CursorDown => self.view.cursor_down(),
            Command::Quit => self.quit = true,
        }
    }

    /// Close hook: cancel timers, abort workers, save the watchlist
    pub fn close(&mut self) {
        self.engine.shutdown(&mut self.view);
        self.persist();
        info!("View closed");
    }

    pub fn footer(&self, now: Instant) -> Footer<'_> {
        match &self.input {
            InputMode::AddSymbol(text) => Footer::Prompt(text.as_str()),
            InputMode::Normal => self
                .engine
                .status()
                .current(now)
                .map(Footer::Status)
                .unwrap_or(Footer::Help),
        }
    }

    fn persist(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };
        self.config.list_of_stocks = self.watchlist.clone();
        if let Err(e) = self.config.save(path) {
            warn!(path = %path.display(), error = %e, "Failed to save watchlist");
        }
    }
}
