/// Stock Monitor
///
/// Watches a list of symbols, refreshing quotes every few seconds in the
/// background and painting gains and losses in colour.
///
/// Keys: g start, s stop, a add, d delete, p/n move, q quit.
use std::{
    error::Error,
    fs::{self, File},
    io,
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use stock_monitor::{
    config::{refresh_period_from_env, STOCKS_ENV},
    refresh::FETCH_PERIOD,
    view, App, Config, EngineConfig, QuoteClient,
};
use tracing::{info, warn};

const LOG_FILE: &str = "stock-monitor.log";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config_path = Config::default_path();
    let config = match &config_path {
        Ok(path) => Config::load_or_default(path),
        Err(e) => {
            warn!(error = %e, "No config location, using defaults");
            Config::default()
        }
    };

    // A session watchlist from STOCKS is not written back
    let persist_path = if std::env::var(STOCKS_ENV).is_ok() {
        None
    } else {
        config_path.ok()
    };
    let config = config.with_env_overrides();

    let engine_config =
        EngineConfig::from(&config).with_fetch_period(refresh_period_from_env(FETCH_PERIOD));
    let mut app = App::new(config, persist_path, QuoteClient::new(), engine_config);

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    info!(symbols = app.watchlist().len(), "Starting stock monitor");
    app.start(Instant::now()).await;

    let result = run_app(&mut terminal, &mut app).await;

    app.close();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    loop {
        app.tick(Instant::now());

        let now = Instant::now();
        terminal.draw(|f| view::draw(f, app.view(), app.footer(now)))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code, Instant::now()).await;
                }
            }
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}

/// Log to a file; stdout belongs to the terminal UI
fn init_logging() {
    let Some(path) = log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = File::options().create(true).append(true).open(&path) else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("stock-monitor").join(LOG_FILE))
}
