pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod events;
pub mod keystroke;
pub mod quotes;
pub mod runtime;
pub mod session_log;
pub mod stats;
pub mod text;
pub mod ui;
pub mod util;

use crate::app_dirs::AppDirs;
use crate::config::{Config, ConfigStore, FileConfigStore};
use crate::engine::{GameEngine, GameOptions, KeyInput};
use crate::events::{EventBus, EventKind, GameEvent, GameStateUpdate};
use crate::quotes::QuoteDb;
use crate::runtime::{translate_key, AppEvent, CrosstermEventSource, FixedTicker, Runner};
use crate::session_log::{SessionLog, SessionRecord};
use crate::text::{QuoteTextProvider, StaticTextProvider, TextProvider};
use crate::ui::{DashboardView, ResultsView};

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing_subscriber::EnvFilter;

/// terminal typing tutor with a live dashboard and quote library
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing tutor that serves quotes from a local library, tracks WPM and accuracy live, and keeps a CSV history of your sessions."
)]
pub struct Cli {
    /// custom text to type instead of a quote
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// path to the quote database (defaults to the platform state dir)
    #[clap(long)]
    db: Option<PathBuf>,

    /// embedded quote collection used to seed the database
    #[clap(short = 'c', long)]
    collection: Option<String>,

    /// block the cursor on mistakes until the right key is hit
    #[clap(long)]
    strict: bool,

    /// dashboard refresh rate in frames per second
    #[clap(long)]
    frame_rate: Option<u32>,
}

impl Cli {
    /// CLI flags win over the config file; absent flags fall back to it
    fn game_options(&self, config: &Config) -> GameOptions {
        let strict = self.strict || config.strict;
        let frame_rate = self.frame_rate.unwrap_or(config.target_frame_rate);
        GameOptions::new(strict).with_frame_rate(frame_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppState {
    Typing,
    Results,
}

fn init_tracing() {
    let Some(path) = AppDirs::trace_log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .try_init();
    }
}

fn build_provider(cli: &Cli, config: &Config) -> Result<Box<dyn TextProvider>, Box<dyn Error>> {
    if let Some(prompt) = &cli.prompt {
        return Ok(Box::new(StaticTextProvider::new(prompt.clone())));
    }

    let path = cli
        .db
        .clone()
        .or_else(AppDirs::quote_db_path)
        .unwrap_or_else(|| PathBuf::from("typr_quotes.db"));
    let collection = cli.collection.as_ref().unwrap_or(&config.collection);

    let mut db = QuoteDb::open(&path)?;
    db.ensure_seeded(collection)?;
    Ok(Box::new(QuoteTextProvider::new(db)))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config = FileConfigStore::new().load();
    let options = cli.game_options(&config);
    let provider = build_provider(&cli, &config)?;

    let bus = Arc::new(EventBus::new());

    // the renderer's entire view of the game is the latest published snapshot
    let latest: Arc<Mutex<Option<GameStateUpdate>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&latest);
    bus.subscribe(EventKind::StateUpdated, move |event| {
        if let GameEvent::StateUpdated(update) = event {
            *slot.lock().unwrap() = Some(update.clone());
        }
    });

    let mut engine = GameEngine::new(provider, options, Arc::clone(&bus));
    engine.start_new_game()?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut engine, &latest);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    engine: &mut GameEngine,
    latest: &Arc<Mutex<Option<GameStateUpdate>>>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(engine.options().frame_delay()),
    );
    let session_log = SessionLog::new();

    let mut app_state = if engine.is_over() {
        AppState::Results
    } else {
        AppState::Typing
    };
    draw(terminal, engine, latest, app_state)?;

    loop {
        match runner.step() {
            AppEvent::Tick => {
                if app_state == AppState::Typing && engine.is_running() {
                    engine.publish_state_update();
                    draw(terminal, engine, latest, app_state)?;
                }
            }
            AppEvent::Resize => {
                draw(terminal, engine, latest, app_state)?;
            }
            AppEvent::Key(key) => {
                match app_state {
                    AppState::Typing => {
                        if !engine.process_key_press(translate_key(key)) {
                            return Ok(());
                        }
                        if engine.is_over() {
                            record_session(engine, session_log.as_ref());
                            app_state = AppState::Results;
                        }
                    }
                    AppState::Results => match translate_key(key) {
                        KeyInput::Escape => return Ok(()),
                        KeyInput::Char('r') => {
                            engine.restart();
                            app_state = AppState::Typing;
                        }
                        KeyInput::Char('n') => {
                            engine.start_next_game()?;
                            app_state = AppState::Typing;
                        }
                        _ => {}
                    },
                }
                draw(terminal, engine, latest, app_state)?;
            }
        }
    }
}

fn record_session(engine: &GameEngine, session_log: Option<&SessionLog>) {
    let Some(log) = session_log else {
        return;
    };
    let source = engine
        .current_sample()
        .map(|sample| sample.source.clone())
        .unwrap_or_default();
    let record = SessionRecord::from_results(&source, &engine.snapshot(), engine.consistency());
    if let Err(err) = log.append(&record) {
        tracing::warn!(%err, "failed to append session record");
    }
}

fn draw<B: Backend>(
    terminal: &mut Terminal<B>,
    engine: &GameEngine,
    latest: &Arc<Mutex<Option<GameStateUpdate>>>,
    app_state: AppState,
) -> io::Result<()> {
    let update = latest.lock().unwrap().clone();
    let Some(update) = update else {
        return Ok(());
    };

    terminal.draw(|frame| match app_state {
        AppState::Typing => {
            let view = DashboardView { state: &update };
            frame.render_widget(&view, frame.area());
        }
        AppState::Results => {
            let series = engine.wpm_time_series();
            let source = engine
                .current_sample()
                .map(|sample| sample.source.as_str())
                .unwrap_or("");
            let view = ResultsView {
                state: &update,
                series: &series,
                consistency: engine.consistency(),
                source,
            };
            frame.render_widget(&view, frame.area());
        }
    })?;
    Ok(())
}
