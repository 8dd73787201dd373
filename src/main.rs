mod app;
mod cli;
mod domain;
mod infra;
mod ui;

use crate::app::{AppCommand, AppEvent, AppModel, FetchRequest, SyncSignal};
use crate::cli::CliInvocation;
use crate::domain::{PageView, page_from_path};
use crate::infra::{
    Config, PushSubscription, SyncClient, init_logging, load_effective_config, resolve_state_dir,
    subscribe_to_external_changes,
};
use chrono::Local;
use crossterm::ExecutableCommand;
use crossterm::event::{
    self, Event, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::size as terminal_size;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout, Write};
use std::path::Path;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Longest the loop sleeps in input polling when the clock is not ticking.
const IDLE_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] crate::app::AppError),

    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),

    #[error(transparent)]
    Config(#[from] crate::infra::ConfigError),
}

fn main() {
    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{error}");
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Tui { config, page } => {
            let config = load_effective_config(config.as_deref())?;
            start_logging(&config);
            Ok(run_tui(&config, page.as_deref())?)
        }
        CliInvocation::Command { config, command } => {
            let config = if command.is_offline() {
                Config::default()
            } else {
                let config = load_effective_config(config.as_deref())?;
                start_logging(&config);
                config
            };
            crate::cli::run(command, &config)?;
            Ok(())
        }
    }
}

fn print_help() {
    let text = format!(
        "{name}: work-session stopwatch client\n\nUSAGE:\n  {name} [--config PATH] [DATE|PATH]  Start the TUI (today, or the day DATE=YYYY-MM-DD read-only)\n  {name} status                      Print running state and today's duration\n  {name} start                       Start a work session\n  {name} stop                        Stop the running work session\n  {name} week                        Print per-day totals of the last 7 days\n  {name} config                      Print the default config\n  {name} --help | --version\n\nOUTPUT:\n  status/start/stop: Running. duration: H:MM:SS.mmm\n  week: date<TAB>duration, then total<TAB>duration\n\nENV:\n  STOPWATCH_CONFIG          Config file (default: ~/.stopwatch/config.json)\n  STOPWATCH_DAY_START_HOUR  Override stopwatch.day_start_hour (0-23)\n  STOPWATCH_LOG             Log filter (default: info)\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}

/// Logging is best effort: without a writable log file the client runs silent.
fn start_logging(config: &Config) {
    let path = match resolve_state_dir() {
        Ok(state_dir) => config.log_path(&state_dir),
        Err(_) => config.log_path(Path::new(".")),
    };
    if init_logging(&path).is_ok() {
        log::info!("{} {} starting", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }
}

fn resolve_page(raw: Option<&str>) -> PageView {
    let Some(raw) = raw else {
        return PageView::Live;
    };
    let page = page_from_path(raw);
    if page.is_live() {
        log::warn!("no valid date in {raw:?}; showing today");
    }
    page
}

fn run_tui(config: &Config, page: Option<&str>) -> Result<(), crate::app::AppError> {
    let mut model = AppModel::new(resolve_page(page), config.day_start_hour(), Local::now());
    let client = SyncClient::new(config);
    let (tx, rx) = channel::<SyncSignal>();
    let _subscription = start_push(config, tx.clone())?;

    let mut terminal = setup_terminal()?;
    if let Ok((width, height)) = terminal_size() {
        model = model.with_terminal_size(width, height);
    }
    let result = run(&mut terminal, &mut model, &client, &tx, &rx);
    restore_terminal(&mut terminal)?;
    result
}

fn start_push(
    config: &Config,
    tx: Sender<SyncSignal>,
) -> Result<Option<PushSubscription>, crate::app::AppError> {
    let url = config.updates_url()?;
    match subscribe_to_external_changes(url, move |event| {
        let _ = tx.send(SyncSignal::Push(event));
    }) {
        Ok(subscription) => Ok(Some(subscription)),
        Err(error) => {
            log::error!("live updates disabled: {error}");
            Ok(None)
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, app::AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let _ = stdout.execute(PushKeyboardEnhancementFlags(
        KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES,
    ));
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<(), app::AppError> {
    disable_raw_mode()?;
    let _ = execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags);
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    model: &mut AppModel,
    client: &SyncClient,
    tx: &Sender<SyncSignal>,
    rx: &Receiver<SyncSignal>,
) -> Result<(), app::AppError> {
    if apply(model, AppEvent::Started, client, tx) {
        return Ok(());
    }

    loop {
        while let Ok(signal) = rx.try_recv() {
            let event = AppEvent::Sync {
                signal,
                now: Instant::now(),
            };
            if apply(model, event, client, tx) {
                return Ok(());
            }
        }

        let tick = AppEvent::Tick {
            now: Instant::now(),
            wall: Local::now(),
        };
        if apply(model, tick, client, tx) {
            return Ok(());
        }

        if model.take_redraw() {
            terminal.draw(|frame| ui::render(frame, model))?;
        }

        if event::poll(poll_timeout(model.next_wakeup(), Instant::now()))? {
            let event = match event::read()? {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    AppEvent::Key(key)
                }
                Event::Resize(width, height) => AppEvent::Resize(width, height),
                _ => continue,
            };
            if apply(model, event, client, tx) {
                return Ok(());
            }
        }
    }
}

/// Runs one update and carries out its command. Returns true on quit.
fn apply(
    model: &mut AppModel,
    event: AppEvent,
    client: &SyncClient,
    tx: &Sender<SyncSignal>,
) -> bool {
    let (next, command) = app::update(model.clone(), event);
    *model = next;
    match command {
        AppCommand::None => false,
        AppCommand::Quit => true,
        AppCommand::Fetch(requests) => {
            for request in requests {
                spawn_fetch(client.clone(), request, tx.clone());
            }
            false
        }
    }
}

fn poll_timeout(next_wakeup: Option<Instant>, now: Instant) -> Duration {
    match next_wakeup {
        Some(due) => due.saturating_duration_since(now).min(IDLE_POLL),
        None => IDLE_POLL,
    }
}

fn spawn_fetch(client: SyncClient, request: FetchRequest, tx: Sender<SyncSignal>) {
    std::thread::spawn(move || {
        let signal = match request {
            FetchRequest::State { seq, action } => SyncSignal::StateFetched {
                seq,
                action,
                result: client
                    .send_action(action)
                    .map_err(|error| error.to_string()),
            },
            FetchRequest::Sessions { seq, day_start_ms } => SyncSignal::SessionsFetched {
                seq,
                result: client
                    .fetch_sessions(day_start_ms)
                    .map_err(|error| error.to_string()),
            },
            FetchRequest::Stats { seq } => SyncSignal::StatsFetched {
                seq,
                result: client.fetch_day_stats().map_err(|error| error.to_string()),
            },
        };
        let _ = tx.send(signal);
    });
}
