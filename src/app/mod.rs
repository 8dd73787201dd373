mod clock;
mod sequence;

use crate::domain::{
    DayStat, DayWindow, PageView, SessionList, SessionQueryResult, SyncAction, TimelineAxis,
    TimelineLayout, day_window, layout,
};
use crate::infra::{ConfigError, PushEvent};
use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};
use thiserror::Error;

pub use clock::*;
pub use sequence::*;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Work the event loop hands to a background thread. `seq` comes from the
/// model's sequence for that request kind and is echoed back in the signal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchRequest {
    State { seq: u64, action: SyncAction },
    Sessions { seq: u64, day_start_ms: Option<i64> },
    Stats { seq: u64 },
}

#[derive(Clone, Debug)]
pub enum SyncSignal {
    StateFetched {
        seq: u64,
        action: SyncAction,
        result: Result<SessionQueryResult, String>,
    },
    SessionsFetched {
        seq: u64,
        result: Result<SessionList, String>,
    },
    StatsFetched {
        seq: u64,
        result: Result<Vec<DayStat>, String>,
    },
    Push(PushEvent),
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Started,
    Key(KeyEvent),
    Resize(u16, u16),
    Tick { now: Instant, wall: DateTime<Local> },
    Sync { signal: SyncSignal, now: Instant },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppCommand {
    None,
    Quit,
    Fetch(Vec<FetchRequest>),
}

impl AppCommand {
    fn fetch(requests: Vec<FetchRequest>) -> Self {
        if requests.is_empty() {
            Self::None
        } else {
            Self::Fetch(requests)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppModel {
    pub page: PageView,
    pub day_start_hour: u32,
    pub day: DayWindow<Local>,
    pub wall: DateTime<Local>,
    pub clock: SessionClock,
    pub sessions: SessionList,
    pub sessions_loaded: bool,
    pub day_stats: Vec<DayStat>,
    pub push_connected: bool,
    pub help_open: bool,
    pub notice: Option<String>,
    pub terminal_size: (u16, u16),
    redraw: bool,
    state_seq: RequestSequence,
    sessions_seq: RequestSequence,
    stats_seq: RequestSequence,
}

impl AppModel {
    pub fn new(page: PageView, day_start_hour: u32, wall: DateTime<Local>) -> Self {
        let today = day_window(&wall, day_start_hour).date();
        let page = page.for_address(today);
        let day = window_for_page(page, day_start_hour, &wall);
        Self {
            page,
            day_start_hour,
            day,
            wall,
            clock: SessionClock::default(),
            sessions: SessionList::default(),
            sessions_loaded: false,
            day_stats: Vec::new(),
            push_connected: false,
            help_open: false,
            notice: None,
            terminal_size: (0, 0),
            redraw: true,
            state_seq: RequestSequence::default(),
            sessions_seq: RequestSequence::default(),
            stats_seq: RequestSequence::default(),
        }
    }

    pub fn with_terminal_size(mut self, width: u16, height: u16) -> Self {
        self.terminal_size = (width, height);
        self
    }

    /// Whether anything visible changed since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    /// Logical date of the live day at the last observed wall-clock time.
    pub fn today(&self) -> chrono::NaiveDate {
        day_window(&self.wall, self.day_start_hour).date()
    }

    pub fn timeline(&self) -> TimelineLayout {
        let axis = TimelineAxis::for_day(self.day.start.clone(), &self.wall);
        layout(
            &self.sessions.sessions,
            &axis,
            self.wall.with_timezone(&Utc),
        )
    }

    pub fn day_total(&self) -> Duration {
        self.sessions.total(self.wall.with_timezone(&Utc))
    }

    /// When the loop must wake up next for the clock, if it is ticking.
    pub fn next_wakeup(&self) -> Option<Instant> {
        if self.page.is_live() {
            self.clock.next_tick_due()
        } else {
            None
        }
    }

    fn state_request(&mut self, action: SyncAction) -> FetchRequest {
        FetchRequest::State {
            seq: self.state_seq.issue(),
            action,
        }
    }

    fn sessions_request(&mut self) -> FetchRequest {
        let day_start_ms = if self.page.is_live() {
            None
        } else {
            Some(self.day.start.timestamp_millis())
        };
        FetchRequest::Sessions {
            seq: self.sessions_seq.issue(),
            day_start_ms,
        }
    }

    fn stats_request(&mut self) -> FetchRequest {
        FetchRequest::Stats {
            seq: self.stats_seq.issue(),
        }
    }

    /// Everything the current page shows, fetched from scratch.
    fn resync(&mut self) -> Vec<FetchRequest> {
        let mut requests = Vec::with_capacity(3);
        if self.page.is_live() {
            requests.push(self.state_request(SyncAction::Query));
        }
        requests.push(self.sessions_request());
        requests.push(self.stats_request());
        requests
    }

    fn show_page(&mut self, page: PageView) -> Vec<FetchRequest> {
        if page == self.page {
            return Vec::new();
        }
        self.page = page;
        self.day = window_for_page(page, self.day_start_hour, &self.wall);
        self.sessions = SessionList::default();
        self.sessions_loaded = false;
        log::debug!("showing day {}", self.day.date());

        let mut requests = Vec::with_capacity(2);
        if page.is_live() {
            requests.push(self.state_request(SyncAction::Query));
        }
        requests.push(self.sessions_request());
        requests
    }
}

fn window_for_page(page: PageView, day_start_hour: u32, wall: &DateTime<Local>) -> DayWindow<Local> {
    match page {
        PageView::Live => day_window(wall, day_start_hour),
        PageView::Day(date) => DayWindow::for_date(date, day_start_hour, &Local),
    }
}

pub fn update(model: AppModel, event: AppEvent) -> (AppModel, AppCommand) {
    let (mut model, command) = match event {
        AppEvent::Tick { now, wall } => return update_on_tick(model, now, wall),
        AppEvent::Started => {
            let mut model = model;
            let requests = model.resync();
            (model, AppCommand::fetch(requests))
        }
        AppEvent::Key(key) => update_on_key(model, key),
        AppEvent::Resize(width, height) => (model.with_terminal_size(width, height), AppCommand::None),
        AppEvent::Sync { signal, now } => update_on_sync(model, signal, now),
    };
    model.redraw = true;
    (model, command)
}

fn update_on_key(model: AppModel, key: KeyEvent) -> (AppModel, AppCommand) {
    let mut model = model;
    model.notice = None;

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return (model, AppCommand::Quit);
    }

    if model.help_open {
        if matches!(key.code, KeyCode::Char('q')) {
            return (model, AppCommand::Quit);
        }
        model.help_open = false;
        return (model, AppCommand::None);
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => (model, AppCommand::Quit),
        KeyCode::Char('?') => {
            model.help_open = true;
            (model, AppCommand::None)
        }
        KeyCode::Char(' ') | KeyCode::Char('s') => {
            if !model.page.is_live() {
                model.notice = Some("Start/stop is only available on today's page (t)".to_string());
                return (model, AppCommand::None);
            }
            let action = if model.clock.is_running() {
                SyncAction::Stop
            } else {
                SyncAction::Start
            };
            let request = model.state_request(action);
            (model, AppCommand::Fetch(vec![request]))
        }
        KeyCode::Char('r') => {
            let requests = model.resync();
            (model, AppCommand::fetch(requests))
        }
        KeyCode::Left | KeyCode::Char('h') => {
            let page = model.page.previous(model.today());
            let requests = model.show_page(page);
            (model, AppCommand::fetch(requests))
        }
        KeyCode::Right | KeyCode::Char('l') => {
            let page = model.page.next(model.today());
            let requests = model.show_page(page);
            (model, AppCommand::fetch(requests))
        }
        KeyCode::Char('t') => {
            let requests = model.show_page(PageView::Live);
            (model, AppCommand::fetch(requests))
        }
        _ => (model, AppCommand::None),
    }
}

fn update_on_tick(model: AppModel, now: Instant, wall: DateTime<Local>) -> (AppModel, AppCommand) {
    let mut model = model;
    // Timeline and status bar move at second granularity.
    if wall.timestamp() != model.wall.timestamp() {
        model.redraw = true;
    }
    model.wall = wall;

    if !model.page.is_live() {
        return (model, AppCommand::None);
    }

    if model.clock.on_tick(now) {
        model.redraw = true;
    }

    if model.day.contains(&model.wall) {
        return (model, AppCommand::None);
    }
    model.redraw = true;
    model.day = day_window(&model.wall, model.day_start_hour);
    model.sessions = SessionList::default();
    model.sessions_loaded = false;
    log::info!("day rolled over to {}", model.day.date());
    let requests = vec![model.sessions_request(), model.stats_request()];
    (model, AppCommand::Fetch(requests))
}

fn update_on_sync(model: AppModel, signal: SyncSignal, now: Instant) -> (AppModel, AppCommand) {
    let mut model = model;
    match signal {
        SyncSignal::StateFetched {
            seq,
            action,
            result,
        } => {
            if !model.state_seq.is_current(seq) {
                log::debug!("dropping stale {action:?} response #{seq}");
                return (model, AppCommand::None);
            }
            let response = match result {
                Ok(response) => response,
                Err(error) => {
                    log::warn!("{action:?} request failed: {error}");
                    return (model, AppCommand::None);
                }
            };

            let Some(status) = model
                .clock
                .reconcile(response.elapsed(), response.running, now)
            else {
                return (model, AppCommand::None);
            };
            log::info!("clock {} ({})", status.label(), model.clock.display_text());

            let mut requests = vec![model.sessions_request()];
            if status == ClockStatus::Stopped {
                requests.push(model.stats_request());
            }
            (model, AppCommand::Fetch(requests))
        }
        SyncSignal::SessionsFetched { seq, result } => {
            if !model.sessions_seq.is_current(seq) {
                log::debug!("dropping stale sessions response #{seq}");
                return (model, AppCommand::None);
            }
            match result {
                Ok(sessions) => {
                    if sessions.skipped > 0 {
                        log::warn!("skipped {} malformed sessions", sessions.skipped);
                    }
                    model.sessions = sessions;
                    model.sessions_loaded = true;
                }
                Err(error) => log::warn!("sessions request failed: {error}"),
            }
            (model, AppCommand::None)
        }
        SyncSignal::StatsFetched { seq, result } => {
            if !model.stats_seq.is_current(seq) {
                log::debug!("dropping stale stats response #{seq}");
                return (model, AppCommand::None);
            }
            match result {
                Ok(stats) => model.day_stats = stats,
                Err(error) => log::warn!("stats request failed: {error}"),
            }
            (model, AppCommand::None)
        }
        SyncSignal::Push(event) => update_on_push(model, event),
    }
}

fn update_on_push(model: AppModel, event: PushEvent) -> (AppModel, AppCommand) {
    let mut model = model;
    match event {
        PushEvent::Connected => {
            model.push_connected = true;
            let requests = model.resync();
            (model, AppCommand::fetch(requests))
        }
        PushEvent::Disconnected(_) => {
            model.push_connected = false;
            (model, AppCommand::None)
        }
        PushEvent::ExternalChange => {
            if !model.page.is_live() {
                return (model, AppCommand::None);
            }
            let requests = vec![
                model.state_request(SyncAction::Query),
                model.sessions_request(),
            ];
            (model, AppCommand::Fetch(requests))
        }
    }
}
