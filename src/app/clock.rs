use crate::domain::format_duration;
use std::time::{Duration, Instant};

/// Cadence of the local display tick. Picked for a smooth millisecond readout,
/// not for precision: every tick recomputes from the anchor instant.
pub const TICK_INTERVAL: Duration = Duration::from_millis(43);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClockStatus {
    Stopped,
    Running,
}

impl ClockStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Running => "Running",
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionClockState {
    pub accumulated: Duration,
    /// Local anchor of the running prediction; present iff running.
    running_since: Option<Instant>,
}

impl SessionClockState {
    pub fn status(&self) -> ClockStatus {
        if self.running_since.is_some() {
            ClockStatus::Running
        } else {
            ClockStatus::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn total_elapsed(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(anchor) => self
                .accumulated
                .saturating_add(now.saturating_duration_since(anchor)),
            None => self.accumulated,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct TickTimer {
    interval: Duration,
    next_due: Instant,
}

impl TickTimer {
    fn start(now: Instant, interval: Duration) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    fn fire(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due += self.interval;
        if self.next_due <= now {
            // Missed ticks are skipped, not replayed.
            self.next_due = now + self.interval;
        }
        true
    }
}

/// Running/stopped state plus the local ticking prediction between syncs.
///
/// The tick timer exists exactly while the clock runs; stopping drops it, so a
/// stale anchor can never be re-rendered.
#[derive(Clone, Debug)]
pub struct SessionClock {
    state: SessionClockState,
    ticker: Option<TickTimer>,
    displayed: Duration,
    tick_interval: Duration,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new(TICK_INTERVAL)
    }
}

impl SessionClock {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            state: SessionClockState::default(),
            ticker: None,
            displayed: Duration::ZERO,
            tick_interval,
        }
    }

    pub fn status(&self) -> ClockStatus {
        self.state.status()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn display_text(&self) -> String {
        format_duration(self.displayed)
    }

    pub fn next_tick_due(&self) -> Option<Instant> {
        self.ticker.map(|ticker| ticker.next_due)
    }

    /// Flips running state without asking the server. Used to bring the local
    /// state in line with an authoritative response.
    pub fn toggle_local(&mut self, now: Instant) -> ClockStatus {
        match self.state.running_since.take() {
            Some(anchor) => {
                self.ticker = None;
                self.state.accumulated = self
                    .state
                    .accumulated
                    .saturating_add(now.saturating_duration_since(anchor));
                self.displayed = self.state.accumulated;
                ClockStatus::Stopped
            }
            None => {
                self.state.running_since = Some(now);
                self.ticker = Some(TickTimer::start(now, self.tick_interval));
                ClockStatus::Running
            }
        }
    }

    /// Recomputes the display when the tick timer is due. Returns whether the
    /// displayed value changed.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        let Some(ticker) = self.ticker.as_mut() else {
            return false;
        };
        if !ticker.fire(now) {
            return false;
        }
        let next = self.state.total_elapsed(now);
        let changed = next != self.displayed;
        self.displayed = next;
        changed
    }

    /// Adopts the server's view. Accumulated time is always overwritten; the
    /// running state is toggled only when it disagrees. Returns the new status
    /// when a toggle happened.
    ///
    /// The server's `elapsed` already covers the open session up to the moment
    /// it answered, so a running clock is re-anchored at `now` instead of
    /// continuing from its old anchor.
    pub fn reconcile(
        &mut self,
        server_elapsed: Duration,
        server_running: bool,
        now: Instant,
    ) -> Option<ClockStatus> {
        let transition = if server_running != self.state.is_running() {
            Some(self.toggle_local(now))
        } else {
            None
        };

        self.state.accumulated = server_elapsed;
        if self.state.running_since.is_some() {
            self.state.running_since = Some(now);
        }
        self.displayed = server_elapsed;
        transition
    }
}
