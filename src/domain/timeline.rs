use crate::domain::{WorkSession, day_length, format_duration};
use chrono::{DateTime, TimeDelta, TimeZone, Timelike, Utc};

/// Ticks right of this position keep their mark but lose their label, so a
/// label is never half-clipped at the right edge.
pub const LABEL_CUTOFF_PERCENT: f64 = 95.0;

/// How far past "now" the live axis extends, so the growing edge is never
/// flush with the right border.
pub fn axis_lookahead() -> TimeDelta {
    TimeDelta::seconds(100)
}

#[derive(Clone, Debug)]
pub struct TimelineAxis<Tz: TimeZone> {
    pub zero: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> TimelineAxis<Tz> {
    /// `end = min(now + lookahead, day_start + 24h)`.
    pub fn for_day(day_start: DateTime<Tz>, now: &DateTime<Tz>) -> Self {
        let day_end = day_start.clone() + day_length();
        let live_end = now.clone() + axis_lookahead();
        let end = if live_end < day_end { live_end } else { day_end };
        Self {
            zero: day_start,
            end,
        }
    }

    pub fn span(&self) -> TimeDelta {
        self.end.clone() - self.zero.clone()
    }

    fn percent_of(&self, offset: TimeDelta) -> f64 {
        let span_ms = self.span().num_milliseconds();
        if span_ms <= 0 {
            return 0.0;
        }
        100.0 * offset.num_milliseconds() as f64 / span_ms as f64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    pub left_percent: f64,
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bar {
    pub left_percent: f64,
    pub width_percent: f64,
    pub open: bool,
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelineLayout {
    pub ticks: Vec<Tick>,
    pub bars: Vec<Bar>,
}

/// Projects hour ticks and session bars onto the axis. Bars are not clipped: an
/// in-progress session may extend past the right edge.
pub fn layout<Tz: TimeZone>(
    sessions: &[WorkSession],
    axis: &TimelineAxis<Tz>,
    now: DateTime<Utc>,
) -> TimelineLayout {
    if axis.span() <= TimeDelta::zero() {
        return TimelineLayout::default();
    }

    let mut ticks = Vec::new();
    let mut ts = axis.zero.clone();
    while ts < axis.end {
        let left_percent = axis.percent_of(ts.clone() - axis.zero.clone());
        let label = if left_percent > LABEL_CUTOFF_PERCENT {
            None
        } else {
            Some(format!("{}:{:02}", ts.hour(), ts.minute()))
        };
        ticks.push(Tick {
            left_percent,
            label,
        });
        ts = ts + TimeDelta::hours(1);
    }

    let tz = axis.zero.timezone();
    let zero = axis.zero.with_timezone(&Utc);
    let bars = sessions
        .iter()
        .map(|session| {
            let end = session.end_or(now);
            Bar {
                left_percent: axis.percent_of(session.start - zero),
                width_percent: axis.percent_of(end - session.start),
                open: session.is_open(),
                label: bar_label(session, &tz, now),
            }
        })
        .collect();

    TimelineLayout { ticks, bars }
}

fn bar_label<Tz: TimeZone>(session: &WorkSession, tz: &Tz, now: DateTime<Utc>) -> String {
    let start = wall_clock(&session.start.with_timezone(tz));
    let end = match session.end {
        Some(end) => wall_clock(&end.with_timezone(tz)),
        None => "now".to_string(),
    };
    format!(
        "{start} - {end}  duration: {}",
        format_duration(session.duration(now))
    )
}

fn wall_clock<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        instant.hour(),
        instant.minute(),
        instant.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionRecord;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, h, m, 0)
            .single()
            .expect("utc time")
    }

    fn session(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> WorkSession {
        WorkSession { start, end }
    }

    fn full_day_axis() -> TimelineAxis<Utc> {
        let zero = utc(0, 0);
        TimelineAxis::for_day(zero, &(zero + TimeDelta::days(2)))
    }

    #[test]
    fn session_spanning_first_hour_of_full_day() {
        let axis = full_day_axis();
        let zero = axis.zero;
        let result = layout(
            &[session(zero, Some(zero + TimeDelta::hours(1)))],
            &axis,
            zero + TimeDelta::days(2),
        );
        let bar = &result.bars[0];
        assert_eq!(bar.left_percent, 0.0);
        assert!((bar.width_percent - 100.0 / 24.0).abs() < 1e-9);
        assert!(!bar.open);
    }

    #[test]
    fn full_day_has_one_tick_per_hour() {
        let axis = full_day_axis();
        let result = layout(&[], &axis, axis.end);
        assert_eq!(result.ticks.len(), 24);
        assert!(result.bars.is_empty());
        assert_eq!(result.ticks[0].label.as_deref(), Some("0:00"));
        assert_eq!(result.ticks[9].label.as_deref(), Some("9:00"));
        assert_eq!(result.ticks[22].label.as_deref(), Some("22:00"));
        // 23:00 sits at ~95.8%.
        assert_eq!(result.ticks[23].label, None);
    }

    #[test]
    fn tick_past_cutoff_keeps_mark_but_drops_label() {
        let zero = utc(0, 0);
        let now = utc(12, 30) - axis_lookahead();
        let axis = TimelineAxis::for_day(zero, &now);
        assert_eq!(axis.end, utc(12, 30));

        let result = layout(&[], &axis, now);
        assert_eq!(result.ticks.len(), 13);
        let last = result.ticks.last().expect("last tick");
        assert!((last.left_percent - 96.0).abs() < 1e-9);
        assert_eq!(last.label, None);
        assert_eq!(result.ticks[11].label.as_deref(), Some("11:00"));
    }

    #[test]
    fn live_axis_tracks_now_with_lookahead() {
        let zero = utc(8, 0);
        let now = utc(10, 0);
        let axis = TimelineAxis::for_day(zero, &now);
        assert_eq!(axis.end, now + axis_lookahead());

        let result = layout(&[], &axis, now);
        assert_eq!(result.ticks.len(), 3);
    }

    #[test]
    fn open_session_grows_with_now_and_is_not_clipped() {
        let zero = utc(8, 0);
        let now = utc(10, 0);
        let axis = TimelineAxis::for_day(zero, &(now - TimeDelta::hours(1)));
        let sessions = [session(utc(9, 0), None)];

        let result = layout(&sessions, &axis, now);
        let bar = &result.bars[0];
        assert!(bar.open);
        assert!(bar.left_percent + bar.width_percent > 100.0);
        assert!(bar.label.contains("09:00:00 - now"));
        assert!(bar.label.ends_with("1:00:00.000"));
    }

    #[test]
    fn bar_label_shows_wall_clock_in_axis_zone() {
        let zero = utc(0, 0);
        let axis = full_day_axis();
        let records = [SessionRecord {
            start: (zero + TimeDelta::minutes(90)).timestamp_millis(),
            end: (zero + TimeDelta::minutes(95)).timestamp_millis() + 4,
        }];
        let list = crate::domain::SessionList::from_records(&records);
        let result = layout(&list.sessions, &axis, axis.end);
        assert_eq!(
            result.bars[0].label,
            "01:30:00 - 01:35:00  duration: 0:05:00.004"
        );
    }

    #[test]
    fn future_day_produces_empty_layout() {
        let zero = utc(8, 0);
        let axis = TimelineAxis::for_day(zero, &(zero - TimeDelta::days(3)));
        let result = layout(&[session(zero, None)], &axis, zero - TimeDelta::days(3));
        assert_eq!(result, TimelineLayout::default());
    }
}
