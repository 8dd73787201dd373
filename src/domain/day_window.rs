use chrono::{
    DateTime, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone, Timelike,
};

pub const MAX_DAY_START_HOUR: u32 = 23;

pub fn day_length() -> TimeDelta {
    TimeDelta::hours(24)
}

/// A 24-hour span whose boundary sits on the configured day-start hour rather
/// than on midnight.
#[derive(Clone, Debug)]
pub struct DayWindow<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> DayWindow<Tz> {
    pub fn for_date(date: NaiveDate, start_hour: u32, tz: &Tz) -> Self {
        let start = resolve_local(tz, at_start_hour(date, start_hour));
        let end = start.clone() + day_length();
        Self { start, end }
    }

    /// Calendar date the window starts on; this is the date a day is named by.
    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn contains(&self, instant: &DateTime<Tz>) -> bool {
        &self.start <= instant && instant < &self.end
    }
}

pub fn day_start_of<Tz: TimeZone>(instant: &DateTime<Tz>, start_hour: u32) -> DateTime<Tz> {
    let start_hour = start_hour.min(MAX_DAY_START_HOUR);
    let today = instant.date_naive();
    let date = if instant.hour() < start_hour {
        today.pred_opt().unwrap_or(today)
    } else {
        today
    };

    resolve_local(&instant.timezone(), at_start_hour(date, start_hour))
}

pub fn day_window<Tz: TimeZone>(instant: &DateTime<Tz>, start_hour: u32) -> DayWindow<Tz> {
    let start = day_start_of(instant, start_hour);
    let end = start.clone() + day_length();
    DayWindow { start, end }
}

fn at_start_hour(date: NaiveDate, start_hour: u32) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(start_hour.min(MAX_DAY_START_HOUR), 0, 0)
        .unwrap_or(NaiveTime::MIN);
    date.and_time(time)
}

const GAP_PROBES: u32 = 8;

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    resolve_local_with_probes(tz, naive, GAP_PROBES)
}

fn resolve_local_with_probes<Tz: TimeZone>(
    tz: &Tz,
    naive: NaiveDateTime,
    probes: u32,
) -> DateTime<Tz> {
    if let Some(instant) = tz.from_local_datetime(&naive).earliest() {
        return instant;
    }

    // Wall-clock time skipped by a DST jump: take the first one that exists again.
    let mut probe = naive;
    for _ in 0..probes {
        probe += TimeDelta::minutes(15);
        if let Some(instant) = tz.from_local_datetime(&probe).earliest() {
            return instant;
        }
    }

    // Still inside the gap: read the wall time with the offset in force just
    // before it, which lands on the far side of the jump.
    let offset = tz.offset_from_utc_datetime(&naive).fix();
    tz.from_utc_datetime(&naive.checked_sub_offset(offset).unwrap_or(naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, FixedOffset, Utc};
    use chrono_tz::America::Sao_Paulo;

    fn at(tz: &FixedOffset, y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<FixedOffset> {
        tz.with_ymd_and_hms(y, m, d, h, min, s)
            .single()
            .expect("valid fixed-offset time")
    }

    fn plus_three() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).expect("offset")
    }

    #[test]
    fn before_start_hour_falls_on_previous_calendar_day() {
        let tz = plus_three();
        let start = day_start_of(&at(&tz, 2024, 3, 1, 5, 59, 59), 6);
        assert_eq!(start, at(&tz, 2024, 2, 29, 6, 0, 0));
    }

    #[test]
    fn at_or_after_start_hour_falls_on_same_day() {
        let tz = plus_three();
        assert_eq!(
            day_start_of(&at(&tz, 2024, 3, 1, 6, 0, 0), 6),
            at(&tz, 2024, 3, 1, 6, 0, 0)
        );
        assert_eq!(
            day_start_of(&at(&tz, 2024, 3, 1, 23, 30, 10), 6),
            at(&tz, 2024, 3, 1, 6, 0, 0)
        );
    }

    #[test]
    fn day_start_is_idempotent() {
        let tz = plus_three();
        for hour in [0, 5, 8, 23] {
            for reference in [
                at(&tz, 2024, 1, 1, 0, 0, 0),
                at(&tz, 2024, 6, 15, 7, 45, 12),
                at(&tz, 2024, 12, 31, 23, 59, 59),
            ] {
                let once = day_start_of(&reference, hour);
                assert_eq!(day_start_of(&once, hour), once);
            }
        }
    }

    #[test]
    fn truncates_sub_second_precision() {
        let instant = Utc
            .with_ymd_and_hms(2024, 5, 5, 12, 34, 56)
            .single()
            .expect("utc")
            + TimeDelta::milliseconds(789);
        let start = day_start_of(&instant, 8);
        assert_eq!(start.timestamp_subsec_nanos(), 0);
        assert_eq!((start.hour(), start.minute(), start.second()), (8, 0, 0));
        assert_eq!(start.day(), 5);
    }

    #[test]
    fn window_spans_exactly_one_day() {
        let tz = plus_three();
        let reference = at(&tz, 2024, 7, 10, 3, 0, 0);
        let window = day_window(&reference, 8);
        assert_eq!(window.start, at(&tz, 2024, 7, 9, 8, 0, 0));
        assert_eq!(window.end - window.start.clone(), day_length());
        assert!(window.contains(&reference));
        assert!(!window.contains(&window.end));
        assert_eq!(window.date(), NaiveDate::from_ymd_opt(2024, 7, 9).expect("date"));
    }

    #[test]
    fn midnight_start_hour_keeps_calendar_days() {
        let tz = plus_three();
        let start = day_start_of(&at(&tz, 2024, 1, 1, 0, 0, 1), 0);
        assert_eq!(start, at(&tz, 2024, 1, 1, 0, 0, 0));
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .expect("utc time")
    }

    // 2018-11-04 00:00 local did not exist in Sao Paulo: clocks jumped to 01:00 (-02).
    #[test]
    fn start_hour_in_dst_gap_uses_first_valid_instant() {
        let tz = Sao_Paulo;
        let noon = tz
            .with_ymd_and_hms(2018, 11, 4, 12, 0, 0)
            .single()
            .expect("noon");
        let start = day_start_of(&noon, 0);
        assert_eq!(start.naive_local(), utc(2018, 11, 4, 1));
        assert_eq!(start.naive_utc(), utc(2018, 11, 4, 3));
        assert_eq!(day_start_of(&start, 0), start);

        let window = DayWindow::for_date(noon.date_naive(), 0, &tz);
        assert_eq!(window.start, start);
        assert_eq!(window.end - window.start.clone(), day_length());
        assert!(window.contains(&noon));
    }

    #[test]
    fn gap_fallback_keeps_local_offset() {
        let naive = utc(2018, 11, 4, 0);
        let start = resolve_local_with_probes(&Sao_Paulo, naive, 0);
        assert_eq!(start.naive_utc(), utc(2018, 11, 4, 3));
        assert_eq!(start.naive_local(), utc(2018, 11, 4, 1));
    }

    // 2019-02-17 00:00 (-02) fell back to 2019-02-16 23:00 (-03), so 23:xx ran twice.
    #[test]
    fn start_hour_in_dst_fold_uses_earlier_instant() {
        let tz = Sao_Paulo;
        let second_pass = tz
            .with_ymd_and_hms(2019, 2, 16, 23, 30, 0)
            .latest()
            .expect("folded time");
        assert_eq!(second_pass.naive_utc(), utc(2019, 2, 17, 2).with_minute(30).expect("minute"));

        let start = day_start_of(&second_pass, 23);
        assert_eq!(start.naive_local(), utc(2019, 2, 16, 23));
        assert_eq!(start.naive_utc(), utc(2019, 2, 17, 1));
        assert_eq!(day_start_of(&start, 23), start);
        assert!(day_window(&second_pass, 23).contains(&second_pass));
    }

    #[test]
    fn window_for_date_starts_at_start_hour() {
        let tz = plus_three();
        let date = NaiveDate::from_ymd_opt(2023, 11, 2).expect("date");
        let window = DayWindow::for_date(date, 8, &tz);
        assert_eq!(window.start, at(&tz, 2023, 11, 2, 8, 0, 0));
        assert_eq!(window.end, at(&tz, 2023, 11, 3, 8, 0, 0));
    }
}
