use chrono::NaiveDate;

/// Which day the client is looking at. `Live` follows the current logical day
/// and is the only view with ticking and start/stop controls.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageView {
    Live,
    Day(NaiveDate),
}

impl PageView {
    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    pub fn date(self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::Live => today,
            Self::Day(date) => date,
        }
    }

    pub fn previous(self, today: NaiveDate) -> Self {
        let date = self.date(today);
        match date.pred_opt() {
            Some(prev) => Self::for_date(prev, today),
            None => self,
        }
    }

    pub fn next(self, today: NaiveDate) -> Self {
        match self {
            Self::Live => Self::Live,
            Self::Day(date) => match date.succ_opt() {
                Some(next) => Self::for_date(next, today),
                None => self,
            },
        }
    }

    /// Navigation target for `date`: stepping onto the current logical day
    /// (or past it) lands on the live view.
    pub fn for_date(date: NaiveDate, today: NaiveDate) -> Self {
        if date >= today {
            Self::Live
        } else {
            Self::Day(date)
        }
    }

    /// Startup view for an addressed page. Any valid date up to and including
    /// today stays read-only; only dates that have not begun yet go live.
    pub fn for_address(self, today: NaiveDate) -> Self {
        match self {
            Self::Day(date) if date > today => Self::Live,
            page => page,
        }
    }
}

/// Resolves a page address (a bare `YYYY-MM-DD` or a path ending in one).
/// Anything that is not a valid date selects the live view.
pub fn page_from_path(path: &str) -> PageView {
    let segment = path
        .split('/')
        .filter(|part| !part.is_empty())
        .next_back()
        .unwrap_or("");
    match parse_date_segment(segment) {
        Some(date) => PageView::Day(date),
        None => PageView::Live,
    }
}

pub fn parse_date_segment(segment: &str) -> Option<NaiveDate> {
    let bytes = segment.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(index, byte)| index == 4 || index == 7 || byte.is_ascii_digit());
    if !digits_ok {
        return None;
    }

    let year = segment[0..4].parse::<i32>().ok()?;
    let month = segment[5..7].parse::<u32>().ok()?;
    let day = segment[8..10].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
