use std::time::Duration;

const MILLIS_PER_SECOND: u128 = 1_000;
const MILLIS_PER_MINUTE: u128 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u128 = 60 * MILLIS_PER_MINUTE;

/// Renders `H:MM:SS.mmm`. Every component is truncated, never rounded, so the
/// display never runs ahead of the underlying value.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    let hours = total_ms / MILLIS_PER_HOUR;
    let minutes = (total_ms % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE;
    let seconds = (total_ms % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND;
    let millis = total_ms % MILLIS_PER_SECOND;

    format!("{hours}:{minutes:02}:{seconds:02}.{millis:03}")
}

pub fn duration_from_micros(micros: u64) -> Duration {
    Duration::from_micros(micros)
}

/// Difference of two epoch-millisecond stamps, clamped at zero.
pub fn duration_between_millis(start_ms: i64, end_ms: i64) -> Duration {
    let delta = end_ms.saturating_sub(start_ms);
    Duration::from_millis(u64::try_from(delta).unwrap_or(0))
}
