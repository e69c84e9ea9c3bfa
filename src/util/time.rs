use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Relative phrasing such as `3 days ago` or `2 hours from now`.
pub fn humanize(time: OffsetDateTime, now: OffsetDateTime) -> String {
    let delta = (now - time).whole_seconds();
    let (seconds, suffix) = if delta >= 0 {
        (delta, "ago")
    } else {
        (-delta, "from now")
    };

    if seconds < 1 {
        return "now".to_string();
    }

    let (count, unit) = match seconds {
        s if s < MINUTE => (s, "second"),
        s if s < HOUR => (s / MINUTE, "minute"),
        s if s < DAY => (s / HOUR, "hour"),
        s if s < WEEK => (s / DAY, "day"),
        s if s < MONTH => (s / WEEK, "week"),
        s if s < YEAR => (s / MONTH, "month"),
        s => (s / YEAR, "year"),
    };

    if count == 1 {
        format!("1 {unit} {suffix}")
    } else {
        format!("{count} {unit}s {suffix}")
    }
}

/// RFC 3339 timestamp for `datetime` attributes; empty if unformattable.
pub fn iso8601(time: OffsetDateTime) -> String {
    time.format(&Rfc3339).unwrap_or_default()
}
