//! Human-readable durations.
//!
//! Accepts `1d2h30m`, `90m`, `1.5h`, `2d 4h` and renders durations back as
//! the two largest applicable units.

use std::sync::LazyLock;
use std::time::Duration;

static INTERVAL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"^\s*(?:(?P<d>\d+(?:\.\d+)?)d)?\s*(?:(?P<h>\d+(?:\.\d+)?)h)?\s*(?:(?P<m>\d+(?:\.\d+)?)m)?\s*(?:(?P<s>\d+(?:\.\d+)?)s)?\s*$",
    )
    .expect("valid regex")
});

const MINUTE: f64 = 60.0;
const HOUR: f64 = 3600.0;
const DAY: f64 = 86400.0;

/// Above this many seconds the days bucket is used. Kept at 16 hours for
/// compatibility with existing guild settings and reports.
const DAYS_THRESHOLD: f64 = 57600.0;

/// Parse an interval such as `1d2h30m`.
///
/// Returns `None` when the text contains no recognised group at all, or
/// when the total is too large to represent.
pub fn parse(text: &str) -> Option<Duration> {
    let caps = INTERVAL_REGEX.captures(text)?;

    let mut matched = false;
    let mut seconds = 0.0;
    for (group, scale) in [("d", DAY), ("h", HOUR), ("m", MINUTE), ("s", 1.0)] {
        if let Some(value) = caps.name(group) {
            matched = true;
            seconds += value.as_str().parse::<f64>().ok()? * scale;
        }
    }

    if !matched {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

/// Render a duration with its two largest units.
pub fn format(duration: Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs > DAYS_THRESHOLD {
        let days = (secs / DAY).floor();
        let hours = ((secs - days * DAY) / HOUR).floor();
        format!("{days:.0}d {hours:.0}h")
    } else if secs > HOUR {
        let hours = (secs / HOUR).floor();
        let minutes = ((secs - hours * HOUR) / MINUTE).floor();
        format!("{hours:.0}h {minutes:.0}m")
    } else if secs > MINUTE {
        let minutes = (secs / MINUTE).floor();
        let mut seconds = (secs - minutes * MINUTE).round();
        let mut minutes = minutes;
        if seconds >= MINUTE {
            minutes += 1.0;
            seconds -= MINUTE;
        }
        format!("{minutes:.0}m {seconds:.0}s")
    } else {
        format!("{:.0}s", secs.round())
    }
}
