use chrono::{DateTime, Utc};

/// Human relative time such as "5 minutes ago" or "in a day".
pub fn from_now(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let future = delta.num_seconds() < 0;
    let phrase = humanize(delta.num_seconds().unsigned_abs());
    if future {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

fn humanize(seconds: u64) -> String {
    let secs = seconds as f64;
    let minutes = secs / 60.0;
    let hours = minutes / 60.0;
    let days = hours / 24.0;

    if secs < 45.0 {
        "a few seconds".into()
    } else if secs < 90.0 {
        "a minute".into()
    } else if minutes < 45.0 {
        format!("{} minutes", minutes.round().max(2.0))
    } else if minutes < 90.0 {
        "an hour".into()
    } else if hours < 22.0 {
        format!("{} hours", hours.round().max(2.0))
    } else if hours < 36.0 {
        "a day".into()
    } else if days < 26.0 {
        format!("{} days", days.round().max(2.0))
    } else if days < 45.0 {
        "a month".into()
    } else if days < 320.0 {
        format!("{} months", (days / 30.4).round().max(2.0))
    } else if days < 548.0 {
        "a year".into()
    } else {
        format!("{} years", (days / 365.0).round().max(2.0))
    }
}
