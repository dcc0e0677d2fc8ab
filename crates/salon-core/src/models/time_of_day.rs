//! Serde helpers for appointment times.
//!
//! The store hands times back as `HH:MM:SS` while forms submit `HH:MM`; both
//! parse to the same [`NaiveTime`]. Whole minutes are written as `HH:MM`.

use chrono::{NaiveTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Parse `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff`.
pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|error| format!("invalid time of day '{raw}': {error}"))
}

/// Render a time the way it was most likely entered.
#[must_use]
pub fn format_time(time: NaiveTime) -> String {
    if time.second() == 0 && time.nanosecond() == 0 {
        time.format("%H:%M").to_string()
    } else {
        time.format("%H:%M:%S").to_string()
    }
}

pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_time(*time))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).map_err(de::Error::custom)
}

/// Same as the parent module, for optional patch fields.
pub mod option {
    use chrono::NaiveTime;
    use serde::Serializer;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => super::serialize(time, serializer),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_accepts_short_and_long_forms() {
        let short = parse_time("09:30").unwrap();
        let long = parse_time("09:30:00").unwrap();
        assert_eq!(short, long);
        assert_eq!(short, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn parse_time_rejects_garbage() {
        assert!(parse_time("half past nine").is_err());
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn format_time_drops_zero_seconds() {
        assert_eq!(format_time(NaiveTime::from_hms_opt(14, 0, 0).unwrap()), "14:00");
        assert_eq!(
            format_time(NaiveTime::from_hms_opt(14, 0, 30).unwrap()),
            "14:00:30"
        );
    }
}
