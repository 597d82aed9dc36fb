//! Serde helpers for wall-clock times written as `HH:MM` (seconds optional).

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer};

pub fn parse(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&time.format("%H:%M").to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_seconds() {
        assert_eq!(parse("14:30"), NaiveTime::from_hms_opt(14, 30, 0));
        assert_eq!(parse("09:05:10"), NaiveTime::from_hms_opt(9, 5, 10));
        assert_eq!(parse("25:00"), None);
    }
}
