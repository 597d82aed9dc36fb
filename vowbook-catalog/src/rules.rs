use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar day without a year, written `MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> Option<Self> {
        // 2024 is a leap year so 02-29 is accepted.
        NaiveDate::from_ymd_opt(2024, month, day).map(|_| Self { month, day })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self { month: date.month(), day: date.day() }
    }
}

impl TryFrom<String> for MonthDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (month, day) = value
            .split_once('-')
            .ok_or_else(|| format!("expected MM-DD, got {}", value))?;
        let month = month.parse().map_err(|_| format!("invalid month in {}", value))?;
        let day = day.parse().map_err(|_| format!("invalid day in {}", value))?;
        MonthDay::new(month, day).ok_or_else(|| format!("no such day {}", value))
    }
}

impl From<MonthDay> for String {
    fn from(value: MonthDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Vendor pricing rule. Rules are read-only inputs to the pricing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule_type", rename_all = "snake_case")]
pub enum PricingRule {
    /// Peak hours on given weekdays.
    TimeBased {
        days_of_week: Vec<Weekday>,
        #[serde(with = "crate::clock")]
        start_time: NaiveTime,
        #[serde(with = "crate::clock")]
        end_time: NaiveTime,
        multiplier: f64,
        is_active: bool,
    },
    /// Wedding season; the window may wrap the year end (e.g. 12-15 to 01-10).
    Seasonal {
        start_date: MonthDay,
        end_date: MonthDay,
        multiplier: f64,
        is_active: bool,
    },
}

impl PricingRule {
    pub fn is_active(&self) -> bool {
        match self {
            PricingRule::TimeBased { is_active, .. } | PricingRule::Seasonal { is_active, .. } => *is_active,
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            PricingRule::TimeBased { multiplier, .. } | PricingRule::Seasonal { multiplier, .. } => *multiplier,
        }
    }

    /// Inclusive window match on weekday and start time.
    pub fn matches_time(&self, date: NaiveDate, start: NaiveTime) -> bool {
        match self {
            PricingRule::TimeBased { days_of_week, start_time, end_time, is_active, .. } => {
                *is_active
                    && days_of_week.contains(&date.weekday())
                    && *start_time <= start
                    && start <= *end_time
            }
            PricingRule::Seasonal { .. } => false,
        }
    }

    /// Inclusive month-day window match.
    pub fn matches_season(&self, date: NaiveDate) -> bool {
        match self {
            PricingRule::Seasonal { start_date, end_date, is_active, .. } => {
                if !*is_active {
                    return false;
                }
                let day = MonthDay::of(date);
                if start_date <= end_date {
                    *start_date <= day && day <= *end_date
                } else {
                    day >= *start_date || day <= *end_date
                }
            }
            PricingRule::TimeBased { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_day_parsing() {
        let md: MonthDay = serde_json::from_str("\"06-01\"").unwrap();
        assert_eq!(md, MonthDay { month: 6, day: 1 });
        assert_eq!(serde_json::to_string(&md).unwrap(), "\"06-01\"");
        assert!(serde_json::from_str::<MonthDay>("\"13-01\"").is_err());
        assert!(serde_json::from_str::<MonthDay>("\"june\"").is_err());
    }

    #[test]
    fn test_time_rule_matching() {
        let rule = PricingRule::TimeBased {
            days_of_week: vec![Weekday::Fri, Weekday::Sat],
            start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            multiplier: 1.2,
            is_active: true,
        };
        // 2025-06-14 is a Saturday
        assert!(rule.matches_time(date(2025, 6, 14), NaiveTime::from_hms_opt(18, 0, 0).unwrap()));
        assert!(rule.matches_time(date(2025, 6, 14), NaiveTime::from_hms_opt(17, 0, 0).unwrap()));
        assert!(!rule.matches_time(date(2025, 6, 14), NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
        assert!(!rule.matches_time(date(2025, 6, 16), NaiveTime::from_hms_opt(18, 0, 0).unwrap()));
        assert!(!rule.matches_season(date(2025, 6, 14)));
    }

    #[test]
    fn test_seasonal_window_wraps_year_end() {
        let rule: PricingRule = serde_json::from_value(serde_json::json!({
            "rule_type": "seasonal",
            "start_date": "12-15",
            "end_date": "01-10",
            "multiplier": 1.3,
            "is_active": true
        }))
        .unwrap();
        assert!(rule.matches_season(date(2025, 12, 31)));
        assert!(rule.matches_season(date(2026, 1, 10)));
        assert!(!rule.matches_season(date(2026, 1, 11)));
        assert!(!rule.matches_season(date(2025, 7, 1)));
    }

    #[test]
    fn test_inactive_rules_never_match() {
        let rule = PricingRule::Seasonal {
            start_date: MonthDay::new(1, 1).unwrap(),
            end_date: MonthDay::new(12, 31).unwrap(),
            multiplier: 2.0,
            is_active: false,
        };
        assert!(!rule.matches_season(date(2025, 5, 5)));
    }
}
