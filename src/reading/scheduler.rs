//! Incremental reading scheduler
//!
//! Priority maps to a fixed interval; there is no memory model.
//!
//! | priority | interval |
//! |----------|----------|
//! | 10       | 1 day    |
//! | 8-9      | 2 days   |
//! | 6-7      | 3 days   |
//! | 4-5      | 5 days   |
//! | 1-3      | 7 days   |

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRIORITY: i32 = 5;
pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 10;

/// Round and clamp to 1-10; non-finite input gets the default priority
pub fn normalize_priority(priority: f64) -> i32 {
    if !priority.is_finite() {
        return DEFAULT_PRIORITY;
    }
    (priority.round() as i64).clamp(MIN_PRIORITY as i64, MAX_PRIORITY as i64) as i32
}

pub fn interval_days(priority: f64) -> i64 {
    match normalize_priority(priority) {
        10 => 1,
        8..=9 => 2,
        6..=7 => 3,
        4..=5 => 5,
        _ => 7,
    }
}

/// `base + interval_days(priority)`, keeping the time of day
pub fn calculate_next_due(priority: f64, base: DateTime<Utc>) -> DateTime<Utc> {
    base.checked_add_signed(Duration::days(interval_days(priority)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Qualitative priority used by the quick-priority commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLabel {
    High,
    Medium,
    Low,
}

impl PriorityLabel {
    /// Day range `[min, max)` for the label
    pub fn day_range(self) -> (i64, i64) {
        match self {
            PriorityLabel::High => (1, 2),
            PriorityLabel::Medium => (3, 5),
            PriorityLabel::Low => (7, 10),
        }
    }
}

impl fmt::Display for PriorityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriorityLabel::High => "high",
            PriorityLabel::Medium => "medium",
            PriorityLabel::Low => "low",
        };
        f.write_str(label)
    }
}

impl FromStr for PriorityLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(PriorityLabel::High),
            "medium" => Ok(PriorityLabel::Medium),
            "low" => Ok(PriorityLabel::Low),
            other => Err(format!("unknown priority label '{}'", other)),
        }
    }
}

/// Uniform interval within the label's range: `floor(u * (max - min)) + min`
pub fn random_interval_days<R: Rng + ?Sized>(label: PriorityLabel, rng: &mut R) -> i64 {
    let (min, max) = label.day_range();
    let unit: f64 = rng.gen();
    (unit * (max - min) as f64).floor() as i64 + min
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_interval_table() {
        let expected = [(10, 1), (9, 2), (8, 2), (7, 3), (6, 3), (5, 5), (4, 5), (3, 7), (2, 7), (1, 7)];
        for (priority, days) in expected {
            assert_eq!(interval_days(priority as f64), days, "priority {}", priority);
        }
        assert_eq!(interval_days(11.0), 1);
        assert_eq!(interval_days(0.0), 7);
    }

    #[test]
    fn test_next_due_saturates_near_max_date() {
        assert_eq!(calculate_next_due(1.0, DateTime::<Utc>::MAX_UTC), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_normalize_priority() {
        assert_eq!(normalize_priority(7.4), 7);
        assert_eq!(normalize_priority(7.5), 8);
        assert_eq!(normalize_priority(-3.0), 1);
        assert_eq!(normalize_priority(42.0), 10);
        assert_eq!(normalize_priority(f64::NAN), DEFAULT_PRIORITY);
        assert_eq!(normalize_priority(f64::INFINITY), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_next_due_keeps_time_of_day() {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 15, 45, 0).unwrap();
        assert_eq!(
            calculate_next_due(6.0, base),
            Utc.with_ymd_and_hms(2025, 1, 4, 15, 45, 0).unwrap()
        );
    }

    #[test]
    fn test_random_interval_within_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for label in [PriorityLabel::High, PriorityLabel::Medium, PriorityLabel::Low] {
            let (min, max) = label.day_range();
            for _ in 0..200 {
                let days = random_interval_days(label, &mut rng);
                assert!(days >= min && days < max, "{} gave {}", label, days);
            }
        }
    }
}
