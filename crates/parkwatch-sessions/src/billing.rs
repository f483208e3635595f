use chrono::{DateTime, Utc};
use parkwatch_core::config::BillingConfig;

/// Hourly parking tariff with a minimum billed duration.
///
/// Stays shorter than the minimum are billed as the minimum; longer stays are
/// billed pro rata, so 150 minutes at 2000/hour costs 5000.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tariff {
    pub rate_per_hour: f64,
    pub minimum_hours: f64,
}

impl Tariff {
    pub fn new(rate_per_hour: f64, minimum_hours: f64) -> Self {
        Self {
            rate_per_hour,
            minimum_hours,
        }
    }

    pub fn fee(&self, duration_minutes: i64) -> f64 {
        let hours = duration_minutes as f64 / 60.0;
        hours.max(self.minimum_hours) * self.rate_per_hour
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Self::from(&BillingConfig::default())
    }
}

impl From<&BillingConfig> for Tariff {
    fn from(cfg: &BillingConfig) -> Self {
        Self::new(cfg.rate_per_hour, cfg.minimum_hours)
    }
}

/// Whole minutes between entry and exit, rounded down. A clock that went
/// backwards yields zero rather than a negative stay.
pub fn billable_minutes(entry: DateTime<Utc>, exit: DateTime<Utc>) -> i64 {
    (exit - entry).num_minutes().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn short_stay_billed_minimum_hour() {
        let tariff = Tariff::default();
        assert_eq!(tariff.fee(0), 2000.0);
        assert_eq!(tariff.fee(40), 2000.0);
        assert_eq!(tariff.fee(60), 2000.0);
    }

    #[test]
    fn long_stay_billed_pro_rata() {
        let tariff = Tariff::default();
        assert_eq!(tariff.fee(90), 3000.0);
        assert_eq!(tariff.fee(150), 5000.0);
    }

    #[test]
    fn custom_rate() {
        let tariff = Tariff::new(3000.0, 2.0);
        assert_eq!(tariff.fee(30), 6000.0);
        assert_eq!(tariff.fee(180), 9000.0);
    }

    #[test]
    fn minutes_floor_partial_minutes() {
        let entry = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();
        let exit = entry + Duration::seconds(40 * 60 + 59);
        assert_eq!(billable_minutes(entry, exit), 40);
        assert_eq!(billable_minutes(exit, entry), 0);
    }
}
