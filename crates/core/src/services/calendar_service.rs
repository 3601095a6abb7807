use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::{error, info, warn};

use crate::providers::traits::HolidaySource;

/// Business-day calendar: weekdays that are not cached holidays.
///
/// The holiday set is loaded once at startup for a window of years. If the
/// source fails, the calendar keeps working with whatever it has and
/// business-day counts become approximate.
#[derive(Debug, Default)]
pub struct CalendarService {
    holidays: RwLock<HashSet<NaiveDate>>,
}

impl CalendarService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: RwLock::new(holidays.into_iter().collect()),
        }
    }

    /// Fetch holidays for every year in `[from_year, to_year]`.
    /// Never fails; returns the number of holidays now cached.
    pub async fn load_holidays(&self, source: &dyn HolidaySource, from_year: i32, to_year: i32) -> usize {
        let mut failed_years = Vec::new();
        for year in from_year..=to_year {
            match source.holidays(year).await {
                Ok(days) => {
                    let mut set = self.holidays.write().unwrap_or_else(|e| e.into_inner());
                    set.extend(days);
                }
                Err(e) => {
                    warn!(year, source = source.name(), error = %e, "Holiday fetch failed");
                    failed_years.push(year);
                }
            }
        }

        let total = self.holiday_count();
        if !failed_years.is_empty() {
            error!(
                ?failed_years,
                cached = total,
                "Holiday calendar incomplete; business-day counts are approximate"
            );
        } else {
            info!(cached = total, from_year, to_year, "Holiday calendar loaded");
        }
        total
    }

    pub fn holiday_count(&self) -> usize {
        self.holidays.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&date)
    }

    /// False on Saturdays, Sundays and cached holidays.
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Business days in `[start, end)`; 0 when `end <= start`.
    pub fn count_business_days(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        if end <= start {
            return 0;
        }
        let holidays = self.holidays.read().unwrap_or_else(|e| e.into_inner());
        start
            .iter_days()
            .take_while(|d| *d < end)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) && !holidays.contains(d))
            .count() as i64
    }
}
