pub mod cache;
pub mod conversions;
pub mod filter;
pub mod visits;

use chrono::NaiveDate;

/// One calendar-day reporting window.
///
/// The bounds are inclusive on both ends (`>= start AND <= end`), which is
/// what the archive readers that consume these records expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    date: NaiveDate,
}

impl DayWindow {
    pub const fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// First instant of the day, formatted for a TIMESTAMP bind.
    pub fn start_datetime(&self) -> String {
        self.date.format("%Y-%m-%d 00:00:00").to_string()
    }

    /// Last second of the day, formatted for a TIMESTAMP bind.
    pub fn end_datetime(&self) -> String {
        self.date.format("%Y-%m-%d 23:59:59").to_string()
    }
}
