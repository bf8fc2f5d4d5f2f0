//! Calendar month date ranges.

use time::{Date, Month};

/// A half-open date range covering one calendar month: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    /// The first day of the month.
    pub start: Date,
    /// The first day of the following month.
    pub end: Date,
}

impl MonthRange {
    /// The month containing `date`.
    pub fn containing(date: Date) -> Self {
        let start = date.replace_day(1).unwrap_or(date);

        let end = match start.month() {
            Month::December => Date::from_calendar_date(start.year() + 1, Month::January, 1),
            month => Date::from_calendar_date(start.year(), month.next(), 1),
        }
        // The year only overflows at the end of the representable range.
        .unwrap_or(Date::MAX);

        Self { start, end }
    }

    /// The last day of the month.
    pub fn last_day(&self) -> Date {
        self.end.previous_day().unwrap_or(self.start)
    }
}
