use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// A single card spend, keyed by the upstream transaction ID. Immutable
/// once stored; re-syncing the same transaction is a no-op.
#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub id: String,
    pub date: NaiveDate,
    /// Amount in minor units of the local currency, truncated toward zero
    /// once at transform time.
    pub amount: i64,
    pub account: String,
    pub category: String,
    pub location: String,
    pub vendor: String,
}

/// A calendar month. Only constructible with a month number in 1..=12, so
/// `first_day` cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Full English month name, e.g. "February".
    pub fn name(&self) -> String {
        self.first_day().format("%B").to_string()
    }
}
