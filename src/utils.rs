use crate::error::{Result, RollupError};
use chrono::{Datelike, Days, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Inclusive calendar window `[start, end]` a rollup is evaluated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(RollupError::DateError(format!(
                "Window end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Result<Self> {
        let start = first_day_of_month(date.year(), date.month())?;
        let end = last_day_of_month(date.year(), date.month())?;
        Ok(Self { start, end })
    }

    /// Accepts "YYYY-MM" or "YYYY-MM:YYYY-MM".
    pub fn parse(period: &str) -> Result<Self> {
        let (start, end) = parse_period_string(period)?;
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// True when `[start, end]` shares at least one day with this window.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && end >= self.start
    }

    /// Calendar months touched by the window, each clipped to the window.
    pub fn months(&self) -> Result<Vec<DateRange>> {
        get_month_ends_in_period(self.start, self.end)?
            .into_iter()
            .chain(self.trailing_partial_month()?)
            .map(|month_end| {
                let month = Self::month_of(month_end)?;
                Ok(Self {
                    start: month.start.max(self.start),
                    end: month.end.min(self.end),
                })
            })
            .collect()
    }

    fn trailing_partial_month(&self) -> Result<Option<NaiveDate>> {
        let end_of_last = last_day_of_month(self.end.year(), self.end.month())?;
        if end_of_last > self.end {
            Ok(Some(self.end))
        } else {
            Ok(None)
        }
    }
}

pub fn first_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| RollupError::DateError(format!("Invalid month {}-{:02}", year, month)))
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    first_day_of_month(next_year, next_month)?
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| RollupError::DateError(format!("Invalid month {}-{:02}", year, month)))
}

pub fn next_month_end(date: NaiveDate) -> Result<NaiveDate> {
    let year = if date.month() == 12 {
        date.year() + 1
    } else {
        date.year()
    };

    let month = if date.month() == 12 {
        1
    } else {
        date.month() + 1
    };

    last_day_of_month(year, month)
}

/// Month-end dates that fall inside `[start, end]`.
pub fn get_month_ends_in_period(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();

    let mut current = last_day_of_month(start.year(), start.month())?;
    while current <= end {
        if current >= start {
            dates.push(current);
        }
        current = next_month_end(current)?;
    }

    Ok(dates)
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// Returns (start_date, end_date)
pub fn parse_period_string(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = period.split(':').collect();

    let parse_month = |raw: &str| -> Result<NaiveDate> {
        let with_day = format!("{}-01", raw.trim());
        NaiveDate::parse_from_str(&with_day, "%Y-%m-%d").map_err(|_| {
            RollupError::DateError(format!(
                "Invalid date format in period: {}. Expected YYYY-MM",
                raw
            ))
        })
    };

    match parts.as_slice() {
        [single] => {
            let start = parse_month(single)?;
            let end = last_day_of_month(start.year(), start.month())?;
            Ok((start, end))
        }
        [from, to] => {
            let start = parse_month(from)?;
            let end_ref = parse_month(to)?;
            let end = last_day_of_month(end_ref.year(), end_ref.month())?;
            Ok((start, end))
        }
        _ => Err(RollupError::DateError(format!(
            "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
            period
        ))),
    }
}

/// `numerator / denominator`, or 0 whenever the result would not be a finite number.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

pub fn percentage(part: f64, whole: f64) -> f64 {
    safe_ratio(part, whole) * 100.0
}

/// `variance / |expected| * 100`, 0 when nothing was expected.
pub fn variance_percentage(variance: f64, expected: f64) -> f64 {
    percentage(variance, expected.abs())
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Unweighted mean; 0 for an empty slice.
pub fn average(values: &[f64]) -> f64 {
    safe_ratio(values.iter().sum(), values.len() as f64)
}
