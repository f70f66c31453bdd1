use std::collections::HashSet;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// One named column of a panel. `None` marks a missing observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build a fully observed series.
    pub fn from_values(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().copied().map(Some).collect())
    }
}

/// Monthly panel: one row per month, one column per series.
///
/// Dates are normalized to the first day of their month and strictly increasing.
/// A panel is never mutated after construction; every derivation returns a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    series: Vec<Series>,
}

impl Panel {
    pub fn new(dates: Vec<NaiveDate>, series: Vec<Series>) -> Result<Self> {
        let dates: Vec<NaiveDate> = dates.into_iter().map(month_start).collect();
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ForecastError::InvalidPanel(format!(
                "dates must be strictly increasing by month, found {} then {}",
                w[0], w[1]
            )));
        }

        let mut seen = HashSet::new();
        for s in &series {
            if !seen.insert(s.name.as_str()) {
                return Err(ForecastError::InvalidPanel(format!(
                    "duplicate series '{}'",
                    s.name
                )));
            }
            if s.values.len() != dates.len() {
                return Err(ForecastError::InvalidPanel(format!(
                    "series '{}' has {} values for {} dates",
                    s.name,
                    s.values.len(),
                    dates.len()
                )));
            }
        }

        Ok(Self { dates, series })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn all_series(&self) -> &[Series] {
        &self.series
    }

    pub fn series(&self, name: &str) -> Result<&Series> {
        self.series
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ForecastError::UnknownSeries(name.to_string()))
    }

    pub fn contains_series(&self, name: &str) -> bool {
        self.series.iter().any(|s| s.name == name)
    }

    /// Row index of `date`'s month, if the panel has it.
    pub fn row_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&month_start(date)).ok()
    }

    /// Observation of `name` at `date`'s month. `Ok(None)` when the month is absent or
    /// the value is missing.
    pub fn value(&self, name: &str, date: NaiveDate) -> Result<Option<f64>> {
        let series = self.series(name)?;
        Ok(self.row_of(date).and_then(|row| series.values[row]))
    }

    /// Rows with `date <= as_of`.
    pub fn truncate_through(&self, as_of: NaiveDate) -> Panel {
        let as_of = month_start(as_of);
        let end = self.dates.partition_point(|d| *d <= as_of);
        self.slice_rows(0, end)
    }

    pub fn drop_leading(&self, n: usize) -> Panel {
        self.slice_rows(n.min(self.len()), self.len())
    }

    /// First pair of consecutive rows that are not exactly one month apart.
    pub fn first_gap(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.dates
            .windows(2)
            .find(|w| add_months(w[0], 1) != Some(w[1]))
            .map(|w| (w[0], w[1]))
    }

    pub(crate) fn with_series(&self, series: Vec<Series>) -> Result<Panel> {
        Panel::new(self.dates.clone(), series)
    }

    fn slice_rows(&self, start: usize, end: usize) -> Panel {
        Panel {
            dates: self.dates[start..end].to_vec(),
            series: self
                .series
                .iter()
                .map(|s| Series::new(s.name.clone(), s.values[start..end].to_vec()))
                .collect(),
        }
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// `date` moved by `n` calendar months (negative goes back), normalized to the month start.
pub fn add_months(date: NaiveDate, n: i64) -> Option<NaiveDate> {
    let base = month_start(date);
    let months = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
    if n >= 0 {
        base.checked_add_months(months)
    } else {
        base.checked_sub_months(months)
    }
}

pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let (a, b) = (month_start(from), month_start(to));
    (b.year() as i64 - a.year() as i64) * 12 + (b.month() as i64 - a.month() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dates_are_normalized_to_month_start() {
        let panel = Panel::new(
            vec![ymd(2000, 1, 15), ymd(2000, 2, 29)],
            vec![Series::from_values("A", &[1.0, 2.0])],
        )
        .unwrap();
        assert_eq!(panel.dates(), &[ymd(2000, 1, 1), ymd(2000, 2, 1)]);
        assert_eq!(panel.value("A", ymd(2000, 2, 10)).unwrap(), Some(2.0));
    }

    #[test]
    fn rejects_duplicate_months() {
        let err = Panel::new(
            vec![ymd(2000, 1, 1), ymd(2000, 1, 20)],
            vec![Series::from_values("A", &[1.0, 2.0])],
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidPanel(_)));
    }

    #[test]
    fn month_arithmetic_crosses_years() {
        assert_eq!(add_months(ymd(1999, 11, 1), 3), Some(ymd(2000, 2, 1)));
        assert_eq!(add_months(ymd(2000, 2, 1), -3), Some(ymd(1999, 11, 1)));
        assert_eq!(months_between(ymd(1999, 11, 1), ymd(2000, 2, 1)), 3);
    }

    #[test]
    fn first_gap_detects_missing_month() {
        let panel = Panel::new(
            vec![ymd(2000, 1, 1), ymd(2000, 2, 1), ymd(2000, 4, 1)],
            vec![Series::from_values("A", &[1.0, 2.0, 3.0])],
        )
        .unwrap();
        assert_eq!(panel.first_gap(), Some((ymd(2000, 2, 1), ymd(2000, 4, 1))));
    }
}
