use std::fmt;

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::panel::{add_months, Panel};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesignColumn {
    Intercept,
    Lag { series: String, lag: usize },
}

impl fmt::Display for DesignColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intercept => write!(f, "const"),
            Self::Lag { series, lag } => write!(f, "{series}_L{lag}"),
        }
    }
}

/// Column layout: intercept, target lags `0..=lag_count`, then each predictor's lags in
/// input order.
pub fn design_columns(target: &str, predictors: &[String], lag_count: usize) -> Vec<DesignColumn> {
    let mut columns = Vec::with_capacity(1 + (lag_count + 1) * (1 + predictors.len()));
    columns.push(DesignColumn::Intercept);
    for series in std::iter::once(target).chain(predictors.iter().map(String::as_str)) {
        for lag in 0..=lag_count {
            columns.push(DesignColumn::Lag {
                series: series.to_string(),
                lag,
            });
        }
    }
    columns
}

/// Lagged regressors keyed by date. Rows whose lag history reaches outside the panel
/// carry `None` in the affected cells.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    columns: Vec<DesignColumn>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<Option<f64>>>,
}

impl DesignMatrix {
    pub fn columns(&self) -> &[DesignColumn] {
        &self.columns
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn row(&self, i: usize) -> &[Option<f64>] {
        &self.rows[i]
    }

    /// Fully observed row at `date`, if any.
    pub fn complete_row(&self, date: NaiveDate) -> Option<Vec<f64>> {
        let i = self.dates.binary_search(&date).ok()?;
        self.rows[i].iter().copied().collect()
    }

    /// Dense regressor matrix for the given dates, in order. Every row must be complete.
    pub fn select(&self, dates: &[NaiveDate]) -> Option<DMatrix<f64>> {
        let mut data = Vec::with_capacity(dates.len() * self.ncols());
        for date in dates {
            data.extend(self.complete_row(*date)?);
        }
        Some(DMatrix::from_row_slice(dates.len(), self.ncols(), &data))
    }
}

/// Regressor snapshot at the latest date known as of the cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub values: DVector<f64>,
}

/// Build the lagged design matrix from observations dated on or before `as_of`.
pub fn build(
    panel: &Panel,
    target: &str,
    predictors: &[String],
    lag_count: usize,
    as_of: NaiveDate,
) -> Result<(DesignMatrix, ForecastRow)> {
    let window = panel.truncate_through(as_of);
    let needed = lag_count + 1;
    let insufficient = |available| ForecastError::InsufficientHistory {
        as_of,
        needed,
        available,
    };
    if window.len() < needed {
        return Err(insufficient(window.len()));
    }

    let columns = design_columns(target, predictors, lag_count);
    let mut sources = Vec::with_capacity(columns.len());
    for column in &columns {
        if let DesignColumn::Lag { series, lag } = column {
            sources.push((window.series(series)?, *lag));
        }
    }

    let mut rows = Vec::with_capacity(window.len());
    for &date in window.dates() {
        let mut row = Vec::with_capacity(columns.len());
        row.push(Some(1.0));
        for (series, lag) in &sources {
            let cell = add_months(date, -(*lag as i64))
                .and_then(|d| window.row_of(d))
                .and_then(|i| series.values[i]);
            row.push(cell);
        }
        rows.push(row);
    }

    let design = DesignMatrix {
        columns,
        dates: window.dates().to_vec(),
        rows,
    };

    let last = design.nrows() - 1;
    let date = design.dates[last];
    let values = design
        .complete_row(date)
        .ok_or_else(|| insufficient(complete_rows(&design)))?;

    Ok((
        design,
        ForecastRow {
            date,
            values: DVector::from_vec(values),
        },
    ))
}

fn complete_rows(design: &DesignMatrix) -> usize {
    design
        .rows
        .iter()
        .filter(|r| r.iter().all(Option::is_some))
        .count()
}
