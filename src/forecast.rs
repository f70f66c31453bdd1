use chrono::NaiveDate;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::design::{self, DesignMatrix};
use crate::error::{ForecastError, Result};
use crate::ols;
use crate::panel::{add_months, Panel};

/// Forecasts and actuals are reported in percentage points of the transformed series.
pub const FORECAST_SCALE: f64 = 100.0;

/// Regression layout shared by every horizon and as-of date of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub target: String,
    pub predictors: Vec<String>,
    pub lag_count: usize,
}

impl ModelSpec {
    pub fn new(target: impl Into<String>, predictors: Vec<String>, lag_count: usize) -> Self {
        Self {
            target: target.into(),
            predictors,
            lag_count,
        }
    }

    pub fn num_columns(&self) -> usize {
        1 + (self.lag_count + 1) * (1 + self.predictors.len())
    }

    /// Every series referenced by the model must be present in `panel`.
    pub fn check_against(&self, panel: &Panel) -> Result<()> {
        for name in std::iter::once(&self.target).chain(&self.predictors) {
            panel.series(name)?;
        }
        Ok(())
    }
}

/// Target values led by `horizon` months, keyed by the design row date.
///
/// Only observations dated on or before `as_of` are used.
pub fn target_vector(
    panel: &Panel,
    target: &str,
    design: &DesignMatrix,
    horizon: usize,
    as_of: NaiveDate,
) -> Result<Vec<(NaiveDate, Option<f64>)>> {
    let mut out = Vec::with_capacity(design.nrows());
    for &date in design.dates() {
        let value = match add_months(date, horizon as i64) {
            Some(lead) if lead <= as_of => panel.value(target, lead)?,
            _ => None,
        };
        out.push((date, value));
    }
    Ok(out)
}

/// Point forecast of `spec.target` at `as_of + horizon` months, scaled by
/// [`FORECAST_SCALE`].
pub fn forecast(panel: &Panel, spec: &ModelSpec, horizon: usize, as_of: NaiveDate) -> Result<f64> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "forecast horizon must be positive".to_string(),
        ));
    }

    let (design, forecast_row) = design::build(
        panel,
        &spec.target,
        &spec.predictors,
        spec.lag_count,
        as_of,
    )?;
    let targets = target_vector(panel, &spec.target, &design, horizon, as_of)?;

    let mut dates = Vec::with_capacity(targets.len());
    let mut y = Vec::with_capacity(targets.len());
    for (date, value) in targets {
        let Some(value) = value else { continue };
        if design.complete_row(date).is_none() {
            continue;
        }
        dates.push(date);
        y.push(value);
    }

    let x = design
        .select(&dates)
        .ok_or_else(|| ForecastError::SingularDesign("incomplete aligned rows".to_string()))?;
    let beta = ols::fit(&x, &DVector::from_vec(y)).map_err(|e| match e {
        ForecastError::SingularDesign(msg) => ForecastError::SingularDesign(format!(
            "{msg} (as of {as_of}, horizon {horizon}, {} aligned rows)",
            dates.len()
        )),
        other => other,
    })?;

    let point = ols::predict(&forecast_row.values, &beta) * FORECAST_SCALE;
    tracing::trace!(
        as_of = %as_of,
        horizon,
        rows = dates.len(),
        forecast = point,
        "fitted horizon model"
    );
    Ok(point)
}

/// Independent forecasts for each horizon at one as-of date.
pub fn forecast_horizons(
    panel: &Panel,
    spec: &ModelSpec,
    horizons: &[usize],
    as_of: NaiveDate,
) -> Vec<(usize, Result<f64>)> {
    horizons
        .iter()
        .map(|&h| (h, forecast(panel, spec, h, as_of)))
        .collect()
}

/// Realized target at `as_of + horizon` months in the full panel, scaled by
/// [`FORECAST_SCALE`].
pub fn realized_actual(
    panel: &Panel,
    target: &str,
    horizon: usize,
    as_of: NaiveDate,
) -> Result<Option<f64>> {
    let Some(date) = add_months(as_of, horizon as i64) else {
        return Ok(None);
    };
    Ok(panel.value(target, date)?.map(|v| v * FORECAST_SCALE))
}
