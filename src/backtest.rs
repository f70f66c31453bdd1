use std::collections::BTreeSet;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result, StepFailure};
use crate::forecast::{self, ModelSpec};
use crate::panel::{add_months, months_between, Panel};
use crate::report::BacktestReport;

/// What to do when the panel skips a calendar month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Reject the panel before any step runs.
    Fail,
    /// Run anyway; steps whose as-of month is absent are recorded as skipped.
    #[default]
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub spec: ModelSpec,
    pub horizons: Vec<usize>,
    pub start_date: NaiveDate,
    pub num_steps: usize,
    #[serde(default)]
    pub gap_policy: GapPolicy,
    /// Worker threads for step evaluation; `None` uses the global rayon pool.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.horizons.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "at least one horizon is required".to_string(),
            ));
        }
        if self.horizons.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "horizons must be positive".to_string(),
            ));
        }
        let unique: BTreeSet<_> = self.horizons.iter().collect();
        if unique.len() != self.horizons.len() {
            return Err(ForecastError::InvalidParameter(
                "horizons must be distinct".to_string(),
            ));
        }
        if self.workers == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "workers must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// As-of date of `step`: one month past the previous step, starting one month after
    /// `start_date`.
    pub fn as_of_date(&self, step: usize) -> Result<NaiveDate> {
        add_months(self.start_date, step as i64 + 1).ok_or_else(|| {
            ForecastError::InvalidParameter(format!("as-of date of step {step} overflows"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HorizonOutcome {
    Evaluated {
        forecast: f64,
        actual: f64,
        error: f64,
    },
    MissingActual {
        forecast: f64,
    },
    Failed {
        reason: StepFailure,
    },
}

impl HorizonOutcome {
    pub fn error(&self) -> Option<f64> {
        match self {
            Self::Evaluated { error, .. } => Some(*error),
            _ => None,
        }
    }

    pub fn forecast(&self) -> Option<f64> {
        match self {
            Self::Evaluated { forecast, .. } | Self::MissingActual { forecast } => Some(*forecast),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonResult {
    pub horizon: usize,
    pub outcome: HorizonOutcome,
}

/// Everything one backtest step produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub as_of: NaiveDate,
    pub results: Vec<HorizonResult>,
}

impl StepRecord {
    pub fn outcome(&self, horizon: usize) -> Option<&HorizonOutcome> {
        self.results
            .iter()
            .find(|r| r.horizon == horizon)
            .map(|r| &r.outcome)
    }
}

/// Evaluate every horizon at a single as-of date.
///
/// Step-scoped failures are recorded in the returned record instead of being
/// propagated. Other errors (unknown series, bad parameters) are returned.
pub fn evaluate_step(
    panel: &Panel,
    config: &BacktestConfig,
    step: usize,
    as_of: NaiveDate,
) -> Result<StepRecord> {
    let spec = &config.spec;
    let mut results = Vec::with_capacity(config.horizons.len());

    let inside_panel = matches!(
        (panel.first_date(), panel.last_date()),
        (Some(first), Some(last)) if first <= as_of && as_of <= last
    );
    if inside_panel && panel.row_of(as_of).is_none() {
        tracing::warn!(step, as_of = %as_of, "as-of month missing from panel, skipping step");
        for &horizon in &config.horizons {
            results.push(HorizonResult {
                horizon,
                outcome: HorizonOutcome::Failed {
                    reason: StepFailure::MissingAsOfMonth,
                },
            });
        }
        return Ok(StepRecord {
            step,
            as_of,
            results,
        });
    }

    for &horizon in &config.horizons {
        let outcome = match forecast::forecast(panel, spec, horizon, as_of) {
            Ok(point) => match forecast::realized_actual(panel, &spec.target, horizon, as_of)? {
                Some(actual) => HorizonOutcome::Evaluated {
                    forecast: point,
                    actual,
                    error: actual - point,
                },
                None => {
                    tracing::debug!(step, as_of = %as_of, horizon, "no realized value yet");
                    HorizonOutcome::MissingActual { forecast: point }
                }
            },
            Err(e) if e.is_step_scoped() => {
                tracing::warn!(
                    step,
                    as_of = %as_of,
                    horizon,
                    error = %e,
                    "forecast excluded from aggregation"
                );
                HorizonOutcome::Failed {
                    reason: StepFailure::try_from(&e)?,
                }
            }
            Err(e) => return Err(e),
        };
        results.push(HorizonResult { horizon, outcome });
    }

    Ok(StepRecord {
        step,
        as_of,
        results,
    })
}

/// Rolling pseudo-out-of-sample evaluation.
///
/// Steps are independent and run on a rayon pool; the report keeps them in step order.
pub fn backtest(panel: &Panel, config: &BacktestConfig) -> Result<BacktestReport> {
    config.validate()?;
    config.spec.check_against(panel)?;
    if config.gap_policy == GapPolicy::Fail {
        if let Some((before, after)) = panel.first_gap() {
            return Err(ForecastError::MonthGap { before, after });
        }
    }

    let as_of_dates = (0..config.num_steps)
        .map(|step| config.as_of_date(step))
        .collect::<Result<Vec<_>>>()?;

    let span_months = match (panel.first_date(), panel.last_date()) {
        (Some(first), Some(last)) => months_between(first, last) + 1,
        _ => 0,
    };
    tracing::info!(
        target_series = %config.spec.target,
        rows = panel.len(),
        span_months,
        predictors = config.spec.predictors.len(),
        lag_count = config.spec.lag_count,
        horizons = ?config.horizons,
        steps = config.num_steps,
        "starting backtest"
    );

    let run = || {
        as_of_dates
            .par_iter()
            .enumerate()
            .map(|(step, &as_of)| evaluate_step(panel, config, step, as_of))
            .collect::<Result<Vec<_>>>()
    };
    let steps = match config.workers {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| ForecastError::InvalidParameter(format!("worker pool: {e}")))?
            .install(run)?,
        None => run()?,
    };

    let report = BacktestReport::from_steps(&config.spec, &config.horizons, steps);
    for summary in report.summaries() {
        tracing::info!(
            horizon = summary.horizon,
            rmsfe = ?summary.rmsfe,
            valid = summary.valid,
            missing_actual = summary.missing_actual,
            failed = summary.failed,
            "horizon summary"
        );
    }
    Ok(report)
}

/// Root-mean-squared error; `None` when there is nothing to aggregate.
pub fn rmsfe(errors: &[f64]) -> Option<f64> {
    if errors.is_empty() {
        return None;
    }
    let mse = errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64;
    Some(mse.sqrt())
}
