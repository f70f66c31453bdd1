use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backtest::{rmsfe, HorizonOutcome, StepRecord};
use crate::error::StepFailure;
use crate::forecast::ModelSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonSummary {
    pub horizon: usize,
    /// `None` when no step produced a valid error for this horizon.
    pub rmsfe: Option<f64>,
    pub valid: usize,
    pub missing_actual: usize,
    pub failed: usize,
}

/// A (date, horizon) pair left out of the RMSFE aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedForecast {
    pub step: usize,
    pub as_of: NaiveDate,
    pub horizon: usize,
    pub reason: StepFailure,
}

/// A forecast whose target month has not been observed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingForecast {
    pub as_of: NaiveDate,
    pub horizon: usize,
    pub forecast: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub spec: ModelSpec,
    pub horizons: Vec<usize>,
    steps: Vec<StepRecord>,
    summaries: Vec<HorizonSummary>,
}

impl BacktestReport {
    pub fn from_steps(spec: &ModelSpec, horizons: &[usize], steps: Vec<StepRecord>) -> Self {
        let summaries = horizons
            .iter()
            .map(|&horizon| summarize(horizon, &steps))
            .collect();
        Self {
            spec: spec.clone(),
            horizons: horizons.to_vec(),
            steps,
            summaries,
        }
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn summaries(&self) -> &[HorizonSummary] {
        &self.summaries
    }

    pub fn summary(&self, horizon: usize) -> Option<&HorizonSummary> {
        self.summaries.iter().find(|s| s.horizon == horizon)
    }

    pub fn rmsfe_by_horizon(&self) -> BTreeMap<usize, Option<f64>> {
        self.summaries.iter().map(|s| (s.horizon, s.rmsfe)).collect()
    }

    /// Forecast errors, one row per step and one column per horizon in configured order.
    pub fn error_matrix(&self) -> Vec<Vec<Option<f64>>> {
        self.steps
            .iter()
            .map(|step| {
                self.horizons
                    .iter()
                    .map(|&h| step.outcome(h).and_then(HorizonOutcome::error))
                    .collect()
            })
            .collect()
    }

    /// Latest forecast per horizon among those still awaiting a realized value.
    pub fn pending_forecasts(&self) -> Vec<PendingForecast> {
        self.horizons
            .iter()
            .filter_map(|&horizon| {
                self.steps.iter().rev().find_map(|step| match step.outcome(horizon)? {
                    outcome @ HorizonOutcome::MissingActual { .. } => Some(PendingForecast {
                        as_of: step.as_of,
                        horizon,
                        forecast: outcome.forecast()?,
                    }),
                    _ => None,
                })
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<SkippedForecast> {
        let mut out = Vec::new();
        for step in &self.steps {
            for result in &step.results {
                let reason = match &result.outcome {
                    HorizonOutcome::Evaluated { .. } => continue,
                    HorizonOutcome::MissingActual { .. } => StepFailure::MissingActual,
                    HorizonOutcome::Failed { reason } => reason.clone(),
                };
                out.push(SkippedForecast {
                    step: step.step,
                    as_of: step.as_of,
                    horizon: result.horizon,
                    reason,
                });
            }
        }
        out
    }
}

fn summarize(horizon: usize, steps: &[StepRecord]) -> HorizonSummary {
    let mut errors = Vec::with_capacity(steps.len());
    let mut missing_actual = 0;
    let mut failed = 0;
    for outcome in steps.iter().filter_map(|s| s.outcome(horizon)) {
        match outcome {
            HorizonOutcome::Evaluated { error, .. } => errors.push(*error),
            HorizonOutcome::MissingActual { .. } => missing_actual += 1,
            HorizonOutcome::Failed { .. } => failed += 1,
        }
    }
    HorizonSummary {
        horizon,
        rmsfe: rmsfe(&errors),
        valid: errors.len(),
        missing_actual,
        failed,
    }
}

pub fn persist_report_to_path(path: &Path, report: &BacktestReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(report).context("failed to serialize backtest report json")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_report_from_path(path: &Path) -> Result<BacktestReport> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&payload).context("failed to parse backtest report json")
}
