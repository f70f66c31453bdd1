use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForecastError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("invalid transformation code {code}{} (expected 1..=7)", for_series(.series))]
    InvalidTransformationCode { series: Option<String>, code: i64 },

    #[error("series '{0}' has no transformation code")]
    MissingTransformationCode(String),

    #[error("unknown series '{0}'")]
    UnknownSeries(String),

    #[error("insufficient history as of {as_of}: need {needed} rows, have {available}")]
    InsufficientHistory {
        as_of: NaiveDate,
        needed: usize,
        available: usize,
    },

    #[error("singular design: {0}")]
    SingularDesign(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid panel: {0}")]
    InvalidPanel(String),

    #[error("panel skips from {before} to {after}")]
    MonthGap { before: NaiveDate, after: NaiveDate },
}

impl ForecastError {
    /// Errors that only invalidate one (as-of date, horizon) pair of a backtest.
    pub fn is_step_scoped(&self) -> bool {
        matches!(
            self,
            Self::InsufficientHistory { .. } | Self::SingularDesign(_)
        )
    }
}

fn for_series(series: &Option<String>) -> String {
    series
        .as_deref()
        .map(|name| format!(" for series '{name}'"))
        .unwrap_or_default()
}

/// Why a single forecast was excluded from aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StepFailure {
    InsufficientHistory(String),
    SingularDesign(String),
    MissingAsOfMonth,
    MissingActual,
}

impl StepFailure {
    pub fn label(&self) -> &'static str {
        match self {
            Self::InsufficientHistory(_) => "insufficient_history",
            Self::SingularDesign(_) => "singular_design",
            Self::MissingAsOfMonth => "missing_as_of_month",
            Self::MissingActual => "missing_actual",
        }
    }
}

impl TryFrom<&ForecastError> for StepFailure {
    type Error = ForecastError;

    fn try_from(err: &ForecastError) -> std::result::Result<Self, Self::Error> {
        match err {
            ForecastError::InsufficientHistory { .. } => {
                Ok(Self::InsufficientHistory(err.to_string()))
            }
            ForecastError::SingularDesign(msg) => Ok(Self::SingularDesign(msg.clone())),
            other => Err(other.clone()),
        }
    }
}
