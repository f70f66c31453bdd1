//! Pseudo-real-time macroeconomic forecasting.
//!
//! A monthly [`panel::Panel`] is stationarized series by series ([`transform`]), turned
//! into lagged regressors ([`design`]), fitted by OLS ([`ols`]) once per horizon
//! ([`forecast`]), and evaluated over a rolling sequence of as-of dates ([`backtest`]).

pub mod backtest;
pub mod config;
pub mod design;
pub mod error;
pub mod forecast;
pub mod ols;
pub mod panel;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod transform;

pub use backtest::{backtest, BacktestConfig, GapPolicy};
pub use error::{ForecastError, StepFailure};
pub use forecast::{forecast, ModelSpec};
pub use panel::{Panel, Series};
pub use report::BacktestReport;
pub use transform::{apply_plan, transform, TransformCode, TransformPlan};
