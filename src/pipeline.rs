use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::backtest::backtest;
use crate::config::Config;
use crate::panel::Panel;
use crate::report::{persist_report_to_path, BacktestReport};
use crate::source::{load_panel_csv, RawPanel};
use crate::transform::{apply_plan, TransformPlan};

/// Validate every transform code, then stationarize the raw panel.
///
/// `overrides` replace the codes delivered with the panel for the series they name.
pub fn prepare_panel(raw: &RawPanel, overrides: &BTreeMap<String, i64>) -> Result<Panel> {
    let mut codes: BTreeMap<String, i64> = raw.codes.iter().cloned().collect();
    for (series, code) in overrides {
        codes.insert(series.clone(), *code);
    }
    let plan = TransformPlan::from_raw(codes).context("transform codes rejected")?;
    let panel = apply_plan(&raw.panel, &plan).context("failed to transform panel")?;
    if panel.is_empty() {
        anyhow::bail!("panel is empty after dropping leading differenced rows");
    }
    Ok(panel)
}

/// Load, transform and backtest as configured, persisting the report when a path is set.
pub fn run(config: &Config) -> Result<BacktestReport> {
    let raw = load_panel_csv(&config.data.panel_path)?;
    let panel = prepare_panel(&raw, &config.transforms)?;
    let report = backtest(&panel, &config.backtest_config()).context("backtest failed")?;
    if let Some(path) = &config.data.report_path {
        persist_report_to_path(path, &report)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(report)
}

/// [`run`] on tokio's blocking pool so the async caller stays responsive.
pub async fn run_async(config: Config) -> Result<BacktestReport> {
    tokio::task::spawn_blocking(move || run(&config))
        .await
        .context("backtest worker panicked")?
}
