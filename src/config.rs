use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::backtest::{BacktestConfig, GapPolicy};
use crate::forecast::ModelSpec;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub backtest: BacktestSection,
    pub logging: LoggingConfig,
    /// Per-series code overrides applied on top of the codes shipped with the panel.
    #[serde(default)]
    pub transforms: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub panel_path: PathBuf,
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub target: String,
    #[serde(default)]
    pub predictors: Vec<String>,
    pub lag_count: usize,
    pub horizons: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestSection {
    pub start_date: NaiveDate,
    pub num_steps: usize,
    #[serde(default)]
    pub gap_policy: GapPolicy,
    #[serde(default)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn config_path() -> PathBuf {
    std::env::var("MF_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from_path(&config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.target.trim().is_empty() {
            bail!("model.target must not be empty");
        }
        if self.model.predictors.iter().any(|p| p == &self.model.target) {
            bail!(
                "model.predictors must not repeat the target '{}'",
                self.model.target
            );
        }
        for (i, p) in self.model.predictors.iter().enumerate() {
            if self.model.predictors[..i].contains(p) {
                bail!("model.predictors lists '{}' twice", p);
            }
        }
        self.backtest_config()
            .validate()
            .context("invalid [model]/[backtest] parameters")?;
        Ok(())
    }

    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec::new(
            self.model.target.clone(),
            self.model.predictors.clone(),
            self.model.lag_count,
        )
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            spec: self.model_spec(),
            horizons: self.model.horizons.clone(),
            start_date: self.backtest.start_date,
            num_steps: self.backtest.num_steps,
            gap_policy: self.backtest.gap_policy,
            workers: self.backtest.workers,
        }
    }
}
