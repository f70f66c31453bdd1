use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::panel::{months_between, Panel, Series};

/// Leading rows dropped after transforming a panel, enough for second differences.
pub const MAX_DIFFERENCE_ORDER: usize = 2;

/// Stationarity transformation, keyed by the conventional integer code 1..=7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TransformCode {
    Level,
    Diff,
    Diff2,
    Log,
    LogDiff,
    LogDiff2,
    PctChange,
}

impl TransformCode {
    pub const ALL: [TransformCode; 7] = [
        Self::Level,
        Self::Diff,
        Self::Diff2,
        Self::Log,
        Self::LogDiff,
        Self::LogDiff2,
        Self::PctChange,
    ];

    pub fn code(self) -> i64 {
        match self {
            Self::Level => 1,
            Self::Diff => 2,
            Self::Diff2 => 3,
            Self::Log => 4,
            Self::LogDiff => 5,
            Self::LogDiff2 => 6,
            Self::PctChange => 7,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Number of leading observations this transform leaves undefined.
    pub fn difference_order(self) -> usize {
        match self {
            Self::Level | Self::Log => 0,
            Self::Diff | Self::LogDiff | Self::PctChange => 1,
            Self::Diff2 | Self::LogDiff2 => 2,
        }
    }

    pub fn apply(self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        match self {
            Self::Level => values.to_vec(),
            Self::Diff => difference(values),
            Self::Diff2 => difference(&difference(values)),
            Self::Log => ln(values),
            Self::LogDiff => difference(&ln(values)),
            Self::LogDiff2 => difference(&difference(&ln(values))),
            Self::PctChange => pct_change(values),
        }
    }
}

impl TryFrom<i64> for TransformCode {
    type Error = String;

    fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("invalid transformation code {code}"))
    }
}

impl From<TransformCode> for i64 {
    fn from(code: TransformCode) -> Self {
        code.code()
    }
}

/// Apply the transform identified by a raw integer code.
pub fn transform(values: &[Option<f64>], code: i64) -> Result<Vec<Option<f64>>> {
    let code = TransformCode::from_code(code).ok_or_else(|| {
        ForecastError::InvalidTransformationCode { series: None, code }
    })?;
    Ok(code.apply(values))
}

fn difference(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if !values.is_empty() {
        out.push(None);
    }
    for w in values.windows(2) {
        out.push(match (w[0], w[1]) {
            (Some(prev), Some(cur)) => Some(cur - prev),
            _ => None,
        });
    }
    out
}

fn ln(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| v.filter(|x| *x > 0.0).map(f64::ln))
        .collect()
}

fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if !values.is_empty() {
        out.push(None);
    }
    for w in values.windows(2) {
        out.push(match (w[0], w[1]) {
            (Some(prev), Some(cur)) if prev != 0.0 => Some((cur - prev) / prev),
            _ => None,
        });
    }
    out
}

/// Validated mapping from series name to transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformPlan {
    codes: BTreeMap<String, TransformCode>,
}

impl TransformPlan {
    /// Validate raw `(series, code)` pairs. Any unknown code rejects the whole plan.
    pub fn from_raw<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut codes = BTreeMap::new();
        for (series, code) in raw {
            let series = series.into();
            let parsed = TransformCode::from_code(code)
                .ok_or_else(|| ForecastError::InvalidTransformationCode {
                    series: Some(series.clone()),
                    code,
                })?;
            codes.insert(series, parsed);
        }
        Ok(Self { codes })
    }

    pub fn get(&self, series: &str) -> Option<TransformCode> {
        self.codes.get(series).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Transform every series of `panel` and drop the rows left undefined by differencing.
///
/// Differences are taken between calendar months: when the panel skips a month, values
/// that would reach across it are missing.
pub fn apply_plan(panel: &Panel, plan: &TransformPlan) -> Result<Panel> {
    if let Some(stray) = plan
        .codes
        .keys()
        .find(|name| !panel.contains_series(name))
    {
        return Err(ForecastError::UnknownSeries(stray.clone()));
    }

    let offsets = calendar_offsets(panel);
    let span = offsets.last().map_or(0, |last| last + 1);
    let mut transformed = Vec::with_capacity(panel.all_series().len());
    let mut lost_to_gaps = 0usize;
    for series in panel.all_series() {
        let code = plan
            .get(&series.name)
            .ok_or_else(|| ForecastError::MissingTransformationCode(series.name.clone()))?;

        let mut calendar = vec![None; span];
        for (&offset, value) in offsets.iter().zip(&series.values) {
            calendar[offset] = *value;
        }
        let out = code.apply(&calendar);
        let values: Vec<Option<f64>> = offsets.iter().map(|&offset| out[offset]).collect();

        if span > offsets.len() {
            let positional = code.apply(&series.values);
            lost_to_gaps += positional
                .iter()
                .zip(&values)
                .skip(code.difference_order())
                .filter(|(p, v)| p.is_some() && v.is_none())
                .count();
        }
        transformed.push(Series::new(series.name.clone(), values));
    }

    if lost_to_gaps > 0 {
        tracing::warn!(
            missing_months = span - offsets.len(),
            values = lost_to_gaps,
            "differences across missing months left undefined"
        );
    }

    let out = panel.with_series(transformed)?.drop_leading(MAX_DIFFERENCE_ORDER);
    tracing::debug!(
        series = plan.len(),
        rows = out.len(),
        "applied stationarity transforms"
    );
    Ok(out)
}

/// Month offset of every panel row from the first row.
fn calendar_offsets(panel: &Panel) -> Vec<usize> {
    match panel.first_date() {
        Some(first) => panel
            .dates()
            .iter()
            .map(|&date| months_between(first, date) as usize)
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_rejects_out_of_range_codes() {
        let ok: TransformCode = serde_json::from_str("5").unwrap();
        assert_eq!(ok, TransformCode::LogDiff);
        assert!(serde_json::from_str::<TransformCode>("8").is_err());
        assert_eq!(serde_json::to_string(&TransformCode::PctChange).unwrap(), "7");
    }

    #[test]
    fn difference_orders_match_leading_gaps() {
        let values: Vec<Option<f64>> = (1..=6).map(|v| Some(v as f64 * v as f64)).collect();
        for code in TransformCode::ALL {
            let out = code.apply(&values);
            let leading = out.iter().take_while(|v| v.is_none()).count();
            assert_eq!(leading, code.difference_order(), "{code:?}");
        }
    }
}
