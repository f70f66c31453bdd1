use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use crate::panel::{Panel, Series};

const TRANSFORM_ROW_LABEL: &str = "transform:";

/// Raw panel as delivered at the input boundary, with unvalidated transform codes.
#[derive(Debug, Clone)]
pub struct RawPanel {
    pub panel: Panel,
    pub codes: Vec<(String, i64)>,
}

pub fn load_panel_csv(path: &Path) -> Result<RawPanel> {
    let file =
        std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_panel_csv(file).with_context(|| format!("failed to load panel from {}", path.display()))
}

/// Parse a FRED-MD style table: a header row `date,<series...>`, a `Transform:` row with
/// one integer code per series, then one row per month. Blank rows are ignored and empty
/// cells are missing observations.
pub fn read_panel_csv<R: Read>(reader: R) -> Result<RawPanel> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let names: Vec<String> = reader
        .headers()
        .context("missing header row")?
        .iter()
        .skip(1)
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        bail!("header row lists no series");
    }

    let mut codes = None;
    let mut dates = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];

    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("bad csv record {}", line + 2))?;
        let Some(first) = record.get(0) else { continue };
        if first.is_empty() && record.iter().all(str::is_empty) {
            continue;
        }

        if first.eq_ignore_ascii_case(TRANSFORM_ROW_LABEL) {
            let mut row = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let cell = record.get(i + 1).unwrap_or("");
                let code = parse_code(cell)
                    .with_context(|| format!("bad transform code '{cell}' for {name}"))?;
                row.push((name.clone(), code));
            }
            codes = Some(row);
            continue;
        }

        let date = parse_date(first).with_context(|| format!("bad date '{first}'"))?;
        dates.push(date);
        for (i, column) in columns.iter_mut().enumerate() {
            let cell = record.get(i + 1).unwrap_or("");
            let value = parse_value(cell)
                .with_context(|| format!("bad value '{cell}' for {} on {date}", names[i]))?;
            column.push(value);
        }
    }

    let codes = codes.context("missing Transform: row")?;
    let series = names
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name, values))
        .collect();
    let panel = Panel::new(dates, series)?;
    tracing::info!(
        rows = panel.len(),
        series = codes.len(),
        "loaded raw panel"
    );
    Ok(RawPanel { panel, codes })
}

fn parse_code(cell: &str) -> Result<i64> {
    let v: f64 = cell.parse()?;
    if v.fract() != 0.0 {
        bail!("code must be an integer");
    }
    Ok(v as i64)
}

fn parse_value(cell: &str) -> Result<Option<f64>> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell == "." {
        return Ok(None);
    }
    let v: f64 = cell.parse()?;
    Ok(v.is_finite().then_some(v))
}

fn parse_date(cell: &str) -> Result<NaiveDate> {
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(cell, fmt) {
            return Ok(d);
        }
    }
    // Month-only dates, e.g. 1959-01.
    NaiveDate::parse_from_str(&format!("{cell}-01"), "%Y-%m-%d")
        .context("expected YYYY-MM-DD, M/D/YYYY or YYYY-MM")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fred_md_layout() {
        let csv = "\
sasdate,INDPRO,CPIAUCSL
Transform:,5,6
1/1/1959,21.9,29.0
2/1/1959,22.3,
3/1/1959,22.6,29.1
";
        let raw = read_panel_csv(csv.as_bytes()).unwrap();
        assert_eq!(raw.panel.len(), 3);
        assert_eq!(
            raw.codes,
            vec![("INDPRO".to_string(), 5), ("CPIAUCSL".to_string(), 6)]
        );
        let feb = NaiveDate::from_ymd_opt(1959, 2, 1).unwrap();
        assert_eq!(raw.panel.value("CPIAUCSL", feb).unwrap(), None);
        assert_eq!(raw.panel.value("INDPRO", feb).unwrap(), Some(22.3));
    }

    #[test]
    fn missing_transform_row_is_an_error() {
        let csv = "date,A\n2000-01-01,1.0\n";
        assert!(read_panel_csv(csv.as_bytes()).is_err());
    }
}
