use nalgebra::{DMatrix, DVector};

use crate::error::{ForecastError, Result};

/// Smallest accepted ratio between the extreme singular values of `XᵀX`.
pub const MIN_RECIPROCAL_CONDITION: f64 = 1e-12;

/// Ordinary least squares through the normal equations `(XᵀX) β = Xᵀy`, solved with an
/// LU decomposition.
pub fn fit(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>> {
    if x.nrows() != y.len() {
        return Err(ForecastError::InvalidParameter(format!(
            "design has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    if x.ncols() == 0 {
        return Err(ForecastError::InvalidParameter(
            "design has no columns".to_string(),
        ));
    }
    if x.nrows() < x.ncols() {
        return Err(ForecastError::SingularDesign(format!(
            "{} observations for {} coefficients",
            x.nrows(),
            x.ncols()
        )));
    }

    let xt = x.transpose();
    let xtx = &xt * x;
    let xty = &xt * y;

    let rcond = reciprocal_condition(&xtx);
    if rcond.is_nan() || rcond < MIN_RECIPROCAL_CONDITION {
        return Err(ForecastError::SingularDesign(format!(
            "normal matrix is ill-conditioned (rcond {rcond:.3e})"
        )));
    }

    let beta = xtx
        .lu()
        .solve(&xty)
        .ok_or_else(|| ForecastError::SingularDesign("LU solve failed".to_string()))?;
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(ForecastError::SingularDesign(
            "non-finite coefficients".to_string(),
        ));
    }
    Ok(beta)
}

pub fn predict(row: &DVector<f64>, beta: &DVector<f64>) -> f64 {
    row.dot(beta)
}

fn reciprocal_condition(xtx: &DMatrix<f64>) -> f64 {
    let sv = xtx.singular_values();
    let max = sv.max();
    if max <= 0.0 || !max.is_finite() {
        return 0.0;
    }
    sv.min() / max
}
