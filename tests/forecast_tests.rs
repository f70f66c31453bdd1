use chrono::NaiveDate;
use macro_forecast::forecast::{forecast, forecast_horizons, realized_actual, ModelSpec};
use macro_forecast::panel::{add_months, Panel, Series};
use macro_forecast::ForecastError;

fn month(i: usize) -> NaiveDate {
    add_months(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), i as i64).unwrap()
}

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn trend_panel(n: usize) -> Panel {
    let y: Vec<f64> = (0..n).map(|t| t as f64).collect();
    let c = vec![3.0; n];
    Panel::new(
        (0..n).map(month).collect(),
        vec![Series::from_values("Y", &y), Series::from_values("C", &c)],
    )
    .unwrap()
}

#[test]
fn linear_trend_forecast_extends_the_trend() {
    let panel = trend_panel(60);
    let spec = ModelSpec::new("Y", vec![], 0);
    let as_of = month(59);
    for h in [1usize, 3, 12] {
        let point = forecast(&panel, &spec, h, as_of).unwrap();
        assert!(
            (point / 100.0 - (59.0 + h as f64)).abs() < 1e-6,
            "h={h}: {point}"
        );
    }
}

#[test]
fn linear_trend_on_any_window() {
    let panel = trend_panel(60);
    let spec = ModelSpec::new("Y", vec![], 0);
    for last in [10usize, 25, 40] {
        let point = forecast(&panel, &spec, 1, month(last)).unwrap();
        assert!((point / 100.0 - (last as f64 + 1.0)).abs() < 1e-6);
    }
}

#[test]
fn constant_predictor_is_singular() {
    let panel = trend_panel(60);
    let spec = ModelSpec::new("Y", vec!["C".to_string()], 0);
    assert!(matches!(
        forecast(&panel, &spec, 1, month(59)),
        Err(ForecastError::SingularDesign(_))
    ));
}

#[test]
fn too_few_aligned_rows_is_singular() {
    let panel = trend_panel(60);
    let spec = ModelSpec::new("Y", vec![], 2);
    // rows 2 and 3 have full lags, only row 2 has a realized target
    assert!(matches!(
        forecast(&panel, &spec, 1, month(3)),
        Err(ForecastError::SingularDesign(_))
    ));
}

#[test]
fn zero_horizon_is_rejected() {
    let panel = trend_panel(20);
    let spec = ModelSpec::new("Y", vec![], 0);
    assert!(matches!(
        forecast(&panel, &spec, 0, month(19)),
        Err(ForecastError::InvalidParameter(_))
    ));
}

fn noisy_panel(n: usize, seed: u64) -> Panel {
    let mut rng = Lcg(seed);
    let y: Vec<f64> = (0..n).map(|_| rng.next()).collect();
    let x: Vec<f64> = (0..n).map(|_| rng.next()).collect();
    Panel::new(
        (0..n).map(month).collect(),
        vec![Series::from_values("Y", &y), Series::from_values("X", &x)],
    )
    .unwrap()
}

#[test]
fn observations_after_the_cutoff_never_leak() {
    let panel = noisy_panel(80, 7);
    let spec = ModelSpec::new("Y", vec!["X".to_string()], 2);
    let as_of = month(50);

    let mut altered = panel.all_series().to_vec();
    for s in &mut altered {
        for v in s.values.iter_mut().skip(51) {
            *v = Some(1.0e6);
        }
    }
    let altered = Panel::new(panel.dates().to_vec(), altered).unwrap();

    for h in [1usize, 4] {
        let a = forecast(&panel, &spec, h, as_of).unwrap();
        let b = forecast(&altered, &spec, h, as_of).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn horizons_are_estimated_independently() {
    let panel = noisy_panel(80, 11);
    let spec = ModelSpec::new("Y", vec!["X".to_string()], 1);
    let as_of = month(60);
    let all = forecast_horizons(&panel, &spec, &[1, 2, 6], as_of);
    assert_eq!(all.len(), 3);
    for (h, res) in all {
        assert_eq!(res.unwrap(), forecast(&panel, &spec, h, as_of).unwrap());
    }
}

#[test]
fn realized_actual_reads_the_lead_month_scaled() {
    let panel = trend_panel(30);
    assert_eq!(realized_actual(&panel, "Y", 3, month(10)).unwrap(), Some(1300.0));
    assert_eq!(realized_actual(&panel, "Y", 3, month(28)).unwrap(), None);
}

/// INDPRO depends on its own fifth lag and the fifth lag of CPIAUCSL, so the one-step
/// target is an exact linear function of the fourth-lag regressors while no linear
/// relation ties regressors inside the lag window together.
fn exact_panel() -> Panel {
    let n = 120;
    let mut rng = Lcg(2024);
    let cpi: Vec<f64> = (0..n).map(|_| rng.next()).collect();
    let unrate: Vec<f64> = (0..n).map(|_| rng.next()).collect();
    let mut indpro: Vec<f64> = (0..5).map(|_| rng.next()).collect();
    for t in 5..n {
        indpro.push(0.5 * indpro[t - 5] + 0.8 * cpi[t - 5] + 0.2);
    }
    Panel::new(
        (0..n).map(month).collect(),
        vec![
            Series::from_values("INDPRO", &indpro),
            Series::from_values("CPIAUCSL", &cpi),
            Series::from_values("UNRATE", &unrate),
        ],
    )
    .unwrap()
}

#[test]
fn exact_linear_relation_is_forecast_without_error() {
    let panel = exact_panel();
    let spec = ModelSpec::new(
        "INDPRO",
        vec!["CPIAUCSL".to_string(), "UNRATE".to_string()],
        4,
    );
    let as_of = month(100);
    let point = forecast(&panel, &spec, 1, as_of).unwrap();
    let actual = realized_actual(&panel, "INDPRO", 1, as_of).unwrap().unwrap();
    assert!((actual - point).abs() < 1e-6, "actual={actual} forecast={point}");
}
