use anyhow::Result;

use macro_forecast::config::Config;
use macro_forecast::pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set MF_CONFIG_PATH or create config/default.toml");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        config
            .logging
            .level
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        panel = %config.data.panel_path.display(),
        target_series = %config.model.target,
        lag_count = config.model.lag_count,
        "Starting macro-forecast"
    );

    let report = tokio::select! {
        res = pipeline::run_async(config) => res?,
        _ = tokio::signal::ctrl_c() => {
            // The blocking backtest cannot be cancelled, so leave without waiting for it.
            tracing::warn!("Ctrl+C received, exiting before the backtest completes");
            std::process::exit(130);
        }
    };

    for summary in report.summaries() {
        match summary.rmsfe {
            Some(v) => println!(
                "h={:<3} rmsfe={:.4} valid={} missing_actual={} failed={}",
                summary.horizon, v, summary.valid, summary.missing_actual, summary.failed
            ),
            None => println!(
                "h={:<3} rmsfe=undefined valid=0 missing_actual={} failed={}",
                summary.horizon, summary.missing_actual, summary.failed
            ),
        }
    }
    for pending in report.pending_forecasts() {
        println!(
            "h={:<3} as_of={} forecast={:.4} (not yet realized)",
            pending.horizon, pending.as_of, pending.forecast
        );
    }
    let skipped = report.skipped();
    if !skipped.is_empty() {
        tracing::warn!(count = skipped.len(), "forecasts excluded from RMSFE");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
