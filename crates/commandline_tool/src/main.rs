use anyhow::Result;
use chrono::{Datelike, Local, Timelike};
use commandline_tool::{parse_args, run};
use rand::SeedableRng;
use rand::{Rng, rngs::StdRng};
use std::fs;
use std::path::Path;
use tracing_appender::rolling;
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter as SubLevel;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Move the previous run's `latest.log` aside under a date-coded name.
fn archive_latest_log(log_dir: &Path) {
    let latest_path = log_dir.join("latest.log");
    let Ok(modified) = fs::metadata(&latest_path).and_then(|meta| meta.modified()) else {
        return;
    };

    // yyMMddHH plus two random digits
    let datetime: chrono::DateTime<Local> = modified.into();
    let mut rng = StdRng::from_entropy();
    let rnd: u8 = rng.gen_range(0..100);
    let code = format!(
        "{:02}{:02}{:02}{:02}{:02}",
        datetime.year() % 100,
        datetime.month(),
        datetime.day(),
        datetime.hour(),
        rnd
    );

    let mut final_path = log_dir.join(format!("{}.log", code));
    let mut idx = 1;
    while final_path.exists() {
        final_path = log_dir.join(format!("{}-{}.log", code, idx));
        idx += 1;
    }
    let _ = fs::rename(&latest_path, &final_path);
}

/// Console gets WARN (DEBUG with `--debug`); `log/latest.log` gets INFO (DEBUG).
fn init_logging(debug: bool) {
    let _ = LogTracer::init();

    let log_dir = Path::new("log");
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }
    archive_latest_log(log_dir);

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_timer(fmt::time::uptime());

    let file_appender = rolling::never(log_dir, "latest.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Flushes pending lines at exit.
    let _guard: &'static _ = Box::leak(Box::new(guard));

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    let stdout_filter = if debug { SubLevel::DEBUG } else { SubLevel::WARN };
    let file_filter = if debug { SubLevel::DEBUG } else { SubLevel::INFO };

    let subscriber = tracing_subscriber::registry()
        .with(stdout_layer.with_filter(stdout_filter))
        .with(file_layer.with_filter(file_filter));
    let _ = subscriber.try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = parse_args();
    init_logging(cli.debug);
    tracing::debug!("cobol2java {} starting", env!("CARGO_PKG_VERSION"));
    run(cli).await
}
