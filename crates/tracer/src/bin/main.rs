// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Interactive sandbox for the signal control surface
//!
//! Runs one SQL statement per stdin line through an instrumented driver.
//!
//! ```text
//! DATABASE_URL=sqlite::memory: RUST_LOG=info isutrace-sandbox
//! kill -USR1 <pid>   # start a session
//! kill -USR2 <pid>   # stop it
//! ```

use anyhow::{Context, Result, bail};
use isutrace_driver::{Database, DriverRegistry, register_sqlx_drivers};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_SANDBOX_DRIVER: &str = "ISUTRACE_SANDBOX_DRIVER";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let url = std::env::var(ENV_DATABASE_URL)
        .with_context(|| format!("{ENV_DATABASE_URL} must be set"))?;
    let driver = match std::env::var(ENV_SANDBOX_DRIVER) {
        Ok(driver) => driver,
        Err(_) => driver_from_url(&url)?,
    };

    let registry = DriverRegistry::global();
    register_sqlx_drivers(registry)?;
    isutrace::init();

    let instrumented = format!("{driver}{}", isutrace::Tracer::global().config().driver_suffix);
    let mut db = Database::open(registry, &instrumented, &url)
        .await
        .with_context(|| format!("Failed to open {instrumented}"))?;

    tracing::info!(
        pid = std::process::id(),
        driver = %instrumented,
        "Sandbox ready, one statement per line"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let statement = line.trim();
        if statement.is_empty() {
            continue;
        }

        let leading = statement
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        if matches!(leading.as_str(), "SELECT" | "SHOW" | "WITH" | "EXPLAIN" | "PRAGMA") {
            match db.query(statement, &[]).await {
                Ok(rows) => println!("{} row(s)", rows.len()),
                Err(e) => eprintln!("error: {e}"),
            }
        } else {
            match db.exec(statement, &[]).await {
                Ok(result) => println!("{} row(s) affected", result.rows_affected),
                Err(e) => eprintln!("error: {e}"),
            }
        }
    }

    db.close().await?;
    isutrace::Tracer::global().stop();
    Ok(())
}

/// `mysql://...` → `mysql`; `postgresql://` maps to `postgres`
fn driver_from_url(url: &str) -> Result<String> {
    let Some((scheme, _)) = url.split_once(':') else {
        bail!("Cannot infer a driver from {ENV_DATABASE_URL}; set {ENV_SANDBOX_DRIVER}");
    };

    Ok(match scheme {
        "postgresql" => "postgres".to_string(),
        "mariadb" => "mysql".to_string(),
        other => other.to_string(),
    })
}
