// SPDX-License-Identifier: MIT

//! `evrd` — the event router daemon binary.

use evr_daemon::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "fatal startup error");
            std::process::exit(err.exit_code());
        }
    };

    match evr_daemon::run(config).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!(error = %err, "fatal startup error");
            std::process::exit(err.exit_code());
        }
    }
}
