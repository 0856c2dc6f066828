//! Setu daemon
//!
//! Streams synthetic frames over one TCP session, as configured in a TOML
//! file. See `setu.toml` for the available settings.

mod app;

use crate::app::SetuApp;
use setu::config::AppConfig;
use setu::error::Result;
use std::env;
use std::path::Path;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `setu <path>` (positional)
/// - `setu --config <path>` (flag-based)
/// - `setu -c <path>` (short flag)
///
/// Defaults to `/etc/setu.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/setu.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();

    // Config is read before the logger exists so it can pick the level
    let loaded = if Path::new(&config_path).exists() {
        Some(AppConfig::from_file(&config_path)?)
    } else {
        None
    };
    let config = loaded.clone().unwrap_or_default();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("Setu v{} starting...", env!("CARGO_PKG_VERSION"));
    if loaded.is_some() {
        log::info!("Using config: {}", config_path);
    } else {
        log::warn!("Config {} not found, using defaults", config_path);
    }

    let mut app = SetuApp::new(config);
    app.run()?;

    log::info!("Setu stopped");
    Ok(())
}
