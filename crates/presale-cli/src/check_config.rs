//! # Check-Config Subcommand
//!
//! Loads a sale configuration, applies environment overrides, validates
//! it, and prints the resolved parameters and phase schedule.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use presale_core::SaleConfig;
use presale_state::rule_for;

/// Arguments for `presale check-config`.
#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Sale configuration file (YAML).
    #[arg(value_name = "CONFIG")]
    pub path: PathBuf,

    /// Ignore `PRESALE_RATE` / `PRESALE_WALLET`.
    #[arg(long)]
    pub no_env: bool,
}

/// Execute the check-config subcommand.
///
/// Returns exit code: 0 when the configuration is valid, 1 otherwise.
pub fn run_check_config(args: &CheckConfigArgs) -> Result<u8> {
    match load_config(&args.path, !args.no_env) {
        Ok(config) => {
            for line in describe(&config) {
                println!("{line}");
            }
            println!("OK: {}", args.path.display());
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {}: {e:#}", args.path.display());
            Ok(1)
        }
    }
}

/// Load a configuration, optionally applying environment overrides.
pub fn load_config(path: &Path, with_env: bool) -> Result<SaleConfig> {
    let config = SaleConfig::load(path)?;
    let config = if with_env {
        config.apply_env_overrides()?
    } else {
        config
    };
    tracing::debug!(sale_id = %config.sale_id, path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Human-readable summary of a configuration, one line per entry.
pub fn describe(config: &SaleConfig) -> Vec<String> {
    let mut lines = vec![
        format!("sale          {}", config.sale_id),
        format!("administrator {}", config.administrator),
        format!("sale address  {}", config.sale_address),
        format!("wallet        {}", config.wallet),
        format!("rate          {}", config.rate),
        format!("global cap    {}", config.global_cap),
    ];
    match config.premium_threshold {
        Some(t) => lines.push(format!("premium       holders of at least {t}")),
        None => lines.push("premium       disabled".to_string()),
    }

    let schedule = &config.schedule;
    let count = schedule.phase_count();
    lines.push(format!("pending       until {}", schedule.start_time()));
    for index in 1..=count {
        if let Some((begin, end)) = schedule.window(index) {
            lines.push(format!(
                "phase {index}       {begin} .. {end}  {}",
                rule_for(index, count)
            ));
        }
    }
    lines.push(format!("closed        from {}", schedule.end_time()));
    lines
}
