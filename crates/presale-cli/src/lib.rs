//! # presale-cli — Command-Line Tool for the Presale Engine
//!
//! Provides the `presale` binary.
//!
//! ## Subcommands
//!
//! - `presale check-config` validates a sale configuration and prints
//!   the resolved phase schedule.
//! - `presale simulate` replays a scripted scenario against a sale wired
//!   to in-process collaborators and prints a JSON report.
//!
//! ```bash
//! presale check-config demos/sale.yaml
//! presale -v simulate --config demos/sale.yaml --scenario demos/scenario.yaml
//! ```
//!
//! ## Logging
//!
//! Diagnostics go to stderr through `tracing`. `-v`/`-vv`/`-vvv` raise the
//! level; `RUST_LOG` overrides it. `--log-json` switches to JSON lines.

pub mod check_config;
pub mod simulate;
