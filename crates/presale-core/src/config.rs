//! # Sale Configuration
//!
//! The immutable parameters of one sale, loaded from YAML and validated
//! before any engine is built from them.
//!
//! ```yaml
//! administrator: "0x00000000000000000000000000000000000000a1"
//! sale_address:  "0x00000000000000000000000000000000000000c5"
//! wallet:        "0x00000000000000000000000000000000000000f0"
//! schedule:
//!   start_time: "2026-03-01T00:00:00Z"
//!   phase_ends:
//!     - "2026-03-31T00:00:00Z"   # personal-cap phase
//!     - "2026-04-20T00:00:00Z"   # holder-gated phase
//!     - "2026-05-10T00:00:00Z"   # open phase, end_time
//! rate: "10"
//! global_cap: "20_000_000"
//! premium_threshold: "5_000"     # optional
//! ```
//!
//! Environment overrides (applied by [`SaleConfig::apply_env_overrides`]):
//! - `PRESALE_RATE` replaces `rate`.
//! - `PRESALE_WALLET` replaces `wallet`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::{decimal, decimal_option, Rate, U256};
use crate::error::CoreError;
use crate::identity::{parse_address, Address, SaleId};
use crate::schedule::SaleSchedule;

/// Environment variable overriding the configured rate.
pub const ENV_RATE: &str = "PRESALE_RATE";
/// Environment variable overriding the configured wallet.
pub const ENV_WALLET: &str = "PRESALE_WALLET";

/// Errors loading a sale configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The document is not valid YAML for a sale configuration.
    #[error("cannot parse sale configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document parsed but violates a sale invariant.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// An environment override is set but unusable.
    #[error("environment override {var}: {reason}")]
    Env {
        /// Variable name.
        var: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Immutable parameters of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Identifier of this sale; generated when the document omits it.
    #[serde(default)]
    pub sale_id: SaleId,
    /// The privileged identity for every administrator-only operation.
    pub administrator: Address,
    /// The sale's own identity, which must hold the token's minting authority.
    pub sale_address: Address,
    /// Receives raised funds and the unsold remainder at finalization.
    pub wallet: Address,
    /// Phase boundaries.
    pub schedule: SaleSchedule,
    /// Initial conversion rate.
    pub rate: Rate,
    /// Maximum sale-token units ever issued.
    #[serde(with = "decimal")]
    pub global_cap: U256,
    /// Minimum membership balance for premium pre-allocation; `None` disables it.
    #[serde(default, with = "decimal_option", skip_serializing_if = "Option::is_none")]
    pub premium_threshold: Option<U256>,
}

impl SaleConfig {
    /// Assemble and validate a configuration.
    pub fn new(
        administrator: Address,
        sale_address: Address,
        wallet: Address,
        schedule: SaleSchedule,
        rate: Rate,
        global_cap: U256,
    ) -> Result<Self, CoreError> {
        let config = Self {
            sale_id: SaleId::new(),
            administrator,
            sale_address,
            wallet,
            schedule,
            rate,
            global_cap,
            premium_threshold: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Enable premium pre-allocation for holders of at least `threshold`.
    pub fn with_premium_threshold(mut self, threshold: U256) -> Result<Self, CoreError> {
        self.premium_threshold = Some(threshold);
        self.validate()?;
        Ok(self)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Apply `PRESALE_RATE` / `PRESALE_WALLET` from the process environment.
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(ENV_RATE) {
            self.rate = Rate::parse(&raw).map_err(|e| ConfigError::Env {
                var: ENV_RATE.to_string(),
                reason: e.to_string(),
            })?;
        }
        if let Some(raw) = lookup(ENV_WALLET) {
            self.wallet = parse_address(&raw).map_err(|e| ConfigError::Env {
                var: ENV_WALLET.to_string(),
                reason: e.to_string(),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check the cross-field invariants not already enforced by the field types.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.global_cap.is_zero() {
            return Err(CoreError::InvalidConfig(
                "global_cap must be greater than zero".to_string(),
            ));
        }
        for (name, address) in [
            ("administrator", self.administrator),
            ("sale_address", self.sale_address),
            ("wallet", self.wallet),
        ] {
            if address.is_zero() {
                return Err(CoreError::InvalidConfig(format!(
                    "{name} must not be the zero address"
                )));
            }
        }
        if self.sale_address == self.administrator {
            return Err(CoreError::InvalidConfig(
                "sale_address must differ from administrator".to_string(),
            ));
        }
        if let Some(threshold) = self.premium_threshold {
            if threshold.is_zero() {
                return Err(CoreError::InvalidConfig(
                    "premium_threshold must be greater than zero when set".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
administrator: "0x00000000000000000000000000000000000000a1"
sale_address: "0x00000000000000000000000000000000000000c5"
wallet: "0x00000000000000000000000000000000000000f0"
schedule:
  start_time: "2026-03-01T00:00:00Z"
  phase_ends:
    - "2026-03-31T00:00:00Z"
    - "2026-04-20T00:00:00Z"
    - "2026-05-10T00:00:00Z"
rate: "10"
global_cap: "20_000_000"
"#;

    #[test]
    fn test_load_yaml() {
        let config = SaleConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.rate, Rate::from_u64(10).unwrap());
        assert_eq!(config.global_cap, U256::from(20_000_000u64));
        assert_eq!(config.schedule.phase_count(), 3);
        assert_eq!(config.administrator, Address::with_last_byte(0xa1));
        assert!(config.premium_threshold.is_none());
    }

    #[test]
    fn test_premium_threshold_parsed() {
        let yaml = format!("{YAML}premium_threshold: \"5_000\"\n");
        let config = SaleConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.premium_threshold, Some(U256::from(5_000u64)));
    }

    #[test]
    fn test_zero_cap_rejected() {
        let yaml = YAML.replace("\"20_000_000\"", "\"0\"");
        let err = SaleConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let yaml = YAML.replace("rate: \"10\"", "rate: \"0\"");
        assert!(matches!(
            SaleConfig::from_yaml_str(&yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unordered_schedule_rejected() {
        let yaml = YAML.replace("2026-04-20", "2026-03-15");
        assert!(SaleConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_sale_must_not_be_administrator() {
        let yaml = YAML.replace(
            "00000000000000000000000000000000000000c5",
            "00000000000000000000000000000000000000a1",
        );
        assert!(SaleConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = SaleConfig::from_yaml_str(YAML).unwrap();
        let updated = config
            .apply_overrides(|var| match var {
                ENV_RATE => Some("25".to_string()),
                ENV_WALLET => Some("0x00000000000000000000000000000000000000f1".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(updated.rate, Rate::from_u64(25).unwrap());
        assert_eq!(updated.wallet, Address::with_last_byte(0xf1));
    }

    #[test]
    fn test_bad_override_reported() {
        let config = SaleConfig::from_yaml_str(YAML).unwrap();
        let err = config
            .apply_overrides(|var| (var == ENV_RATE).then(|| "zero".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == ENV_RATE));
    }

    #[test]
    fn test_missing_file() {
        let err = SaleConfig::load("/nonexistent/presale.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
