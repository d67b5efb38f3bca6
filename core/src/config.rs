//! Global configuration.
//!
//! Loaded once at process start and handed to each component constructor.
//! Persisting changes back to the world store is an explicit `save()` call.

use crate::{
    error::LedgerResult,
    store::{AttributeOwner, WorldAttributes},
    types::Millis,
};
use serde::{Deserialize, Serialize};

/// World attribute key holding the serialized configuration object.
pub const GLOBAL_CONFIG_KEY: &str = "global_config";

const DAY_MS: Millis = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub starting_balance: i64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self { starting_balance: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusConfig {
    pub daily_bonus: i64,
    /// Kept for compatibility with stored configs. Eligibility is decided by
    /// UTC calendar date, not by this cooldown.
    pub bonus_cooldown_ms: Millis,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            daily_bonus: 100,
            bonus_cooldown_ms: DAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Largest amount the transfer command accepts in one call.
    pub max_transfer: i64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self { max_transfer: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub retention_ms: Millis,
    /// Records priced at or above this raise an anomaly alert.
    pub anomaly_threshold: f64,
    pub purge_interval_ms: Millis,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention_ms: 7 * DAY_MS,
            anomaly_threshold: 1000.0,
            purge_interval_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Session tag that marks an account as privileged.
    pub privileged_tag: String,
    /// Name of the live-board objective holding balances.
    pub objective_id: String,
    pub slow_pass_warn_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            privileged_tag: "admin".into(),
            objective_id: "col".into(),
            slow_pass_warn_ms: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub prefix: String,
    pub usage: String,
    /// Commands enabled for dispatch. Names not listed are rejected.
    pub enabled: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            prefix: ".".into(),
            usage: "Usage: .[command] [args...]".into(),
            enabled: [
                "help",
                "balance",
                "dailybonus",
                "transfer",
                "history",
                "search",
                "audit",
                "stats",
                "rich",
                "resetbalance",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub currency: CurrencyConfig,
    pub bonus:    BonusConfig,
    pub transfer: TransferConfig,
    pub ledger:   LedgerConfig,
    pub sync:     SyncConfig,
    pub commands: CommandConfig,
}

impl GlobalConfig {
    /// Read the configuration stored on the world owner.
    ///
    /// A missing or undecodable entry is replaced by the defaults, which are
    /// written back so the next start sees them.
    pub fn load_or_init(world: &WorldAttributes) -> Self {
        if let Some(value) = world.get(GLOBAL_CONFIG_KEY) {
            match serde_json::from_value::<GlobalConfig>(value) {
                Ok(config) => {
                    log::info!("global config loaded from world store");
                    return config;
                }
                Err(e) => log::error!("global config is not decodable, using defaults: {e}"),
            }
        }
        let config = Self::default();
        if let Err(e) = config.save(world) {
            log::error!("could not persist default global config: {e}");
        }
        config
    }

    /// Load from a JSON file on disk (runner overrides).
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: GlobalConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, world: &WorldAttributes) -> LedgerResult<()> {
        world.try_set(GLOBAL_CONFIG_KEY, &serde_json::to_value(self)?)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_section_defaults() {
        let config: GlobalConfig =
            serde_json::from_str(r#"{"currency":{"starting_balance":750}}"#).unwrap();
        assert_eq!(config.currency.starting_balance, 750);
        assert_eq!(config.bonus.daily_bonus, 100);
        assert_eq!(config.ledger.anomaly_threshold, 1000.0);
        assert_eq!(config.sync.privileged_tag, "admin");
    }
}
