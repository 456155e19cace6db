//! Configuration for the tradepost crate.
//!
//! A small sectioned TOML file covers shop creation limits, trading
//! behavior, and the persistence path. All values have sensible defaults so
//! an empty file is valid; `load` validates everything upfront and rejects a
//! config the rest of the crate could not honor.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::shop::engine::TradePolicy;
use crate::shop::registry::ShopPolicy;
use crate::shop::types::GoodId;

/// Shop creation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSettings {
    /// Maximum shops per owner. Zero means unlimited.
    #[serde(default = "default_max_shops_per_owner")]
    pub max_shops_per_owner: u32,
    /// Price ceiling in minor currency units.
    #[serde(default = "default_max_price")]
    pub max_price: u64,
    /// Good identifiers that may never be traded.
    #[serde(default)]
    pub banned_goods: Vec<String>,
}

fn default_max_shops_per_owner() -> u32 {
    10
}

fn default_max_price() -> u64 {
    1_000_000
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            max_shops_per_owner: default_max_shops_per_owner(),
            max_price: default_max_price(),
            banned_goods: Vec::new(),
        }
    }
}

/// Trading behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingSettings {
    /// Minimum seconds between barters by the same actor. Zero disables.
    #[serde(default)]
    pub barter_cooldown_secs: u64,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory for the sled shop store.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "data/shops".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub shop: ShopSettings,
    #[serde(default)]
    pub trading: TradingSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write a default configuration file, refusing to clobber an existing
    /// one.
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(anyhow!("config file {} already exists", path.display()));
        }
        let rendered =
            toml::to_string_pretty(&Config::default()).context("rendering default config")?;
        std::fs::write(path, rendered)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.shop.max_price == 0 {
            return Err(anyhow!("shop.max_price must be greater than zero"));
        }
        for raw in &self.shop.banned_goods {
            GoodId::parse(raw)
                .map_err(|reason| anyhow!("shop.banned_goods entry {:?}: {}", raw, reason))?;
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        Ok(())
    }

    /// Registry-facing view of the limits. Call only after `validate`.
    pub fn shop_policy(&self) -> ShopPolicy {
        let banned_goods = self
            .shop
            .banned_goods
            .iter()
            .filter_map(|raw| GoodId::parse(raw).ok())
            .collect();
        ShopPolicy {
            max_shops_per_owner: self.shop.max_shops_per_owner,
            max_price: self.shop.max_price,
            banned_goods,
        }
    }

    /// Engine-facing view of the trading behavior.
    pub fn trade_policy(&self) -> TradePolicy {
        TradePolicy {
            barter_cooldown_secs: self.trading.barter_cooldown_secs,
        }
    }
}
