//! # Tradepost - Container Shops for Block Worlds
//!
//! Tradepost implements a player-operated marketplace: physical storage
//! containers are registered against spatial coordinates, advertise buy/sell
//! terms, and execute trades that move currency and goods between a visiting
//! actor and a shop's backing storage with all-or-nothing semantics.
//!
//! ## Features
//!
//! - **Spatially-Indexed Registry**: O(1) shop lookup by storage or sign
//!   coordinate, owner listings in insertion order, and a single-writer
//!   mutation gateway that keeps every record invariant in one place.
//! - **Trade Engine**: buy, sell, and item-barter protocols with ordered
//!   precondition checks and an explicit, data-driven rollback harness —
//!   any step failure reverses exactly the steps already committed.
//! - **Gateway Boundary**: currency, container inventory, presentation, and
//!   statistics are traits the host implements; the core never assumes a
//!   transfer succeeded without checking its result.
//! - **Persistence**: sled-backed snapshot store with per-entry corruption
//!   tolerance — one bad entry is logged and skipped, never aborting a load.
//! - **Barter Cooldowns**: optional per-actor rate limiting with an owned,
//!   resettable tracker rather than process-wide state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tradepost::config::Config;
//! use tradepost::shop::{ShopRegistry, ShopStore, TradeEngine};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("tradepost.toml")?;
//!     let registry = ShopRegistry::new(config.shop_policy());
//!     let engine = TradeEngine::new(config.trade_policy());
//!
//!     let store = ShopStore::open(&config.storage.data_dir)?;
//!     let report = registry.load_from(&store)?;
//!     log::info!("loaded {} shops", report.loaded);
//!
//!     // ... resolve interactions to shops, hand them to the engine ...
//!     let _ = engine;
//!
//!     registry.save_to(&store)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`shop`] - Registry, trade engine, gateway traits, and persistence
//! - [`config`] - Configuration management and validation

pub mod config;
pub mod shop;
