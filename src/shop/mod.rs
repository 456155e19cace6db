//! Shop registry and trade engine.
//!
//! The registry owns every shop record plus the location index derived from
//! them; the engine executes buy/sell/barter protocols against the gateway
//! traits with explicit compensating rollback. Persistence round-trips the
//! registry through a sled-backed store.

pub mod engine;
pub mod errors;
pub mod gateways;
pub mod registry;
pub mod storage;
pub mod types;

pub use engine::{CooldownTracker, TradeEngine, TradeGateways, TradePolicy};
pub use errors::{RegistryError, StoreError, TradeError};
pub use gateways::{
    shop_status, ContainerRef, CurrencyLedger, NullPresentation, NullStats, PersistenceStore,
    PresentationHooks, StatisticsSink, StorageInventory,
};
pub use registry::{CreateShop, LoadReport, ShopPolicy, ShopRegistry};
pub use storage::ShopStore;
pub use types::*;
