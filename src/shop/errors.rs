use thiserror::Error;

use super::types::{GoodId, Location, ShopId};

/// Errors that can arise while interacting with the shop persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when deserializing an entry with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },
}

/// Registry-side rejections. All of these are reported before any state
/// change; the registry is left exactly as it was.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Another shop already claims this coordinate (storage or sign).
    #[error("a shop already occupies {0}")]
    LocationOccupied(Location),

    /// Storage and sign must be two different coordinates.
    #[error("storage and sign cannot share the coordinate {0}")]
    LocationsNotDistinct(Location),

    /// Lot size outside 1..=64.
    #[error("invalid lot quantity {0}, must be between 1 and 64")]
    InvalidQuantity(u32),

    /// Both trade directions disabled, or a price above the configured cap.
    #[error("invalid prices: {0}")]
    InvalidPrice(String),

    /// The good is on the configured ban list.
    #[error("{0} cannot be traded")]
    ItemNotTradable(GoodId),

    /// Barter would swap a good for itself.
    #[error("barter cannot exchange {0} for itself")]
    BarterSameGood(GoodId),

    /// The owner already runs the configured maximum number of shops.
    #[error("shop limit reached: {0} shops per owner")]
    ShopLimitReached(u32),

    /// The referenced shop is not registered.
    #[error("no shop with id {0}")]
    UnknownShop(ShopId),

    /// Persistence failure surfaced through a load/save call.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Trade rejections and failures surfaced by the engine.
///
/// Everything except `ConsistencyFault` is reported with no net state
/// change: either no mutation was attempted, or every applied step was
/// reversed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TradeError {
    /// No currency ledger is configured; money trades cannot run at all.
    #[error("no currency provider is available")]
    CurrencyUnavailable,

    /// The shop is toggled off.
    #[error("this shop is currently closed")]
    ShopInactive,

    /// The shop does not sell to actors (buy price is zero or barter-mode).
    #[error("this shop does not sell goods")]
    BuyDisabled,

    /// The shop does not buy from actors (sell price is zero or barter-mode).
    #[error("this shop does not purchase goods")]
    SellDisabled,

    /// Barter was requested against a currency shop.
    #[error("this shop does not barter")]
    NotBarterShop,

    /// Owners cannot barter with their own shop.
    #[error("you cannot trade with your own shop")]
    SelfTradeBlocked,

    /// The actor bartered too recently.
    #[error("trade cooldown active, {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: u64 },

    /// The shop's storage holds fewer goods than one lot.
    #[error("the shop has insufficient stock")]
    InsufficientStock,

    /// The receiving container cannot absorb the goods.
    #[error("not enough storage space for {stack}")]
    InsufficientSpace { stack: String },

    /// The actor's balance does not cover the price.
    #[error("you need {needed} coins but have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// The actor does not hold enough of the good being handed over.
    #[error("you need {needed}x {good} to trade")]
    InsufficientItems { good: GoodId, needed: u32 },

    /// The shop owner's live balance cannot cover the sell price.
    #[error("the shop owner cannot afford this purchase")]
    OwnerInsufficientFunds,

    /// The ledger refused a payout mid-trade; every prior step was reversed.
    #[error("payment could not be completed")]
    PaymentFailed,

    /// A compensating reversal failed; resources are out of sync and need
    /// operator attention.
    #[error("trade left resources inconsistent: {context}")]
    ConsistencyFault { context: String },
}
