//! Interface boundary to the host environment.
//!
//! The registry and engine never own currency balances, container contents,
//! or display surfaces; they talk to these traits. Every mutating call
//! reports success or failure explicitly and partial success counts as
//! failure, so the engine can decide whether a compensating reversal is
//! needed.

use super::errors::StoreError;
use super::types::{
    ActorId, GoodId, LocationKey, RawShopEntry, ShopId, ShopRecord, ShopStatus, TradeEvent,
};

/// Addresses one of the two container kinds a trade touches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    /// A trading party's personal holdings.
    Actor(ActorId),
    /// A shop's backing storage container.
    Storage(LocationKey),
}

impl std::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerRef::Actor(id) => write!(f, "actor {}", id),
            ContainerRef::Storage(key) => write!(f, "storage {}", key),
        }
    }
}

/// Currency balance queries and transfers.
///
/// `withdraw` and `deposit` report per-call success; the engine never
/// assumes a transfer went through without checking the result.
pub trait CurrencyLedger {
    fn balance(&self, actor: ActorId) -> u64;
    fn has_at_least(&self, actor: ActorId, amount: u64) -> bool {
        self.balance(actor) >= amount
    }
    #[must_use]
    fn withdraw(&mut self, actor: ActorId, amount: u64) -> bool;
    #[must_use]
    fn deposit(&mut self, actor: ActorId, amount: u64) -> bool;
}

/// Stacked-goods access to shop containers and actor holdings.
pub trait StorageInventory {
    /// How many of `good` the container currently holds.
    fn count_of(&self, container: &ContainerRef, good: &GoodId) -> u32;

    /// How many more of `good` the container can absorb.
    fn free_capacity_for(&self, container: &ContainerRef, good: &GoodId) -> u32;

    /// Remove exactly `qty` of `good`. Removing less than `qty` must be
    /// reported as failure with nothing removed.
    #[must_use]
    fn remove(&mut self, container: &ContainerRef, good: &GoodId, qty: u32) -> bool;

    /// Add exactly `qty` of `good`. Overflow must be reported as failure
    /// rather than silently dropping the excess.
    #[must_use]
    fn add(&mut self, container: &ContainerRef, good: &GoodId, qty: u32) -> bool;
}

/// Compute a shop's derived status from its backing storage.
pub fn shop_status(shop: &ShopRecord, inventory: &dyn StorageInventory) -> ShopStatus {
    let container = ContainerRef::Storage(shop.storage_location.key());
    let stock = inventory.count_of(&container, &shop.good);
    let free = inventory.free_capacity_for(&container, &shop.good);
    shop.status(stock, free)
}

/// Snapshot persistence for the registry.
pub trait PersistenceStore {
    /// Load every stored entry. Implementations skip entries they cannot
    /// decode (logging them) rather than failing the whole load.
    fn load_all(&self) -> Result<Vec<RawShopEntry>, StoreError>;

    /// Replace the stored snapshot with the given records.
    fn save_all(&self, records: &[ShopRecord]) -> Result<(), StoreError>;
}

/// Fire-and-forget display refresh notifications. Implementations must not
/// propagate failure back into the operation that triggered them.
pub trait PresentationHooks: Send + Sync {
    fn on_shop_created(&self, _record: &ShopRecord) {}
    fn on_shop_removed(&self, _id: &ShopId) {}
    fn on_shop_changed(&self, _record: &ShopRecord) {}
}

/// Default presentation sink that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresentation;

impl PresentationHooks for NullPresentation {}

/// Consumer of settled-trade events.
pub trait StatisticsSink {
    fn on_trade(&self, _event: &TradeEvent) {}
}

/// Default statistics sink that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats;

impl StatisticsSink for NullStats {}
