//! Shop registry: the single source of truth mapping shop identity and
//! location to [`ShopRecord`].
//!
//! The registry owns the record collection and the derived location index
//! behind one lock, so concurrent lookups never observe a half-inserted or
//! half-removed shop. All mutation flows through registry methods; the trade
//! engine and any command surface work against record clones and request
//! changes here, which keeps invariant checking in one place.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info, warn};
use parking_lot::RwLock;

use super::errors::{RegistryError, StoreError};
use super::gateways::{NullPresentation, PersistenceStore, PresentationHooks};
use super::types::{
    ActorId, BarterTerms, GoodId, Location, LocationKey, ShopId, ShopRecord, MAX_UNIT_QUANTITY,
};

/// Creation-time limits, usually sourced from the crate configuration.
#[derive(Debug, Clone)]
pub struct ShopPolicy {
    /// Maximum shops a single owner may register. Zero means unlimited.
    pub max_shops_per_owner: u32,
    /// Upper bound for buy/sell prices in minor units.
    pub max_price: u64,
    /// Goods that may not be traded at all.
    pub banned_goods: Vec<GoodId>,
}

impl Default for ShopPolicy {
    fn default() -> Self {
        Self {
            max_shops_per_owner: 10,
            max_price: 1_000_000,
            banned_goods: Vec::new(),
        }
    }
}

/// Parameters for [`ShopRegistry::create`].
#[derive(Debug, Clone)]
pub struct CreateShop {
    pub owner_id: ActorId,
    pub owner_name: String,
    pub storage_location: Location,
    pub sign_location: Location,
    pub good: GoodId,
    pub unit_quantity: u32,
    pub buy_price: u64,
    pub sell_price: u64,
}

/// Outcome of a snapshot load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

struct RegistryInner {
    shops: IndexMap<ShopId, ShopRecord>,
    index: HashMap<LocationKey, ShopId>,
}

/// Authoritative shop collection plus the location index derived from it.
pub struct ShopRegistry {
    policy: ShopPolicy,
    hooks: Arc<dyn PresentationHooks>,
    inner: RwLock<RegistryInner>,
}

impl ShopRegistry {
    pub fn new(policy: ShopPolicy) -> Self {
        Self::with_hooks(policy, Arc::new(NullPresentation))
    }

    pub fn with_hooks(policy: ShopPolicy, hooks: Arc<dyn PresentationHooks>) -> Self {
        Self {
            policy,
            hooks,
            inner: RwLock::new(RegistryInner {
                shops: IndexMap::new(),
                index: HashMap::new(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Creation and removal
    // ------------------------------------------------------------------

    /// Register a new shop. Rejections leave the registry unchanged.
    pub fn create(&self, request: CreateShop) -> Result<ShopRecord, RegistryError> {
        if request.unit_quantity == 0 || request.unit_quantity > MAX_UNIT_QUANTITY {
            return Err(RegistryError::InvalidQuantity(request.unit_quantity));
        }
        if self.is_banned(&request.good) {
            return Err(RegistryError::ItemNotTradable(request.good));
        }
        if request.buy_price == 0 && request.sell_price == 0 {
            return Err(RegistryError::InvalidPrice(
                "at least one of the buy or sell price must be set".to_string(),
            ));
        }
        self.check_price(request.buy_price)?;
        self.check_price(request.sell_price)?;

        let storage_key = request.storage_location.key();
        let sign_key = request.sign_location.key();
        if storage_key == sign_key {
            return Err(RegistryError::LocationsNotDistinct(request.storage_location));
        }

        let record = {
            let mut inner = self.inner.write();

            if self.policy.max_shops_per_owner > 0 {
                let owned = inner
                    .shops
                    .values()
                    .filter(|shop| shop.owner_id == request.owner_id)
                    .count() as u32;
                if owned >= self.policy.max_shops_per_owner {
                    return Err(RegistryError::ShopLimitReached(
                        self.policy.max_shops_per_owner,
                    ));
                }
            }

            if inner.index.contains_key(&storage_key) {
                return Err(RegistryError::LocationOccupied(request.storage_location));
            }
            if inner.index.contains_key(&sign_key) {
                return Err(RegistryError::LocationOccupied(request.sign_location));
            }

            let record = ShopRecord::new(
                request.owner_id,
                request.owner_name,
                request.storage_location,
                request.sign_location,
                request.good,
                request.unit_quantity,
                request.buy_price,
                request.sell_price,
            );
            record
                .check_invariants()
                .map_err(RegistryError::InvalidPrice)?;

            inner.index.insert(storage_key, record.id.clone());
            inner.index.insert(sign_key, record.id.clone());
            inner.shops.insert(record.id.clone(), record.clone());
            record
        };

        info!(
            "created shop {} for {} trading {}",
            record.id, record.owner_name, record.good
        );
        self.hooks.on_shop_created(&record);
        Ok(record)
    }

    /// Remove a shop and both of its index entries. Idempotent: removing an
    /// absent id returns `false`.
    pub fn remove(&self, id: &ShopId) -> bool {
        let removed = {
            let mut inner = self.inner.write();
            // shift_remove keeps the remaining owner listing in insertion order.
            match inner.shops.shift_remove(id) {
                Some(record) => {
                    inner.index.remove(&record.storage_location.key());
                    inner.index.remove(&record.sign_location.key());
                    Some(record)
                }
                None => None,
            }
        };
        match removed {
            Some(record) => {
                info!("removed shop {} owned by {}", record.id, record.owner_name);
                self.hooks.on_shop_removed(&record.id);
                true
            }
            None => false,
        }
    }

    /// Remove the shop whose storage or sign occupies `location`, if any.
    /// The register-side path for a backing block being destroyed.
    pub fn remove_by_location(&self, location: &Location) -> Option<ShopId> {
        let id = {
            let inner = self.inner.read();
            inner.index.get(&location.key()).cloned()
        }?;
        if self.remove(&id) {
            Some(id)
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Resolve the shop claiming this coordinate as storage or sign.
    pub fn by_location(&self, location: &Location) -> Option<ShopRecord> {
        let inner = self.inner.read();
        let id = inner.index.get(&location.key())?;
        inner.shops.get(id).cloned()
    }

    pub fn by_id(&self, id: &ShopId) -> Option<ShopRecord> {
        self.inner.read().shops.get(id).cloned()
    }

    /// All shops registered to `owner`, in insertion order.
    pub fn by_owner(&self, owner: ActorId) -> Vec<ShopRecord> {
        self.inner
            .read()
            .shops
            .values()
            .filter(|shop| shop.owner_id == owner)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<ShopRecord> {
        self.inner.read().shops.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().shops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().shops.is_empty()
    }

    pub fn shop_count_for(&self, owner: ActorId) -> usize {
        self.inner
            .read()
            .shops
            .values()
            .filter(|shop| shop.owner_id == owner)
            .count()
    }

    pub fn is_shop_location(&self, location: &Location) -> bool {
        self.inner.read().index.contains_key(&location.key())
    }

    // ------------------------------------------------------------------
    // Mutation gateways
    // ------------------------------------------------------------------

    /// Update money prices on a currency-mode shop.
    pub fn set_prices(
        &self,
        id: &ShopId,
        buy_price: u64,
        sell_price: u64,
    ) -> Result<ShopRecord, RegistryError> {
        self.check_price(buy_price)?;
        self.check_price(sell_price)?;
        self.update(id, |shop| {
            if shop.is_barter() {
                return Err(RegistryError::InvalidPrice(
                    "shop is in barter mode; revert it before setting prices".to_string(),
                ));
            }
            shop.buy_price = buy_price;
            shop.sell_price = sell_price;
            Ok(())
        })
    }

    /// Change the lot size per transaction.
    pub fn set_unit_quantity(&self, id: &ShopId, qty: u32) -> Result<ShopRecord, RegistryError> {
        if qty == 0 || qty > MAX_UNIT_QUANTITY {
            return Err(RegistryError::InvalidQuantity(qty));
        }
        self.update(id, |shop| {
            shop.unit_quantity = qty;
            Ok(())
        })
    }

    /// Toggle the shop open or closed.
    pub fn set_active(&self, id: &ShopId, active: bool) -> Result<ShopRecord, RegistryError> {
        self.update(id, |shop| {
            shop.active = active;
            Ok(())
        })
    }

    /// Convert a currency shop into an item-for-item exchange. Money prices
    /// are forced to zero.
    pub fn convert_to_barter(
        &self,
        id: &ShopId,
        terms: BarterTerms,
    ) -> Result<ShopRecord, RegistryError> {
        if terms.required_good == terms.offered_good {
            return Err(RegistryError::BarterSameGood(terms.required_good));
        }
        if terms.required_qty == 0 || terms.required_qty > MAX_UNIT_QUANTITY {
            return Err(RegistryError::InvalidQuantity(terms.required_qty));
        }
        if terms.offered_qty == 0 || terms.offered_qty > MAX_UNIT_QUANTITY {
            return Err(RegistryError::InvalidQuantity(terms.offered_qty));
        }
        if self.is_banned(&terms.required_good) {
            return Err(RegistryError::ItemNotTradable(terms.required_good));
        }
        if self.is_banned(&terms.offered_good) {
            return Err(RegistryError::ItemNotTradable(terms.offered_good));
        }
        self.update(id, |shop| {
            shop.barter = Some(terms);
            shop.buy_price = 0;
            shop.sell_price = 0;
            Ok(())
        })
    }

    /// Clear barter terms and restore money prices.
    pub fn revert_to_currency(
        &self,
        id: &ShopId,
        buy_price: u64,
        sell_price: u64,
    ) -> Result<ShopRecord, RegistryError> {
        if buy_price == 0 && sell_price == 0 {
            return Err(RegistryError::InvalidPrice(
                "at least one of the buy or sell price must be set".to_string(),
            ));
        }
        self.check_price(buy_price)?;
        self.check_price(sell_price)?;
        self.update(id, |shop| {
            shop.barter = None;
            shop.buy_price = buy_price;
            shop.sell_price = sell_price;
            Ok(())
        })
    }

    /// Trade settlement: bump `last_used` only. Price and ownership fields
    /// are never touched by settlement.
    pub fn mark_used(&self, id: &ShopId) -> Result<ShopRecord, RegistryError> {
        self.update(id, |shop| {
            shop.touch();
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Full replace of in-memory state from the persistence collaborator.
    ///
    /// Individual corrupt entries are logged and skipped; loading the rest
    /// always proceeds. A later entry whose location collides with an
    /// already-loaded shop is treated as corrupt.
    pub fn load_from(&self, store: &dyn PersistenceStore) -> Result<LoadReport, StoreError> {
        let entries = store.load_all()?;
        let mut report = LoadReport {
            loaded: 0,
            skipped: 0,
        };

        let mut inner = self.inner.write();
        inner.shops.clear();
        inner.index.clear();

        for entry in entries {
            let entry_id = entry.id.clone();
            let record = match entry.into_record() {
                Ok(record) => record,
                Err(reason) => {
                    warn!("skipping shop entry {}: {}", entry_id, reason);
                    report.skipped += 1;
                    continue;
                }
            };
            let storage_key = record.storage_location.key();
            let sign_key = record.sign_location.key();
            if inner.index.contains_key(&storage_key) || inner.index.contains_key(&sign_key) {
                warn!(
                    "skipping shop entry {}: location already claimed by another shop",
                    record.id
                );
                report.skipped += 1;
                continue;
            }
            inner.index.insert(storage_key, record.id.clone());
            inner.index.insert(sign_key, record.id.clone());
            inner.shops.insert(record.id.clone(), record);
            report.loaded += 1;
        }

        info!(
            "shop registry loaded: {} shops, {} entries skipped",
            report.loaded, report.skipped
        );
        Ok(report)
    }

    /// Snapshot the full registry into the persistence collaborator.
    pub fn save_to(&self, store: &dyn PersistenceStore) -> Result<usize, StoreError> {
        let records = self.all();
        store.save_all(&records)?;
        debug!("shop registry saved: {} shops", records.len());
        Ok(records.len())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn is_banned(&self, good: &GoodId) -> bool {
        self.policy.banned_goods.iter().any(|banned| banned == good)
    }

    fn check_price(&self, price: u64) -> Result<(), RegistryError> {
        if price > self.policy.max_price {
            return Err(RegistryError::InvalidPrice(format!(
                "price {} exceeds the maximum of {}",
                price, self.policy.max_price
            )));
        }
        Ok(())
    }

    /// Apply an edit through the single-writer gateway: mutate a copy,
    /// re-check invariants, then commit and notify.
    fn update<F>(&self, id: &ShopId, edit: F) -> Result<ShopRecord, RegistryError>
    where
        F: FnOnce(&mut ShopRecord) -> Result<(), RegistryError>,
    {
        let updated = {
            let mut inner = self.inner.write();
            let current = inner
                .shops
                .get(id)
                .ok_or_else(|| RegistryError::UnknownShop(id.clone()))?;
            let mut draft = current.clone();
            edit(&mut draft)?;
            draft
                .check_invariants()
                .map_err(RegistryError::InvalidPrice)?;
            inner.shops.insert(id.clone(), draft.clone());
            draft
        };
        self.hooks.on_shop_changed(&updated);
        Ok(updated)
    }
}
