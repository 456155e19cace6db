//! Test utilities & fixtures.
//! In-memory gateway implementations shared by the integration suites.

#![allow(dead_code)] // Not every suite uses every fixture.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tradepost::shop::{
    ActorId, ContainerRef, CurrencyLedger, GoodId, PresentationHooks, ShopId, ShopRecord,
    StatisticsSink, StorageInventory, TradeEvent,
};

/// Default per-(container, good) capacity: one 27-slot container of stacks.
pub const DEFAULT_CAPACITY: u32 = 27 * 64;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn good(name: &str) -> GoodId {
    GoodId::parse(name).expect("valid good id")
}

/// In-memory currency ledger. Accounts must be opened before they accept
/// deposits, which doubles as the "owner has no open account" case.
pub struct MemoryLedger {
    balances: HashMap<ActorId, u64>,
    refuse_withdraw: HashSet<ActorId>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
            refuse_withdraw: HashSet::new(),
        }
    }

    pub fn open(&mut self, actor: ActorId, balance: u64) {
        self.balances.insert(actor, balance);
    }

    /// Make future withdrawals by this actor fail even when the balance
    /// covers them, to force mid-trade rollback paths.
    pub fn refuse_withdrawals(&mut self, actor: ActorId) {
        self.refuse_withdraw.insert(actor);
    }
}

impl CurrencyLedger for MemoryLedger {
    fn balance(&self, actor: ActorId) -> u64 {
        self.balances.get(&actor).copied().unwrap_or(0)
    }

    fn withdraw(&mut self, actor: ActorId, amount: u64) -> bool {
        if self.refuse_withdraw.contains(&actor) {
            return false;
        }
        match self.balances.get_mut(&actor) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                true
            }
            _ => false,
        }
    }

    fn deposit(&mut self, actor: ActorId, amount: u64) -> bool {
        match self.balances.get_mut(&actor) {
            Some(balance) => {
                *balance += amount;
                true
            }
            None => false,
        }
    }
}

/// In-memory stacked-goods inventory with per-(container, good) capacity.
pub struct MemoryInventory {
    counts: HashMap<(ContainerRef, GoodId), u32>,
    caps: HashMap<(ContainerRef, GoodId), u32>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            caps: HashMap::new(),
        }
    }

    pub fn stock(&mut self, container: ContainerRef, good: &GoodId, qty: u32) {
        self.counts.insert((container, good.clone()), qty);
    }

    pub fn set_capacity(&mut self, container: ContainerRef, good: &GoodId, cap: u32) {
        self.caps.insert((container, good.clone()), cap);
    }
}

impl StorageInventory for MemoryInventory {
    fn count_of(&self, container: &ContainerRef, good: &GoodId) -> u32 {
        self.counts
            .get(&(container.clone(), good.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn free_capacity_for(&self, container: &ContainerRef, good: &GoodId) -> u32 {
        let cap = self
            .caps
            .get(&(container.clone(), good.clone()))
            .copied()
            .unwrap_or(DEFAULT_CAPACITY);
        cap.saturating_sub(self.count_of(container, good))
    }

    fn remove(&mut self, container: &ContainerRef, good: &GoodId, qty: u32) -> bool {
        let key = (container.clone(), good.clone());
        match self.counts.get_mut(&key) {
            Some(count) if *count >= qty => {
                *count -= qty;
                true
            }
            _ => false,
        }
    }

    fn add(&mut self, container: &ContainerRef, good: &GoodId, qty: u32) -> bool {
        if self.free_capacity_for(container, good) < qty {
            return false;
        }
        *self
            .counts
            .entry((container.clone(), good.clone()))
            .or_insert(0) += qty;
        true
    }
}

/// Presentation sink that counts hook invocations.
#[derive(Default)]
pub struct RecordingHooks {
    pub created: Mutex<Vec<ShopId>>,
    pub removed: Mutex<Vec<ShopId>>,
    pub changed: Mutex<Vec<ShopId>>,
}

impl PresentationHooks for RecordingHooks {
    fn on_shop_created(&self, record: &ShopRecord) {
        self.created.lock().unwrap().push(record.id.clone());
    }

    fn on_shop_removed(&self, id: &ShopId) {
        self.removed.lock().unwrap().push(id.clone());
    }

    fn on_shop_changed(&self, record: &ShopRecord) {
        self.changed.lock().unwrap().push(record.id.clone());
    }
}

/// Statistics sink that stores every event.
#[derive(Default)]
pub struct RecordingStats {
    pub events: Mutex<Vec<TradeEvent>>,
}

impl StatisticsSink for RecordingStats {
    fn on_trade(&self, event: &TradeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
