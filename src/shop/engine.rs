//! Trade engine: validates, executes, and rolls back buy/sell/barter
//! operations across three resources it does not own (currency ledger, actor
//! holdings, shop storage).
//!
//! Each operation is all-or-nothing from the caller's view. Preconditions are
//! checked before any mutation; the mutation sequence itself is data-driven
//! (a list of [`TradeStep`]s with computed inverses) so a failure partway
//! through replays the inverses of every committed step in reverse order. A
//! failed inverse escalates to [`TradeError::ConsistencyFault`] and is logged
//! at the highest severity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use super::errors::TradeError;
use super::gateways::{ContainerRef, CurrencyLedger, StatisticsSink, StorageInventory};
use super::registry::ShopRegistry;
use super::types::{
    ActorId, GoodId, GoodStack, ShopRecord, TradeEvent, TradeKind, TradeReceipt,
};

/// Engine tunables, usually sourced from the crate configuration.
#[derive(Debug, Clone)]
pub struct TradePolicy {
    /// Minimum seconds between barters by the same actor. Zero disables the
    /// cooldown check entirely.
    pub barter_cooldown_secs: u64,
}

impl Default for TradePolicy {
    fn default() -> Self {
        Self {
            barter_cooldown_secs: 0,
        }
    }
}

/// External resources one trade executes against.
///
/// `ledger` is optional: a host without a currency provider can still run
/// barter shops, while money trades are rejected upfront.
pub struct TradeGateways<'a> {
    pub ledger: Option<&'a mut dyn CurrencyLedger>,
    pub inventory: &'a mut dyn StorageInventory,
    pub registry: &'a ShopRegistry,
    pub stats: &'a dyn StatisticsSink,
}

impl<'a> TradeGateways<'a> {
    fn require_ledger(&mut self) -> Result<&mut (dyn CurrencyLedger + 'a), TradeError> {
        self.ledger
            .as_deref_mut()
            .ok_or(TradeError::CurrencyUnavailable)
    }
}

// ============================================================================
// Step harness
// ============================================================================

/// One reversible mutation against a gateway resource.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TradeStep {
    RemoveGoods {
        container: ContainerRef,
        good: GoodId,
        qty: u32,
    },
    AddGoods {
        container: ContainerRef,
        good: GoodId,
        qty: u32,
    },
    Withdraw {
        account: ActorId,
        amount: u64,
    },
    Deposit {
        account: ActorId,
        amount: u64,
    },
}

impl TradeStep {
    fn apply(&self, gw: &mut TradeGateways<'_>) -> bool {
        match self {
            TradeStep::RemoveGoods {
                container,
                good,
                qty,
            } => gw.inventory.remove(container, good, *qty),
            TradeStep::AddGoods {
                container,
                good,
                qty,
            } => gw.inventory.add(container, good, *qty),
            TradeStep::Withdraw { account, amount } => match gw.ledger.as_deref_mut() {
                Some(ledger) => ledger.withdraw(*account, *amount),
                None => false,
            },
            TradeStep::Deposit { account, amount } => match gw.ledger.as_deref_mut() {
                Some(ledger) => ledger.deposit(*account, *amount),
                None => false,
            },
        }
    }

    /// The compensating step that undoes this one.
    fn inverse(&self) -> TradeStep {
        match self.clone() {
            TradeStep::RemoveGoods {
                container,
                good,
                qty,
            } => TradeStep::AddGoods {
                container,
                good,
                qty,
            },
            TradeStep::AddGoods {
                container,
                good,
                qty,
            } => TradeStep::RemoveGoods {
                container,
                good,
                qty,
            },
            TradeStep::Withdraw { account, amount } => TradeStep::Deposit { account, amount },
            TradeStep::Deposit { account, amount } => TradeStep::Withdraw { account, amount },
        }
    }
}

impl std::fmt::Display for TradeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStep::RemoveGoods {
                container,
                good,
                qty,
            } => write!(f, "remove {}x {} from {}", qty, good, container),
            TradeStep::AddGoods {
                container,
                good,
                qty,
            } => write!(f, "add {}x {} to {}", qty, good, container),
            TradeStep::Withdraw { account, amount } => {
                write!(f, "withdraw {} from {}", amount, account)
            }
            TradeStep::Deposit { account, amount } => {
                write!(f, "deposit {} to {}", amount, account)
            }
        }
    }
}

/// Records committed steps so a later failure can reverse exactly what was
/// applied, in reverse order.
#[derive(Default)]
struct AppliedSteps {
    steps: Vec<TradeStep>,
}

impl AppliedSteps {
    fn new() -> Self {
        Self::default()
    }

    /// Apply a step and record it. Returns whether the step took effect.
    fn commit(&mut self, step: TradeStep, gw: &mut TradeGateways<'_>) -> bool {
        if step.apply(gw) {
            self.steps.push(step);
            true
        } else {
            false
        }
    }

    /// Replay inverses of every committed step, newest first. Every inverse
    /// is attempted even if an earlier one fails; any failure escalates to a
    /// consistency fault.
    fn rollback(self, gw: &mut TradeGateways<'_>) -> Result<(), TradeError> {
        let mut failures = Vec::new();
        for step in self.steps.iter().rev() {
            let inverse = step.inverse();
            if !inverse.apply(gw) {
                failures.push(inverse.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            let context = format!("compensating steps failed: {}", failures.join("; "));
            error!("trade rollback incomplete, {}", context);
            Err(TradeError::ConsistencyFault { context })
        }
    }
}

/// Reverse committed steps and surface `reject` if the reversal held, or the
/// consistency fault if it did not.
fn abort(
    applied: AppliedSteps,
    gw: &mut TradeGateways<'_>,
    reject: TradeError,
) -> TradeError {
    match applied.rollback(gw) {
        Ok(()) => reject,
        Err(fault) => fault,
    }
}

// ============================================================================
// Cooldown tracking
// ============================================================================

/// Per-actor barter cooldown stamps. Owned by the engine so its lifecycle is
/// explicit: pruned periodically, reset on reload.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    stamps: HashMap<ActorId, DateTime<Utc>>,
}

impl CooldownTracker {
    /// Seconds the actor must still wait, or `None` when clear.
    pub fn remaining(&self, actor: ActorId, window_secs: u64) -> Option<u64> {
        if window_secs == 0 {
            return None;
        }
        let stamp = self.stamps.get(&actor)?;
        let elapsed = Utc::now().signed_duration_since(*stamp).num_seconds();
        if elapsed < 0 {
            // Clock went backwards; treat the full window as remaining.
            return Some(window_secs);
        }
        let elapsed = elapsed as u64;
        if elapsed < window_secs {
            Some(window_secs - elapsed)
        } else {
            None
        }
    }

    pub fn record(&mut self, actor: ActorId) {
        self.stamps.insert(actor, Utc::now());
    }

    /// Drop stamps older than the window.
    pub fn prune_expired(&mut self, window_secs: u64) {
        let now = Utc::now();
        self.stamps.retain(|_, stamp| {
            let elapsed = now.signed_duration_since(*stamp).num_seconds();
            elapsed < 0 || (elapsed as u64) < window_secs
        });
    }

    /// Clear all stamps (reload/shutdown lifecycle).
    pub fn reset(&mut self) {
        self.stamps.clear();
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Stateless trade protocol plus the barter cooldown tracker.
pub struct TradeEngine {
    policy: TradePolicy,
    cooldowns: CooldownTracker,
}

impl TradeEngine {
    pub fn new(policy: TradePolicy) -> Self {
        Self {
            policy,
            cooldowns: CooldownTracker::default(),
        }
    }

    /// Drop expired cooldown stamps. Intended for a periodic sweep.
    pub fn prune_cooldowns(&mut self) {
        self.cooldowns.prune_expired(self.policy.barter_cooldown_secs);
    }

    /// Clear all cooldown state, e.g. on registry reload.
    pub fn reset_cooldowns(&mut self) {
        self.cooldowns.reset();
    }

    /// Actor buys one lot of the shop's good for its buy price.
    pub fn buy(
        &self,
        actor: ActorId,
        shop: &ShopRecord,
        gw: &mut TradeGateways<'_>,
    ) -> Result<TradeReceipt, TradeError> {
        gw.require_ledger()?;
        if !shop.active {
            return Err(TradeError::ShopInactive);
        }
        if shop.is_barter() || !shop.has_buy_price() {
            return Err(TradeError::BuyDisabled);
        }

        let qty = shop.unit_quantity;
        let price = shop.buy_price;
        let storage = ContainerRef::Storage(shop.storage_location.key());
        let holdings = ContainerRef::Actor(actor);

        if gw.inventory.count_of(&storage, &shop.good) < qty {
            return Err(TradeError::InsufficientStock);
        }
        let balance = gw.require_ledger()?.balance(actor);
        if balance < price {
            return Err(TradeError::InsufficientFunds {
                needed: price,
                available: balance,
            });
        }
        // Checked here as a precondition so a late discovery never forces a
        // currency reversal.
        if gw.inventory.free_capacity_for(&holdings, &shop.good) < qty {
            return Err(TradeError::InsufficientSpace {
                stack: GoodStack::new(shop.good.clone(), qty).to_string(),
            });
        }

        let mut applied = AppliedSteps::new();

        let take_stock = TradeStep::RemoveGoods {
            container: storage,
            good: shop.good.clone(),
            qty,
        };
        if !applied.commit(take_stock, gw) {
            return Err(abort(applied, gw, TradeError::InsufficientStock));
        }

        let charge = TradeStep::Withdraw {
            account: actor,
            amount: price,
        };
        if !applied.commit(charge, gw) {
            let available = gw
                .ledger
                .as_deref()
                .map(|ledger| ledger.balance(actor))
                .unwrap_or(0);
            return Err(abort(
                applied,
                gw,
                TradeError::InsufficientFunds {
                    needed: price,
                    available,
                },
            ));
        }

        // Crediting the owner is best-effort: an owner without an open
        // account does not block the trade.
        let credit_owner = TradeStep::Deposit {
            account: shop.owner_id,
            amount: price,
        };
        if !applied.commit(credit_owner, gw) {
            warn!(
                "owner {} of shop {} could not be credited {} coins",
                shop.owner_id, shop.id, price
            );
        }

        let grant = TradeStep::AddGoods {
            container: holdings,
            good: shop.good.clone(),
            qty,
        };
        if !applied.commit(grant, gw) {
            return Err(abort(
                applied,
                gw,
                TradeError::InsufficientSpace {
                    stack: GoodStack::new(shop.good.clone(), qty).to_string(),
                },
            ));
        }

        let receipt = TradeReceipt {
            kind: TradeKind::Buy,
            shop_id: shop.id.clone(),
            actor,
            owner: shop.owner_id,
            gave: None,
            received: Some(GoodStack::new(shop.good.clone(), qty)),
            price: Some(price),
            settled_at: Utc::now(),
        };
        self.settle(shop, gw, &receipt);
        Ok(receipt)
    }

    /// Actor sells one lot of the shop's good for its sell price, drawn from
    /// the owner's live balance.
    pub fn sell(
        &self,
        actor: ActorId,
        shop: &ShopRecord,
        gw: &mut TradeGateways<'_>,
    ) -> Result<TradeReceipt, TradeError> {
        gw.require_ledger()?;
        if !shop.active {
            return Err(TradeError::ShopInactive);
        }
        if shop.is_barter() || !shop.has_sell_price() {
            return Err(TradeError::SellDisabled);
        }

        let qty = shop.unit_quantity;
        let price = shop.sell_price;
        let storage = ContainerRef::Storage(shop.storage_location.key());
        let holdings = ContainerRef::Actor(actor);

        if gw.inventory.free_capacity_for(&storage, &shop.good) < qty {
            return Err(TradeError::InsufficientSpace {
                stack: GoodStack::new(shop.good.clone(), qty).to_string(),
            });
        }
        if gw.inventory.count_of(&holdings, &shop.good) < qty {
            return Err(TradeError::InsufficientItems {
                good: shop.good.clone(),
                needed: qty,
            });
        }
        // No escrow: the owner's live balance backs the advertised price.
        if !gw.require_ledger()?.has_at_least(shop.owner_id, price) {
            return Err(TradeError::OwnerInsufficientFunds);
        }

        let mut applied = AppliedSteps::new();

        let take_goods = TradeStep::RemoveGoods {
            container: holdings.clone(),
            good: shop.good.clone(),
            qty,
        };
        if !applied.commit(take_goods, gw) {
            return Err(abort(
                applied,
                gw,
                TradeError::InsufficientItems {
                    good: shop.good.clone(),
                    needed: qty,
                },
            ));
        }

        let stock_shop = TradeStep::AddGoods {
            container: storage,
            good: shop.good.clone(),
            qty,
        };
        if !applied.commit(stock_shop, gw) {
            return Err(abort(
                applied,
                gw,
                TradeError::InsufficientSpace {
                    stack: GoodStack::new(shop.good.clone(), qty).to_string(),
                },
            ));
        }

        let charge_owner = TradeStep::Withdraw {
            account: shop.owner_id,
            amount: price,
        };
        if !applied.commit(charge_owner, gw) {
            return Err(abort(applied, gw, TradeError::OwnerInsufficientFunds));
        }

        let pay_actor = TradeStep::Deposit {
            account: actor,
            amount: price,
        };
        if !applied.commit(pay_actor, gw) {
            return Err(abort(applied, gw, TradeError::PaymentFailed));
        }

        let receipt = TradeReceipt {
            kind: TradeKind::Sell,
            shop_id: shop.id.clone(),
            actor,
            owner: shop.owner_id,
            gave: Some(GoodStack::new(shop.good.clone(), qty)),
            received: None,
            price: Some(price),
            settled_at: Utc::now(),
        };
        self.settle(shop, gw, &receipt);
        Ok(receipt)
    }

    /// Actor exchanges the shop's required goods for its offered goods. No
    /// currency is involved.
    pub fn barter(
        &mut self,
        actor: ActorId,
        shop: &ShopRecord,
        gw: &mut TradeGateways<'_>,
    ) -> Result<TradeReceipt, TradeError> {
        let terms = shop.barter.as_ref().ok_or(TradeError::NotBarterShop)?;
        if !shop.active {
            return Err(TradeError::ShopInactive);
        }
        // Rejected outright, independent of stock or cooldown state.
        if actor == shop.owner_id {
            return Err(TradeError::SelfTradeBlocked);
        }
        if let Some(remaining_secs) = self
            .cooldowns
            .remaining(actor, self.policy.barter_cooldown_secs)
        {
            return Err(TradeError::CooldownActive { remaining_secs });
        }

        let storage = ContainerRef::Storage(shop.storage_location.key());
        let holdings = ContainerRef::Actor(actor);
        let required = GoodStack::new(terms.required_good.clone(), terms.required_qty);
        let offered = GoodStack::new(terms.offered_good.clone(), terms.offered_qty);

        if gw.inventory.count_of(&holdings, &required.good) < required.quantity {
            return Err(TradeError::InsufficientItems {
                good: required.good.clone(),
                needed: required.quantity,
            });
        }
        if gw.inventory.count_of(&storage, &offered.good) < offered.quantity {
            return Err(TradeError::InsufficientStock);
        }
        if gw.inventory.free_capacity_for(&holdings, &offered.good) < offered.quantity {
            return Err(TradeError::InsufficientSpace {
                stack: offered.to_string(),
            });
        }
        if gw.inventory.free_capacity_for(&storage, &required.good) < required.quantity {
            return Err(TradeError::InsufficientSpace {
                stack: required.to_string(),
            });
        }

        let mut applied = AppliedSteps::new();

        let take_required = TradeStep::RemoveGoods {
            container: holdings.clone(),
            good: required.good.clone(),
            qty: required.quantity,
        };
        if !applied.commit(take_required, gw) {
            return Err(abort(
                applied,
                gw,
                TradeError::InsufficientItems {
                    good: required.good.clone(),
                    needed: required.quantity,
                },
            ));
        }

        let stock_required = TradeStep::AddGoods {
            container: storage.clone(),
            good: required.good.clone(),
            qty: required.quantity,
        };
        if !applied.commit(stock_required, gw) {
            return Err(abort(
                applied,
                gw,
                TradeError::InsufficientSpace {
                    stack: required.to_string(),
                },
            ));
        }

        let take_offered = TradeStep::RemoveGoods {
            container: storage,
            good: offered.good.clone(),
            qty: offered.quantity,
        };
        if !applied.commit(take_offered, gw) {
            return Err(abort(applied, gw, TradeError::InsufficientStock));
        }

        let grant_offered = TradeStep::AddGoods {
            container: holdings,
            good: offered.good.clone(),
            qty: offered.quantity,
        };
        if !applied.commit(grant_offered, gw) {
            return Err(abort(
                applied,
                gw,
                TradeError::InsufficientSpace {
                    stack: offered.to_string(),
                },
            ));
        }

        self.cooldowns.record(actor);

        let receipt = TradeReceipt {
            kind: TradeKind::Barter,
            shop_id: shop.id.clone(),
            actor,
            owner: shop.owner_id,
            gave: Some(required),
            received: Some(offered),
            price: None,
            settled_at: Utc::now(),
        };
        self.settle(shop, gw, &receipt);
        Ok(receipt)
    }

    /// Post-trade settlement: bump the shop's last-used stamp (which also
    /// triggers a presentation refresh) and emit the statistics event.
    fn settle(&self, shop: &ShopRecord, gw: &mut TradeGateways<'_>, receipt: &TradeReceipt) {
        if let Err(err) = gw.registry.mark_used(&shop.id) {
            warn!("could not settle shop {} after trade: {}", shop.id, err);
        }
        gw.stats.on_trade(&TradeEvent::from_receipt(receipt));
        info!(
            "trade settled: {:?} at shop {} by {} (owner {})",
            receipt.kind, receipt.shop_id, receipt.actor, receipt.owner
        );
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
