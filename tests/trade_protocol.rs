//! End-to-end trade protocol tests: conservation properties, precondition
//! ordering, rollback behavior, and the statistics contract.

mod common;

use common::{good, init_logging, MemoryInventory, MemoryLedger, RecordingStats};
use tradepost::shop::{
    shop_status, ActorId, BarterTerms, ContainerRef, CreateShop, CurrencyLedger, Location,
    NullStats, ShopPolicy, ShopRecord, ShopRegistry, ShopStatus, StorageInventory, TradeEngine,
    TradeError, TradeGateways, TradeKind, TradePolicy,
};

struct World {
    registry: ShopRegistry,
    shop: ShopRecord,
    owner: ActorId,
    actor: ActorId,
    ledger: MemoryLedger,
    inventory: MemoryInventory,
}

/// Shop trading 5x iron_ingot at buy 10 / sell 6, stocked with 20; actor
/// holds 100 coins, owner 50.
fn world() -> World {
    init_logging();
    let registry = ShopRegistry::new(ShopPolicy::default());
    let owner = ActorId::random();
    let actor = ActorId::random();
    let shop = registry
        .create(CreateShop {
            owner_id: owner,
            owner_name: "Alice".to_string(),
            storage_location: Location::new("overworld", 3, 64, -12),
            sign_location: Location::new("overworld", 3, 65, -12),
            good: good("iron_ingot"),
            unit_quantity: 5,
            buy_price: 10,
            sell_price: 6,
        })
        .expect("create shop");

    let mut ledger = MemoryLedger::new();
    ledger.open(actor, 100);
    ledger.open(owner, 50);

    let mut inventory = MemoryInventory::new();
    inventory.stock(
        ContainerRef::Storage(shop.storage_location.key()),
        &good("iron_ingot"),
        20,
    );

    World {
        registry,
        shop,
        owner,
        actor,
        ledger,
        inventory,
    }
}

fn storage(shop: &ShopRecord) -> ContainerRef {
    ContainerRef::Storage(shop.storage_location.key())
}

#[test]
fn buy_conserves_goods_and_money() {
    let mut w = world();
    let iron = good("iron_ingot");
    let engine = TradeEngine::new(TradePolicy::default());

    let goods_before = w.inventory.count_of(&storage(&w.shop), &iron)
        + w.inventory.count_of(&ContainerRef::Actor(w.actor), &iron);
    let money_before = w.ledger.balance(w.actor) + w.ledger.balance(w.owner);

    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    engine.buy(w.actor, &w.shop, &mut gw).expect("buy");

    let goods_after = w.inventory.count_of(&storage(&w.shop), &iron)
        + w.inventory.count_of(&ContainerRef::Actor(w.actor), &iron);
    let money_after = w.ledger.balance(w.actor) + w.ledger.balance(w.owner);
    assert_eq!(goods_before, goods_after);
    assert_eq!(money_before, money_after);
}

#[test]
fn repeated_buys_drain_shop_then_reject() {
    let mut w = world();
    let iron = good("iron_ingot");
    let engine = TradeEngine::new(TradePolicy::default());

    // 20 in stock, lot of 5: four buys succeed, the fifth rejects.
    for _ in 0..4 {
        let mut gw = TradeGateways {
            ledger: Some(&mut w.ledger),
            inventory: &mut w.inventory,
            registry: &w.registry,
            stats: &NullStats,
        };
        engine.buy(w.actor, &w.shop, &mut gw).expect("buy");
    }
    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    assert_eq!(
        engine.buy(w.actor, &w.shop, &mut gw),
        Err(TradeError::InsufficientStock)
    );

    assert_eq!(w.inventory.count_of(&storage(&w.shop), &iron), 0);
    assert_eq!(
        w.inventory.count_of(&ContainerRef::Actor(w.actor), &iron),
        20
    );
    assert_eq!(w.ledger.balance(w.actor), 60);
    assert_eq!(w.ledger.balance(w.owner), 90);

    // Drained shop reads as out of stock.
    let shop = w.registry.by_id(&w.shop.id).unwrap();
    assert_eq!(shop_status(&shop, &w.inventory), ShopStatus::OutOfStock);
}

#[test]
fn exact_funds_buy_scenario() {
    // Shop: buyPrice=10, stock=5, lot=5; actor: balance=10, room for 5.
    let mut w = world();
    let iron = good("iron_ingot");
    w.inventory.stock(storage(&w.shop), &iron, 5);
    w.ledger.open(w.actor, 10);

    let engine = TradeEngine::new(TradePolicy::default());
    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    let receipt = engine.buy(w.actor, &w.shop, &mut gw).expect("buy");
    assert_eq!(receipt.price, Some(10));

    assert_eq!(w.ledger.balance(w.actor), 0);
    assert_eq!(w.inventory.count_of(&storage(&w.shop), &iron), 0);
    assert_eq!(
        w.inventory.count_of(&ContainerRef::Actor(w.actor), &iron),
        5
    );
}

#[test]
fn buy_with_short_stock_never_mutates_balances() {
    let mut w = world();
    w.inventory.stock(storage(&w.shop), &good("iron_ingot"), 4);

    let engine = TradeEngine::new(TradePolicy::default());
    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    assert_eq!(
        engine.buy(w.actor, &w.shop, &mut gw),
        Err(TradeError::InsufficientStock)
    );
    assert_eq!(w.ledger.balance(w.actor), 100);
    assert_eq!(w.ledger.balance(w.owner), 50);
}

#[test]
fn buy_without_actor_room_rejected_before_any_mutation() {
    let mut w = world();
    let iron = good("iron_ingot");
    w.inventory
        .set_capacity(ContainerRef::Actor(w.actor), &iron, 3);

    let engine = TradeEngine::new(TradePolicy::default());
    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    let err = engine.buy(w.actor, &w.shop, &mut gw).unwrap_err();
    assert!(matches!(err, TradeError::InsufficientSpace { .. }));
    assert_eq!(w.ledger.balance(w.actor), 100);
    assert_eq!(w.inventory.count_of(&storage(&w.shop), &iron), 20);
}

#[test]
fn sell_conserves_goods_and_money() {
    let mut w = world();
    let iron = good("iron_ingot");
    w.inventory
        .stock(ContainerRef::Actor(w.actor), &iron, 12);
    let engine = TradeEngine::new(TradePolicy::default());

    let goods_before = w.inventory.count_of(&storage(&w.shop), &iron)
        + w.inventory.count_of(&ContainerRef::Actor(w.actor), &iron);
    let money_before = w.ledger.balance(w.actor) + w.ledger.balance(w.owner);

    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    let receipt = engine.sell(w.actor, &w.shop, &mut gw).expect("sell");
    assert_eq!(receipt.kind, TradeKind::Sell);

    let goods_after = w.inventory.count_of(&storage(&w.shop), &iron)
        + w.inventory.count_of(&ContainerRef::Actor(w.actor), &iron);
    let money_after = w.ledger.balance(w.actor) + w.ledger.balance(w.owner);
    assert_eq!(goods_before, goods_after);
    assert_eq!(money_before, money_after);
    assert_eq!(w.ledger.balance(w.actor), 106);
    assert_eq!(w.ledger.balance(w.owner), 44);
}

#[test]
fn sell_to_broke_owner_never_mutates_inventories() {
    let mut w = world();
    let iron = good("iron_ingot");
    w.ledger.open(w.owner, 5);
    w.inventory
        .stock(ContainerRef::Actor(w.actor), &iron, 12);

    let engine = TradeEngine::new(TradePolicy::default());
    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    assert_eq!(
        engine.sell(w.actor, &w.shop, &mut gw),
        Err(TradeError::OwnerInsufficientFunds)
    );
    assert_eq!(
        w.inventory.count_of(&ContainerRef::Actor(w.actor), &iron),
        12
    );
    assert_eq!(w.inventory.count_of(&storage(&w.shop), &iron), 20);
}

#[test]
fn forced_sell_rollback_restores_actor_count_exactly() {
    let mut w = world();
    let iron = good("iron_ingot");
    // Owner balance passes the precondition but the ledger refuses the
    // withdraw after the goods already moved into storage.
    w.ledger.refuse_withdrawals(w.owner);
    w.inventory
        .stock(ContainerRef::Actor(w.actor), &iron, 12);

    let engine = TradeEngine::new(TradePolicy::default());
    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    assert_eq!(
        engine.sell(w.actor, &w.shop, &mut gw),
        Err(TradeError::OwnerInsufficientFunds)
    );
    assert_eq!(
        w.inventory.count_of(&ContainerRef::Actor(w.actor), &iron),
        12
    );
    assert_eq!(w.inventory.count_of(&storage(&w.shop), &iron), 20);
    assert_eq!(w.ledger.balance(w.actor), 100);
}

#[test]
fn barter_round_trip_with_cooldown() {
    let mut w = world();
    let coal = good("coal");
    let iron = good("iron_ingot");
    w.registry
        .convert_to_barter(
            &w.shop.id,
            BarterTerms {
                required_good: coal.clone(),
                required_qty: 3,
                offered_good: iron.clone(),
                offered_qty: 1,
            },
        )
        .expect("convert");
    let shop = w.registry.by_id(&w.shop.id).unwrap();
    w.inventory
        .stock(ContainerRef::Actor(w.actor), &coal, 9);

    let mut engine = TradeEngine::new(TradePolicy {
        barter_cooldown_secs: 120,
    });
    let mut gw = TradeGateways {
        ledger: None,
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };

    let receipt = engine.barter(w.actor, &shop, &mut gw).expect("barter");
    assert_eq!(receipt.kind, TradeKind::Barter);
    assert_eq!(receipt.price, None);

    match engine.barter(w.actor, &shop, &mut gw) {
        Err(TradeError::CooldownActive { remaining_secs }) => {
            assert!(remaining_secs > 0 && remaining_secs <= 120);
        }
        other => panic!("expected cooldown rejection, got {:?}", other),
    }

    // A different actor is unaffected by the first actor's cooldown.
    let visitor = ActorId::random();
    w.inventory
        .stock(ContainerRef::Actor(visitor), &coal, 3);
    let mut gw = TradeGateways {
        ledger: None,
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    engine.barter(visitor, &shop, &mut gw).expect("other actor");
}

#[test]
fn barter_without_shop_stock_fails_cleanly() {
    let mut w = world();
    let coal = good("coal");
    let iron = good("iron_ingot");
    w.registry
        .convert_to_barter(
            &w.shop.id,
            BarterTerms {
                required_good: coal.clone(),
                required_qty: 3,
                offered_good: iron.clone(),
                offered_qty: 1,
            },
        )
        .expect("convert");
    let shop = w.registry.by_id(&w.shop.id).unwrap();
    // Shop holds no iron to offer.
    w.inventory.stock(storage(&shop), &iron, 0);
    w.inventory
        .stock(ContainerRef::Actor(w.actor), &coal, 9);

    let mut engine = TradeEngine::new(TradePolicy::default());
    let mut gw = TradeGateways {
        ledger: None,
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    assert_eq!(
        engine.barter(w.actor, &shop, &mut gw),
        Err(TradeError::InsufficientStock)
    );
    assert_eq!(
        w.inventory.count_of(&ContainerRef::Actor(w.actor), &coal),
        9
    );
}

#[test]
fn settled_trades_emit_statistics_events() {
    let mut w = world();
    let iron = good("iron_ingot");
    w.inventory
        .stock(ContainerRef::Actor(w.actor), &iron, 5);
    let stats = RecordingStats::default();
    let engine = TradeEngine::new(TradePolicy::default());

    {
        let mut gw = TradeGateways {
            ledger: Some(&mut w.ledger),
            inventory: &mut w.inventory,
            registry: &w.registry,
            stats: &stats,
        };
        engine.buy(w.actor, &w.shop, &mut gw).expect("buy");
        engine.sell(w.actor, &w.shop, &mut gw).expect("sell");
    }

    let events = stats.events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, TradeKind::Buy);
    assert_eq!(events[0].price, Some(10));
    assert_eq!(events[0].actor, w.actor);
    assert_eq!(events[0].counterparty, w.owner);
    assert_eq!(events[0].shop_id, w.shop.id);
    assert_eq!(events[1].kind, TradeKind::Sell);
    assert_eq!(events[1].price, Some(6));
}

#[test]
fn rejected_trades_emit_no_statistics() {
    let mut w = world();
    w.inventory.stock(storage(&w.shop), &good("iron_ingot"), 0);
    let stats = RecordingStats::default();
    let engine = TradeEngine::new(TradePolicy::default());
    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &stats,
    };
    assert!(engine.buy(w.actor, &w.shop, &mut gw).is_err());
    assert!(stats.events.lock().unwrap().is_empty());
}

#[test]
fn trade_settlement_updates_last_used_only() {
    let mut w = world();
    let engine = TradeEngine::new(TradePolicy::default());
    let before = w.registry.by_id(&w.shop.id).unwrap();

    let mut gw = TradeGateways {
        ledger: Some(&mut w.ledger),
        inventory: &mut w.inventory,
        registry: &w.registry,
        stats: &NullStats,
    };
    engine.buy(w.actor, &w.shop, &mut gw).expect("buy");

    let after = w.registry.by_id(&w.shop.id).unwrap();
    assert!(after.last_used >= before.last_used);
    assert_eq!(after.buy_price, before.buy_price);
    assert_eq!(after.sell_price, before.sell_price);
    assert_eq!(after.owner_id, before.owner_id);
    assert_eq!(after.unit_quantity, before.unit_quantity);
}
