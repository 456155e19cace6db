//! Core data model for the shop system: locations and their index keys,
//! good/actor/shop identifiers, shop records with their invariants, and the
//! receipt/event types a settled trade produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version stamped into every persisted shop entry.
pub const SHOP_SCHEMA_VERSION: u8 = 1;

/// Largest lot size a shop may trade per transaction (one container stack).
pub const MAX_UNIT_QUANTITY: u32 = 64;

/// Upper bound on good identifier length.
pub const MAX_GOOD_ID_LEN: usize = 48;

// ============================================================================
// Locations
// ============================================================================

/// A discrete block coordinate within a named region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub region: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Location {
    pub fn new(region: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            region: region.into(),
            x,
            y,
            z,
        }
    }

    /// Derive the index key for this coordinate.
    pub fn key(&self) -> LocationKey {
        LocationKey(format!("{}:{}:{}:{}", self.region, self.x, self.y, self.z))
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {}, {})", self.region, self.x, self.y, self.z)
    }
}

/// Deterministic string key derived from a [`Location`]. Used only for
/// indexing; equality is structural and carries no business meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Location> for LocationKey {
    fn from(loc: &Location) -> Self {
        loc.key()
    }
}

impl std::fmt::Display for LocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Identifiers
// ============================================================================

/// Validated identifier for a kind of tradeable good.
///
/// Good identifiers are lowercase `[a-z0-9_]` names like `iron_ingot`. An
/// identifier outside that shape does not resolve to a known good; snapshot
/// loading treats such entries as corrupt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoodId(String);

impl GoodId {
    /// Parse and validate a good identifier.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("good identifier is empty".to_string());
        }
        if raw.len() > MAX_GOOD_ID_LEN {
            return Err(format!("good identifier too long: {} chars", raw.len()));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(format!("unknown good type: {}", raw));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable display name: `iron_ingot` -> `Iron Ingot`.
    pub fn display_name(&self) -> String {
        self.0
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for GoodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque shop identifier, immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopId(String);

impl ShopId {
    /// Generate a fresh short id from a v4 UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string()[..8].to_string())
    }

    /// Accept an id loaded from persistence. Ids are opaque but must be
    /// non-empty printable ASCII.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() || raw.len() > 32 || !raw.chars().all(|c| c.is_ascii_graphic()) {
            return Err(format!("malformed shop id: {:?}", raw));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a trading party (player or service account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub Uuid);

impl ActorId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Shop records
// ============================================================================

/// Item-for-item exchange terms for a barter-mode shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarterTerms {
    /// What the visiting actor must hand over.
    pub required_good: GoodId,
    pub required_qty: u32,
    /// What the shop gives back.
    pub offered_good: GoodId,
    pub offered_qty: u32,
}

impl BarterTerms {
    /// Validate quantity bounds and that both sides trade different goods.
    pub fn validate(&self) -> Result<(), String> {
        if self.required_qty == 0 || self.required_qty > MAX_UNIT_QUANTITY {
            return Err(format!("required quantity out of range: {}", self.required_qty));
        }
        if self.offered_qty == 0 || self.offered_qty > MAX_UNIT_QUANTITY {
            return Err(format!("offered quantity out of range: {}", self.offered_qty));
        }
        if self.required_good == self.offered_good {
            return Err(format!("barter would swap {} for itself", self.required_good));
        }
        Ok(())
    }
}

/// A registered container shop.
///
/// The registry is the only mutation gateway for these records; everything
/// else works against clones handed out by lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopRecord {
    pub id: ShopId,
    pub owner_id: ActorId,
    pub owner_name: String,
    /// Backing container coordinate. Immutable once created.
    pub storage_location: Location,
    /// Display sign coordinate. Immutable once created.
    pub sign_location: Location,
    /// Traded good for currency-mode shops.
    pub good: GoodId,
    /// Lot size per transaction, 1..=64.
    pub unit_quantity: u32,
    /// Price the actor pays to buy one lot. Zero disables buying.
    pub buy_price: u64,
    /// Price the actor is paid for selling one lot. Zero disables selling.
    pub sell_price: u64,
    /// Item-for-item terms. When set, both money prices are zero.
    #[serde(default)]
    pub barter: Option<BarterTerms>,
    pub active: bool,
    pub created: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl ShopRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_id: ActorId,
        owner_name: impl Into<String>,
        storage_location: Location,
        sign_location: Location,
        good: GoodId,
        unit_quantity: u32,
        buy_price: u64,
        sell_price: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ShopId::generate(),
            owner_id,
            owner_name: owner_name.into(),
            storage_location,
            sign_location,
            good,
            unit_quantity,
            buy_price,
            sell_price,
            barter: None,
            active: true,
            created: now,
            last_used: now,
        }
    }

    /// Actors can buy from this shop.
    pub fn has_buy_price(&self) -> bool {
        self.buy_price > 0
    }

    /// Actors can sell to this shop.
    pub fn has_sell_price(&self) -> bool {
        self.sell_price > 0
    }

    pub fn is_barter(&self) -> bool {
        self.barter.is_some()
    }

    /// Record invariants, checked at creation, load, and after every edit.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.unit_quantity == 0 || self.unit_quantity > MAX_UNIT_QUANTITY {
            return Err(format!("unit quantity out of range: {}", self.unit_quantity));
        }
        if self.storage_location.key() == self.sign_location.key() {
            return Err("storage and sign share a coordinate".to_string());
        }
        match &self.barter {
            Some(terms) => {
                terms.validate()?;
                if self.buy_price != 0 || self.sell_price != 0 {
                    return Err("barter shop carries money prices".to_string());
                }
            }
            None => {
                if self.buy_price == 0 && self.sell_price == 0 {
                    return Err("neither trade direction is enabled".to_string());
                }
            }
        }
        Ok(())
    }

    /// Derived status given the backing storage's current stock and free
    /// capacity for the traded good. Never stored; recomputed per query.
    pub fn status(&self, stock: u32, free_capacity: u32) -> ShopStatus {
        if !self.active {
            return ShopStatus::Inactive;
        }
        if self.has_buy_price() && stock == 0 {
            return ShopStatus::OutOfStock;
        }
        if self.has_sell_price() && free_capacity == 0 {
            return ShopStatus::OutOfSpace;
        }
        ShopStatus::Active
    }

    pub fn touch(&mut self) {
        self.last_used = Utc::now();
    }
}

// ============================================================================
// Derived status
// ============================================================================

/// Computed shop state used for display gating. `OutOfStock`/`OutOfSpace`
/// revert to `Active` on their own once stock or space changes; there is no
/// stored transition history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShopStatus {
    Active,
    Inactive,
    OutOfStock,
    OutOfSpace,
}

/// Display styling resolved once per render from the computed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStyle {
    pub label: &'static str,
    pub color: &'static str,
}

impl ShopStatus {
    pub fn style(self) -> StatusStyle {
        match self {
            ShopStatus::Active => StatusStyle {
                label: "Open",
                color: "green",
            },
            ShopStatus::Inactive => StatusStyle {
                label: "Closed",
                color: "gray",
            },
            ShopStatus::OutOfStock => StatusStyle {
                label: "Sold Out",
                color: "red",
            },
            ShopStatus::OutOfSpace => StatusStyle {
                label: "Full",
                color: "gold",
            },
        }
    }
}

// ============================================================================
// Trade outcomes
// ============================================================================

/// Which protocol settled a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    Buy,
    Sell,
    Barter,
}

/// A quantity of one good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodStack {
    pub good: GoodId,
    pub quantity: u32,
}

impl GoodStack {
    pub fn new(good: GoodId, quantity: u32) -> Self {
        Self { good, quantity }
    }
}

impl std::fmt::Display for GoodStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x {}", self.quantity, self.good.display_name())
    }
}

/// What a settled trade actually moved, from the acting party's perspective.
/// Confirmation messages are rendered from this, never reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub kind: TradeKind,
    pub shop_id: ShopId,
    pub actor: ActorId,
    pub owner: ActorId,
    /// Goods the actor handed over (sell, barter).
    pub gave: Option<GoodStack>,
    /// Goods the actor received (buy, barter).
    pub received: Option<GoodStack>,
    /// Money that changed hands, if any.
    pub price: Option<u64>,
    pub settled_at: DateTime<Utc>,
}

/// Statistics record emitted after every settled trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub kind: TradeKind,
    pub shop_id: ShopId,
    pub actor: ActorId,
    pub counterparty: ActorId,
    pub gave: Option<GoodStack>,
    pub received: Option<GoodStack>,
    pub price: Option<u64>,
    pub at: DateTime<Utc>,
}

impl TradeEvent {
    pub fn from_receipt(receipt: &TradeReceipt) -> Self {
        Self {
            kind: receipt.kind,
            shop_id: receipt.shop_id.clone(),
            actor: receipt.actor,
            counterparty: receipt.owner,
            gave: receipt.gave.clone(),
            received: receipt.received.clone(),
            price: receipt.price,
            at: receipt.settled_at,
        }
    }
}

// ============================================================================
// Persistence wire format
// ============================================================================

/// Flat persisted form of a shop entry, keyed by shop id in the store.
///
/// Kept separate from [`ShopRecord`] so loading can tolerate individual
/// corrupt entries: decoding produces a raw entry, and promotion to a record
/// validates identity, locations, and good identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawShopEntry {
    pub schema_version: u8,
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub storage_location: (String, i32, i32, i32),
    pub sign_location: (String, i32, i32, i32),
    pub good: String,
    pub unit_quantity: u32,
    pub buy_price: u64,
    pub sell_price: u64,
    pub active: bool,
    pub created: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    /// Missing or unknown barter data defaults to "barter disabled".
    #[serde(default)]
    pub barter: RawBarter,
}

/// Persisted barter sub-tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawBarter {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub required_good: Option<String>,
    #[serde(default)]
    pub required_qty: u32,
    #[serde(default)]
    pub offered_good: Option<String>,
    #[serde(default)]
    pub offered_qty: u32,
}

impl RawShopEntry {
    pub fn from_record(record: &ShopRecord) -> Self {
        let barter = match &record.barter {
            Some(terms) => RawBarter {
                enabled: true,
                required_good: Some(terms.required_good.as_str().to_string()),
                required_qty: terms.required_qty,
                offered_good: Some(terms.offered_good.as_str().to_string()),
                offered_qty: terms.offered_qty,
            },
            None => RawBarter::default(),
        };
        Self {
            schema_version: SHOP_SCHEMA_VERSION,
            id: record.id.as_str().to_string(),
            owner_id: record.owner_id.to_string(),
            owner_name: record.owner_name.clone(),
            storage_location: (
                record.storage_location.region.clone(),
                record.storage_location.x,
                record.storage_location.y,
                record.storage_location.z,
            ),
            sign_location: (
                record.sign_location.region.clone(),
                record.sign_location.x,
                record.sign_location.y,
                record.sign_location.z,
            ),
            good: record.good.as_str().to_string(),
            unit_quantity: record.unit_quantity,
            buy_price: record.buy_price,
            sell_price: record.sell_price,
            active: record.active,
            created: record.created,
            last_used: record.last_used,
            barter,
        }
    }

    /// Promote a raw entry into a validated record.
    pub fn into_record(self) -> Result<ShopRecord, String> {
        let id = ShopId::parse(&self.id)?;
        let owner_id = Uuid::parse_str(&self.owner_id)
            .map(ActorId)
            .map_err(|e| format!("malformed owner id {:?}: {}", self.owner_id, e))?;
        let storage_location = location_from_tuple(&self.storage_location)?;
        let sign_location = location_from_tuple(&self.sign_location)?;
        let good = GoodId::parse(&self.good)?;
        let barter = if self.barter.enabled {
            let required = self
                .barter
                .required_good
                .as_deref()
                .ok_or_else(|| "barter enabled without required good".to_string())?;
            let offered = self
                .barter
                .offered_good
                .as_deref()
                .ok_or_else(|| "barter enabled without offered good".to_string())?;
            Some(BarterTerms {
                required_good: GoodId::parse(required)?,
                required_qty: self.barter.required_qty,
                offered_good: GoodId::parse(offered)?,
                offered_qty: self.barter.offered_qty,
            })
        } else {
            None
        };
        let record = ShopRecord {
            id,
            owner_id,
            owner_name: self.owner_name,
            storage_location,
            sign_location,
            good,
            unit_quantity: self.unit_quantity,
            buy_price: self.buy_price,
            sell_price: self.sell_price,
            barter,
            active: self.active,
            created: self.created,
            last_used: self.last_used,
        };
        record.check_invariants()?;
        Ok(record)
    }
}

fn location_from_tuple(tuple: &(String, i32, i32, i32)) -> Result<Location, String> {
    let (region, x, y, z) = tuple;
    if region.is_empty() {
        return Err("location has an empty region".to_string());
    }
    Ok(Location::new(region.clone(), *x, *y, *z))
}

// ============================================================================
// Unit Tests
// ============================================================================
