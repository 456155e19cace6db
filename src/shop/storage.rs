use std::path::Path;

use log::warn;
use sled::IVec;

use super::errors::StoreError;
use super::gateways::PersistenceStore;
use super::types::{RawShopEntry, ShopRecord, SHOP_SCHEMA_VERSION};

const TREE_SHOPS: &str = "tradepost_shops";

/// Sled-backed persistence for shop entries.
///
/// Entries live in one tree keyed `shops:<id>` with bincode-encoded
/// [`RawShopEntry`] values. A value that no longer decodes is skipped on
/// load with a warning; it never aborts the rest of the snapshot.
pub struct ShopStore {
    _db: sled::Db,
    shops: sled::Tree,
}

impl ShopStore {
    /// Open (or create) the shop store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let shops = db.open_tree(TREE_SHOPS)?;
        Ok(Self { _db: db, shops })
    }

    fn shop_key(id: &str) -> Vec<u8> {
        format!("shops:{}", id).into_bytes()
    }

    fn serialize(entry: &RawShopEntry) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(entry)?)
    }

    fn deserialize(bytes: IVec) -> Result<RawShopEntry, StoreError> {
        let entry: RawShopEntry = bincode::deserialize(&bytes)?;
        if entry.schema_version != SHOP_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "shop",
                expected: SHOP_SCHEMA_VERSION,
                found: entry.schema_version,
            });
        }
        Ok(entry)
    }

    /// Insert or update a single shop entry.
    pub fn put_shop(&self, record: &ShopRecord) -> Result<(), StoreError> {
        let entry = RawShopEntry::from_record(record);
        let key = Self::shop_key(&entry.id);
        let bytes = Self::serialize(&entry)?;
        self.shops.insert(key, bytes)?;
        self.shops.flush()?;
        Ok(())
    }

    /// Remove a single shop entry. Returns whether it was present.
    pub fn delete_shop(&self, id: &str) -> Result<bool, StoreError> {
        let existed = self.shops.remove(Self::shop_key(id))?.is_some();
        self.shops.flush()?;
        Ok(existed)
    }

    /// Number of stored entries, decodable or not.
    pub fn entry_count(&self) -> usize {
        self.shops.scan_prefix(b"shops:").count()
    }
}

impl PersistenceStore for ShopStore {
    fn load_all(&self) -> Result<Vec<RawShopEntry>, StoreError> {
        let mut entries = Vec::new();
        for item in self.shops.scan_prefix(b"shops:") {
            let (key, value) = item?;
            match Self::deserialize(value) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    warn!(
                        "skipping undecodable shop entry {}: {}",
                        String::from_utf8_lossy(&key),
                        err
                    );
                }
            }
        }
        Ok(entries)
    }

    fn save_all(&self, records: &[ShopRecord]) -> Result<(), StoreError> {
        // Full replace: drop stale entries first so removed shops do not
        // resurrect on the next load.
        let stale: Vec<_> = self
            .shops
            .scan_prefix(b"shops:")
            .map(|item| item.map(|(key, _)| key))
            .collect::<Result<_, _>>()?;
        for key in stale {
            self.shops.remove(key)?;
        }
        for record in records {
            let entry = RawShopEntry::from_record(record);
            let key = Self::shop_key(&entry.id);
            self.shops.insert(key, Self::serialize(&entry)?)?;
        }
        self.shops.flush()?;
        Ok(())
    }
}
