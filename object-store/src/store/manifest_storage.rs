use std::sync::Arc;

use quick_cache::sync::Cache;
use rocksdb::{IteratorMode, DB};

use crate::error::StoreResult;
use crate::store::storage::{column_family, MANIFESTS_CF};
use crate::store::types::{Manifest, ObjectId};

/// Durable manifest records, keyed by object id, with a read-through cache.
///
/// Manifests are immutable, so a cached entry can only go stale through
/// [`ManifestStore::remove`], which evicts it.
#[derive(Clone)]
pub struct ManifestStore {
    db: Arc<DB>,
    cache: Arc<Cache<ObjectId, Arc<Manifest>>>,
}

impl ManifestStore {
    pub fn new(db: Arc<DB>, cache_capacity: usize) -> Self {
        Self {
            db,
            cache: Arc::new(Cache::new(cache_capacity)),
        }
    }

    /// Looks up a committed manifest.
    pub fn get(&self, id: &ObjectId) -> StoreResult<Option<Arc<Manifest>>> {
        if let Some(manifest) = self.cache.get(id) {
            return Ok(Some(manifest));
        }

        let Some(raw) = self.read_record(id)? else {
            return Ok(None);
        };

        let manifest = Arc::new(serde_json::from_slice::<Manifest>(&raw)?);
        self.cache.insert(*id, manifest.clone());
        // A `remove` may have deleted the record and evicted the cache between
        // our read and insert. It deletes before evicting, so seeing the record
        // still present here means any later eviction comes after our insert.
        if self.read_record(id)?.is_none() {
            self.cache.remove(id);
            return Ok(None);
        }
        Ok(Some(manifest))
    }

    fn read_record(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get_cf(column_family(&self.db, MANIFESTS_CF)?, id.to_string())?)
    }

    pub fn contains(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Writes the manifest and syncs the WAL. Once this returns the object is
    /// visible to readers.
    pub fn commit(&self, manifest: &Manifest) -> StoreResult<()> {
        let json = serde_json::to_vec(manifest)?;
        self.db.put_cf(
            column_family(&self.db, MANIFESTS_CF)?,
            manifest.id.to_string(),
            json,
        )?;
        self.db.flush_wal(true)?;
        Ok(())
    }

    /// Deletes the manifest. Removing an absent manifest is a no-op.
    pub fn remove(&self, id: &ObjectId) -> StoreResult<()> {
        self.db.delete_cf(column_family(&self.db, MANIFESTS_CF)?, id.to_string())?;
        self.db.flush_wal(true)?;
        self.cache.remove(id);
        Ok(())
    }

    /// Number of committed manifests. Walks the whole column family.
    pub fn count(&self) -> StoreResult<usize> {
        let mut count = 0;
        for res in self.db.iterator_cf(column_family(&self.db, MANIFESTS_CF)?, IteratorMode::Start) {
            res?;
            count += 1;
        }
        Ok(count)
    }
}
