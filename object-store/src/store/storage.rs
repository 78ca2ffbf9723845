use std::path::Path;
use std::sync::Arc;

use rocksdb::ColumnFamily;
use rocksdb::ColumnFamilyDescriptor;
use rocksdb::Options;
use rocksdb::DB;

use crate::error::{StoreError, StoreResult};

/// Column family holding one JSON manifest per object id.
pub const MANIFESTS_CF: &str = "manifests";

/// Column family used by the RocksDB chunk backend.
pub const CHUNKS_CF: &str = "chunks";

/// Opens (or creates) the RocksDB database backing a store.
///
/// # Arguments
/// * `db_path` - The path where the RocksDB database will be stored
pub fn new_storage<P: AsRef<Path>>(db_path: P) -> StoreResult<Arc<DB>> {
    let mut db_opts = Options::default();
    db_opts.create_missing_column_families(true);
    db_opts.create_if_missing(true);

    let manifests = ColumnFamilyDescriptor::new(MANIFESTS_CF, Options::default());
    let chunks = ColumnFamilyDescriptor::new(CHUNKS_CF, Options::default());

    let db = DB::open_cf_descriptors(&db_opts, db_path, vec![manifests, chunks])?;
    Ok(Arc::new(db))
}

/// Returns a handle to the named column family.
pub(crate) fn column_family<'a>(db: &'a DB, name: &str) -> StoreResult<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::io(format!("missing column family {}", name)))
}
