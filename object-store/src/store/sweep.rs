use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::store::chunk_storage::ChunkStores;
use crate::store::manifest_storage::ManifestStore;
use crate::store::types::parse_chunk_id;
use crate::store::writer::InFlight;
use crate::store::ObjectStore;

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Chunk keys looked at
    pub scanned: usize,
    /// Orphaned chunks deleted
    pub removed: usize,
}

/// Deletes chunks that belong to no committed manifest, left behind by failed
/// or cancelled writes and by interrupted deletes.
///
/// An object is checked for being in flight before its manifest is looked up.
/// Writers commit the manifest before leaving the in-flight set, so a chunk is
/// never judged orphaned while its object is still committing.
pub(crate) async fn sweep_orphans(
    manifests: &ManifestStore,
    chunks: &ChunkStores,
    in_flight: &InFlight,
) -> StoreResult<SweepReport> {
    let chunk_ids = chunks.as_trait().list_chunks().await.map_err(StoreError::Io)?;
    let mut report = SweepReport { scanned: chunk_ids.len(), removed: 0 };
    let mut committed = HashMap::new();

    for chunk_id in chunk_ids {
        let Some((object, _)) = parse_chunk_id(&chunk_id) else {
            tracing::debug!("ignoring foreign chunk key {}", chunk_id);
            continue;
        };
        if in_flight.contains(&object) {
            continue;
        }
        let has_manifest = match committed.get(&object) {
            Some(known) => *known,
            None => {
                let known = manifests.contains(&object)?;
                committed.insert(object, known);
                known
            }
        };
        if has_manifest {
            continue;
        }

        chunks.as_trait().delete_chunk(&chunk_id).await.map_err(StoreError::Io)?;
        report.removed += 1;
    }

    Ok(report)
}

/// Runs [`ObjectStore::sweep_orphans`] every `period` until the task is dropped.
pub async fn run_periodic(store: ObjectStore, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // the first tick completes immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        match store.sweep_orphans().await {
            Ok(report) if report.removed > 0 => {
                tracing::info!(
                    "orphan sweep removed {} of {} chunks",
                    report.removed,
                    report.scanned
                )
            }
            Ok(report) => tracing::debug!("orphan sweep scanned {} chunks", report.scanned),
            Err(e) => tracing::error!("orphan sweep failed: {}", e),
        }
    }
}
