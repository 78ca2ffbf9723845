//! Chunk-level persistence for the object store.
//!
//! A chunk is an opaque, immutable byte segment addressed by a string key.
//! Nothing in this crate knows about manifests or how chunks group into
//! objects; that lives in `object-store`.

pub mod local_store;
pub mod memory_store;
pub mod store;

pub use local_store::LocalChunkStore;
pub use memory_store::MemoryChunkStore;
pub use store::{ChunkResult, ChunkStore};
