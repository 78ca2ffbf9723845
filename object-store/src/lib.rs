#![allow(clippy::uninlined_format_args)]
#![deny(unused_qualifications)]

//! A chunked binary object store.
//!
//! Objects are split into fixed-size chunks held by a pluggable chunk backend,
//! and described by a manifest kept in RocksDB. The manifest is written after
//! the last chunk, so an object is either fully readable or not visible at all.

pub mod config;
pub mod error;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::chunk_storage::ChunkBackend;
pub use store::reader::ObjectStream;
pub use store::sweep::{run_periodic, SweepReport};
pub use store::types::{Manifest, ObjectId};
pub use store::ObjectStore;
