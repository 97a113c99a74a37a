//! Sharded, read-only access to the WoC archive.
//!
//! Every kind of data (a [`Category`]) is split over `2^prefix_bits` shard
//! files. Git object keys pick their shard by their first byte; identifier
//! strings (projects, files, authors) by their FNV-1a hash. Shards are either
//! Tokyo Cabinet hash databases, read through a memory map, or sequential
//! files read by offset or line.
//!
//! The [`ShardStore`] resolves lookups against an injected
//! [`ArchiveConfig`] and reads through an [`ArchiveBackend`]:
//! [`DiskBackend`] for a real archive, [`MemoryArchive`] for tests.

pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod pool;
pub mod sequential;
pub mod shard;
pub mod store;
pub mod table;
pub mod tch;

pub use backend::{ArchiveBackend, DiskBackend, ReadSeek};
pub use config::{ArchiveConfig, Category, ShardLayout, Storage, DEFAULT_MAX_OPEN_HANDLES};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryArchive;
pub use pool::HandlePool;
pub use sequential::{IndexEntry, SequentialRecords};
pub use shard::{fnv1a_32, shard_index, Sharding};
pub use store::{PrefixKeys, ShardStore};
pub use table::{HashTable, MemoryTable};
pub use tch::TchFile;
