//! Two-tier caching in front of the spreadsheet.
//!
//! `TieredCache` serves reads from an in-process memory tier, then from JSON
//! snapshots on disk, and only then from the remote source. When the remote
//! fails, the last disk snapshot is served with a stale marker instead of an
//! error.
//!
//! Default TTLs: memory 5 minutes, disk 60 minutes, search results 1 minute,
//! stats 2 minutes.

pub mod clock;
pub mod disk;
pub mod entry;
pub mod key;
pub mod memory;
pub mod tiered;

pub use clock::{Clock, ManualClock, SystemClock};
pub use disk::DiskTier;
pub use entry::{CacheEntry, CacheSource, CachedData};
pub use key::{cache_key, normalize_key};
pub use memory::MemoryTier;
pub use tiered::{CacheInfo, ClearScope, ReadOptions, TieredCache};
