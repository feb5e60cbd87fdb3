//! Generic client-side resource caching.
//!
//! This module is domain-agnostic and provides:
//! - Per-key entries with data, fetch status and last-fetch timestamp
//! - A TTL staleness policy, one per resource class
//! - A keyed cache that deduplicates concurrent fetches for the same key
//! - Snapshot export/restore of data + timestamp only

mod entry;
mod map;
mod policy;

pub use entry::{CacheEntry, FetchStatus};
pub use map::ResourceCache;
pub use policy::StalenessPolicy;
