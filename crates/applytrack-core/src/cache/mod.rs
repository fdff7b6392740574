//! Cache layer: TTL + version store, invalidation bus, unified domain cache.
//!
//! ```text
//! consumer ── get ──► CacheStore ── miss ──► DomainFetcher (remote)
//!                        ▲
//!   Signal ── publish ──► InvalidationBus ── evict(keys_for(signal))
//! ```

pub mod bus;
pub mod entry;
pub mod keys;
pub mod store;
pub mod unified;

pub use bus::{InvalidationBus, Subscription};
pub use entry::CacheEntry;
pub use keys::CacheKey;
pub use store::{CacheStats, CacheStore, FillTicket, Invalidate};
pub use unified::{DomainFetcher, UnifiedDomainCache};
