//! Decision cache
//!
//! Keys generalize across instances of the same page template: the URL
//! is normalized by stripping volatile path segments before hashing,
//! so `/orders/123/edit` and `/orders/456/edit` share prior heals.

mod key;
mod store;

pub use key::{normalize_page_pattern, CacheKey};
pub use store::{CacheBundle, CacheConfig, CacheEntry, CacheStore};
