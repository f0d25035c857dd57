pub mod keys;
pub mod quote_cache;

pub use quote_cache::{CacheMode, CacheStore};
