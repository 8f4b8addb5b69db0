//! Cache module: keyed query cache and read retry policy.

mod query_cache;
mod retry;

pub use query_cache::QueryCache;
pub use retry::RetryPolicy;
