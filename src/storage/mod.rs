//! Object storage access
//!
//! The backup catalog only needs two read-only primitives from object
//! storage: enumerating the immediate child "directories" under a key prefix
//! and fetching a whole object. They are modeled as a capability trait so the
//! catalog can be tested against an in-memory store.

mod s3;

pub use s3::S3Store;

use crate::error::Result;

/// Read-only object store capability
pub trait ObjectStore {
    /// List the immediate common prefixes (child "directories") under
    /// `prefix`, as returned by a delimited listing. Returned prefixes are
    /// full keys ending in `/`. A prefix with no objects yields an empty
    /// list, not an error.
    fn list_common_prefixes(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>>;

    /// Fetch an object in full. Returns `None` when the key does not exist.
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>>;
}
