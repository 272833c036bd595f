//! Storage layer: last analysis result per domain, in memory or on disk.

mod domain_store;
mod error;

pub use domain_store::DomainStore;
pub use error::StoreError;
