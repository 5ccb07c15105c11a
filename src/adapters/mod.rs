//! Adapter implementations shipped with the crate.
//!
//! Real deployments provide their own adapters (schema-per-tenant,
//! database-per-tenant, discriminator-column) against their database driver;
//! the in-memory adapter here implements the full contract without a
//! database, for tests and for embedding.

pub mod memory;

pub use memory::MemoryAdapter;
