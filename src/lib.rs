//! Multi-Tenancy Coordination
//!
//! Tenant-resolution and adapter-dispatch core for database-backed
//! applications: selects, caches, and exposes a per-execution-context tenant
//! adapter and routes tenant lifecycle operations (create/drop/switch/reset/
//! seed) to it. The isolation strategy itself (schema per tenant, database
//! per tenant, discriminator column) lives in adapter implementations behind
//! the [`TenantAdapter`] trait.
//!
//! # Features
//!
//! - 🏢 **Per-Context Adapters** - One lazily constructed adapter per
//!   request/job/thread, never shared
//! - 🔀 **Guaranteed Restoration** - Scoped switching through a `Drop` guard
//!   that restores the previous tenant on every exit path
//! - 🗄️ **Pluggable Isolation** - One trait per strategy seam, adapters
//!   self-register with the factory at startup
//! - 🔍 **Tenant Resolution** - Header, subdomain, host, and path strategies
//!   over a framework-neutral request type
//! - 📝 **Lifecycle Hooks** - Before/after create, drop, and switch extension
//!   points
//! - 🌱 **Seeding & Excluded Models** - Seed-after-create and
//!   never-tenant-scoped entity configuration
//!
//! # Quick Start
//!
//! ```
//! use tenantry::{Tenancy, TenancyConfig};
//!
//! let tenancy = Tenancy::new(TenancyConfig::new("memory"));
//!
//! // One scope per unit of work (request, job, thread).
//! let scope = tenancy.scope();
//! scope.init()?;
//!
//! scope.create("acme")?;
//! {
//!     let _guard = scope.switch("acme")?;
//!     // everything here runs against the acme tenant
//!     assert_eq!(scope.current()?.as_deref(), Some("acme"));
//! }
//! // the guard restored the previous tenant
//! assert_eq!(scope.current()?.as_deref(), Some("public"));
//! # Ok::<(), tenantry::TenancyError>(())
//! ```
//!
//! # Implementing an Adapter
//!
//! ```rust,ignore
//! use tenantry::{AdapterRegistration, TenantAdapter};
//!
//! struct SchemaAdapter { /* connection handle, config */ }
//!
//! impl TenantAdapter for SchemaAdapter {
//!     // create/drop map to CREATE SCHEMA / DROP SCHEMA,
//!     // switch_into maps to SET search_path, ...
//! #    fn create(&self, _: &str) -> tenantry::TenancyResult<()> { todo!() }
//! }
//!
//! inventory::submit! {
//!     AdapterRegistration::new("postgresql", None, SchemaAdapter::construct)
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod adapters;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod registry;
pub mod resolver;

pub use adapter::{AdapterEvent, CallbackSet, LifecycleHook, TenantAdapter};
pub use adapters::MemoryAdapter;
pub use config::{EnvironmentNamespacing, TenancyConfig};
pub use coordinator::{ContextId, SwitchGuard, Tenancy, TenancyScope};
pub use error::{TenancyError, TenancyResult};
pub use registry::{AdapterConstructor, AdapterRegistration, AdapterRegistry, Platform};
pub use resolver::{
    HeaderResolver, HostResolver, PathResolver, SubdomainResolver, TenantRequest, TenantResolver,
};

// Re-export inventory so adapter crates can self-register without adding the
// dependency themselves.
pub use inventory;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{AdapterEvent, LifecycleHook, TenantAdapter};
    pub use crate::config::{EnvironmentNamespacing, TenancyConfig};
    pub use crate::coordinator::{Tenancy, TenancyScope};
    pub use crate::error::{TenancyError, TenancyResult};
    pub use crate::registry::{AdapterRegistration, AdapterRegistry, Platform};
    pub use crate::resolver::{TenantRequest, TenantResolver};
}
