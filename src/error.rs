//! Error types for tenancy operations.

use thiserror::Error;

/// Errors that can occur while coordinating tenants.
#[derive(Error, Debug)]
pub enum TenancyError {
    /// The configured engine kind is not a supported adapter at all.
    ///
    /// Carries the adapter module name that failed to resolve (e.g.
    /// `nonexistent_adapter`), so callers can report actionable diagnostics.
    #[error("the adapter `{0}` is not yet supported")]
    UnsupportedAdapter(String),

    /// The engine kind is recognized, but no adapter implementation has been
    /// registered for it on this platform.
    #[error("database configuration specifies nonexistent {0} adapter")]
    AdapterNotFound(String),

    /// The backend's tenant metadata store does not exist yet.
    ///
    /// Adapters return this from `current` (and other metadata reads) when
    /// queried before any tenant has been provisioned. The coordinator maps
    /// this one condition to "no tenant selected"; from any other operation it
    /// propagates like every other error.
    #[error("tenant metadata store has not been initialized")]
    UninitializedDatabase,

    /// The named tenant does not exist in the backend.
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// A tenant with this identifier already exists.
    #[error("tenant already exists: {0}")]
    TenantExists(String),

    /// A failure from the underlying database driver.
    #[error("database error: {0}")]
    Database(String),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A request-based resolution strategy could not produce a tenant name.
    #[error("tenant resolution failed: {0}")]
    ResolutionFailed(String),
}

/// Result type alias for tenancy operations.
pub type TenancyResult<T> = Result<T, TenancyError>;
