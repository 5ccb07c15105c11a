//! The tenant coordinator.
//!
//! [`Tenancy`] owns the configuration and a registry of live adapter
//! instances keyed by execution context. Each independent unit of work (a
//! request, a job, a thread) takes a [`TenancyScope`], which lazily resolves
//! and memoizes one adapter for that context and delegates every tenant
//! operation to it. Adapters hold connection/session state and are never
//! shared across contexts.
//!
//! Scoped switching is the load-bearing invariant of this layer:
//! [`TenancyScope::switch`] returns a guard that restores the previously
//! active tenant in `Drop`, so restoration happens on normal exit, early
//! return, and unwind alike, and a borrowed pooled connection can never leak
//! one tenant's scope into the next unit of work.

use crate::adapter::{AdapterEvent, LifecycleHook, TenantAdapter};
use crate::config::TenancyConfig;
use crate::error::{TenancyError, TenancyResult};
use crate::registry::{AdapterRegistry, Platform};
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Identifies one execution context (request, job, thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

struct Shared {
    config: RwLock<TenancyConfig>,
    registry: Arc<AdapterRegistry>,
    adapters: RwLock<HashMap<ContextId, Arc<dyn TenantAdapter>>>,
}

/// Process-wide tenant coordinator.
///
/// Cheap to clone; all clones share the same configuration and adapter cache.
///
/// # Examples
///
/// ```
/// use tenantry::{Tenancy, TenancyConfig};
///
/// let tenancy = Tenancy::new(TenancyConfig::new("memory"));
/// let scope = tenancy.scope();
///
/// scope.create("acme")?;
/// {
///     let _guard = scope.switch("acme")?;
///     // queries here run against the acme tenant
/// }
/// assert_eq!(scope.current()?.as_deref(), Some("public"));
/// # Ok::<(), tenantry::TenancyError>(())
/// ```
#[derive(Clone)]
pub struct Tenancy {
    shared: Arc<Shared>,
}

impl Tenancy {
    /// Create a coordinator using the global adapter registry.
    pub fn new(config: TenancyConfig) -> Self {
        Self::with_registry(config, AdapterRegistry::global())
    }

    /// Create a coordinator with an explicit adapter registry.
    pub fn with_registry(config: TenancyConfig, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                registry,
                adapters: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Open a scope for a new execution context.
    ///
    /// The scope owns this context's lazily constructed adapter; dropping the
    /// scope discards it. Take one scope per request/job and keep it on that
    /// unit of work; scopes are not meant to be shared between contexts.
    pub fn scope(&self) -> TenancyScope {
        TenancyScope {
            shared: Arc::clone(&self.shared),
            id: ContextId::next(),
        }
    }

    /// A snapshot of the active configuration.
    pub fn config(&self) -> TenancyConfig {
        self.shared.config.read().clone()
    }

    /// Number of execution contexts currently holding a live adapter.
    pub fn cached_adapters(&self) -> usize {
        self.shared.adapters.read().len()
    }
}

/// One execution context's handle onto the coordinator.
///
/// All tenant operations delegate to this context's cached adapter, resolving
/// and constructing it on first use.
pub struct TenancyScope {
    shared: Arc<Shared>,
    id: ContextId,
}

impl TenancyScope {
    /// This scope's context identifier.
    pub fn context_id(&self) -> ContextId {
        self.id
    }

    /// The adapter for this execution context, constructing and caching it on
    /// first use.
    ///
    /// Two calls without an intervening [`reload`](Self::reload) return the
    /// identical instance.
    pub fn adapter(&self) -> TenancyResult<Arc<dyn TenantAdapter>> {
        if let Some(adapter) = self.shared.adapters.read().get(&self.id) {
            return Ok(Arc::clone(adapter));
        }

        let config = self.shared.config.read().clone();
        let constructor = self
            .shared
            .registry
            .resolve(&config.adapter, Platform::host())?;
        let adapter = constructor(&config)?;
        debug!("constructed {} adapter for {}", config.adapter, self.id);

        Ok(Arc::clone(
            self.shared
                .adapters
                .write()
                .entry(self.id)
                .or_insert(adapter),
        ))
    }

    /// One-time setup: apply the excluded-models configuration through the
    /// adapter, before any other tenant operation runs.
    pub fn init(&self) -> TenancyResult<()> {
        let models = self.shared.config.read().excluded_models.clone();
        self.adapter()?.process_excluded_models(&models)
    }

    /// Provision storage for a new tenant.
    ///
    /// When the configuration enables `seed_after_create`, the new tenant is
    /// seeded under a scoped switch before this returns.
    pub fn create(&self, tenant: &str) -> TenancyResult<()> {
        let adapter = self.adapter()?;
        adapter.create(tenant)?;

        if self.shared.config.read().seed_after_create {
            let _guard = self.switch(tenant)?;
            adapter.seed()?;
        }

        Ok(())
    }

    /// Destroy a tenant's storage.
    pub fn drop_tenant(&self, tenant: &str) -> TenancyResult<()> {
        self.adapter()?.drop_tenant(tenant)
    }

    /// Switch into a tenant for a bounded piece of work.
    ///
    /// The returned guard restores the previously active tenant (or the
    /// default, when none was selected) when dropped, on every exit path.
    pub fn switch(&self, tenant: &str) -> TenancyResult<SwitchGuard> {
        let adapter = self.adapter()?;
        let previous = absent_if_uninitialized(adapter.current())?;
        adapter.switch_into(Some(tenant))?;
        Ok(SwitchGuard { adapter, previous })
    }

    /// Switch into a tenant permanently for this execution context.
    ///
    /// No automatic restoration; prefer [`switch`](Self::switch) for bounded
    /// work.
    pub fn switch_into(&self, tenant: &str) -> TenancyResult<()> {
        self.adapter()?.switch_into(Some(tenant))
    }

    /// Run a closure with the given tenant active, restoring the previous
    /// tenant afterwards.
    pub fn with_tenant<T>(
        &self,
        tenant: &str,
        f: impl FnOnce() -> TenancyResult<T>,
    ) -> TenancyResult<T> {
        let _guard = self.switch(tenant)?;
        f()
    }

    /// The identifier of the currently active tenant, or `None` when the
    /// backend's tenant metadata does not exist yet.
    ///
    /// Only the typed uninitialized condition maps to `None`; every other
    /// failure propagates unchanged.
    pub fn current(&self) -> TenancyResult<Option<String>> {
        absent_if_uninitialized(self.adapter()?.current())
    }

    /// Restore the active tenant to the default.
    pub fn reset(&self) -> TenancyResult<()> {
        self.adapter()?.reset()
    }

    /// Seed the currently active tenant.
    pub fn seed(&self) -> TenancyResult<()> {
        self.adapter()?.seed()
    }

    /// The process-wide default tenant identifier.
    pub fn default_tenant(&self) -> TenancyResult<String> {
        Ok(self.adapter()?.default_tenant())
    }

    /// Namespace a tenant identifier per the adapter's policy.
    pub fn environmentify(&self, tenant: &str) -> TenancyResult<String> {
        Ok(self.adapter()?.environmentify(tenant))
    }

    /// All tenant identifiers known to the backend.
    pub fn tenant_names(&self) -> TenancyResult<Vec<String>> {
        self.adapter()?.tenant_names()
    }

    /// Run a closure once per known tenant, with that tenant active.
    ///
    /// The originally active tenant is restored after each iteration and after
    /// the whole traversal, even when the closure fails.
    pub fn each(&self, mut f: impl FnMut(&str) -> TenancyResult<()>) -> TenancyResult<()> {
        for name in self.tenant_names()? {
            let _guard = self.switch(&name)?;
            f(&name)?;
        }
        Ok(())
    }

    /// Register a lifecycle hook with this context's adapter.
    pub fn set_callback(&self, event: AdapterEvent, hook: LifecycleHook) -> TenancyResult<()> {
        self.adapter()?.set_callback(event, hook);
        Ok(())
    }

    /// Discard this context's cached adapter and, when given, replace the
    /// coordinator's configuration.
    ///
    /// The next [`adapter`](Self::adapter) call constructs a fresh instance
    /// from the active configuration; a cached adapter never outlives the
    /// configuration it was built from.
    pub fn reload(&self, config: Option<TenancyConfig>) {
        debug!("reloading adapter for {}", self.id);
        self.shared.adapters.write().remove(&self.id);
        if let Some(config) = config {
            *self.shared.config.write() = config;
        }
    }
}

impl Drop for TenancyScope {
    fn drop(&mut self) {
        self.shared.adapters.write().remove(&self.id);
    }
}

fn absent_if_uninitialized(result: TenancyResult<String>) -> TenancyResult<Option<String>> {
    match result {
        Ok(tenant) => Ok(Some(tenant)),
        Err(TenancyError::UninitializedDatabase) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Restores the previously active tenant when dropped.
///
/// Returned by [`TenancyScope::switch`]; hold it for exactly the span of work
/// that should run under the switched tenant.
#[must_use = "dropping the guard immediately restores the previous tenant"]
pub struct SwitchGuard {
    adapter: Arc<dyn TenantAdapter>,
    previous: Option<String>,
}

impl SwitchGuard {
    /// The tenant that will be restored, or `None` for the default.
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }
}

impl Drop for SwitchGuard {
    fn drop(&mut self) {
        if let Err(err) = self.adapter.switch_into(self.previous.as_deref()) {
            warn!(
                "failed to restore tenant {:?} after scoped switch: {}",
                self.previous, err
            );
        }
    }
}
