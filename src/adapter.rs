//! The adapter contract every isolation backend implements.
//!
//! An adapter maps tenant operations onto one isolation mechanism: a schema
//! per tenant, a database per tenant, or a discriminator column. Strategies
//! share this contract but not an implementation, so the seam is a trait, not
//! a base type.

use crate::error::TenancyResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Extension points at which adapters fire registered lifecycle hooks.
///
/// Exact invocation points inside an operation are adapter-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterEvent {
    /// Before a tenant's storage is provisioned.
    BeforeCreate,
    /// After a tenant's storage has been provisioned.
    AfterCreate,
    /// Before a tenant's storage is destroyed.
    BeforeDrop,
    /// After a tenant's storage has been destroyed.
    AfterDrop,
    /// Before the active tenant changes.
    BeforeSwitch,
    /// After the active tenant has changed.
    AfterSwitch,
}

/// A lifecycle hook, invoked with the tenant identifier the event concerns.
pub type LifecycleHook = Arc<dyn Fn(&str) + Send + Sync>;

/// A concurrency-safe collection of lifecycle hooks, keyed by event.
///
/// Adapters embed one of these and fire it from their operations.
#[derive(Default)]
pub struct CallbackSet {
    hooks: RwLock<HashMap<AdapterEvent, Vec<LifecycleHook>>>,
}

impl CallbackSet {
    /// Create an empty callback set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for an event. Hooks for the same event fire in
    /// registration order.
    pub fn register(&self, event: AdapterEvent, hook: LifecycleHook) {
        self.hooks.write().entry(event).or_default().push(hook);
    }

    /// Fire all hooks registered for an event.
    pub fn fire(&self, event: AdapterEvent, tenant: &str) {
        // Clone the hooks out of the lock so a hook can register further hooks.
        let hooks: Vec<LifecycleHook> = self
            .hooks
            .read()
            .get(&event)
            .map(|hooks| hooks.to_vec())
            .unwrap_or_default();

        for hook in hooks {
            hook(tenant);
        }
    }
}

impl std::fmt::Debug for CallbackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<AdapterEvent, usize> = self
            .hooks
            .read()
            .iter()
            .map(|(event, hooks)| (*event, hooks.len()))
            .collect();
        f.debug_struct("CallbackSet").field("hooks", &counts).finish()
    }
}

/// A tenant isolation backend.
///
/// One instance exists per execution context; it holds the connection/session
/// state identifying which tenant that context is currently scoped to, which
/// is why instances are never shared across contexts.
///
/// All operations are synchronous calls into a database driver and may block
/// on network I/O. Implementations must not retry internally; failures
/// propagate to the coordinator unchanged.
pub trait TenantAdapter: Send + Sync {
    /// Provision storage for a new tenant.
    fn create(&self, tenant: &str) -> TenancyResult<()>;

    /// Destroy a tenant's storage.
    fn drop_tenant(&self, tenant: &str) -> TenancyResult<()>;

    /// Set the active tenant for this adapter's execution context.
    ///
    /// `None` selects the default tenant. There is no automatic restoration;
    /// scoped switching is built on top of this by the coordinator.
    fn switch_into(&self, tenant: Option<&str>) -> TenancyResult<()>;

    /// The identifier of the currently active tenant.
    ///
    /// Returns [`TenancyError::UninitializedDatabase`] when queried before the
    /// backend's tenant metadata exists, so the coordinator can distinguish
    /// "not initialized yet" from real failures.
    ///
    /// [`TenancyError::UninitializedDatabase`]: crate::TenancyError::UninitializedDatabase
    fn current(&self) -> TenancyResult<String>;

    /// Restore the active tenant to the default.
    fn reset(&self) -> TenancyResult<()> {
        self.switch_into(None)
    }

    /// Seed the currently active tenant with initial data.
    fn seed(&self) -> TenancyResult<()>;

    /// All tenant identifiers known to the backend.
    fn tenant_names(&self) -> TenancyResult<Vec<String>>;

    /// The process-wide default tenant identifier.
    fn default_tenant(&self) -> String;

    /// Namespace a tenant identifier per this adapter's policy.
    fn environmentify(&self, tenant: &str) -> String;

    /// Apply the excluded-models configuration.
    ///
    /// Called once at startup, before any other tenant operation; the listed
    /// entities must bypass tenant scoping entirely.
    fn process_excluded_models(&self, models: &[String]) -> TenancyResult<()>;

    /// Register a lifecycle hook fired at the named extension point.
    fn set_callback(&self, event: AdapterEvent, hook: LifecycleHook);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callbacks_fire_in_registration_order() {
        let callbacks = CallbackSet::new();
        let seen = Arc::new(RwLock::new(Vec::new()));

        for label in ["first", "second"] {
            let seen = Arc::clone(&seen);
            callbacks.register(
                AdapterEvent::AfterCreate,
                Arc::new(move |tenant: &str| {
                    seen.write().push(format!("{}:{}", label, tenant));
                }),
            );
        }

        callbacks.fire(AdapterEvent::AfterCreate, "acme");
        assert_eq!(*seen.read(), vec!["first:acme", "second:acme"]);
    }

    #[test]
    fn test_callbacks_are_scoped_to_their_event() {
        let callbacks = CallbackSet::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        callbacks.register(
            AdapterEvent::BeforeDrop,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        callbacks.fire(AdapterEvent::AfterCreate, "acme");
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        callbacks.fire(AdapterEvent::BeforeDrop, "acme");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_may_register_another_hook() {
        let callbacks = Arc::new(CallbackSet::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let inner_callbacks = Arc::clone(&callbacks);
        let counter = Arc::clone(&fired);
        callbacks.register(
            AdapterEvent::AfterSwitch,
            Arc::new(move |_| {
                let counter = Arc::clone(&counter);
                inner_callbacks.register(
                    AdapterEvent::AfterSwitch,
                    Arc::new(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        // First fire only registers; second fire runs the nested hook.
        callbacks.fire(AdapterEvent::AfterSwitch, "acme");
        callbacks.fire(AdapterEvent::AfterSwitch, "acme");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
