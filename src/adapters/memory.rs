//! In-memory reference adapter.
//!
//! Simulates schema-per-tenant isolation with an in-process tenant set. The
//! metadata store "exists" once the first tenant has been created; before
//! that, metadata reads fail with the uninitialized condition exactly like a
//! freshly created database would.

use crate::adapter::{AdapterEvent, CallbackSet, LifecycleHook, TenantAdapter};
use crate::config::TenancyConfig;
use crate::error::{TenancyError, TenancyResult};
use crate::registry::AdapterRegistration;
use log::debug;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Default)]
struct State {
    initialized: bool,
    tenants: BTreeSet<String>,
    current: Option<String>,
    seeded: BTreeSet<String>,
    excluded_models: Vec<String>,
}

/// An adapter backed by in-process state instead of a database.
pub struct MemoryAdapter {
    config: TenancyConfig,
    state: RwLock<State>,
    callbacks: CallbackSet,
}

impl MemoryAdapter {
    /// Create an adapter with an uninitialized metadata store.
    pub fn new(config: TenancyConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
            callbacks: CallbackSet::new(),
        }
    }

    /// Constructor registered with the adapter factory.
    pub fn construct(config: &TenancyConfig) -> TenancyResult<Arc<dyn TenantAdapter>> {
        Ok(Arc::new(Self::new(config.clone())))
    }

    /// Whether the tenant metadata store exists yet.
    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// Tenants that have been seeded.
    pub fn seeded_tenants(&self) -> Vec<String> {
        self.state.read().seeded.iter().cloned().collect()
    }

    /// The excluded models applied through `process_excluded_models`.
    pub fn excluded_models(&self) -> Vec<String> {
        self.state.read().excluded_models.clone()
    }

    fn is_switch_target(&self, state: &State, name: &str) -> bool {
        name == self.config.default_tenant
            || state.tenants.contains(name)
            || self.config.persistent_schemas.iter().any(|s| s == name)
    }
}

impl TenantAdapter for MemoryAdapter {
    fn create(&self, tenant: &str) -> TenancyResult<()> {
        let name = self.environmentify(tenant);
        self.callbacks.fire(AdapterEvent::BeforeCreate, &name);

        {
            let mut state = self.state.write();
            if state.tenants.contains(&name) {
                return Err(TenancyError::TenantExists(name));
            }
            state.tenants.insert(name.clone());
            state.initialized = true;
        }

        debug!("created tenant {}", name);
        self.callbacks.fire(AdapterEvent::AfterCreate, &name);
        Ok(())
    }

    fn drop_tenant(&self, tenant: &str) -> TenancyResult<()> {
        let name = self.environmentify(tenant);
        self.callbacks.fire(AdapterEvent::BeforeDrop, &name);

        {
            let mut state = self.state.write();
            if !state.tenants.remove(&name) {
                return Err(TenancyError::TenantNotFound(name));
            }
            // Dropping the active tenant falls back to the default.
            if state.current.as_deref() == Some(name.as_str()) {
                state.current = None;
            }
        }

        debug!("dropped tenant {}", name);
        self.callbacks.fire(AdapterEvent::AfterDrop, &name);
        Ok(())
    }

    fn switch_into(&self, tenant: Option<&str>) -> TenancyResult<()> {
        let name = match tenant {
            Some(tenant) => self.environmentify(tenant),
            None => self.config.default_tenant.clone(),
        };
        self.callbacks.fire(AdapterEvent::BeforeSwitch, &name);

        {
            let mut state = self.state.write();
            if !self.is_switch_target(&state, &name) {
                return Err(TenancyError::TenantNotFound(name));
            }
            state.current = if name == self.config.default_tenant {
                None
            } else {
                Some(name.clone())
            };
        }

        self.callbacks.fire(AdapterEvent::AfterSwitch, &name);
        Ok(())
    }

    fn current(&self) -> TenancyResult<String> {
        let state = self.state.read();
        if !state.initialized {
            return Err(TenancyError::UninitializedDatabase);
        }
        Ok(state
            .current
            .clone()
            .unwrap_or_else(|| self.config.default_tenant.clone()))
    }

    fn seed(&self) -> TenancyResult<()> {
        let mut state = self.state.write();
        if !state.initialized {
            return Err(TenancyError::UninitializedDatabase);
        }
        let name = state
            .current
            .clone()
            .unwrap_or_else(|| self.config.default_tenant.clone());
        debug!("seeding tenant {}", name);
        state.seeded.insert(name);
        Ok(())
    }

    fn tenant_names(&self) -> TenancyResult<Vec<String>> {
        Ok(self.state.read().tenants.iter().cloned().collect())
    }

    fn default_tenant(&self) -> String {
        self.config.default_tenant.clone()
    }

    fn environmentify(&self, tenant: &str) -> String {
        self.config.environmentify(tenant)
    }

    fn process_excluded_models(&self, models: &[String]) -> TenancyResult<()> {
        debug!("excluding {} models from tenant scoping", models.len());
        self.state.write().excluded_models = models.to_vec();
        Ok(())
    }

    fn set_callback(&self, event: AdapterEvent, hook: LifecycleHook) {
        self.callbacks.register(event, hook);
    }
}

inventory::submit! {
    AdapterRegistration::new("memory", None, MemoryAdapter::construct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentNamespacing;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn adapter() -> MemoryAdapter {
        MemoryAdapter::new(TenancyConfig::new("memory"))
    }

    #[test]
    fn test_current_before_any_tenant_is_uninitialized() {
        let adapter = adapter();
        assert!(matches!(
            adapter.current(),
            Err(TenancyError::UninitializedDatabase)
        ));
    }

    #[test]
    fn test_create_switch_current() {
        let adapter = adapter();
        adapter.create("acme").unwrap();

        assert_eq!(adapter.current().unwrap(), "public");

        adapter.switch_into(Some("acme")).unwrap();
        assert_eq!(adapter.current().unwrap(), "acme");

        adapter.reset().unwrap();
        assert_eq!(adapter.current().unwrap(), "public");
    }

    #[test]
    fn test_create_duplicate_fails() {
        let adapter = adapter();
        adapter.create("acme").unwrap();
        assert!(matches!(
            adapter.create("acme"),
            Err(TenancyError::TenantExists(_))
        ));
    }

    #[test]
    fn test_switch_into_unknown_tenant_fails() {
        let adapter = adapter();
        adapter.create("acme").unwrap();
        assert!(matches!(
            adapter.switch_into(Some("globex")),
            Err(TenancyError::TenantNotFound(_))
        ));
    }

    #[test]
    fn test_switch_into_persistent_schema_is_allowed() {
        let config = TenancyConfig::new("memory").with_persistent_schema("extensions");
        let adapter = MemoryAdapter::new(config);
        adapter.create("acme").unwrap();

        adapter.switch_into(Some("extensions")).unwrap();
        assert_eq!(adapter.current().unwrap(), "extensions");
    }

    #[test]
    fn test_drop_active_tenant_falls_back_to_default() {
        let adapter = adapter();
        adapter.create("acme").unwrap();
        adapter.switch_into(Some("acme")).unwrap();

        adapter.drop_tenant("acme").unwrap();
        assert_eq!(adapter.current().unwrap(), "public");
    }

    #[test]
    fn test_drop_unknown_tenant_fails() {
        let adapter = adapter();
        adapter.create("acme").unwrap();
        assert!(matches!(
            adapter.drop_tenant("globex"),
            Err(TenancyError::TenantNotFound(_))
        ));
    }

    #[test]
    fn test_tenant_names_sorted() {
        let adapter = adapter();
        adapter.create("globex").unwrap();
        adapter.create("acme").unwrap();

        assert_eq!(
            adapter.tenant_names().unwrap(),
            vec!["acme".to_string(), "globex".to_string()]
        );
    }

    #[test]
    fn test_seed_tracks_current_tenant() {
        let adapter = adapter();
        adapter.create("acme").unwrap();
        adapter.switch_into(Some("acme")).unwrap();

        adapter.seed().unwrap();
        assert_eq!(adapter.seeded_tenants(), vec!["acme".to_string()]);
    }

    #[test]
    fn test_environmentify_applied_to_storage_names() {
        let config = TenancyConfig::new("memory")
            .with_environment("staging")
            .with_environment_namespacing(EnvironmentNamespacing::Prefix);
        let adapter = MemoryAdapter::new(config);

        adapter.create("acme").unwrap();
        assert_eq!(
            adapter.tenant_names().unwrap(),
            vec!["staging_acme".to_string()]
        );

        adapter.switch_into(Some("acme")).unwrap();
        assert_eq!(adapter.current().unwrap(), "staging_acme");
    }

    #[test]
    fn test_callbacks_fire_around_create() {
        let adapter = adapter();
        let fired = Arc::new(AtomicUsize::new(0));

        for event in [AdapterEvent::BeforeCreate, AdapterEvent::AfterCreate] {
            let counter = Arc::clone(&fired);
            adapter.set_callback(
                event,
                Arc::new(move |tenant: &str| {
                    assert_eq!(tenant, "acme");
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        adapter.create("acme").unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_process_excluded_models_recorded() {
        let adapter = adapter();
        let models = vec!["Company".to_string(), "Plan".to_string()];
        adapter.process_excluded_models(&models).unwrap();
        assert_eq!(adapter.excluded_models(), models);
    }
}
