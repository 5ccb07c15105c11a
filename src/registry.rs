//! Adapter factory: a lookup table from `(engine, platform)` to constructor.
//!
//! Adapter implementations register themselves at startup with
//! [`inventory::submit!`]; the table then resolves a configuration's engine
//! kind to a constructor without any name-mangling dispatch. Registrations may
//! target one host platform (for engines whose driver builds differ per
//! platform) or all of them; a platform-specific entry wins over an agnostic
//! one.

use crate::adapter::TenantAdapter;
use crate::config::TenancyConfig;
use crate::error::{TenancyError, TenancyResult};
use log::debug;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Engine kinds the crate recognizes even when no implementation is linked
/// in. Asking for one of these without a registered constructor is a
/// deployment error ([`TenancyError::AdapterNotFound`]), not an unsupported
/// engine.
const KNOWN_ENGINES: &[&str] = &["postgresql", "mysql", "sqlite", "memory"];

/// Host platform axis of the factory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Unix-family targets (Linux, macOS, BSDs).
    Unix,
    /// Windows targets.
    Windows,
    /// Everything else (wasm, embedded).
    Other,
}

impl Platform {
    /// The platform this build is running on.
    pub fn host() -> Self {
        if cfg!(target_family = "unix") {
            Self::Unix
        } else if cfg!(target_family = "windows") {
            Self::Windows
        } else {
            Self::Other
        }
    }
}

/// Constructs an adapter instance from a configuration.
pub type AdapterConstructor = fn(&TenancyConfig) -> TenancyResult<Arc<dyn TenantAdapter>>;

/// A startup-time adapter registration.
///
/// Submit one per adapter implementation:
///
/// ```rust,ignore
/// inventory::submit! {
///     AdapterRegistration::new("postgresql", None, PostgresAdapter::construct)
/// }
/// ```
pub struct AdapterRegistration {
    engine: &'static str,
    platform: Option<Platform>,
    constructor: AdapterConstructor,
}

impl AdapterRegistration {
    /// Create a registration. `platform: None` registers the constructor for
    /// every host platform.
    pub const fn new(
        engine: &'static str,
        platform: Option<Platform>,
        constructor: AdapterConstructor,
    ) -> Self {
        Self {
            engine,
            platform,
            constructor,
        }
    }
}

inventory::collect!(AdapterRegistration);

#[derive(Default)]
struct EngineEntry {
    default: Option<AdapterConstructor>,
    by_platform: HashMap<Platform, AdapterConstructor>,
}

/// The adapter factory table.
///
/// The process-wide [`global`](Self::global) table is populated from
/// `inventory` submissions; independent tables can be built for tests or for
/// embedding multiple coordinators with different adapter sets.
pub struct AdapterRegistry {
    engines: RwLock<HashSet<String>>,
    entries: RwLock<HashMap<String, EngineEntry>>,
}

static GLOBAL: Lazy<Arc<AdapterRegistry>> = Lazy::new(|| Arc::new(AdapterRegistry::from_inventory()));

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    /// Create a table with the built-in recognized engine kinds and no
    /// constructors.
    pub fn new() -> Self {
        Self {
            engines: RwLock::new(KNOWN_ENGINES.iter().map(|e| (*e).to_string()).collect()),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a table populated from all `inventory` submissions linked into
    /// this binary.
    pub fn from_inventory() -> Self {
        let registry = Self::new();
        for registration in inventory::iter::<AdapterRegistration> {
            match registration.platform {
                Some(platform) => {
                    registry.register_for(registration.engine, platform, registration.constructor)
                }
                None => registry.register(registration.engine, registration.constructor),
            }
        }
        registry
    }

    /// The process-wide table, populated once from `inventory`.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Mark an engine kind as recognized without registering a constructor.
    pub fn declare(&self, engine: impl Into<String>) {
        self.engines.write().insert(engine.into());
    }

    /// Register a constructor for an engine on every platform.
    pub fn register(&self, engine: impl Into<String>, constructor: AdapterConstructor) {
        let engine = engine.into();
        debug!("registering {} adapter", engine);
        self.engines.write().insert(engine.clone());
        self.entries.write().entry(engine).or_default().default = Some(constructor);
    }

    /// Register a constructor for an engine on one platform only.
    ///
    /// Overrides any platform-agnostic registration on that platform.
    pub fn register_for(
        &self,
        engine: impl Into<String>,
        platform: Platform,
        constructor: AdapterConstructor,
    ) {
        let engine = engine.into();
        debug!("registering {} adapter for {:?}", engine, platform);
        self.engines.write().insert(engine.clone());
        self.entries
            .write()
            .entry(engine)
            .or_default()
            .by_platform
            .insert(platform, constructor);
    }

    /// Resolve the constructor for `(engine, platform)`.
    ///
    /// Unrecognized engine kinds fail with
    /// [`TenancyError::UnsupportedAdapter`] naming the attempted
    /// `{engine}_adapter` module; recognized kinds with no registered
    /// constructor fail with [`TenancyError::AdapterNotFound`]. The two are
    /// distinguishable by callers.
    pub fn resolve(&self, engine: &str, platform: Platform) -> TenancyResult<AdapterConstructor> {
        if let Some(entry) = self.entries.read().get(engine) {
            if let Some(constructor) = entry.by_platform.get(&platform) {
                return Ok(*constructor);
            }
            if let Some(constructor) = entry.default {
                return Ok(constructor);
            }
        }

        if self.engines.read().contains(engine) {
            Err(TenancyError::AdapterNotFound(engine.to_string()))
        } else {
            Err(TenancyError::UnsupportedAdapter(format!("{}_adapter", engine)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryAdapter;

    fn memory_constructor(config: &TenancyConfig) -> TenancyResult<Arc<dyn TenantAdapter>> {
        Ok(Arc::new(MemoryAdapter::new(config.clone())))
    }

    #[test]
    fn test_unrecognized_engine_is_unsupported() {
        let registry = AdapterRegistry::new();
        let err = registry
            .resolve("nonexistent", Platform::host())
            .unwrap_err();

        match err {
            TenancyError::UnsupportedAdapter(name) => assert_eq!(name, "nonexistent_adapter"),
            other => panic!("expected UnsupportedAdapter, got {:?}", other),
        }
    }

    #[test]
    fn test_recognized_unregistered_engine_is_not_found() {
        let registry = AdapterRegistry::new();
        let err = registry.resolve("mysql", Platform::host()).unwrap_err();

        match err {
            TenancyError::AdapterNotFound(engine) => assert_eq!(engine, "mysql"),
            other => panic!("expected AdapterNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_declared_engine_moves_from_unsupported_to_not_found() {
        let registry = AdapterRegistry::new();
        registry.declare("cockroachdb");

        assert!(matches!(
            registry.resolve("cockroachdb", Platform::host()),
            Err(TenancyError::AdapterNotFound(_))
        ));
    }

    #[test]
    fn test_registered_engine_resolves() {
        let registry = AdapterRegistry::new();
        registry.register("postgresql", memory_constructor);

        let constructor = registry.resolve("postgresql", Platform::host()).unwrap();
        let adapter = constructor(&TenancyConfig::new("postgresql")).unwrap();
        assert_eq!(adapter.default_tenant(), "public");
    }

    #[test]
    fn test_platform_specific_registration_wins() {
        fn failing_constructor(_: &TenancyConfig) -> TenancyResult<Arc<dyn TenantAdapter>> {
            Err(TenancyError::Database("wrong constructor".to_string()))
        }

        let registry = AdapterRegistry::new();
        registry.register("sqlite", failing_constructor);
        registry.register_for("sqlite", Platform::host(), memory_constructor);

        let constructor = registry.resolve("sqlite", Platform::host()).unwrap();
        assert!(constructor(&TenancyConfig::new("sqlite")).is_ok());
    }

    #[test]
    fn test_agnostic_registration_covers_other_platforms() {
        let registry = AdapterRegistry::new();
        registry.register("sqlite", memory_constructor);

        assert!(registry.resolve("sqlite", Platform::Unix).is_ok());
        assert!(registry.resolve("sqlite", Platform::Windows).is_ok());
        assert!(registry.resolve("sqlite", Platform::Other).is_ok());
    }

    #[test]
    fn test_inventory_registers_memory_adapter() {
        let registry = AdapterRegistry::from_inventory();
        assert!(registry.resolve("memory", Platform::host()).is_ok());
    }
}
