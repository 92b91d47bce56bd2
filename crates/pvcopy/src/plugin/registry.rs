use std::sync::{Arc, Once, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::{ArrayPlugin, DeadbandPlugin, PVPlugin, TimestampPlugin, PLUGIN_TARGET};

/// Named plugins. The first registration of a name wins; later ones are
/// ignored.
pub struct PluginRegistry {
    plugins: RwLock<IndexMap<String, Arc<dyn PVPlugin>>>,
    builtins: Option<Once>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(IndexMap::new()),
            builtins: None,
        }
    }

    /// Registry that adds `array`, `deadband` and `timestamp` on its first
    /// lookup. Plugins registered before that lookup take precedence.
    pub fn with_builtins() -> Self {
        Self {
            plugins: RwLock::new(IndexMap::new()),
            builtins: Some(Once::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static PluginRegistry {
        static REGISTRY: OnceLock<PluginRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PluginRegistry::with_builtins)
    }

    fn load_builtins(&self) {
        if let Some(once) = &self.builtins {
            once.call_once(|| {
                self.register("array", ArrayPlugin);
                self.register("deadband", DeadbandPlugin);
                self.register("timestamp", TimestampPlugin);
            });
        }
    }

    /// Registers `plugin` under `name`. Returns `false`, leaving the
    /// registry unchanged, if the name is taken.
    pub fn register(&self, name: &str, plugin: impl PVPlugin + 'static) -> bool {
        let mut plugins = self.plugins.write();
        if plugins.contains_key(name) {
            tracing::debug!(
                target: PLUGIN_TARGET,
                plugin = name,
                "plugin already registered, ignoring"
            );
            return false;
        }
        plugins.insert(name.to_string(), Arc::new(plugin));
        tracing::debug!(target: PLUGIN_TARGET, plugin = name, "registered plugin");
        true
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn PVPlugin>> {
        self.load_builtins();
        self.plugins.read().get(name).cloned()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.load_builtins();
        self.plugins.read().keys().cloned().collect()
    }
}

/// Registers a plugin in the process-wide registry.
pub fn register_plugin(name: &str, plugin: impl PVPlugin + 'static) -> bool {
    PluginRegistry::global().register(name, plugin)
}

/// Looks up a plugin in the process-wide registry.
pub fn find_plugin(name: &str) -> Option<Arc<dyn PVPlugin>> {
    PluginRegistry::global().find(name)
}
