//! Module registry boundary.
//!
//! Plugin modules declare their own client dependencies. The resolver only
//! needs three things from whatever loads those modules:
//!
//! - look a module up by name ([`ModuleRegistry::module`])
//! - list a module's declared dependency specifiers
//!   ([`ModuleRegistry::module_dependencies`])
//! - hear about "modules reloaded" so it can drop every cached resolution
//!   ([`ModuleRegistry::subscribe_reload`])
//!
//! [`StaticModuleRegistry`] is the in-process implementation backed by the
//! `[modules]` table of the configuration file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError, RwLock};

use crate::specifier::DependencySpecifier;

/// Identity of a loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Wrap a module name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Callback invoked after modules were reloaded.
pub type ReloadListener = Box<dyn Fn() + Send + Sync>;

/// Source of module identities and their declared dependencies.
pub trait ModuleRegistry: Send + Sync {
    /// Look a module up by name. Lookups are expected to be case-insensitive.
    fn module(&self, name: &str) -> Option<ModuleId>;

    /// The module's own declared dependencies, in declaration order.
    fn module_dependencies(&self, module: &ModuleId) -> Vec<DependencySpecifier>;

    /// Register a callback for "modules reloaded" broadcasts.
    ///
    /// Registries that never reload can keep the default no-op.
    fn subscribe_reload(&self, listener: ReloadListener) {
        drop(listener);
    }
}

/// Declaration of one module: its name and raw dependency identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleDeclaration {
    /// Module name
    pub name: String,
    /// Raw dependency identifiers, in order
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ModuleDeclaration {
    /// Convenience constructor.
    pub fn new<I, S>(name: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        }
    }
}

/// Registry holding a fixed set of module declarations that can be swapped
/// wholesale with [`reload`](StaticModuleRegistry::reload).
#[derive(Default)]
pub struct StaticModuleRegistry {
    modules: RwLock<HashMap<String, ModuleDeclaration>>,
    listeners: Mutex<Vec<ReloadListener>>,
}

impl StaticModuleRegistry {
    /// Build a registry from declarations.
    pub fn new(modules: impl IntoIterator<Item = ModuleDeclaration>) -> Self {
        Self {
            modules: RwLock::new(index(modules)),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Replace every declaration and broadcast "modules reloaded".
    pub fn reload(&self, modules: impl IntoIterator<Item = ModuleDeclaration>) {
        *self.modules.write().unwrap_or_else(PoisonError::into_inner) = index(modules);
        self.notify_reloaded();
    }

    /// Broadcast "modules reloaded" without changing declarations.
    pub fn notify_reloaded(&self) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(
            target: "clientdeps::modules",
            "Broadcasting module reload to {} listener(s)",
            listeners.len()
        );
        for listener in listeners.iter() {
            listener();
        }
    }

    /// Number of declared modules.
    pub fn len(&self) -> usize {
        self.modules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no module is declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModuleRegistry for StaticModuleRegistry {
    fn module(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_lowercase())
            .map(|decl| ModuleId::new(decl.name.clone()))
    }

    fn module_dependencies(&self, module: &ModuleId) -> Vec<DependencySpecifier> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&module.name().to_lowercase())
            .map(|decl| decl.dependencies.iter().map(DependencySpecifier::parse).collect())
            .unwrap_or_default()
    }

    fn subscribe_reload(&self, listener: ReloadListener) {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).push(listener);
    }
}

fn index(modules: impl IntoIterator<Item = ModuleDeclaration>) -> HashMap<String, ModuleDeclaration> {
    modules.into_iter().map(|decl| (decl.name.to_lowercase(), decl)).collect()
}
