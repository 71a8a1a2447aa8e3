//! Process-wide kind registry.
//!
//! Plugin crates submit their [`KindDescriptor`] statics to the [`KINDS`]
//! distributed slice; [`KindRegistry::collect`] gathers them at startup and
//! checks the structural invariants. No runtime reflection is involved —
//! registration is write-once, before any instance exists.

use linkme::distributed_slice;
use tracing::debug;

use crate::error::ConfigError;
use crate::kind::{KindDescriptor, KindPredicate, Role};

/// Distributed slice collecting every kind linked into the process.
///
/// ```rust,ignore
/// #[distributed_slice(KINDS)]
/// static MY_KIND_ENTRY: &KindDescriptor = &MY_KIND;
/// ```
#[distributed_slice]
pub static KINDS: [&'static KindDescriptor];

/// The universe of registered component kinds.
///
/// Insertion order is preserved and observable: predicate matching and
/// dependency resolution both iterate kinds in registration order.
#[derive(Debug, Default)]
pub struct KindRegistry {
    kinds: Vec<&'static KindDescriptor>,
}

impl KindRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from every kind linked into the process and
    /// validates it.
    pub fn collect() -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for &kind in KINDS.iter() {
            registry.register(kind)?;
        }
        registry.validate()?;
        debug!(kinds = registry.len(), "kind registry collected");
        Ok(registry)
    }

    /// Registers a kind.
    ///
    /// Registering the same descriptor twice is a no-op. A *different*
    /// descriptor colliding on kind id, on `(component_namespace)` for plugin
    /// bases, or on `(component_namespace, plugin_type)` for plugins is a
    /// fatal configuration error.
    pub fn register(&mut self, kind: &'static KindDescriptor) -> Result<(), ConfigError> {
        if self.kinds.iter().any(|k| std::ptr::eq(*k, kind)) {
            return Ok(());
        }
        if let Some(existing) = self.get(kind.name) {
            return Err(ConfigError::DuplicateKindId(existing.name.to_string()));
        }
        match kind.role {
            Role::PluginBase => {
                if let Some(namespace) = kind.component_namespace
                    && let Some(existing) = self.plugin_base_for(namespace)
                {
                    return Err(ConfigError::DuplicatePluginBase {
                        namespace: namespace.to_string(),
                        first: existing.name.to_string(),
                        second: kind.name.to_string(),
                    });
                }
            }
            Role::Plugin => {
                if let (Some(namespace), Some(plugin_type)) =
                    (kind.component_namespace, kind.plugin_type)
                    && let Some(existing) = self.kinds.iter().find(|k| {
                        k.role == Role::Plugin
                            && k.component_namespace == Some(namespace)
                            && k.plugin_type == Some(plugin_type)
                    })
                {
                    return Err(ConfigError::DuplicatePlugin {
                        namespace: namespace.to_string(),
                        plugin_type: plugin_type.to_string(),
                        first: existing.name.to_string(),
                        second: kind.name.to_string(),
                    });
                }
            }
            Role::Base => {}
        }
        self.kinds.push(kind);
        Ok(())
    }

    /// Checks the structural invariants over the full set of kinds:
    ///
    /// - every named parent exists;
    /// - every plugin has a non-empty `plugin_type`, a `plugin_base` parent,
    ///   the same `component_namespace` as that parent, and a factory;
    /// - every plugin base has a `component_namespace`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in &self.kinds {
            if let Some(parent) = kind.parent
                && self.get(parent).is_none()
            {
                return Err(ConfigError::UnknownParent {
                    kind: kind.name.to_string(),
                    parent: parent.to_string(),
                });
            }
            match kind.role {
                Role::Plugin => {
                    let malformed = |reason: &str| ConfigError::MalformedKind {
                        kind: kind.name.to_string(),
                        reason: reason.to_string(),
                    };
                    if kind.plugin_type.is_none_or(str::is_empty) {
                        return Err(malformed("plugin kinds need a non-empty plugin_type"));
                    }
                    if kind.create.is_none() {
                        return Err(malformed("plugin kinds need an instance factory"));
                    }
                    let parent = kind
                        .parent
                        .and_then(|p| self.get(p))
                        .ok_or_else(|| malformed("plugin kinds need a plugin_base parent"))?;
                    if parent.role != Role::PluginBase {
                        return Err(malformed("a plugin's parent must be a plugin_base"));
                    }
                    if kind.component_namespace != parent.component_namespace {
                        return Err(malformed(
                            "a plugin's component_namespace must match its plugin_base",
                        ));
                    }
                }
                Role::PluginBase => {
                    if kind.component_namespace.is_none_or(str::is_empty) {
                        return Err(ConfigError::MalformedKind {
                            kind: kind.name.to_string(),
                            reason: "plugin_base kinds need a component_namespace".to_string(),
                        });
                    }
                }
                Role::Base => {}
            }
        }
        Ok(())
    }

    /// All registered kinds, in registration order.
    pub fn all(&self) -> &[&'static KindDescriptor] {
        &self.kinds
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns `true` when no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Looks up a kind by id.
    pub fn get(&self, name: &str) -> Option<&'static KindDescriptor> {
        self.kinds.iter().find(|k| k.name == name).copied()
    }

    /// Returns all kinds matching the predicate, in registration order.
    pub fn matching(&self, predicate: &KindPredicate) -> Vec<&'static KindDescriptor> {
        self.kinds
            .iter()
            .filter(|k| predicate.matches(k))
            .copied()
            .collect()
    }

    /// Returns the unique plugin base for a component namespace, if any.
    pub fn plugin_base_for(&self, component_namespace: &str) -> Option<&'static KindDescriptor> {
        self.kinds
            .iter()
            .find(|k| {
                k.role == Role::PluginBase && k.component_namespace == Some(component_namespace)
            })
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ROOT: KindDescriptor = KindDescriptor::base("Root", "t.root");
    static GADGETS: KindDescriptor =
        KindDescriptor::plugin_base("Gadget", "t.gadget", "Root", "gadgets");
    static GADGETS_AGAIN: KindDescriptor =
        KindDescriptor::plugin_base("GadgetBis", "t.gadget2", "Root", "gadgets");
    static DIAL: KindDescriptor =
        KindDescriptor::plugin("DialGadget", "t.gadget.dial", "Gadget", "gadgets", "dial")
            .with_create(crate::component::test_support::make_null);
    static DIAL_AGAIN: KindDescriptor =
        KindDescriptor::plugin("DialBis", "t.gadget.dial2", "Gadget", "gadgets", "dial")
            .with_create(crate::component::test_support::make_null);

    fn seeded() -> KindRegistry {
        let mut registry = KindRegistry::new();
        registry.register(&ROOT).unwrap();
        registry.register(&GADGETS).unwrap();
        registry.register(&DIAL).unwrap();
        registry
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = seeded();
        registry.register(&DIAL).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn duplicate_plugin_base_is_fatal() {
        let mut registry = seeded();
        let err = registry.register(&GADGETS_AGAIN).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePluginBase { .. }));
    }

    #[test]
    fn duplicate_plugin_type_is_fatal() {
        let mut registry = seeded();
        let err = registry.register(&DIAL_AGAIN).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePlugin { .. }));
    }

    #[test]
    fn matching_respects_insertion_order() {
        static KNOB: KindDescriptor =
            KindDescriptor::plugin("KnobGadget", "t.gadget.knob", "Gadget", "gadgets", "knob")
                .with_create(crate::component::test_support::make_null);
        let mut registry = seeded();
        registry.register(&KNOB).unwrap();
        let names: Vec<_> = registry
            .matching(&KindPredicate::of_parent("Gadget"))
            .iter()
            .map(|k| k.name)
            .collect();
        assert_eq!(names, ["DialGadget", "KnobGadget"]);
    }

    #[test]
    fn validate_rejects_unknown_parent() {
        static ORPHAN: KindDescriptor =
            KindDescriptor::plugin("Orphan", "t.orphan", "Nowhere", "gadgets", "orphan")
                .with_create(crate::component::test_support::make_null);
        let mut registry = seeded();
        registry.register(&ORPHAN).unwrap();
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::UnknownParent { .. })
        ));
    }

    #[test]
    fn validate_rejects_namespace_mismatch() {
        static STRAY: KindDescriptor =
            KindDescriptor::plugin("Stray", "t.stray", "Gadget", "widgets", "stray")
                .with_create(crate::component::test_support::make_null);
        let mut registry = seeded();
        registry.register(&STRAY).unwrap();
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::MalformedKind { .. })
        ));
    }

    #[test]
    fn plugin_base_lookup_by_namespace() {
        let registry = seeded();
        assert_eq!(registry.plugin_base_for("gadgets").unwrap().name, "Gadget");
        assert!(registry.plugin_base_for("missing").is_none());
    }
}
