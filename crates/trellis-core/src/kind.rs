//! Component kind descriptors and dependency predicates.
//!
//! A [`KindDescriptor`] is the static, immutable record describing a component
//! type: its role in the family tree, the configuration it accepts, its
//! declared dependencies, and the factory that materializes instances of it.
//! Descriptors are plain `static` items; plugin crates submit them to the
//! process-wide registry through the [`KINDS`](crate::registry::KINDS)
//! distributed slice.
//!
//! A [`KindPredicate`] is the small record used both to declare `depends_on`
//! edges and to look up kinds (and instances) at runtime. A kind matches a
//! predicate iff every populated field equals the kind's corresponding
//! attribute.
//!
//! # Defining a kind
//!
//! ```rust,ignore
//! static SOCKET_MQ: KindDescriptor =
//!     KindDescriptor::plugin("SocketMq", "trellis.mq.socket", "MessageQueue", "mq", "socket")
//!         .with_create(make_socket_mq)
//!         .with_validate(validate_as::<SocketConfig>);
//!
//! #[distributed_slice(KINDS)]
//! static SOCKET_MQ_ENTRY: &KindDescriptor = &SOCKET_MQ;
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::component::Component;
use crate::error::{BoxError, ConfigError};
use crate::registry::KindRegistry;

// =============================================================================
// Role
// =============================================================================

/// The place a kind occupies in the component family tree.
///
/// Deep inheritance is replaced by composition plus this tag: a `PluginBase`
/// groups a family (exactly one per component namespace), a `Plugin` is a
/// concrete variant of that family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The root component kind. Not instantiable.
    Base,
    /// Family head for one component namespace. Not instantiable.
    PluginBase,
    /// A concrete, instantiable component variant.
    Plugin,
}

// =============================================================================
// KindPredicate
// =============================================================================

/// A dependency predicate over kinds.
///
/// Used to declare `depends_on` constraints and for runtime lookup via
/// [`KindRegistry::matching`] and the instance manager's `find`. Every
/// populated field must equal the kind's corresponding attribute;
/// `parent_class_name` matches kinds whose *direct* parent has that name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KindPredicate {
    /// Matches the kind id exactly.
    pub class_name: Option<Cow<'static, str>>,
    /// Matches kinds whose direct parent has this kind id.
    pub parent_class_name: Option<Cow<'static, str>>,
    /// Matches the kind's plugin type.
    pub plugin_type: Option<Cow<'static, str>>,
    /// Matches the kind's component namespace.
    pub component_namespace: Option<Cow<'static, str>>,
}

impl KindPredicate {
    /// The empty predicate. Matches every kind.
    pub const ANY: Self = Self {
        class_name: None,
        parent_class_name: None,
        plugin_type: None,
        component_namespace: None,
    };

    /// Predicate matching a single kind by id.
    pub const fn of_class(name: &'static str) -> Self {
        Self {
            class_name: Some(Cow::Borrowed(name)),
            parent_class_name: None,
            plugin_type: None,
            component_namespace: None,
        }
    }

    /// Predicate matching all direct children of the named kind.
    pub const fn of_parent(name: &'static str) -> Self {
        Self {
            class_name: None,
            parent_class_name: Some(Cow::Borrowed(name)),
            plugin_type: None,
            component_namespace: None,
        }
    }

    /// Predicate matching the child of `parent` with the given plugin type.
    pub const fn of_parent_and_type(parent: &'static str, plugin_type: &'static str) -> Self {
        Self {
            class_name: None,
            parent_class_name: Some(Cow::Borrowed(parent)),
            plugin_type: Some(Cow::Borrowed(plugin_type)),
            component_namespace: None,
        }
    }

    /// Predicate matching the plugin of a component family, e.g.
    /// `("triggers", "http_webhook")`.
    ///
    /// Accepts owned strings so it can be built from configuration data.
    pub fn of_family(
        component_namespace: impl Into<Cow<'static, str>>,
        plugin_type: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            class_name: None,
            parent_class_name: None,
            plugin_type: Some(plugin_type.into()),
            component_namespace: Some(component_namespace.into()),
        }
    }

    /// Returns `true` if every populated field equals the kind's attribute.
    pub fn matches(&self, kind: &KindDescriptor) -> bool {
        if let Some(name) = &self.class_name
            && kind.name != name.as_ref()
        {
            return false;
        }
        if let Some(parent) = &self.parent_class_name
            && kind.parent != Some(parent.as_ref())
        {
            return false;
        }
        if let Some(plugin_type) = &self.plugin_type
            && kind.plugin_type != Some(plugin_type.as_ref())
        {
            return false;
        }
        if let Some(namespace) = &self.component_namespace
            && kind.component_namespace != Some(namespace.as_ref())
        {
            return false;
        }
        true
    }
}

// =============================================================================
// KindDescriptor
// =============================================================================

/// Factory that constructs a component instance from its kind and effective
/// configuration. Construction is synchronous; async work belongs in
/// [`Component::on_init`].
pub type CreateFn = fn(&'static KindDescriptor, &Value) -> Result<Arc<dyn Component>, BoxError>;

/// Per-kind schema check over a configuration node.
pub type ValidateFn = fn(&Value) -> Result<(), String>;

/// Parse hook a plugin base may install to replace the default
/// `plugin_type → list<item>` binding format for its configuration section.
pub type ParseSectionFn = fn(
    &KindRegistry,
    &'static KindDescriptor,
    &Value,
) -> Result<Vec<ComponentSpec>, ConfigError>;

/// Immutable descriptor of a component kind.
///
/// Plugins carry their family's `component_namespace` alongside their own
/// `plugin_type`; the registry verifies it agrees with the parent plugin
/// base's namespace.
#[derive(Debug, Clone, Copy)]
pub struct KindDescriptor {
    /// Stable kind id, unique per registry (e.g. `"SocketMq"`).
    pub name: &'static str,
    /// Human namespace of the kind (e.g. `"trellis.mq.socket"`). This is the
    /// `plugin_namespace` carried in envelope identities.
    pub namespace: &'static str,
    /// Role of this kind in the family tree.
    pub role: Role,
    /// Plugin type tag. Present for `Role::Plugin`.
    pub plugin_type: Option<&'static str>,
    /// Component namespace. Present for `Role::PluginBase` and its plugins.
    pub component_namespace: Option<&'static str>,
    /// Kind id of the direct parent (`plugin → plugin_base → base`).
    pub parent: Option<&'static str>,
    /// Declared dependency predicates; each resolves to zero or more kinds.
    pub depends_on: &'static [KindPredicate],
    /// Default configuration document (YAML), layered beneath user values.
    pub defaults: Option<&'static str>,
    /// Schema check applied to each configured item for this kind.
    pub validate: Option<ValidateFn>,
    /// Binding-format override for plugin bases.
    pub parse_section: Option<ParseSectionFn>,
    /// Instance factory. Required for `Role::Plugin`.
    pub create: Option<CreateFn>,
}

impl KindDescriptor {
    /// Descriptor for a root (`Role::Base`) kind.
    pub const fn base(name: &'static str, namespace: &'static str) -> Self {
        Self {
            name,
            namespace,
            role: Role::Base,
            plugin_type: None,
            component_namespace: None,
            parent: None,
            depends_on: &[],
            defaults: None,
            validate: None,
            parse_section: None,
            create: None,
        }
    }

    /// Descriptor for a family head (`Role::PluginBase`) kind.
    pub const fn plugin_base(
        name: &'static str,
        namespace: &'static str,
        parent: &'static str,
        component_namespace: &'static str,
    ) -> Self {
        Self {
            name,
            namespace,
            role: Role::PluginBase,
            plugin_type: None,
            component_namespace: Some(component_namespace),
            parent: Some(parent),
            depends_on: &[],
            defaults: None,
            validate: None,
            parse_section: None,
            create: None,
        }
    }

    /// Descriptor for a concrete (`Role::Plugin`) kind.
    pub const fn plugin(
        name: &'static str,
        namespace: &'static str,
        parent: &'static str,
        component_namespace: &'static str,
        plugin_type: &'static str,
    ) -> Self {
        Self {
            name,
            namespace,
            role: Role::Plugin,
            plugin_type: Some(plugin_type),
            component_namespace: Some(component_namespace),
            parent: Some(parent),
            depends_on: &[],
            defaults: None,
            validate: None,
            parse_section: None,
            create: None,
        }
    }

    /// Sets the declared dependency predicates.
    pub const fn with_depends_on(mut self, depends_on: &'static [KindPredicate]) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Sets the default configuration document (YAML source).
    pub const fn with_defaults(mut self, defaults: &'static str) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Sets the per-kind schema check.
    pub const fn with_validate(mut self, validate: ValidateFn) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Installs a binding-format override for this plugin base.
    pub const fn with_parse_section(mut self, parse: ParseSectionFn) -> Self {
        self.parse_section = Some(parse);
        self
    }

    /// Sets the instance factory.
    pub const fn with_create(mut self, create: CreateFn) -> Self {
        self.create = Some(create);
        self
    }

    /// Parses the kind's default configuration document into a JSON mapping.
    ///
    /// Kinds without defaults yield an empty mapping.
    pub fn default_document(&self) -> Result<Map<String, Value>, ConfigError> {
        let Some(source) = self.defaults else {
            return Ok(Map::new());
        };
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let value = serde_json::to_value(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        match value {
            Value::Null => Ok(Map::new()),
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::MalformedKind {
                kind: self.name.to_string(),
                reason: "default document must be a mapping".to_string(),
            }),
        }
    }
}

/// Schema check that accepts exactly the values deserializable into `T`.
///
/// Turns a typed config struct into a [`ValidateFn`]:
/// `with_validate(validate_as::<SocketConfig>)`.
pub fn validate_as<T: serde::de::DeserializeOwned>(value: &Value) -> Result<(), String> {
    serde_json::from_value::<T>(value.clone())
        .map(drop)
        .map_err(|e| e.to_string())
}

// =============================================================================
// ComponentSpec
// =============================================================================

/// A parsed-configuration record: one future instance of a plugin kind.
///
/// Produced by the configuration binder, consumed by the instance manager.
/// Distinct from an instance; holds only the raw user-supplied item.
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    /// The plugin kind to instantiate.
    pub kind: &'static KindDescriptor,
    /// The raw configuration item for this instance (defaults are layered at
    /// construction time, not here).
    pub config_data: Value,
}

impl ComponentSpec {
    /// A spec with empty configuration, as emitted for unconfigured kinds.
    pub fn default_for(kind: &'static KindDescriptor) -> Self {
        Self {
            kind,
            config_data: Value::Object(Map::new()),
        }
    }
}

// =============================================================================
// Default section binding
// =============================================================================

/// Default parse of one component-namespace configuration section.
///
/// Expects a mapping `plugin_type → list<item>`; a bare string is treated as
/// an alias for `{<string>: []}`, and an empty item list yields a single spec
/// with empty configuration. Plugin bases may replace this via
/// [`KindDescriptor::parse_section`].
pub fn default_parse_section(
    kinds: &KindRegistry,
    base: &'static KindDescriptor,
    section: &Value,
) -> Result<Vec<ComponentSpec>, ConfigError> {
    let namespace = base.component_namespace.unwrap_or(base.name);

    let alias_map;
    let map = match section {
        Value::String(alias) => {
            alias_map = Map::from_iter([(alias.clone(), Value::Array(Vec::new()))]);
            &alias_map
        }
        Value::Object(map) => map,
        _ => {
            return Err(ConfigError::Schema {
                path: namespace.to_string(),
                reason: "section must be a mapping of plugin types to item lists".to_string(),
            });
        }
    };

    let mut specs = Vec::new();
    for (plugin_type, items) in map {
        let kind = resolve_plugin_kind(kinds, base, plugin_type)?;
        let path = format!("{namespace}.{plugin_type}");

        let Value::Array(items) = items else {
            return Err(ConfigError::Schema {
                path,
                reason: "value must be a list of items".to_string(),
            });
        };

        if items.is_empty() {
            specs.push(ComponentSpec::default_for(kind));
            continue;
        }

        for (index, item) in items.iter().enumerate() {
            if !item.is_object() {
                return Err(ConfigError::Schema {
                    path: format!("{path}[{index}]"),
                    reason: "item must be a mapping".to_string(),
                });
            }
            if let Some(validate) = kind.validate {
                validate(item).map_err(|reason| ConfigError::Schema {
                    path: format!("{path}[{index}]"),
                    reason,
                })?;
            }
            specs.push(ComponentSpec {
                kind,
                config_data: item.clone(),
            });
        }
    }
    Ok(specs)
}

/// Resolves a configured plugin type to the unique plugin kind whose parent is
/// the given plugin base.
pub fn resolve_plugin_kind(
    kinds: &KindRegistry,
    base: &'static KindDescriptor,
    plugin_type: &str,
) -> Result<&'static KindDescriptor, ConfigError> {
    let predicate = KindPredicate {
        class_name: None,
        parent_class_name: Some(Cow::Borrowed(base.name)),
        plugin_type: Some(Cow::Owned(plugin_type.to_string())),
        component_namespace: None,
    };
    let matches = kinds.matching(&predicate);
    match matches.as_slice() {
        [kind] => Ok(*kind),
        [] => Err(ConfigError::UnknownPluginType {
            namespace: base.component_namespace.unwrap_or(base.name).to_string(),
            plugin_type: plugin_type.to_string(),
        }),
        [first, second, ..] => Err(ConfigError::DuplicatePlugin {
            namespace: base.component_namespace.unwrap_or(base.name).to_string(),
            plugin_type: plugin_type.to_string(),
            first: first.name.to_string(),
            second: second.name.to_string(),
        }),
    }
}
