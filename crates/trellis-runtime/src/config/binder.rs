//! Configuration binder: document tree → ordered component specs.
//!
//! The top-level keys of the document are component namespaces. Each section
//! is handed to its plugin base's parse hook (default:
//! `plugin_type → list<item>`), producing one spec per configured item. Kinds
//! with no configured spec receive a *default spec* with empty configuration,
//! so every plugin kind is instantiated exactly once unless the configuration
//! adds more.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};
use trellis_core::{
    ComponentSpec, ConfigError, KindDescriptor, KindRegistry, Role, default_parse_section,
};

/// Binds a configuration document against the registry, emitting specs in
/// resolver order (`order` is the output of
/// [`resolution_order`](trellis_core::resolution_order)).
///
/// Unknown component namespaces are ignored with a warning. Everything else
/// that does not validate is a fatal [`ConfigError`].
pub fn bind(
    kinds: &KindRegistry,
    order: &[&'static KindDescriptor],
    document: &Value,
) -> Result<Vec<ComponentSpec>, ConfigError> {
    let mut configured: HashMap<&str, Vec<ComponentSpec>> = HashMap::new();

    match document {
        Value::Null => {}
        Value::Object(root) => {
            for (namespace, section) in root {
                let Some(base) = kinds.plugin_base_for(namespace) else {
                    warn!(%namespace, "no plugin base for component namespace, ignoring");
                    continue;
                };
                if let Some(validate) = base.validate {
                    validate(section).map_err(|reason| ConfigError::Schema {
                        path: namespace.clone(),
                        reason,
                    })?;
                }
                let parse = base.parse_section.unwrap_or(default_parse_section);
                for spec in parse(kinds, base, section)? {
                    configured.entry(spec.kind.name).or_default().push(spec);
                }
            }
        }
        _ => {
            return Err(ConfigError::Schema {
                path: ".".to_string(),
                reason: "configuration document must be a mapping".to_string(),
            });
        }
    }

    let mut specs = Vec::new();
    for kind in order.iter().copied().filter(|k| k.role == Role::Plugin) {
        match configured.remove(kind.name) {
            Some(items) => specs.extend(items),
            None => specs.push(ComponentSpec::default_for(kind)),
        }
    }
    debug!(specs = specs.len(), "configuration bound");
    Ok(specs)
}
