//! The built-in component families.
//!
//! One root kind plus one plugin base per component namespace. Concrete
//! plugins live in their own crates (`trellis-transport`,
//! `trellis-adapter-http`, the runtime's built-in jobs) and name these bases
//! as parents.

use linkme::distributed_slice;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::kind::{ComponentSpec, KindDescriptor, KindPredicate, default_parse_section};
use crate::registry::{KINDS, KindRegistry};

/// The root component kind.
pub static COMPONENT: KindDescriptor = KindDescriptor::base("Component", "trellis.component");

/// Family head for message-queue transports (`mq`).
pub static MESSAGE_QUEUE: KindDescriptor =
    KindDescriptor::plugin_base("MessageQueue", "trellis.mq", "Component", "mq");

static TRIGGER_DEPS: [KindPredicate; 1] = [KindPredicate::of_parent("MessageQueue")];

/// Family head for ingress adapters (`triggers`).
///
/// Triggers publish through transports, so every transport plugin is ordered
/// before every trigger plugin.
pub static TRIGGER: KindDescriptor =
    KindDescriptor::plugin_base("Trigger", "trellis.triggers", "Component", "triggers")
        .with_depends_on(&TRIGGER_DEPS);

/// Family head for jobs (`jobs`).
pub static JOB: KindDescriptor =
    KindDescriptor::plugin_base("Job", "trellis.jobs", "Component", "jobs");

/// Family head for frontends (`frontend`).
///
/// Overrides the binding format: a frontend section may give a single mapping
/// per plugin type instead of a list, since running several instances of one
/// frontend is the exception.
pub static FRONTEND: KindDescriptor =
    KindDescriptor::plugin_base("Frontend", "trellis.frontend", "Component", "frontend")
        .with_parse_section(parse_frontend_section);

#[distributed_slice(KINDS)]
static COMPONENT_ENTRY: &KindDescriptor = &COMPONENT;
#[distributed_slice(KINDS)]
static MESSAGE_QUEUE_ENTRY: &KindDescriptor = &MESSAGE_QUEUE;
#[distributed_slice(KINDS)]
static TRIGGER_ENTRY: &KindDescriptor = &TRIGGER;
#[distributed_slice(KINDS)]
static JOB_ENTRY: &KindDescriptor = &JOB;
#[distributed_slice(KINDS)]
static FRONTEND_ENTRY: &KindDescriptor = &FRONTEND;

/// Frontend binding format: `plugin_type → item | list<item>`.
fn parse_frontend_section(
    kinds: &KindRegistry,
    base: &'static KindDescriptor,
    section: &Value,
) -> Result<Vec<ComponentSpec>, ConfigError> {
    let normalized = match section {
        Value::Object(map) => {
            let mut out = Map::new();
            for (plugin_type, value) in map {
                let value = match value {
                    Value::Object(item) => Value::Array(vec![Value::Object(item.clone())]),
                    other => other.clone(),
                };
                out.insert(plugin_type.clone(), value);
            }
            Value::Object(out)
        }
        other => other.clone(),
    };
    default_parse_section(kinds, base, &normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::test_support::make_null;
    use serde_json::json;

    static HTTP_FRONTEND: KindDescriptor = KindDescriptor::plugin(
        "TestHttpFrontend",
        "t.frontend.http",
        "Frontend",
        "frontend",
        "http",
    )
    .with_create(make_null);

    fn registry() -> KindRegistry {
        let mut registry = KindRegistry::new();
        registry.register(&COMPONENT).unwrap();
        registry.register(&FRONTEND).unwrap();
        registry.register(&HTTP_FRONTEND).unwrap();
        registry
    }

    #[test]
    fn frontend_section_accepts_single_mapping() {
        let kinds = registry();
        let specs =
            parse_frontend_section(&kinds, &FRONTEND, &json!({"http": {"listen": "127.0.0.1:0"}}))
                .unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].config_data["listen"], "127.0.0.1:0");
    }

    #[test]
    fn frontend_section_still_accepts_lists() {
        let kinds = registry();
        let specs = parse_frontend_section(
            &kinds,
            &FRONTEND,
            &json!({"http": [{"name": "a"}, {"name": "b"}]}),
        )
        .unwrap();
        assert_eq!(specs.len(), 2);
    }

    #[test]
    fn trigger_family_depends_on_transports() {
        assert_eq!(TRIGGER.depends_on.len(), 1);
        assert!(TRIGGER.depends_on[0].matches(&KindDescriptor::plugin(
            "AnyMq",
            "t.mq.any",
            "MessageQueue",
            "mq",
            "any",
        )));
    }
}
