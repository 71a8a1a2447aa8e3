//! Hook records and the hook registry.
//!
//! A [`Hook`] is a subscription: a *sender kind* (resolved from a predicate at
//! registration time), a `match_data` mapping that must be a subset of one of
//! the envelope's payload mappings, and an async callback. The registry is
//! append-only after startup; readers never lock each other out for long.
//!
//! # Matching
//!
//! For an envelope `E`, [`HookRegistry::matches`] yields `(hook, instance)`
//! pairs, in (hook insertion, instance insertion) order, where:
//!
//! 1. the instance's kind is exactly the hook's kind;
//! 2. `E`'s identity names that same kind (sender-kind semantics);
//! 3. every entry of `match_data` appears, recursively, inside at least one
//!    mapping in `E.data` — an empty `match_data` always passes, and empty
//!    payload data never satisfies a non-empty `match_data`.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::component::{ComponentCell, ComponentHandle, ComponentState};
use crate::error::BoxError;
use crate::kind::{KindDescriptor, KindPredicate};
use crate::message::Envelope;
use crate::registry::KindRegistry;

/// Future returned by a hook callback.
pub type HookFuture = BoxFuture<'static, Result<(), BoxError>>;

/// Async hook callback, invoked with the hook, the matched sender instance,
/// and the envelope.
pub type HookCallback = Arc<dyn Fn(Arc<Hook>, ComponentHandle, Envelope) -> HookFuture + Send + Sync>;

/// Wraps an async closure into a [`HookCallback`].
pub fn hook_callback<F, Fut>(f: F) -> HookCallback
where
    F: Fn(Arc<Hook>, ComponentHandle, Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |hook, instance, envelope| Box::pin(f(hook, instance, envelope)))
}

// =============================================================================
// Hook
// =============================================================================

/// One registered subscription.
pub struct Hook {
    /// The sender kind this hook fires for.
    pub kind: &'static KindDescriptor,
    /// Optional tag describing the kind of hook.
    pub hook_type: Option<String>,
    /// Partial mapping that must be a subset of one payload mapping.
    pub match_data: Value,
    /// The callback to invoke on a match.
    pub callback: HookCallback,
    /// The component that registered the hook. Weak: the hook dies with its
    /// owner.
    pub owner: Weak<ComponentCell>,
}

impl Hook {
    /// Invokes the callback with this hook, the matched sender instance, and
    /// the envelope.
    pub async fn invoke(
        self: &Arc<Self>,
        instance: ComponentHandle,
        envelope: Envelope,
    ) -> Result<(), BoxError> {
        (self.callback.as_ref())(Arc::clone(self), instance, envelope).await
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("kind", &self.kind.name)
            .field("hook_type", &self.hook_type)
            .field("match_data", &self.match_data)
            .finish()
    }
}

// =============================================================================
// HookRegistry
// =============================================================================

/// Append-only store of hook records.
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<Vec<Arc<Hook>>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook: one record per kind matching `predicate`, in
    /// registry order. A predicate matching no kind registers nothing.
    pub fn register(
        &self,
        kinds: &KindRegistry,
        owner: &ComponentHandle,
        predicate: &KindPredicate,
        match_data: Value,
        hook_type: Option<String>,
        callback: HookCallback,
    ) {
        let matched = kinds.matching(predicate);
        debug!(
            owner = owner.kind().name,
            senders = matched.len(),
            ?match_data,
            "registering hook"
        );
        let mut hooks = self.hooks.write();
        for kind in matched {
            hooks.push(Arc::new(Hook {
                kind,
                hook_type: hook_type.clone(),
                match_data: match_data.clone(),
                callback: callback.clone(),
                owner: Arc::downgrade(owner),
            }));
        }
    }

    /// All hook records, in insertion order.
    pub fn list(&self) -> Vec<Arc<Hook>> {
        self.hooks.read().clone()
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    /// Returns `true` when no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Matches an envelope against every hook and live instance.
    ///
    /// Each `(hook, instance)` pair appears at most once per call.
    pub fn matches(
        &self,
        envelope: &Envelope,
        instances: &[ComponentHandle],
    ) -> Vec<(Arc<Hook>, ComponentHandle)> {
        let identity = envelope.identity();
        let mut out = Vec::new();
        for hook in self.hooks.read().iter() {
            if hook.owner.strong_count() == 0 {
                continue;
            }
            if identity.plugin_namespace != hook.kind.namespace
                || identity.plugin_type != hook.kind.plugin_type.unwrap_or_default()
            {
                continue;
            }
            if !match_data_matches(&hook.match_data, envelope.data()) {
                continue;
            }
            for instance in instances {
                if !std::ptr::eq(instance.kind(), hook.kind) {
                    continue;
                }
                if instance.state() != ComponentState::Ready {
                    continue;
                }
                out.push((Arc::clone(hook), Arc::clone(instance)));
            }
        }
        out
    }
}

/// Returns `true` when `match_data` is satisfied by the payload list.
///
/// A `match_data` that is not a non-empty mapping matches everything; a
/// non-empty mapping must be a recursive subset of at least one payload entry.
fn match_data_matches(match_data: &Value, data: &[Value]) -> bool {
    match match_data.as_object() {
        None => true,
        Some(pattern) if pattern.is_empty() => true,
        Some(_) => data.iter().any(|item| is_subset(match_data, item)),
    }
}

/// Recursive subset check: every key/value of `pattern` must appear in
/// `data`; nested mappings recurse, scalars compare for equality.
pub fn is_subset(pattern: &Value, data: &Value) -> bool {
    match (pattern, data) {
        (Value::Object(pattern), Value::Object(data)) => pattern
            .iter()
            .all(|(key, value)| data.get(key).is_some_and(|inner| is_subset(value, inner))),
        _ => pattern == data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::test_support::ready_cell;
    use crate::message::{Identity, MetaMap};
    use serde_json::json;

    static SENSOR: KindDescriptor =
        KindDescriptor::plugin("Sensor", "t.sensor", "Widget", "widgets", "sensor");
    static OTHER: KindDescriptor =
        KindDescriptor::plugin("Probe", "t.probe", "Widget", "widgets", "probe");

    fn seeded_kinds() -> KindRegistry {
        let mut kinds = KindRegistry::new();
        kinds.register(&SENSOR).unwrap();
        kinds.register(&OTHER).unwrap();
        kinds
    }

    fn noop() -> HookCallback {
        hook_callback(|_, _, _| async { Ok(()) })
    }

    fn envelope_from(kind: &KindDescriptor, data: Vec<Value>) -> Envelope {
        Envelope::new(
            Identity::new(None, kind.namespace, kind.plugin_type.unwrap()),
            MetaMap::new(),
            data,
        )
        .unwrap()
    }

    #[test]
    fn subset_check_recurses() {
        assert!(is_subset(&json!({"a": {"b": 1}}), &json!({"a": {"b": 1, "c": 2}, "d": 3})));
        assert!(!is_subset(&json!({"a": {"b": 2}}), &json!({"a": {"b": 1}})));
        assert!(!is_subset(&json!({"missing": 1}), &json!({"a": 1})));
        assert!(is_subset(&json!(5), &json!(5)));
    }

    #[test]
    fn match_data_subset_law() {
        let kinds = seeded_kinds();
        let registry = HookRegistry::new();
        let owner = ready_cell(&OTHER, Some("job"));
        let sensor = ready_cell(&SENSOR, None);

        registry.register(
            &kinds,
            &owner,
            &KindPredicate::of_class("Sensor"),
            json!({"event_type": "push"}),
            None,
            noop(),
        );

        let matching = envelope_from(&SENSOR, vec![json!({"event_type": "push", "ref": "main"})]);
        let pairs = registry.matches(&matching, &[sensor.clone(), owner.clone()]);
        assert_eq!(pairs.len(), 1);
        assert!(Arc::ptr_eq(&pairs[0].1, &sensor));

        let rejected = envelope_from(&SENSOR, vec![json!({"event_type": "ping"})]);
        assert!(registry.matches(&rejected, &[sensor.clone()]).is_empty());
    }

    #[test]
    fn empty_match_data_matches_any_payload() {
        let kinds = seeded_kinds();
        let registry = HookRegistry::new();
        let owner = ready_cell(&OTHER, None);
        let sensor = ready_cell(&SENSOR, None);

        registry.register(
            &kinds,
            &owner,
            &KindPredicate::of_class("Sensor"),
            json!({}),
            None,
            noop(),
        );
        let envelope = envelope_from(&SENSOR, Vec::new());
        assert_eq!(registry.matches(&envelope, &[sensor]).len(), 1);
    }

    #[test]
    fn empty_payload_never_satisfies_nonempty_match_data() {
        let kinds = seeded_kinds();
        let registry = HookRegistry::new();
        let owner = ready_cell(&OTHER, None);
        let sensor = ready_cell(&SENSOR, None);

        registry.register(
            &kinds,
            &owner,
            &KindPredicate::of_class("Sensor"),
            json!({"event_type": "push"}),
            None,
            noop(),
        );
        let envelope = envelope_from(&SENSOR, Vec::new());
        assert!(registry.matches(&envelope, &[sensor]).is_empty());
    }

    #[test]
    fn identity_kind_gates_matching() {
        let kinds = seeded_kinds();
        let registry = HookRegistry::new();
        let owner = ready_cell(&OTHER, None);
        let sensor = ready_cell(&SENSOR, None);

        registry.register(
            &kinds,
            &owner,
            &KindPredicate::of_class("Sensor"),
            json!({}),
            None,
            noop(),
        );
        // The envelope claims to come from a different kind.
        let envelope = envelope_from(&OTHER, Vec::new());
        assert!(registry.matches(&envelope, &[sensor]).is_empty());
    }

    #[test]
    fn pairs_follow_hook_then_instance_insertion_order() {
        let kinds = seeded_kinds();
        let registry = HookRegistry::new();
        let owner = ready_cell(&OTHER, None);
        let first = ready_cell(&SENSOR, Some("first"));
        let second = ready_cell(&SENSOR, Some("second"));

        registry.register(&kinds, &owner, &KindPredicate::of_class("Sensor"), json!({}), Some("a".into()), noop());
        registry.register(&kinds, &owner, &KindPredicate::of_class("Sensor"), json!({}), Some("b".into()), noop());

        let envelope = envelope_from(&SENSOR, Vec::new());
        let pairs = registry.matches(&envelope, &[first.clone(), second.clone()]);
        let labels: Vec<_> = pairs
            .iter()
            .map(|(h, i)| (h.hook_type.clone().unwrap(), i.name().unwrap().to_string()))
            .collect();
        assert_eq!(
            labels,
            [
                ("a".to_string(), "first".to_string()),
                ("a".to_string(), "second".to_string()),
                ("b".to_string(), "first".to_string()),
                ("b".to_string(), "second".to_string()),
            ]
        );
    }

    #[test]
    fn dead_owner_disables_hook() {
        let kinds = seeded_kinds();
        let registry = HookRegistry::new();
        let sensor = ready_cell(&SENSOR, None);
        {
            let owner = ready_cell(&OTHER, None);
            registry.register(&kinds, &owner, &KindPredicate::of_class("Sensor"), json!({}), None, noop());
        }
        let envelope = envelope_from(&SENSOR, Vec::new());
        assert!(registry.matches(&envelope, &[sensor]).is_empty());
    }
}
