//! Dependency resolution over the kind registry.
//!
//! Builds a directed graph with two edge sources — structural parent edges
//! (`plugin → plugin_base → base`) and declared `depends_on` predicates — and
//! computes a topological order in which dependencies precede dependents.
//! Ties are broken by registration order, so the result is deterministic.

use std::collections::{BTreeSet, HashMap};

use crate::error::DependencyCycle;
use crate::kind::KindDescriptor;
use crate::registry::KindRegistry;

/// Computes the topological construction order over all registered kinds.
///
/// A predicate in `depends_on` resolves (via the registry) to zero or more
/// kinds; each becomes an edge. Self-edges are ignored. A cycle is fatal and
/// is reported with the kinds left unordered behind it.
pub fn resolution_order(
    registry: &KindRegistry,
) -> Result<Vec<&'static KindDescriptor>, DependencyCycle> {
    let kinds = registry.all();
    let index: HashMap<&str, usize> = kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| (kind.name, i))
        .collect();

    // Dependency indices per kind; BTreeSet keeps edges deduplicated.
    let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); kinds.len()];
    for (i, kind) in kinds.iter().enumerate() {
        if let Some(parent) = kind.parent
            && let Some(&p) = index.get(parent)
        {
            dependencies[i].insert(p);
        }
        for predicate in kind.depends_on {
            for dependency in registry.matching(predicate) {
                let j = index[dependency.name];
                if j != i {
                    dependencies[i].insert(j);
                }
            }
        }
    }

    let mut emitted = vec![false; kinds.len()];
    let mut order = Vec::with_capacity(kinds.len());
    while order.len() < kinds.len() {
        let before = order.len();
        for i in 0..kinds.len() {
            if !emitted[i] && dependencies[i].iter().all(|&d| emitted[d]) {
                emitted[i] = true;
                order.push(kinds[i]);
            }
        }
        if order.len() == before {
            let kinds = kinds
                .iter()
                .enumerate()
                .filter(|(i, _)| !emitted[*i])
                .map(|(_, kind)| kind.name.to_string())
                .collect();
            return Err(DependencyCycle { kinds });
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::test_support::make_null;
    use crate::kind::{KindPredicate, Role};

    static ROOT: KindDescriptor = KindDescriptor::base("Root", "t.root");
    static BASE: KindDescriptor = KindDescriptor::plugin_base("Widget", "t.widget", "Root", "widgets");

    static C_DEPS: [KindPredicate; 0] = [];
    static B_DEPS: [KindPredicate; 1] = [KindPredicate::of_class("KindC")];
    static A_DEPS: [KindPredicate; 1] = [KindPredicate::of_class("KindB")];

    static KIND_A: KindDescriptor = KindDescriptor::plugin("KindA", "t.a", "Widget", "widgets", "a")
        .with_depends_on(&A_DEPS)
        .with_create(make_null);
    static KIND_B: KindDescriptor = KindDescriptor::plugin("KindB", "t.b", "Widget", "widgets", "b")
        .with_depends_on(&B_DEPS)
        .with_create(make_null);
    static KIND_C: KindDescriptor = KindDescriptor::plugin("KindC", "t.c", "Widget", "widgets", "c")
        .with_depends_on(&C_DEPS)
        .with_create(make_null);

    fn registry_with(kinds: &[&'static KindDescriptor]) -> KindRegistry {
        let mut registry = KindRegistry::new();
        registry.register(&ROOT).unwrap();
        registry.register(&BASE).unwrap();
        for kind in kinds {
            registry.register(kind).unwrap();
        }
        registry.validate().unwrap();
        registry
    }

    #[test]
    fn dependencies_precede_dependents_regardless_of_registration_order() {
        let registry = registry_with(&[&KIND_A, &KIND_B, &KIND_C]);
        let order = resolution_order(&registry).unwrap();
        let plugins: Vec<_> = order
            .iter()
            .filter(|k| k.role == Role::Plugin)
            .map(|k| k.name)
            .collect();
        assert_eq!(plugins, ["KindC", "KindB", "KindA"]);
    }

    #[test]
    fn structural_parent_edges_are_honored() {
        let registry = registry_with(&[&KIND_C]);
        let order = resolution_order(&registry).unwrap();
        let names: Vec<_> = order.iter().map(|k| k.name).collect();
        let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(pos("Root") < pos("Widget"));
        assert!(pos("Widget") < pos("KindC"));
    }

    #[test]
    fn ties_break_by_registration_order() {
        static KIND_X: KindDescriptor =
            KindDescriptor::plugin("KindX", "t.x", "Widget", "widgets", "x").with_create(make_null);
        static KIND_Y: KindDescriptor =
            KindDescriptor::plugin("KindY", "t.y", "Widget", "widgets", "y").with_create(make_null);
        let registry = registry_with(&[&KIND_Y, &KIND_X]);
        let order = resolution_order(&registry).unwrap();
        let plugins: Vec<_> = order
            .iter()
            .filter(|k| k.role == Role::Plugin)
            .map(|k| k.name)
            .collect();
        assert_eq!(plugins, ["KindY", "KindX"]);
    }

    #[test]
    fn cycle_is_reported_with_participants() {
        static LOOP_A_DEPS: [KindPredicate; 1] = [KindPredicate::of_class("LoopB")];
        static LOOP_B_DEPS: [KindPredicate; 1] = [KindPredicate::of_class("LoopA")];
        static LOOP_A: KindDescriptor =
            KindDescriptor::plugin("LoopA", "t.la", "Widget", "widgets", "la")
                .with_depends_on(&LOOP_A_DEPS)
                .with_create(make_null);
        static LOOP_B: KindDescriptor =
            KindDescriptor::plugin("LoopB", "t.lb", "Widget", "widgets", "lb")
                .with_depends_on(&LOOP_B_DEPS)
                .with_create(make_null);
        let registry = registry_with(&[&LOOP_A, &LOOP_B]);
        let err = resolution_order(&registry).unwrap_err();
        assert!(err.kinds.contains(&"LoopA".to_string()));
        assert!(err.kinds.contains(&"LoopB".to_string()));
    }

    #[test]
    fn predicate_resolving_to_nothing_adds_no_edge() {
        static FLOATING_DEPS: [KindPredicate; 1] = [KindPredicate::of_class("Missing")];
        static FLOATING: KindDescriptor =
            KindDescriptor::plugin("Floating", "t.f", "Widget", "widgets", "f")
                .with_depends_on(&FLOATING_DEPS)
                .with_create(make_null);
        let registry = registry_with(&[&FLOATING]);
        assert!(resolution_order(&registry).is_ok());
    }
}
