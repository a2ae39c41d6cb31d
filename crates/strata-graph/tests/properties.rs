//! Module id normalization and graph traversal properties.

use std::collections::BTreeSet;

use proptest::prelude::*;
use strata_graph::{Module, ModuleGraph, ModuleId};

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,8}"
}

fn relative_path() -> impl Strategy<Value = String> {
    (prop::collection::vec(segment(), 1..5), "(js|mjs|ts)")
        .prop_map(|(segments, ext)| format!("{}.{ext}", segments.join("/")))
}

fn module_id(index: usize) -> ModuleId {
    ModuleId::new(format!("src/m{index}.js")).unwrap()
}

/// Up to eight modules with arbitrary static and dynamic edges; module 0 is
/// the entry.
fn edges() -> impl Strategy<Value = (usize, Vec<(usize, usize, bool)>)> {
    (1usize..=8).prop_flat_map(|modules| {
        (
            Just(modules),
            prop::collection::vec((0..modules, 0..modules, any::<bool>()), 0..16),
        )
    })
}

fn modules(count: usize, edges: &[(usize, usize, bool)]) -> Vec<Module> {
    (0..count)
        .map(|i| {
            let mut builder = Module::builder(module_id(i), format!("m{i}"));
            for &(from, to, dynamic) in edges {
                if from != i || to == i {
                    continue;
                }
                builder = if dynamic {
                    builder.dynamic_dependency(module_id(to))
                } else {
                    builder.dependency(module_id(to))
                };
            }
            builder.build()
        })
        .collect()
}

fn graph(modules: Vec<Module>) -> ModuleGraph {
    ModuleGraph::builder()
        .modules(modules)
        .entry("main", module_id(0))
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn normalized_ids_are_fixed_points(path in relative_path()) {
        let id = ModuleId::new(&path).unwrap();
        prop_assert_eq!(ModuleId::new(id.as_str()).unwrap(), id.clone());
        prop_assert_eq!(ModuleId::new(format!("./{path}")).unwrap(), id.clone());
        prop_assert_eq!(ModuleId::new(path.replace('/', "\\")).unwrap(), id);
    }

    #[test]
    fn detours_through_parent_collapse(path in relative_path(), detour in segment()) {
        let direct = ModuleId::new(&path).unwrap();
        let detoured = ModuleId::new(format!("{detour}/../{path}")).unwrap();
        prop_assert_eq!(detoured, direct);
    }

    #[test]
    fn insertion_order_does_not_matter((count, edges) in edges()) {
        let forward = graph(modules(count, &edges));
        let mut reversed_modules = modules(count, &edges);
        reversed_modules.reverse();
        let reversed = graph(reversed_modules);

        let root = module_id(0);
        prop_assert_eq!(
            forward.static_closure([&root], |_| false),
            reversed.static_closure([&root], |_| false)
        );
        for module in forward.modules() {
            let other = reversed.module(module.id()).unwrap();
            prop_assert_eq!(module.digest(), other.digest());
        }
    }

    #[test]
    fn static_closure_is_closed((count, edges) in edges()) {
        let graph = graph(modules(count, &edges));
        let root = module_id(0);
        let closure = graph.static_closure([&root], |_| false);

        prop_assert!(closure.contains(&root));
        for id in &closure {
            let module = graph.module(id).unwrap();
            for target in module.static_dependencies() {
                prop_assert!(closure.contains(target), "{target} reachable from {id} but missing");
            }
        }
    }

    #[test]
    fn stopped_modules_are_excluded((count, edges) in edges(), stop in 1usize..8) {
        let graph = graph(modules(count, &edges));
        let root = module_id(0);
        let stopped = module_id(stop);
        let closure = graph.static_closure([&root], |id| *id == stopped);
        let all: BTreeSet<ModuleId> = graph.static_closure([&root], |_| false);

        prop_assert!(!closure.contains(&stopped));
        prop_assert!(closure.is_subset(&all));
    }
}
