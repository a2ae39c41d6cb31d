//! Partition and identity properties over generated graphs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use proptest::prelude::*;
use strata_bundler::{
    BuildContext, BuildOptions, BuildResult, IncrementalCache, Module, ModuleGraph, ModuleId,
    PartitionPolicy,
};

const MAX_MODULES: usize = 10;

#[derive(Debug, Clone)]
struct Shape {
    modules: usize,
    edges: Vec<(usize, usize, bool)>,
    entries: Vec<bool>,
    contents: Vec<String>,
}

fn module_id(index: usize) -> ModuleId {
    ModuleId::new(format!("src/m{index}.js")).unwrap()
}

impl Shape {
    fn graph(&self) -> ModuleGraph {
        let mut builders: Vec<_> = (0..self.modules)
            .map(|i| Module::builder(module_id(i), self.contents[i].clone()))
            .collect();

        for &(from, to, dynamic) in &self.edges {
            let (from, to) = (from % self.modules, to % self.modules);
            if from == to {
                continue;
            }
            let builder = std::mem::replace(
                &mut builders[from],
                Module::builder(module_id(from), Vec::new()),
            );
            builders[from] = if dynamic {
                builder.dynamic_dependency(module_id(to))
            } else {
                builder.dependency(module_id(to))
            };
        }

        let mut graph = ModuleGraph::builder().modules(builders.into_iter().map(|b| b.build()));
        for i in 0..self.modules {
            if i == 0 || self.entries[i] {
                graph = graph.entry(format!("e{i}"), module_id(i));
            }
        }
        graph.build().unwrap()
    }

    fn edited(&self, module: usize) -> Shape {
        let mut shape = self.clone();
        let index = module % self.modules;
        shape.contents[index].push_str("// edited");
        shape
    }
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        1usize..=MAX_MODULES,
        prop::collection::vec((0usize..MAX_MODULES, 0usize..MAX_MODULES, any::<bool>()), 0..24),
        prop::collection::vec(any::<bool>(), MAX_MODULES),
        prop::collection::vec("[a-z ]{0,12}", MAX_MODULES),
    )
        .prop_map(|(modules, edges, entries, contents)| Shape {
            modules,
            edges,
            entries,
            contents,
        })
}

fn run(graph: ModuleGraph, cache: &Arc<IncrementalCache>) -> BuildResult {
    let policy = PartitionPolicy::from_graph(&graph);
    BuildContext::new(graph, policy, BuildOptions::development())
        .with_cache(Arc::clone(cache))
        .build()
        .unwrap()
}

/// Names of the chunks that `root` depends on, directly or not.
fn transitive_dependencies(result: &BuildResult, root: usize) -> BTreeSet<usize> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(index) = stack.pop() {
        for dep in result.chunks()[index].chunk.dependencies() {
            if seen.insert(dep.index()) {
                stack.push(dep.index());
            }
        }
    }
    seen
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_module_lands_in_at_most_one_chunk(shape in shape()) {
        let graph = shape.graph();
        let result = run(graph.clone(), &Arc::new(IncrementalCache::in_memory()));

        let mut owners: BTreeMap<&ModuleId, &str> = BTreeMap::new();
        for output in result.chunks() {
            for module in output.chunk.modules() {
                let previous = owners.insert(module, output.chunk.name());
                prop_assert!(previous.is_none(), "{module} in {previous:?} and {}", output.chunk.name());
            }
        }

        let orphans: BTreeSet<_> = result.orphans().iter().map(|o| o.module.clone()).collect();
        for module in graph.modules() {
            prop_assert!(owners.contains_key(module.id()) != orphans.contains(module.id()));
        }
    }

    #[test]
    fn builds_are_reproducible(shape in shape()) {
        let one = run(shape.graph(), &Arc::new(IncrementalCache::in_memory()));
        let two = run(shape.graph(), &Arc::new(IncrementalCache::in_memory()));
        prop_assert_eq!(one.artifacts(), two.artifacts());
    }

    #[test]
    fn entries_load_their_own_chunk_last(shape in shape()) {
        let result = run(shape.graph(), &Arc::new(IncrementalCache::in_memory()));
        let manifest = result.manifest();
        for (name, refs) in &manifest.entries {
            let last = refs.last().unwrap();
            prop_assert_eq!(&manifest.chunks[last].name, &format!("entry:{name}"));
            let unique: BTreeSet<_> = refs.iter().collect();
            prop_assert_eq!(unique.len(), refs.len());
        }
    }

    #[test]
    fn edits_only_reach_dependent_chunks(shape in shape(), edit in 0usize..MAX_MODULES) {
        let cache = Arc::new(IncrementalCache::in_memory());
        let before = run(shape.graph(), &cache);
        let edited_shape = shape.edited(edit);
        let after = run(edited_shape.graph(), &cache);

        let edited = module_id(edit % shape.modules);
        let Some(owner) = before.chunks().iter().position(|c| c.chunk.contains(&edited)) else {
            // Orphans never reach the output.
            prop_assert_eq!(before.artifacts(), after.artifacts());
            return Ok(());
        };

        prop_assert_eq!(before.chunks().len(), after.chunks().len());
        for (index, (a, b)) in before.chunks().iter().zip(after.chunks()).enumerate() {
            prop_assert_eq!(a.chunk.name(), b.chunk.name());
            let affected = index == owner || transitive_dependencies(&before, index).contains(&owner);
            if affected {
                prop_assert_ne!(a.identity, b.identity);
            } else {
                prop_assert_eq!(a.identity, b.identity);
                prop_assert!(b.cached);
            }
        }
    }
}
