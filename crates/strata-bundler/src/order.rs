//! Deterministic ordering helpers shared by the partitioner, hasher and manifest.
//!
//! Everything here works on `BTreeSet`/`BTreeMap` so ties always resolve by
//! key order, never by insertion or hash order.

use std::collections::{BTreeMap, BTreeSet};

/// Topological order where dependencies precede dependents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TopoOrder<K> {
    pub order: Vec<K>,
    /// Times a cycle had to be broken by force-emitting the smallest node.
    pub broken_cycles: usize,
}

/// Kahn's algorithm with a sorted ready queue.
///
/// Edges to nodes outside `nodes`, self edges and duplicate edges are
/// ignored. When every remaining node waits on another one (a cycle), the
/// smallest remaining node is emitted and the walk continues.
pub(crate) fn stable_topological<K, F, I>(nodes: &BTreeSet<K>, mut deps: F) -> TopoOrder<K>
where
    K: Ord + Clone,
    F: FnMut(&K) -> I,
    I: IntoIterator<Item = K>,
{
    let mut waiting: BTreeMap<K, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<K, Vec<K>> = BTreeMap::new();

    for node in nodes {
        let mut seen = BTreeSet::new();
        for dep in deps(node) {
            if &dep == node || !nodes.contains(&dep) || !seen.insert(dep.clone()) {
                continue;
            }
            dependents.entry(dep).or_default().push(node.clone());
        }
        waiting.insert(node.clone(), seen.len());
    }

    let mut ready: BTreeSet<K> = waiting
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| node.clone())
        .collect();
    let mut remaining = nodes.clone();
    let mut order = Vec::with_capacity(nodes.len());
    let mut broken_cycles = 0;

    loop {
        let next = match ready.pop_first() {
            Some(next) => next,
            None => match remaining.first() {
                Some(smallest) => {
                    broken_cycles += 1;
                    smallest.clone()
                }
                None => break,
            },
        };

        if !remaining.remove(&next) {
            continue;
        }

        if let Some(list) = dependents.get(&next) {
            for dependent in list {
                if let Some(count) = waiting.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 && remaining.contains(dependent) {
                        ready.insert(dependent.clone());
                    }
                }
            }
        }

        order.push(next);
    }

    TopoOrder {
        order,
        broken_cycles,
    }
}

/// First cycle found by a depth-first walk in key order, closed at both ends.
pub(crate) fn find_cycle<K, F, I>(nodes: &BTreeSet<K>, mut deps: F) -> Option<Vec<K>>
where
    K: Ord + Clone,
    F: FnMut(&K) -> I,
    I: IntoIterator<Item = K>,
{
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Active,
        Done,
    }

    let edges: BTreeMap<K, Vec<K>> = nodes
        .iter()
        .map(|node| {
            let targets = deps(node)
                .into_iter()
                .filter(|dep| nodes.contains(dep))
                .collect();
            (node.clone(), targets)
        })
        .collect();

    let mut marks: BTreeMap<K, Mark> = BTreeMap::new();

    for start in nodes {
        if marks.contains_key(start) {
            continue;
        }

        // (node, next edge index)
        let mut stack: Vec<(K, usize)> = vec![(start.clone(), 0)];
        marks.insert(start.clone(), Mark::Active);

        while let Some((node, cursor)) = stack.last().cloned() {
            let targets = edges.get(&node).map(Vec::as_slice).unwrap_or(&[]);
            if cursor >= targets.len() {
                marks.insert(node, Mark::Done);
                stack.pop();
                continue;
            }
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            let target = &targets[cursor];
            match marks.get(target) {
                Some(Mark::Active) => {
                    let begin = stack
                        .iter()
                        .position(|(visited, _)| visited == target)
                        .unwrap_or(0);
                    let mut cycle: Vec<K> = stack[begin..].iter().map(|(n, _)| n.clone()).collect();
                    cycle.push(target.clone());
                    return Some(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(target.clone(), Mark::Active);
                    stack.push((target.clone(), 0));
                }
            }
        }
    }

    None
}

/// Group a dependency-first order into levels: level 0 has no dependencies,
/// level n depends only on levels below n. Nodes inside a level are sorted.
pub(crate) fn levels<K, F, I>(order: &[K], mut deps: F) -> Vec<Vec<K>>
where
    K: Ord + Clone,
    F: FnMut(&K) -> I,
    I: IntoIterator<Item = K>,
{
    let mut level_of: BTreeMap<K, usize> = BTreeMap::new();
    let mut levels: Vec<Vec<K>> = Vec::new();

    for node in order {
        let level = deps(node)
            .into_iter()
            .filter(|dep| dep != node)
            .filter_map(|dep| level_of.get(&dep).map(|level| level + 1))
            .max()
            .unwrap_or(0);
        level_of.insert(node.clone(), level);
        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push(node.clone());
    }

    for level in &mut levels {
        level.sort();
    }
    levels
}
