//! # Dependency Builder
//!
//! Turns a set of system descriptors into an ordered list of execution
//! batches. Construction is a modified Kahn topological sort with
//! conflict-aware batch admission:
//!
//! 1. Explicit `before` / `after` edges are normalised into a single directed
//!    adjacency `u → v` meaning "u must complete before v", and in-degrees
//!    are computed.
//! 2. The ready queue seeds with every in-degree-zero system, sorted
//!    ascending by group id (stable for ties).
//! 3. Each batch greedily admits ready candidates in group order. A
//!    candidate is rejected if any component it touches is already
//!    write-claimed by the batch, or if it declares a write on a component
//!    the batch already reads. Rejected candidates carry over, ahead of the
//!    systems the closing batch unlocks.
//! 4. An empty ready queue with systems unplaced is a **cycle**; a non-empty
//!    ready queue that admits nothing is a **deadlock**. Both are non-fatal:
//!    they log, and the partial plan is returned for the caller to inspect.
//!
//! Group id is not a barrier: systems in different groups share a batch
//! whenever they are conflict-free. The group only biases which candidates
//! are tried first when admission is conflict-limited.

use std::collections::{HashMap, HashSet};

use crate::engine::error::ScheduleError;
use crate::engine::systems::System;
use crate::engine::types::{Access, ComponentName};

/// A set of systems proven free of mutual conflicts and ordering edges,
/// therefore safely runnable in parallel.
///
/// Holds indices into the descriptor list the plan was built from.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    systems: Vec<usize>,
}

impl Batch {
    /// Returns the descriptor indices placed in this batch.
    pub fn systems(&self) -> &[usize] {
        &self.systems
    }

    /// Returns the number of systems in this batch.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

/// Ordered batches plus any non-fatal errors hit during construction.
#[derive(Default)]
pub struct SchedulePlan {
    batches: Vec<Batch>,
    names: Vec<&'static str>,
    errors: Vec<ScheduleError>,
}

impl SchedulePlan {
    /// Short-circuit plan for a single descriptor.
    pub(crate) fn single(name: &'static str) -> Self {
        Self {
            batches: vec![Batch { systems: vec![0] }],
            names: vec![name],
            errors: Vec::new(),
        }
    }

    /// Returns the batches in execution order.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Returns the errors accumulated during construction. Empty for a
    /// complete plan.
    pub fn errors(&self) -> &[ScheduleError] {
        &self.errors
    }

    /// Returns `true` if every descriptor was placed.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the index of the batch containing the named system, if it was
    /// placed at all.
    pub fn batch_index_of(&self, name: &str) -> Option<usize> {
        let descriptor = self.names.iter().position(|n| *n == name)?;
        self.batches
            .iter()
            .position(|batch| batch.systems.contains(&descriptor))
    }

    /// Returns `true` if the named system made it into the plan.
    pub fn contains(&self, name: &str) -> bool {
        self.batch_index_of(name).is_some()
    }

    /// Returns the number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Returns `true` if the plan has no batches.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Builds an execution plan from a list of descriptors.
///
/// Duplicate system names are a programming error; in release builds the
/// later descriptor shadows the earlier one as an edge target.
pub fn build_schedule(descriptors: &[&dyn System]) -> SchedulePlan {
    let count = descriptors.len();
    let names: Vec<&'static str> = descriptors.iter().map(|d| d.name()).collect();

    let index_of: HashMap<&'static str, usize> = names
        .iter()
        .enumerate()
        .map(|(index, name)| (*name, index))
        .collect();
    debug_assert_eq!(index_of.len(), count, "duplicate system names");

    // Normalise before/after into "u must complete before v" adjacency.
    let mut graph = Adjacency::new(count);

    for (index, descriptor) in descriptors.iter().enumerate() {
        for name in descriptor.before() {
            match index_of.get(name) {
                Some(&target) => graph.add_edge(index, target),
                None => log::warn!(
                    "system `{}` is before unknown system `{}`; edge dropped",
                    names[index],
                    name
                ),
            }
        }
        for name in descriptor.after() {
            match index_of.get(name) {
                Some(&source) => graph.add_edge(source, index),
                None => log::warn!(
                    "system `{}` is after unknown system `{}`; edge dropped",
                    names[index],
                    name
                ),
            }
        }
    }

    let Adjacency {
        successors,
        mut in_degree,
        ..
    } = graph;

    // Ready queue: in-degree-zero systems, group-ascending, stable for ties.
    let mut ready: Vec<usize> = (0..count).filter(|&index| in_degree[index] == 0).collect();
    ready.sort_by_key(|&index| descriptors[index].group());

    let mut batches: Vec<Batch> = Vec::new();
    let mut errors: Vec<ScheduleError> = Vec::new();
    let mut placed: HashSet<usize> = HashSet::new();

    while placed.len() < count {
        if ready.is_empty() {
            let unplaced: Vec<&'static str> = (0..count)
                .filter(|index| !placed.contains(index))
                .map(|index| names[index])
                .collect();
            let error = ScheduleError::Cycle { unplaced };
            log::error!("{}", error);
            errors.push(error);
            break;
        }

        let mut batch = Batch::default();
        let mut reads: HashSet<ComponentName> = HashSet::new();
        let mut writes: HashSet<ComponentName> = HashSet::new();
        let mut carried: Vec<usize> = Vec::new();

        for &candidate in &ready {
            let table = descriptors[candidate].access();
            let conflict = table.iter().any(|(name, access)| {
                writes.contains(name) || (access == Access::ReadWrite && reads.contains(name))
            });

            if conflict {
                carried.push(candidate);
                continue;
            }

            for (name, access) in table.iter() {
                match access {
                    Access::ReadOnly => reads.insert(name),
                    Access::ReadWrite => writes.insert(name),
                };
            }
            batch.systems.push(candidate);
        }

        if batch.systems.is_empty() {
            let pending: Vec<&'static str> =
                carried.iter().map(|&index| names[index]).collect();
            let error = ScheduleError::Deadlock { pending };
            log::error!("{}", error);
            errors.push(error);
            break;
        }

        // Unlock successors of everything admitted; newly ready systems queue
        // after the carried-over rejects, in group order.
        let mut unlocked: Vec<usize> = Vec::new();
        for &admitted in &batch.systems {
            placed.insert(admitted);
            for &successor in &successors[admitted] {
                in_degree[successor] -= 1;
                if in_degree[successor] == 0 {
                    unlocked.push(successor);
                }
            }
        }
        unlocked.sort_by_key(|&index| descriptors[index].group());

        ready = carried;
        ready.extend(unlocked);
        batches.push(batch);
    }

    SchedulePlan {
        batches,
        names,
        errors,
    }
}

/// Deduplicated directed adjacency with in-degree counts.
struct Adjacency {
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
    edges: HashSet<(usize, usize)>,
}

impl Adjacency {
    fn new(count: usize) -> Self {
        Self {
            successors: vec![Vec::new(); count],
            in_degree: vec![0; count],
            edges: HashSet::new(),
        }
    }

    /// Records "`from` must complete before `to`". Duplicate edges are
    /// ignored so in-degrees stay exact.
    fn add_edge(&mut self, from: usize, to: usize) {
        if self.edges.insert((from, to)) {
            self.successors[from].push(to);
            self.in_degree[to] += 1;
        }
    }
}
