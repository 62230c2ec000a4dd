//! Validation of the workflow-builder step graph.
//!
//! The builder produces a set of steps and dependency edges. Validation turns that payload into
//! an [`ExecutionPlan`]: a topological order of the steps plus the parallel groups formed by
//! steps that share an identical set of dependencies.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::domain::{StepId, WorkflowStep};

/// Directed dependency: `to` may only proceed once `from` is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: StepId,
    pub to: StepId,
}

impl DependencyEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: StepId::new(from),
            to: StepId::new(to),
        }
    }
}

/// Payload emitted by the visual workflow builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub edges: Vec<DependencyEdge>,
}

impl WorkflowGraph {
    /// Build a graph whose edges come from each step's declared `depends_on`.
    pub fn from_declared_dependencies(steps: Vec<WorkflowStep>) -> Self {
        let edges = steps
            .iter()
            .flat_map(|step| {
                step.depends_on.iter().map(|dependency| DependencyEdge {
                    from: dependency.clone(),
                    to: step.id.clone(),
                })
            })
            .collect();
        Self { steps, edges }
    }

    pub fn validate(&self) -> Result<ExecutionPlan, GraphError> {
        validate_graph(&self.steps, &self.edges)
    }
}

/// Steps that share the same dependencies and may be approved in any relative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParallelGroup {
    pub id: String,
    pub depends_on: Vec<StepId>,
    pub steps: Vec<StepId>,
}

/// Validated ordering of a workflow graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    steps: Vec<WorkflowStep>,
    groups: Vec<ParallelGroup>,
}

impl ExecutionPlan {
    /// Steps in execution order, with dependencies, parallel groups and a dense order stamped.
    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn groups(&self) -> &[ParallelGroup] {
        &self.groups
    }

    pub fn order(&self) -> Vec<&StepId> {
        self.steps.iter().map(|step| &step.id).collect()
    }

    pub fn position(&self, step_id: &StepId) -> Option<usize> {
        self.steps.iter().position(|step| &step.id == step_id)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("workflow step '{0}' is defined more than once")]
    DuplicateStep(StepId),
    #[error("dependency references unknown workflow step '{0}'")]
    UnknownStep(StepId),
    #[error("entry and exit steps cannot depend on each other ('{from}' -> '{to}')")]
    MixedPhase { from: StepId, to: StepId },
    #[error("workflow graph is not acyclic: cycle detected involving steps [{}]", join_ids(.steps))]
    CycleDetected { steps: Vec<StepId> },
    #[error("workflow step '{0}' is not reachable from any start step")]
    DisconnectedStep(StepId),
}

fn join_ids(ids: &[StepId]) -> String {
    ids.iter()
        .map(StepId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a step graph and compute its execution plan.
///
/// Ready steps are ranked by their ordering hint; ties keep insertion order. Start steps are the
/// ones flagged `root`, or, when none is flagged, the first step without incoming edges.
pub fn validate_graph(
    steps: &[WorkflowStep],
    edges: &[DependencyEdge],
) -> Result<ExecutionPlan, GraphError> {
    let mut index: HashMap<&StepId, usize> = HashMap::with_capacity(steps.len());
    for (position, step) in steps.iter().enumerate() {
        if index.insert(&step.id, position).is_some() {
            return Err(GraphError::DuplicateStep(step.id.clone()));
        }
    }

    let resolve = |id: &StepId| {
        index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownStep(id.clone()))
    };

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    let mut predecessors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); steps.len()];
    for edge in edges {
        let from = resolve(&edge.from)?;
        let to = resolve(&edge.to)?;
        if steps[from].is_exit_step != steps[to].is_exit_step {
            return Err(GraphError::MixedPhase {
                from: edge.from.clone(),
                to: edge.to.clone(),
            });
        }
        if predecessors[to].insert(from) {
            successors[from].push(to);
        }
    }

    let sequence = topological_sequence(steps, &successors, &predecessors)?;
    ensure_reachable(steps, &successors, &predecessors, &sequence)?;

    let rank: Vec<usize> = {
        let mut rank = vec![0; steps.len()];
        for (slot, &position) in sequence.iter().enumerate() {
            rank[position] = slot;
        }
        rank
    };

    let groups = parallel_groups(steps, &predecessors, &sequence, &rank);
    let mut group_of: HashMap<usize, &ParallelGroup> = HashMap::new();
    for (group, members) in &groups {
        for &member in members {
            group_of.insert(member, group);
        }
    }

    let planned = sequence
        .iter()
        .enumerate()
        .map(|(slot, &position)| {
            let mut step = steps[position].clone();
            let mut dependencies: Vec<usize> = predecessors[position].iter().copied().collect();
            dependencies.sort_by_key(|&dependency| rank[dependency]);
            step.depends_on = dependencies
                .into_iter()
                .map(|dependency| steps[dependency].id.clone())
                .collect();
            if let Some(group) = group_of.get(&position) {
                if group.steps.len() > 1 {
                    step.parallel_group = Some(group.id.clone());
                }
            }
            step.order = slot as u32 + 1;
            step
        })
        .collect();

    Ok(ExecutionPlan {
        steps: planned,
        groups: groups.into_iter().map(|(group, _)| group).collect(),
    })
}

fn topological_sequence(
    steps: &[WorkflowStep],
    successors: &[Vec<usize>],
    predecessors: &[BTreeSet<usize>],
) -> Result<Vec<usize>, GraphError> {
    let mut in_degree: Vec<usize> = predecessors.iter().map(BTreeSet::len).collect();
    let mut ready: BinaryHeap<Reverse<(u32, usize)>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(position, _)| Reverse((steps[position].order, position)))
        .collect();

    let mut sequence = Vec::with_capacity(steps.len());
    while let Some(Reverse((_, position))) = ready.pop() {
        sequence.push(position);
        for &next in &successors[position] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse((steps[next].order, next)));
            }
        }
    }

    if sequence.len() < steps.len() {
        let mut cyclic: Vec<StepId> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree > 0)
            .map(|(position, _)| steps[position].id.clone())
            .collect();
        cyclic.sort();
        return Err(GraphError::CycleDetected { steps: cyclic });
    }

    Ok(sequence)
}

fn ensure_reachable(
    steps: &[WorkflowStep],
    successors: &[Vec<usize>],
    predecessors: &[BTreeSet<usize>],
    sequence: &[usize],
) -> Result<(), GraphError> {
    let mut starts: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, step)| step.root)
        .map(|(position, _)| position)
        .collect();
    if starts.is_empty() {
        starts.extend(predecessors.iter().position(BTreeSet::is_empty));
    }

    let mut reached = vec![false; steps.len()];
    let mut queue: VecDeque<usize> = starts.into_iter().collect();
    while let Some(position) = queue.pop_front() {
        if std::mem::replace(&mut reached[position], true) {
            continue;
        }
        queue.extend(successors[position].iter().copied());
    }

    match sequence.iter().find(|&&position| !reached[position]) {
        Some(&position) => Err(GraphError::DisconnectedStep(steps[position].id.clone())),
        None => Ok(()),
    }
}

fn parallel_groups(
    steps: &[WorkflowStep],
    predecessors: &[BTreeSet<usize>],
    sequence: &[usize],
    rank: &[usize],
) -> Vec<(ParallelGroup, Vec<usize>)> {
    let mut keyed: Vec<(&BTreeSet<usize>, Vec<usize>)> = Vec::new();
    for &position in sequence {
        let key = &predecessors[position];
        match keyed.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(position),
            None => keyed.push((key, vec![position])),
        }
    }

    keyed
        .into_iter()
        .enumerate()
        .map(|(slot, (dependencies, members))| {
            let declared = members
                .first()
                .and_then(|&first| steps[first].parallel_group.clone())
                .filter(|name| {
                    members
                        .iter()
                        .all(|&member| {
                            steps[member].parallel_group.as_deref() == Some(name.as_str())
                        })
                });
            let mut depends_on: Vec<usize> = dependencies.iter().copied().collect();
            depends_on.sort_by_key(|&dependency| rank[dependency]);
            let group = ParallelGroup {
                id: declared.unwrap_or_else(|| format!("group-{}", slot + 1)),
                depends_on: depends_on
                    .into_iter()
                    .map(|dependency| steps[dependency].id.clone())
                    .collect(),
                steps: members
                    .iter()
                    .map(|&member| steps[member].id.clone())
                    .collect(),
            };
            (group, members)
        })
        .collect()
}
