//! Definition validation and execution-plan building. Run this before
//! executing a workflow.
//!
//! Rules enforced:
//! 1. Run limits are sane (finite, non-negative budget; non-zero timeout).
//! 2. Node keys are unique and do not shadow the `trigger` / `env` roots.
//! 3. Every node type is known and its config parses into the typed config.
//! 4. At most one trigger node.
//! 5. Every `next` pointer, jump target and the output node exist.
//! 6. The successor/jump graph is acyclic (Kahn's algorithm).
//!
//! Traversal is an explicit graph: each node has one successor (its `next`
//! pointer, else the following non-trigger node in definition order) and
//! condition nodes add jump edges.

use std::collections::{HashMap, HashSet, VecDeque};

use nodes::{NodeConfig, NodeKind};

use crate::{EngineError, WorkflowDefinition};

const RESERVED_KEYS: [&str; 2] = ["trigger", "env"];

/// A validated node with its typed config and resolved successor.
#[derive(Debug, Clone)]
pub struct PlannedNode {
    pub key: String,
    pub kind: NodeKind,
    pub config: NodeConfig,
    pub critical: bool,
    /// Index of the default next node; `None` ends the traversal.
    pub successor: Option<usize>,
}

/// The validated, typed form of a definition.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub nodes: Vec<PlannedNode>,
    /// Index of the trigger node, if any.
    pub trigger: Option<usize>,
    /// First node dispatched after the trigger.
    pub entry: Option<usize>,
    index: HashMap<String, usize>,
}

impl ExecutionPlan {
    pub fn index_of(&self, node_key: &str) -> Option<usize> {
        self.index.get(node_key).copied()
    }

    /// Node keys along the default path: trigger, then successors from the
    /// entry, ignoring condition jumps.
    pub fn default_path(&self) -> Vec<&str> {
        let mut path: Vec<&str> =
            self.trigger.iter().map(|&i| self.nodes[i].key.as_str()).collect();
        let mut seen = HashSet::new();
        let mut cursor = self.entry;
        while let Some(i) = cursor {
            if !seen.insert(i) {
                break;
            }
            path.push(&self.nodes[i].key);
            cursor = self.nodes[i].successor;
        }
        path
    }
}

/// Validate the definition and build its execution plan.
///
/// # Errors
/// Any [`EngineError`] variant except `MissingExecutor`.
pub fn build_plan(def: &WorkflowDefinition) -> Result<ExecutionPlan, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Run limits
    // -----------------------------------------------------------------------
    if !def.max_cost_per_run.is_finite() || def.max_cost_per_run < 0.0 {
        return Err(EngineError::InvalidLimits(format!(
            "max_cost_per_run must be a non-negative number, got {}",
            def.max_cost_per_run
        )));
    }
    if def.timeout_seconds == 0 {
        return Err(EngineError::InvalidLimits("timeout_seconds must be greater than zero".into()));
    }

    // -----------------------------------------------------------------------
    // 2-4. Keys, types, configs, trigger count
    // -----------------------------------------------------------------------
    let mut index: HashMap<String, usize> = HashMap::with_capacity(def.nodes.len());
    let mut planned: Vec<PlannedNode> = Vec::with_capacity(def.nodes.len());
    let mut trigger: Option<usize> = None;

    for (i, node) in def.nodes.iter().enumerate() {
        if index.insert(node.node_key.clone(), i).is_some() {
            return Err(EngineError::DuplicateNodeKey(node.node_key.clone()));
        }

        let kind: NodeKind = node.node_type.parse().map_err(|_| EngineError::UnknownNodeType {
            node_key: node.node_key.clone(),
            node_type: node.node_type.clone(),
        })?;

        if kind != NodeKind::Trigger && RESERVED_KEYS.contains(&node.node_key.as_str()) {
            return Err(EngineError::ReservedNodeKey(node.node_key.clone()));
        }

        if kind == NodeKind::Trigger {
            if let Some(first) = trigger {
                return Err(EngineError::MultipleTriggers {
                    first: def.nodes[first].node_key.clone(),
                    second: node.node_key.clone(),
                });
            }
            trigger = Some(i);
        }

        let config =
            NodeConfig::parse(kind, &node.config).map_err(|e| EngineError::InvalidNodeConfig {
                node_key: node.node_key.clone(),
                message: e.to_string(),
            })?;

        planned.push(PlannedNode {
            key: node.node_key.clone(),
            kind,
            config,
            critical: node.critical,
            successor: None,
        });
    }

    // -----------------------------------------------------------------------
    // 5. References
    // -----------------------------------------------------------------------
    let target = |key: &str, referenced_by: &str| -> Result<usize, EngineError> {
        let i = *index.get(key).ok_or_else(|| EngineError::UnknownNodeReference {
            node_key: key.to_owned(),
            referenced_by: referenced_by.to_owned(),
        })?;
        if Some(i) == trigger {
            return Err(EngineError::InvalidNodeConfig {
                node_key: referenced_by.to_owned(),
                message: format!("cannot route to trigger node '{key}'"),
            });
        }
        Ok(i)
    };

    let next_in_order = |from: usize| (from + 1..def.nodes.len()).find(|&j| Some(j) != trigger);

    for (i, node) in def.nodes.iter().enumerate() {
        if Some(i) == trigger {
            continue;
        }
        planned[i].successor = match &node.next {
            Some(next) => Some(target(next, &node.node_key)?),
            None => next_in_order(i),
        };
        for jump in planned[i].config.jump_targets() {
            target(jump, &node.node_key)?;
        }
    }

    let entry = match trigger.and_then(|t| def.nodes[t].next.as_deref().map(|next| (t, next))) {
        Some((t, next)) => Some(target(next, &def.nodes[t].node_key)?),
        None => (0..def.nodes.len()).find(|&j| Some(j) != trigger),
    };

    if let Some(output) = &def.output_node {
        if !index.contains_key(output) {
            return Err(EngineError::UnknownNodeReference {
                node_key: output.clone(),
                referenced_by: "output_node".into(),
            });
        }
    }

    // -----------------------------------------------------------------------
    // 6. Cycle check (Kahn's algorithm over successor + jump edges)
    // -----------------------------------------------------------------------
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); planned.len()];
    let mut in_degree: Vec<usize> = vec![0; planned.len()];

    for (i, node) in planned.iter().enumerate() {
        let jumps = node.config.jump_targets().into_iter().filter_map(|k| index.get(k).copied());
        for to in node.successor.into_iter().chain(jumps) {
            adjacency[i].push(to);
            in_degree[to] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..planned.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut visited = 0usize;

    while let Some(i) = queue.pop_front() {
        visited += 1;
        for &to in &adjacency[i] {
            in_degree[to] -= 1;
            if in_degree[to] == 0 {
                queue.push_back(to);
            }
        }
    }

    // If we didn't visit every node the graph contains a cycle.
    if visited != planned.len() {
        let culprit = (0..planned.len())
            .find(|&i| in_degree[i] > 0)
            .map(|i| planned[i].key.clone())
            .unwrap_or_default();
        return Err(EngineError::CycleDetected(culprit));
    }

    Ok(ExecutionPlan { nodes: planned, trigger, entry, index })
}
