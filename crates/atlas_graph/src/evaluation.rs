// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation: one pass over the execution order per refresh tick.

use crate::graph::GraphStore;
use crate::link::Link;
use crate::node::{NodeId, NodeKindId, NodeOutput, NodeUpdateError};
use crate::payload::{OutputPayload, ResultPayload};
use crate::schedule::{ExecutionOrder, SchedulerWarning};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// Per-graph outputs shared between nodes.
///
/// Each node reads its producers' entries during its update; the driver
/// replaces the node's own entries afterwards.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    /// Last data written by each node
    pub node_data: HashMap<NodeId, OutputPayload>,
    /// Last result written by each node
    pub node_result: HashMap<NodeId, ResultPayload>,
}

impl SharedState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Last data written by a node
    pub fn data(&self, node_id: NodeId) -> Option<&OutputPayload> {
        self.node_data.get(&node_id)
    }

    /// Last result written by a node
    pub fn result(&self, node_id: NodeId) -> Option<&ResultPayload> {
        self.node_result.get(&node_id)
    }

    /// Drop everything a node wrote
    pub fn evict(&mut self, node_id: NodeId) {
        self.node_data.remove(&node_id);
        self.node_result.remove(&node_id);
    }

    /// Drop entries of nodes that are no longer in `graph`
    pub fn retain_nodes(&mut self, graph: &GraphStore) {
        self.node_data.retain(|id, _| graph.contains_node(*id));
        self.node_result.retain(|id, _| graph.contains_node(*id));
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.node_data.clear();
        self.node_result.clear();
    }

    fn store(&mut self, node_id: NodeId, output: NodeOutput) {
        match output.data {
            Some(data) => {
                self.node_data.insert(node_id, data);
            }
            None => {
                self.node_data.remove(&node_id);
            }
        }
        self.node_result.insert(node_id, output.result);
    }
}

/// Everything a node sees during its update
pub struct UpdateContext<'a> {
    /// The node being updated
    pub node_id: NodeId,
    /// Its kind
    pub kind: &'a NodeKindId,
    /// Links terminating on this node, in creation order
    pub connections: &'a [&'a Link],
    /// Graph-level configuration, `Null` when unset
    pub graph_config: &'a serde_json::Value,
    /// Data written so far, by node
    pub node_data: &'a HashMap<NodeId, OutputPayload>,
    /// Results written so far, by node
    pub node_result: &'a HashMap<NodeId, ResultPayload>,
}

impl<'a> UpdateContext<'a> {
    /// The link bound to input `port`
    pub fn connection(&self, port: &str) -> Option<&'a Link> {
        self.connections
            .iter()
            .copied()
            .find(|link| link.destination.name == port)
    }

    /// Whether input `port` is linked
    pub fn is_connected(&self, port: &str) -> bool {
        self.connection(port).is_some()
    }

    /// Data of the producer linked to input `port`
    pub fn input(&self, port: &str) -> Option<&'a OutputPayload> {
        let link = self.connection(port)?;
        self.node_data.get(&link.source_node())
    }

    /// Result of the producer linked to input `port`
    pub fn input_result(&self, port: &str) -> Option<&'a ResultPayload> {
        let link = self.connection(port)?;
        self.node_result.get(&link.source_node())
    }

    /// Entry of the graph configuration at a JSON pointer such as
    /// `/chart_settings/width`
    pub fn config_value(&self, pointer: &str) -> Option<&'a serde_json::Value> {
        self.graph_config.pointer(pointer)
    }

    /// Data on input `port`, failing when absent
    pub fn require(&self, port: &str) -> Result<&'a OutputPayload, NodeUpdateError> {
        self.input(port)
            .ok_or_else(|| NodeUpdateError::MissingInput(port.to_string()))
    }
}

/// A node whose update failed during a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdateFailure {
    /// The node
    pub node_id: NodeId,
    /// Its kind
    pub kind: NodeKindId,
    /// What went wrong
    pub error: NodeUpdateError,
}

/// Outcome of one execution cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Nodes updated successfully, in order
    pub executed: Vec<NodeId>,
    /// Nodes whose update failed; their previous entries were kept
    pub failures: Vec<NodeUpdateFailure>,
    /// Scheduler warning carried by the order that was walked
    pub warning: Option<SchedulerWarning>,
}

impl CycleReport {
    /// Whether every node updated
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Walk `order` once, updating each node from its producers' latest data.
///
/// A failing node keeps its previous entries and never stops the cycle.
/// Ids in `order` that are not in `graph` are skipped.
pub fn run_cycle(order: &ExecutionOrder, graph: &mut GraphStore, state: &mut SharedState) -> CycleReport {
    let mut report = CycleReport {
        warning: order.warning().cloned(),
        ..CycleReport::default()
    };
    state.retain_nodes(graph);

    for node_id in order.iter() {
        let Some((kind, behavior, connections, graph_config)) = graph.update_view(node_id) else {
            tracing::debug!(node = %node_id, "skipping node missing from graph");
            continue;
        };

        let ctx = UpdateContext {
            node_id,
            kind,
            connections: &connections,
            graph_config,
            node_data: &state.node_data,
            node_result: &state.node_result,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| behavior.update(&ctx)))
            .unwrap_or_else(|payload| Err(NodeUpdateError::Panicked(panic_message(&*payload))));

        match outcome {
            Ok(output) => {
                state.store(node_id, output);
                report.executed.push(node_id);
            }
            Err(error) => {
                tracing::warn!(node = %node_id, kind = %kind, %error, "node update failed");
                report.failures.push(NodeUpdateFailure {
                    node_id,
                    kind: kind.clone(),
                    error,
                });
            }
        }
    }

    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
