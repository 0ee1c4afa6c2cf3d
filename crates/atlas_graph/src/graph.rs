// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph store: node instances, links and the current execution order.

use crate::link::{Link, LinkError, LinkId};
use crate::node::{
    NodeBehavior, NodeId, NodeInstance, NodeKindId, NodeRegistry, NodeSettings, NodeUpdateError,
};
use crate::port::{PortDirection, PortRef};
use crate::schedule::{self, ExecutionOrder};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Mutable node graph; single source of truth for topology.
///
/// Nodes are kept in declaration order and links in creation order. Both
/// orders feed the scheduler, so removals preserve the relative order of
/// what remains. The execution order is recomputed after every mutation.
pub struct GraphStore {
    registry: Arc<NodeRegistry>,
    /// Nodes in declaration order
    nodes: IndexMap<NodeId, NodeInstance>,
    /// Links in creation order
    links: IndexMap<LinkId, Link>,
    /// Links touching each node, in creation order
    links_by_node: HashMap<NodeId, Vec<LinkId>>,
    /// The single link terminating at each bound input
    bound_inputs: HashMap<PortRef, LinkId>,
    next_id: u64,
    order: ExecutionOrder,
    /// Graph-level configuration visible to every node
    config: serde_json::Value,
}

impl GraphStore {
    /// Create an empty graph that instantiates kinds from `registry`
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            links_by_node: HashMap::new(),
            bound_inputs: HashMap::new(),
            next_id: 1,
            order: ExecutionOrder::default(),
            config: serde_json::Value::Null,
        }
    }

    /// Registry this graph instantiates kinds from
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Instantiate a node of `kind` and add it to the graph
    pub fn add_node(&mut self, kind: &str) -> Result<NodeId, GraphError> {
        let id = NodeId(self.next_id);
        let node = self
            .registry
            .instantiate(kind, id)
            .ok_or_else(|| GraphError::UnknownKind(kind.to_string()))?;
        self.next_id += 1;
        tracing::debug!(node = %id, kind, "node added");
        self.nodes.insert(id, node);
        self.relinearize();
        Ok(id)
    }

    /// Remove a node, every link touching it, and call its close hook
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<NodeInstance> {
        let mut node = self.nodes.shift_remove(&node_id)?;
        let touching = self.links_by_node.remove(&node_id).unwrap_or_default();
        for link_id in touching {
            self.detach_link(link_id);
        }
        node.close();
        tracing::debug!(node = %node_id, kind = %node.kind(), "node removed");
        self.relinearize();
        Some(node)
    }

    /// Remove every node and link. Node ids keep increasing afterwards and
    /// the graph configuration is kept.
    pub fn clear(&mut self) {
        for node in self.nodes.values_mut() {
            node.close();
        }
        self.nodes.clear();
        self.links.clear();
        self.links_by_node.clear();
        self.bound_inputs.clear();
        tracing::debug!("graph cleared");
        self.relinearize();
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&NodeInstance> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInstance> {
        self.nodes.values()
    }

    /// Get all node IDs in declaration order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Whether a node exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Link `source` to `destination`.
    ///
    /// Cycles are accepted here; the scheduler reports them.
    pub fn try_add_link(
        &mut self,
        source: PortRef,
        destination: PortRef,
    ) -> Result<LinkId, LinkError> {
        Link::validate(&source, &destination)?;

        for port in [&source, &destination] {
            let exists = self
                .nodes
                .get(&port.node)
                .is_some_and(|node| node.has_port(port));
            if !exists {
                return Err(LinkError::UnknownPort {
                    node: port.node,
                    name: port.name.clone(),
                    direction: port.direction,
                });
            }
        }

        if let Some(existing) = self.bound_inputs.get(&destination) {
            return Err(LinkError::InputAlreadyBound {
                port: destination,
                existing: *existing,
            });
        }

        let link = Link {
            id: LinkId::new(),
            source,
            destination,
        };
        let id = link.id;
        tracing::debug!(source = %link.source, destination = %link.destination, "link added");
        self.attach_link(link);
        self.relinearize();
        Ok(id)
    }

    /// Link two ports by node and port name
    pub fn connect(
        &mut self,
        from_node: NodeId,
        output: &str,
        to_node: NodeId,
        input: &str,
    ) -> Result<LinkId, LinkError> {
        let source = self.resolve_port(from_node, PortDirection::Output, output)?;
        let destination = self.resolve_port(to_node, PortDirection::Input, input)?;
        self.try_add_link(source, destination)
    }

    /// Remove a link. Unknown ids are ignored.
    pub fn remove_link(&mut self, link_id: LinkId) -> Option<Link> {
        let link = self.detach_link(link_id)?;
        tracing::debug!(source = %link.source, destination = %link.destination, "link removed");
        self.relinearize();
        Some(link)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// Get all links in creation order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Links terminating on any input of `node_id`, in creation order
    pub fn links_into(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links_touching(node_id)
            .filter(move |link| link.destination_node() == node_id)
    }

    /// Links leaving an output port
    pub fn links_from<'a>(&'a self, port: &'a PortRef) -> impl Iterator<Item = &'a Link> {
        self.links_touching(port.node)
            .filter(move |link| link.source == *port)
    }

    /// The link bound to an input port, if any
    pub fn link_into(&self, port: &PortRef) -> Option<&Link> {
        self.bound_inputs
            .get(port)
            .and_then(|id| self.links.get(id))
    }

    /// Settings reported by a node
    pub fn settings(&self, node_id: NodeId) -> Option<NodeSettings> {
        self.nodes.get(&node_id).map(NodeInstance::settings)
    }

    /// Restore settings on a node
    pub fn set_settings(
        &mut self,
        node_id: NodeId,
        settings: &NodeSettings,
    ) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.apply_settings(settings)
            .map_err(|source| GraphError::Settings { node: node_id, source })
    }

    /// Graph-level configuration, `Null` when unset
    pub fn config(&self) -> &serde_json::Value {
        &self.config
    }

    /// Replace the graph-level configuration. Nodes see it from their next update.
    pub fn set_config(&mut self, config: serde_json::Value) {
        self.config = config;
    }

    /// Current execution order
    pub fn order(&self) -> &ExecutionOrder {
        &self.order
    }

    /// Highest id handed out so far, if any
    pub fn last_node_id(&self) -> Option<NodeId> {
        (self.next_id > 1).then(|| NodeId(self.next_id - 1))
    }

    /// Borrow everything a node update needs at once
    pub(crate) fn update_view(
        &mut self,
        node_id: NodeId,
    ) -> Option<(&NodeKindId, &mut dyn NodeBehavior, Vec<&Link>, &serde_json::Value)> {
        let node = self.nodes.get_mut(&node_id)?;
        let connections = self
            .links_by_node
            .get(&node_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.links.get(id))
                    .filter(|link| link.destination_node() == node_id)
                    .collect()
            })
            .unwrap_or_default();
        let (kind, behavior) = node.split_for_update();
        Some((kind, behavior, connections, &self.config))
    }

    /// Insert fully built nodes and links, replacing the current contents.
    ///
    /// Callers validate everything beforehand.
    pub(crate) fn replace_contents(&mut self, nodes: Vec<NodeInstance>, links: Vec<Link>) {
        for node in self.nodes.values_mut() {
            node.close();
        }
        self.nodes.clear();
        self.links.clear();
        self.links_by_node.clear();
        self.bound_inputs.clear();

        for node in nodes {
            self.next_id = self.next_id.max(node.id().0 + 1);
            self.nodes.insert(node.id(), node);
        }
        for link in links {
            self.attach_link(link);
        }
        self.relinearize();
    }

    fn resolve_port(
        &self,
        node_id: NodeId,
        direction: PortDirection,
        name: &str,
    ) -> Result<PortRef, LinkError> {
        self.nodes
            .get(&node_id)
            .and_then(|node| match direction {
                PortDirection::Input => node.input(name),
                PortDirection::Output => node.output(name),
            })
            .cloned()
            .ok_or_else(|| LinkError::UnknownPort {
                node: node_id,
                name: name.to_string(),
                direction,
            })
    }

    fn links_touching(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links_by_node
            .get(&node_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.links.get(id))
    }

    fn attach_link(&mut self, link: Link) {
        let id = link.id;
        self.bound_inputs.insert(link.destination.clone(), id);
        self.links_by_node
            .entry(link.source_node())
            .or_default()
            .push(id);
        if link.destination_node() != link.source_node() {
            self.links_by_node
                .entry(link.destination_node())
                .or_default()
                .push(id);
        }
        self.links.insert(id, link);
    }

    /// Remove a link from the link table and both indexes
    fn detach_link(&mut self, link_id: LinkId) -> Option<Link> {
        let link = self.links.shift_remove(&link_id)?;
        self.bound_inputs.remove(&link.destination);
        for node in [link.source_node(), link.destination_node()] {
            if let Some(ids) = self.links_by_node.get_mut(&node) {
                ids.retain(|id| *id != link_id);
            }
        }
        Some(link)
    }

    fn relinearize(&mut self) {
        let nodes: Vec<NodeId> = self.nodes.keys().copied().collect();
        self.order = schedule::linearize(&nodes, self.links.values());
    }
}

impl fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphStore")
            .field("nodes", &self.nodes.values().collect::<Vec<_>>())
            .field("links", &self.links.values().collect::<Vec<_>>())
            .field("order", &self.order)
            .field("config", &self.config)
            .finish()
    }
}

/// Error when mutating nodes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No kind with this id is registered
    #[error("Unknown node kind: {0}")]
    UnknownKind(String),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node rejected its settings
    #[error("Node {node} rejected its settings: {source}")]
    Settings {
        /// The node
        node: NodeId,
        /// Why the settings were rejected
        source: NodeUpdateError,
    },
}
