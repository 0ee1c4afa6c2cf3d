// SPDX-License-Identifier: MIT OR Apache-2.0
//! A graph paired with the shared state its cycles write to.

use crate::evaluation::{self, CycleReport, SharedState};
use crate::graph::{GraphError, GraphStore};
use crate::link::{Link, LinkError, LinkId};
use crate::node::{NodeId, NodeInstance, NodeRegistry, NodeSettings};
use crate::port::PortRef;
use crate::snapshot::{GraphSnapshot, SnapshotError};
use std::sync::Arc;

/// Single owner of one graph and its shared state.
///
/// Topology mutations and cycles never interleave: every method takes
/// `&mut self`. Hosts driving a session from several threads wrap the whole
/// session in one mutex.
#[derive(Debug)]
pub struct Session {
    graph: GraphStore,
    state: SharedState,
    cycles: u64,
}

impl Session {
    /// Create an empty session
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            graph: GraphStore::new(registry),
            state: SharedState::new(),
            cycles: 0,
        }
    }

    /// The graph
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// The shared state written by the last cycles
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Number of cycles run so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Instantiate and add a node
    pub fn add_node(&mut self, kind: &str) -> Result<NodeId, GraphError> {
        self.graph.add_node(kind)
    }

    /// Remove a node, its links and everything it wrote
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<NodeInstance> {
        let removed = self.graph.remove_node(node_id);
        self.state.evict(node_id);
        removed
    }

    /// Link two ports
    pub fn try_add_link(&mut self, source: PortRef, destination: PortRef) -> Result<LinkId, LinkError> {
        self.graph.try_add_link(source, destination)
    }

    /// Link two ports by node and port name
    pub fn connect(
        &mut self,
        from_node: NodeId,
        output: &str,
        to_node: NodeId,
        input: &str,
    ) -> Result<LinkId, LinkError> {
        self.graph.connect(from_node, output, to_node, input)
    }

    /// Remove a link
    pub fn remove_link(&mut self, link_id: LinkId) -> Option<Link> {
        self.graph.remove_link(link_id)
    }

    /// Restore settings on a node
    pub fn set_settings(&mut self, node_id: NodeId, settings: &NodeSettings) -> Result<(), GraphError> {
        self.graph.set_settings(node_id, settings)
    }

    /// Graph-level configuration
    pub fn graph_config(&self) -> &serde_json::Value {
        self.graph.config()
    }

    /// Replace the graph-level configuration
    pub fn set_graph_config(&mut self, config: serde_json::Value) {
        self.graph.set_config(config);
    }

    /// Remove every node and forget all outputs
    pub fn clear(&mut self) {
        self.graph.clear();
        self.state.clear();
    }

    /// Run one cycle over the current execution order
    pub fn tick(&mut self) -> CycleReport {
        let order = self.graph.order().clone();
        let report = evaluation::run_cycle(&order, &mut self.graph, &mut self.state);
        self.cycles += 1;
        report
    }

    /// Describe the graph for persistence
    pub fn export_snapshot(&self) -> GraphSnapshot {
        self.graph.export_snapshot()
    }

    /// Replace the graph with a snapshot. On error nothing changes.
    pub fn import_snapshot(&mut self, snapshot: &GraphSnapshot) -> Result<(), SnapshotError> {
        self.graph.import_snapshot(snapshot)?;
        self.state.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::builtin_registry;
    use crate::payload::OutputPayload;

    fn demo() -> (Session, NodeId, NodeId) {
        let mut session = Session::new(Arc::new(builtin_registry()));
        let source = session.add_node("sample_series").unwrap();
        let chart = session.add_node("line_chart").unwrap();
        session.connect(source, "Series", chart, "Series").unwrap();
        (session, source, chart)
    }

    #[test]
    fn test_tick_counts_cycles() {
        let (mut session, _, chart) = demo();
        assert_eq!(session.cycles(), 0);
        session.tick();
        session.tick();
        assert_eq!(session.cycles(), 2);
        assert!(matches!(
            session.state().data(chart),
            Some(OutputPayload::Chart(_))
        ));
    }

    #[test]
    fn test_remove_node_evicts_state() {
        let (mut session, source, chart) = demo();
        session.tick();

        session.remove_node(source).unwrap();
        assert!(session.state().data(source).is_none());
        assert!(session.state().result(source).is_none());
        assert_eq!(session.graph().link_count(), 0);

        // The chart keeps its last chart until its next update
        assert!(session.state().data(chart).is_some());
        session.tick();
        assert!(session.state().data(chart).is_none());
    }

    #[test]
    fn test_import_resets_state() {
        let (mut session, _, chart) = demo();
        session.tick();
        let snapshot = session.export_snapshot();

        session.import_snapshot(&snapshot).unwrap();
        assert!(session.state().data(chart).is_none());
        assert_eq!(session.graph().node_count(), 2);

        session.tick();
        assert!(session.state().data(chart).is_some());
    }

    #[test]
    fn test_failed_import_keeps_state() {
        let (mut session, _, chart) = demo();
        session.tick();
        let mut snapshot = session.export_snapshot();
        snapshot.format_version = 99;

        assert!(session.import_snapshot(&snapshot).is_err());
        assert!(session.state().data(chart).is_some());
    }

    #[test]
    fn test_clear() {
        let (mut session, source, _) = demo();
        session.tick();
        session.clear();

        assert_eq!(session.graph().node_count(), 0);
        assert!(session.state().data(source).is_none());
        assert!(session.tick().executed.is_empty());
    }
}
