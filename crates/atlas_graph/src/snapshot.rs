// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapshot codec: graph topology plus per-node settings.

use crate::graph::GraphStore;
use crate::link::{Link, LinkError, LinkId};
use crate::node::{NodeId, NodeInstance, NodeKindId, NodeRegistry, NodeSettings, NodeUpdateError};
use crate::port::PortRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Current snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A node as stored in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Original node id, preserved on import
    pub id: NodeId,
    /// Kind to instantiate
    pub kind: NodeKindId,
    /// Kind version at save time
    #[serde(default)]
    pub version: String,
}

/// A link as stored in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Producing output port
    pub source: PortRef,
    /// Consuming input port
    pub destination: PortRef,
}

/// Serializable description of a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Format version
    pub format_version: u32,
    /// Nodes in declaration order
    pub nodes: Vec<NodeRecord>,
    /// Links in creation order
    pub links: Vec<LinkRecord>,
    /// Opaque settings per node
    #[serde(default)]
    pub per_node_settings: BTreeMap<NodeId, NodeSettings>,
    /// Graph-level configuration; absent in snapshots that predate it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_config: Option<serde_json::Value>,
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            nodes: Vec::new(),
            links: Vec::new(),
            per_node_settings: BTreeMap::new(),
            graph_config: None,
        }
    }
}

impl GraphSnapshot {
    /// Encode as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode as pretty-printed RON
    pub fn to_ron(&self) -> Result<String, SnapshotError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Decode from RON
    pub fn from_ron(ron_str: &str) -> Result<Self, SnapshotError> {
        Ok(ron::from_str(ron_str)?)
    }
}

impl GraphStore {
    /// Describe nodes, links, each node's settings and the graph configuration
    pub fn export_snapshot(&self) -> GraphSnapshot {
        let config = self.config();
        let mut snapshot = GraphSnapshot {
            graph_config: (!config.is_null()).then(|| config.clone()),
            ..GraphSnapshot::default()
        };
        for node in self.nodes() {
            let version = self
                .registry()
                .get(node.kind().as_str())
                .map(|kind| kind.version.clone())
                .unwrap_or_default();
            snapshot.nodes.push(NodeRecord {
                id: node.id(),
                kind: node.kind().clone(),
                version,
            });
            snapshot.per_node_settings.insert(node.id(), node.settings());
        }
        snapshot.links = self
            .links()
            .map(|link| LinkRecord {
                source: link.source.clone(),
                destination: link.destination.clone(),
            })
            .collect();
        snapshot
    }

    /// Replace the whole graph with `snapshot`.
    ///
    /// Nodes are rebuilt with their original ids, then settings applied, then
    /// links added, then the order is resolved once. Everything is validated
    /// before the graph is touched, so on error the graph is unchanged and
    /// every node staged so far is closed. The graph configuration is only
    /// replaced when the snapshot carries one.
    pub fn import_snapshot(&mut self, snapshot: &GraphSnapshot) -> Result<(), SnapshotError> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.format_version));
        }

        let mut staged = Vec::with_capacity(snapshot.nodes.len());
        let links = match stage_snapshot(self.registry(), snapshot, &mut staged) {
            Ok(links) => links,
            Err(e) => {
                for node in &mut staged {
                    node.close();
                }
                return Err(e);
            }
        };

        tracing::info!(
            nodes = staged.len(),
            links = links.len(),
            "snapshot imported"
        );
        self.replace_contents(staged, links);
        if let Some(config) = &snapshot.graph_config {
            self.set_config(config.clone());
        }
        Ok(())
    }
}

/// Instantiate nodes into `staged`, apply their settings and validate links
fn stage_snapshot(
    registry: &NodeRegistry,
    snapshot: &GraphSnapshot,
    staged: &mut Vec<NodeInstance>,
) -> Result<Vec<Link>, SnapshotError> {
    let mut index_of = HashMap::new();
    for record in &snapshot.nodes {
        if index_of.insert(record.id, staged.len()).is_some() {
            return Err(SnapshotError::DuplicateNode(record.id));
        }
        let unknown_kind = || SnapshotError::UnknownKind {
            node: record.id,
            kind: record.kind.clone(),
        };
        let kind = registry.get(record.kind.as_str()).ok_or_else(unknown_kind)?;
        if kind.version != record.version {
            tracing::warn!(
                node = %record.id,
                kind = %record.kind,
                saved = %record.version,
                current = %kind.version,
                "node kind version differs from snapshot"
            );
        }
        let node = registry
            .instantiate(record.kind.as_str(), record.id)
            .ok_or_else(unknown_kind)?;
        staged.push(node);
    }

    for (node_id, settings) in &snapshot.per_node_settings {
        let index = *index_of
            .get(node_id)
            .ok_or(SnapshotError::UnknownNode(*node_id))?;
        staged[index]
            .apply_settings(settings)
            .map_err(|source| SnapshotError::Settings {
                node: *node_id,
                source,
            })?;
    }

    let mut links = Vec::with_capacity(snapshot.links.len());
    let mut bound: HashMap<&PortRef, LinkId> = HashMap::new();
    for (index, record) in snapshot.links.iter().enumerate() {
        let link_error = |source: LinkError| SnapshotError::Link { index, source };
        Link::validate(&record.source, &record.destination).map_err(link_error)?;
        for port in [&record.source, &record.destination] {
            let exists = index_of
                .get(&port.node)
                .is_some_and(|&i| staged[i].has_port(port));
            if !exists {
                return Err(link_error(LinkError::UnknownPort {
                    node: port.node,
                    name: port.name.clone(),
                    direction: port.direction,
                }));
            }
        }
        let link = Link {
            id: LinkId::new(),
            source: record.source.clone(),
            destination: record.destination.clone(),
        };
        if let Some(existing) = bound.insert(&record.destination, link.id) {
            return Err(link_error(LinkError::InputAlreadyBound {
                port: record.destination.clone(),
                existing,
            }));
        }
        links.push(link);
    }
    Ok(links)
}

/// Error when importing or encoding a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Format version not understood
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    /// Two nodes share an id
    #[error("Duplicate node id in snapshot: {0}")]
    DuplicateNode(NodeId),

    /// A node names a kind that is not registered
    #[error("Node {node} uses unknown kind '{kind}'")]
    UnknownKind {
        /// The node
        node: NodeId,
        /// The missing kind
        kind: NodeKindId,
    },

    /// Settings reference a node that is not in the snapshot
    #[error("Settings reference unknown node {0}")]
    UnknownNode(NodeId),

    /// A link is invalid
    #[error("Invalid link #{index}: {source}")]
    Link {
        /// Position in the link list
        index: usize,
        /// Why the link was rejected
        source: LinkError,
    },

    /// A node rejected its settings
    #[error("Node {node} rejected its settings: {source}")]
    Settings {
        /// The node
        node: NodeId,
        /// Why the settings were rejected
        source: NodeUpdateError,
    },

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON encoding failed
    #[error("RON error: {0}")]
    RonEncode(#[from] ron::Error),

    /// RON decoding failed
    #[error("RON parse error: {0}")]
    RonDecode(#[from] ron::error::SpannedError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{builtin_registry, SampleSeriesSettings};
    use crate::payload::Series;
    use crate::evaluation::UpdateContext;
    use crate::node::{NodeBehavior, NodeCategory, NodeKind, NodeOutput};
    use crate::port::{PortSpec, PortType};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Tracked(Arc<AtomicUsize>);

    impl NodeBehavior for Tracked {
        fn update(&mut self, _ctx: &UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> {
            Ok(NodeOutput::default())
        }

        fn close(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked_graph(closed: &Arc<AtomicUsize>) -> GraphStore {
        let mut registry = builtin_registry();
        let counter = Arc::clone(closed);
        registry.register_kind(
            NodeKind::new("tracked", "Tracked", NodeCategory::DataSource)
                .with_output(PortSpec::new("Value", PortType::Int)),
            move || Box::new(Tracked(Arc::clone(&counter))),
        );
        GraphStore::new(Arc::new(registry))
    }

    fn tracked_record(id: u64) -> NodeRecord {
        NodeRecord {
            id: NodeId(id),
            kind: NodeKindId::from("tracked"),
            version: "0.1.0".to_string(),
        }
    }

    fn demo_graph() -> (GraphStore, NodeId, NodeId, NodeId) {
        let mut graph = GraphStore::new(Arc::new(builtin_registry()));
        let source = graph.add_node("sample_series").unwrap();
        let width = graph.add_node("int_value").unwrap();
        let chart = graph.add_node("line_chart").unwrap();
        graph.connect(source, "Series", chart, "Series").unwrap();
        graph.connect(width, "Value", chart, "Width").unwrap();
        let settings = NodeSettings::from_json(&SampleSeriesSettings {
            series: vec![Series::new("cpu", 0, 1_000, vec![1.0, 2.5, 4.0])],
        })
        .unwrap();
        graph.set_settings(source, &settings).unwrap();
        (graph, source, width, chart)
    }

    fn endpoints(graph: &GraphStore) -> Vec<(NodeId, String, NodeId, String)> {
        graph
            .links()
            .map(|l| {
                (
                    l.source.node,
                    l.source.name.clone(),
                    l.destination.node,
                    l.destination.name.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_roundtrip_into_empty_graph() {
        let (graph, source, _, chart) = demo_graph();
        let snapshot = graph.export_snapshot();
        assert_eq!(snapshot.nodes.len(), 3);
        assert_eq!(snapshot.links.len(), 2);

        let mut restored = GraphStore::new(Arc::clone(graph.registry()));
        restored.import_snapshot(&snapshot).unwrap();

        let kinds: Vec<_> = restored.nodes().map(|n| (n.id(), n.kind().clone())).collect();
        let original: Vec<_> = graph.nodes().map(|n| (n.id(), n.kind().clone())).collect();
        assert_eq!(kinds, original);
        assert_eq!(endpoints(&restored), endpoints(&graph));
        assert_eq!(restored.settings(source), graph.settings(source));
        assert_eq!(restored.order().nodes(), graph.order().nodes());
        assert!(restored.order().index_of(source) < restored.order().index_of(chart));
    }

    #[test]
    fn test_json_and_ron_codecs() {
        let (graph, ..) = demo_graph();
        let snapshot = graph.export_snapshot();

        let json = snapshot.to_json().unwrap();
        assert_eq!(GraphSnapshot::from_json(&json).unwrap(), snapshot);

        let ron_str = snapshot.to_ron().unwrap();
        assert_eq!(GraphSnapshot::from_ron(&ron_str).unwrap(), snapshot);
    }

    #[test]
    fn test_imported_ids_are_not_reused() {
        let (graph, ..) = demo_graph();
        let snapshot = graph.export_snapshot();
        let mut restored = GraphStore::new(Arc::clone(graph.registry()));
        restored.import_snapshot(&snapshot).unwrap();
        let fresh = restored.add_node("int_value").unwrap();
        assert!(snapshot.nodes.iter().all(|n| n.id < fresh));
    }

    #[test]
    fn test_unknown_kind_leaves_graph_unchanged() {
        let (mut graph, ..) = demo_graph();
        let before = endpoints(&graph);
        let mut snapshot = graph.export_snapshot();
        snapshot.nodes[1].kind = NodeKindId::from("does_not_exist");

        let err = graph.import_snapshot(&snapshot).unwrap_err();
        assert!(matches!(err, SnapshotError::UnknownKind { .. }));
        assert_eq!(graph.node_count(), 3);
        assert_eq!(endpoints(&graph), before);
    }

    #[test]
    fn test_duplicate_destination_rejected() {
        let (mut graph, source, _, chart) = demo_graph();
        let mut snapshot = graph.export_snapshot();
        snapshot.links.push(LinkRecord {
            source: PortRef::output(source, "Series", PortType::TimeSeries),
            destination: PortRef::input(chart, "Series", PortType::TimeSeries),
        });
        let err = graph.import_snapshot(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Link {
                index: 2,
                source: LinkError::InputAlreadyBound { .. }
            }
        ));
        assert_eq!(graph.link_count(), 2);
    }

    #[test]
    fn test_link_to_missing_node_rejected() {
        let (mut graph, source, ..) = demo_graph();
        let mut snapshot = graph.export_snapshot();
        snapshot.links.push(LinkRecord {
            source: PortRef::output(source, "Series", PortType::TimeSeries),
            destination: PortRef::input(NodeId(99), "Series", PortType::TimeSeries),
        });
        assert!(matches!(
            graph.import_snapshot(&snapshot),
            Err(SnapshotError::Link {
                source: LinkError::UnknownPort { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_bad_settings_rejected_atomically() {
        let (mut graph, source, ..) = demo_graph();
        let before = graph.settings(source);
        let mut snapshot = graph.export_snapshot();
        snapshot
            .per_node_settings
            .insert(source, NodeSettings(b"{not json".to_vec()));
        assert!(matches!(
            graph.import_snapshot(&snapshot),
            Err(SnapshotError::Settings { .. })
        ));
        assert_eq!(graph.settings(source), before);
    }

    #[test]
    fn test_unsupported_version() {
        let (mut graph, ..) = demo_graph();
        let mut snapshot = graph.export_snapshot();
        snapshot.format_version = 42;
        assert!(matches!(
            graph.import_snapshot(&snapshot),
            Err(SnapshotError::UnsupportedVersion(42))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            GraphSnapshot::from_json("{\"nodes\": 3}"),
            Err(SnapshotError::Json(_))
        ));
    }

    #[test]
    fn test_graph_config_roundtrip() {
        let (mut graph, ..) = demo_graph();
        let config = json!({
            "chart_settings": { "width": 800, "height": 400 },
            "theme": "dark"
        });
        graph.set_config(config.clone());
        let snapshot = graph.export_snapshot();
        assert_eq!(snapshot.graph_config.as_ref(), Some(&config));

        let json = snapshot.to_json().unwrap();
        assert_eq!(GraphSnapshot::from_json(&json).unwrap(), snapshot);
        let ron_str = snapshot.to_ron().unwrap();
        assert_eq!(GraphSnapshot::from_ron(&ron_str).unwrap(), snapshot);

        let mut restored = GraphStore::new(Arc::clone(graph.registry()));
        restored.import_snapshot(&snapshot).unwrap();
        assert_eq!(restored.config(), &config);
    }

    #[test]
    fn test_snapshot_without_config_keeps_current() {
        let (graph, ..) = demo_graph();
        let snapshot = graph.export_snapshot();
        assert!(snapshot.graph_config.is_none());
        assert!(!snapshot.to_json().unwrap().contains("graph_config"));

        let mut restored = GraphStore::new(Arc::clone(graph.registry()));
        restored.set_config(json!({ "theme": "light" }));
        restored.import_snapshot(&snapshot).unwrap();
        assert_eq!(restored.config(), &json!({ "theme": "light" }));
    }

    #[test]
    fn test_failed_import_closes_staged_nodes() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut graph = tracked_graph(&closed);

        let bad_link = GraphSnapshot {
            nodes: vec![tracked_record(1), tracked_record(2)],
            links: vec![LinkRecord {
                source: PortRef::output(NodeId(1), "Value", PortType::Int),
                destination: PortRef::input(NodeId(2), "Missing", PortType::Int),
            }],
            ..GraphSnapshot::default()
        };
        assert!(matches!(
            graph.import_snapshot(&bad_link),
            Err(SnapshotError::Link { index: 0, .. })
        ));
        assert_eq!(closed.load(Ordering::SeqCst), 2);

        let unknown_kind = GraphSnapshot {
            nodes: vec![
                tracked_record(1),
                NodeRecord {
                    id: NodeId(2),
                    kind: NodeKindId::from("does_not_exist"),
                    version: String::new(),
                },
            ],
            ..GraphSnapshot::default()
        };
        assert!(matches!(
            graph.import_snapshot(&unknown_kind),
            Err(SnapshotError::UnknownKind { .. })
        ));
        assert_eq!(closed.load(Ordering::SeqCst), 3);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_successful_import_closes_only_replaced_nodes() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut graph = tracked_graph(&closed);
        let snapshot = GraphSnapshot {
            nodes: vec![tracked_record(1)],
            ..GraphSnapshot::default()
        };
        graph.import_snapshot(&snapshot).unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        graph.import_snapshot(&snapshot).unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(graph.node_count(), 1);
    }
}
