// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node kinds, node instances and the kind registry.

use crate::evaluation::UpdateContext;
use crate::payload::{OutputPayload, ResultPayload};
use crate::port::{PortDirection, PortRef, PortSpec};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a node instance.
///
/// Assigned by the graph store, monotonically increasing, never reused
/// within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a registered node kind
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKindId(pub String);

impl NodeKindId {
    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeKindId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeKindId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for NodeKindId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node kind category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Produces data from nothing (datasets, constants)
    DataSource,
    /// Reshapes upstream data
    Transform,
    /// Builds chart specifications
    Visualization,
    /// Evaluates alert rules
    Alerting,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Node kind definition: the fixed port layout shared by every instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeKind {
    /// Unique kind identifier
    pub id: NodeKindId,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Kind version, recorded in snapshots
    pub version: String,
    /// Input ports
    pub inputs: Vec<PortSpec>,
    /// Output ports
    pub outputs: Vec<PortSpec>,
}

impl NodeKind {
    /// Start a kind definition with no ports
    pub fn new(id: impl Into<NodeKindId>, name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: String::new(),
            version: "0.1.0".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add an input port
    pub fn with_input(mut self, port: PortSpec) -> Self {
        self.inputs.push(port);
        self
    }

    /// Add an output port
    pub fn with_output(mut self, port: PortSpec) -> Self {
        self.outputs.push(port);
        self
    }

    /// Find a declared port
    pub fn port(&self, direction: PortDirection, name: &str) -> Option<&PortSpec> {
        let ports = match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        };
        ports.iter().find(|p| p.name == name)
    }
}

/// Opaque per-node settings blob. Only the node kind knows its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeSettings(pub Vec<u8>);

impl NodeSettings {
    /// Encode a serializable value as JSON bytes
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, NodeUpdateError> {
        serde_json::to_vec(value)
            .map(Self)
            .map_err(|e| NodeUpdateError::Settings(e.to_string()))
    }

    /// Decode JSON bytes. Empty settings decode to `T::default()`.
    pub fn to_json<T: DeserializeOwned + Default>(&self) -> Result<T, NodeUpdateError> {
        if self.0.is_empty() {
            return Ok(T::default());
        }
        serde_json::from_slice(&self.0).map_err(|e| NodeUpdateError::Settings(e.to_string()))
    }

    /// Whether the blob is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a node update returns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeOutput {
    /// Data for downstream consumers; `None` clears the node's entry
    pub data: Option<OutputPayload>,
    /// Status/result information
    pub result: ResultPayload,
}

impl NodeOutput {
    /// Output with data and an empty result
    pub fn data(data: OutputPayload) -> Self {
        Self {
            data: Some(data),
            result: ResultPayload::Empty,
        }
    }

    /// Output with no data, only a result
    pub fn result(result: ResultPayload) -> Self {
        Self { data: None, result }
    }

    /// Attach a result
    pub fn with_result(mut self, result: ResultPayload) -> Self {
        self.result = result;
        self
    }
}

/// Error raised by a node's update or settings capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeUpdateError {
    /// A required input is not connected or has no upstream data yet
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Upstream data has the wrong shape
    #[error("Invalid input for '{port}': expected {expected}")]
    InvalidInput {
        /// Input port name
        port: String,
        /// Expected payload
        expected: String,
    },

    /// Settings could not be encoded or decoded
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// The update panicked
    #[error("Node panicked: {0}")]
    Panicked(String),

    /// Any other failure
    #[error("{0}")]
    Failed(String),
}

impl NodeUpdateError {
    /// Create a failure with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Per-node update capability supplied by a node kind.
///
/// One boxed instance exists per node, created by the kind's factory.
pub trait NodeBehavior: Send {
    /// Compute this node's output from its upstream producers
    fn update(&mut self, ctx: &UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError>;

    /// Current settings, for persistence
    fn settings(&self) -> NodeSettings {
        NodeSettings::default()
    }

    /// Restore settings produced by [`NodeBehavior::settings`]
    fn apply_settings(&mut self, _settings: &NodeSettings) -> Result<(), NodeUpdateError> {
        Ok(())
    }

    /// Called once when the node is deleted
    fn close(&mut self) {}
}

/// Update function signature accepted by [`NodeRegistry::register_fn`]
pub type UpdateFn =
    dyn Fn(&UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> + Send + Sync;

/// Factory producing a fresh behaviour per node
pub type BehaviorFactory = dyn Fn() -> Box<dyn NodeBehavior> + Send + Sync;

/// Stateless behaviour wrapping a shared update function
struct FnBehavior {
    update: Arc<UpdateFn>,
}

impl NodeBehavior for FnBehavior {
    fn update(&mut self, ctx: &UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> {
        (self.update)(ctx)
    }
}

/// A node instance in the graph.
///
/// Id, kind and ports are fixed at instantiation and only readable
/// afterwards.
pub struct NodeInstance {
    id: NodeId,
    kind: NodeKindId,
    inputs: Vec<PortRef>,
    outputs: Vec<PortRef>,
    behavior: Box<dyn NodeBehavior>,
}

impl NodeInstance {
    /// Unique instance ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Kind this node was built from
    pub fn kind(&self) -> &NodeKindId {
        &self.kind
    }

    /// Input ports in declaration order
    pub fn inputs(&self) -> &[PortRef] {
        &self.inputs
    }

    /// Output ports in declaration order
    pub fn outputs(&self) -> &[PortRef] {
        &self.outputs
    }

    /// Find an input port by name
    pub fn input(&self, name: &str) -> Option<&PortRef> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Find an output port by name
    pub fn output(&self, name: &str) -> Option<&PortRef> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Whether `port` is one of this node's ports
    pub fn has_port(&self, port: &PortRef) -> bool {
        port.node == self.id && self.ports().any(|p| p == port)
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &PortRef> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Settings reported by the node's behaviour
    pub fn settings(&self) -> NodeSettings {
        self.behavior.settings()
    }

    /// Restore settings on the node's behaviour
    pub fn apply_settings(&mut self, settings: &NodeSettings) -> Result<(), NodeUpdateError> {
        self.behavior.apply_settings(settings)
    }

    pub(crate) fn split_for_update(&mut self) -> (&NodeKindId, &mut dyn NodeBehavior) {
        (&self.kind, self.behavior.as_mut())
    }

    pub(crate) fn close(&mut self) {
        self.behavior.close();
    }
}

impl fmt::Debug for NodeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeInstance")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// A registered kind and its behaviour factory
struct RegistryEntry {
    kind: NodeKind,
    factory: Arc<BehaviorFactory>,
}

/// Registry of available node kinds
#[derive(Default)]
pub struct NodeRegistry {
    /// Registered kinds by ID, in registration order
    entries: IndexMap<NodeKindId, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node kind with a factory creating one behaviour per node.
    ///
    /// Registering an id twice replaces the earlier definition.
    pub fn register_kind<F>(&mut self, kind: NodeKind, factory: F)
    where
        F: Fn() -> Box<dyn NodeBehavior> + Send + Sync + 'static,
    {
        let id = kind.id.clone();
        let entry = RegistryEntry {
            kind,
            factory: Arc::new(factory),
        };
        if self.entries.insert(id.clone(), entry).is_some() {
            tracing::warn!(kind = %id, "node kind registered twice; keeping the latest definition");
        }
    }

    /// Register a stateless node kind from a plain update function
    pub fn register_fn<F>(&mut self, kind: NodeKind, update: F)
    where
        F: Fn(&UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> + Send + Sync + 'static,
    {
        let update: Arc<UpdateFn> = Arc::new(update);
        self.register_kind(kind, move || {
            Box::new(FnBehavior {
                update: Arc::clone(&update),
            })
        });
    }

    /// Get a kind by ID
    pub fn get(&self, id: &str) -> Option<&NodeKind> {
        self.entries.get(id).map(|e| &e.kind)
    }

    /// Whether a kind is registered
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Get all registered kinds
    pub fn kinds(&self) -> impl Iterator<Item = &NodeKind> {
        self.entries.values().map(|e| &e.kind)
    }

    /// Get kinds by category
    pub fn kinds_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeKind> {
        self.kinds().filter(move |k| k.category == category)
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no kinds are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build an inert node of `kind` carrying `id`.
    ///
    /// The node does nothing until a graph store owns it.
    pub fn instantiate(&self, kind: &str, id: NodeId) -> Option<NodeInstance> {
        let entry = self.entries.get(kind)?;
        Some(NodeInstance {
            id,
            kind: entry.kind.id.clone(),
            inputs: entry
                .kind
                .inputs
                .iter()
                .map(|spec| PortRef::from_spec(id, spec, PortDirection::Input))
                .collect(),
            outputs: entry
                .kind
                .outputs
                .iter()
                .map(|spec| PortRef::from_spec(id, spec, PortDirection::Output))
                .collect(),
            behavior: (entry.factory)(),
        })
    }
}
