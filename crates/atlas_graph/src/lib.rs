// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow node graph engine.
//!
//! A graph holds node instances with typed input and output ports and
//! directed links between them. Every mutation recomputes an execution
//! order, and a driver walks that order once per refresh tick so each node
//! reads the latest outputs of its producers.
//!
//! ## Architecture
//!
//! - [`port`]: port types and references
//! - [`node`]: node kinds, behaviours and the registry
//! - [`link`]: link validation
//! - [`graph`]: the graph store and linker
//! - [`schedule`]: execution order linearization
//! - [`evaluation`]: shared state and the cycle driver
//! - [`session`]: a graph paired with its shared state
//! - [`snapshot`]: persistence
//! - [`kinds`]: built-in time-series node kinds

pub mod evaluation;
pub mod graph;
pub mod kinds;
pub mod link;
pub mod node;
pub mod payload;
pub mod port;
pub mod schedule;
pub mod session;
pub mod snapshot;

pub use evaluation::{run_cycle, CycleReport, NodeUpdateFailure, SharedState, UpdateContext};
pub use graph::{GraphError, GraphStore};
pub use link::{Link, LinkError, LinkId};
pub use node::{
    NodeBehavior, NodeCategory, NodeId, NodeInstance, NodeKind, NodeKindId, NodeOutput,
    NodeRegistry, NodeSettings, NodeUpdateError,
};
pub use payload::{OutputPayload, ResultPayload};
pub use port::{PortDirection, PortRef, PortSpec, PortType};
pub use schedule::{ExecutionOrder, SchedulerWarning};
pub use session::Session;
pub use snapshot::{GraphSnapshot, SnapshotError, SNAPSHOT_FORMAT_VERSION};
