// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::{PortDirection, PortRef, PortType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub Uuid);

impl LinkId {
    /// Create a new random link ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

/// A directed edge from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Producing output port
    pub source: PortRef,
    /// Consuming input port
    pub destination: PortRef,
}

impl Link {
    /// Check a candidate source/destination pair against the port rules.
    ///
    /// Does not check that the ports exist or that the input is free.
    pub fn validate(source: &PortRef, destination: &PortRef) -> Result<(), LinkError> {
        if source.direction != PortDirection::Output
            || destination.direction != PortDirection::Input
        {
            return Err(LinkError::DirectionMismatch {
                from: source.direction,
                to: destination.direction,
            });
        }
        if !source.port_type.can_connect_to(&destination.port_type) {
            return Err(LinkError::TypeMismatch {
                from: source.port_type,
                to: destination.port_type,
            });
        }
        Ok(())
    }

    /// Producing node
    pub fn source_node(&self) -> NodeId {
        self.source.node
    }

    /// Consuming node
    pub fn destination_node(&self) -> NodeId {
        self.destination.node
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.source.node == node_id || self.destination.node == node_id
    }
}

/// Error when creating a link
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// Endpoints carry different data types
    #[error("Port type mismatch: {from} -> {to}")]
    TypeMismatch {
        /// Source port type
        from: PortType,
        /// Destination port type
        to: PortType,
    },

    /// Source is not an output or destination is not an input
    #[error("Port direction mismatch: {from} -> {to} (expected Output -> Input)")]
    DirectionMismatch {
        /// Source port direction
        from: PortDirection,
        /// Destination port direction
        to: PortDirection,
    },

    /// The destination input already has a producer
    #[error("Input already bound: {port} (by link {existing:?})")]
    InputAlreadyBound {
        /// The contested input
        port: PortRef,
        /// Link currently terminating there
        existing: LinkId,
    },

    /// An endpoint does not name a port on a live node
    #[error("Unknown {direction} port '{name}' on node {node}")]
    UnknownPort {
        /// Node the port was looked up on
        node: NodeId,
        /// Requested port name
        name: String,
        /// Requested direction
        direction: PortDirection,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_direction() {
        let a = PortRef::input(NodeId(1), "In", PortType::Int);
        let b = PortRef::input(NodeId(2), "In", PortType::Int);
        assert!(matches!(
            Link::validate(&a, &b),
            Err(LinkError::DirectionMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_type() {
        let a = PortRef::output(NodeId(1), "Out", PortType::TimeSeries);
        let b = PortRef::input(NodeId(2), "In", PortType::Metadata);
        assert_eq!(
            Link::validate(&a, &b),
            Err(LinkError::TypeMismatch {
                from: PortType::TimeSeries,
                to: PortType::Metadata,
            })
        );
    }

    #[test]
    fn test_involves_node() {
        let link = Link {
            id: LinkId::new(),
            source: PortRef::output(NodeId(1), "Out", PortType::Int),
            destination: PortRef::input(NodeId(2), "In", PortType::Int),
        };
        assert!(link.involves_node(NodeId(1)));
        assert!(link.involves_node(NodeId(2)));
        assert!(!link.involves_node(NodeId(3)));
        assert_eq!(link.source_node(), NodeId(1));
        assert_eq!(link.destination_node(), NodeId(2));
    }
}
