// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port (consumes data)
    Input,
    /// Output port (produces data)
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("Input"),
            Self::Output => f.write_str("Output"),
        }
    }
}

/// Data kind that can flow through ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// One or more labelled time series
    TimeSeries,
    /// Tabular data
    DataFrame,
    /// Chart specification
    Chart,
    /// Query text
    Query,
    /// Free-form metadata
    Metadata,
    /// Time window
    TimeRange,
    /// Alerting rule
    AlertRule,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// Text value
    Text,
}

impl PortType {
    /// All port types, in declaration order
    pub const ALL: [PortType; 10] = [
        Self::TimeSeries,
        Self::DataFrame,
        Self::Chart,
        Self::Query,
        Self::Metadata,
        Self::TimeRange,
        Self::AlertRule,
        Self::Int,
        Self::Float,
        Self::Text,
    ];

    /// Stable name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeSeries => "TimeSeries",
            Self::DataFrame => "DataFrame",
            Self::Chart => "Chart",
            Self::Query => "Query",
            Self::Metadata => "Metadata",
            Self::TimeRange => "TimeRange",
            Self::AlertRule => "AlertRule",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Text => "Text",
        }
    }

    /// Check if this type can be linked to another type.
    ///
    /// There are no implicit conversions: only identical tags link.
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        self == other
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port declared by a node kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Port name, unique per direction within a kind
    pub name: String,
    /// Data type
    pub port_type: PortType,
}

impl PortSpec {
    /// Create a new port spec
    pub fn new(name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
        }
    }
}

/// Addressable endpoint of a link: a named, typed, directed port on a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Owning node
    pub node: NodeId,
    /// Data type
    pub port_type: PortType,
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
}

impl PortRef {
    /// Create a new input port reference
    pub fn input(node: NodeId, name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            node,
            port_type,
            name: name.into(),
            direction: PortDirection::Input,
        }
    }

    /// Create a new output port reference
    pub fn output(node: NodeId, name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            node,
            port_type,
            name: name.into(),
            direction: PortDirection::Output,
        }
    }

    /// Build a reference to a declared port on a node
    pub fn from_spec(node: NodeId, spec: &PortSpec, direction: PortDirection) -> Self {
        Self {
            node,
            port_type: spec.port_type,
            name: spec.name.clone(),
            direction,
        }
    }

    /// Whether this is an input port
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Whether this is an output port
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.node, self.port_type, self.name, self.direction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_equal_types_connect() {
        for a in PortType::ALL {
            for b in PortType::ALL {
                assert_eq!(a.can_connect_to(&b), a == b, "{a} -> {b}");
            }
        }
    }

    #[test]
    fn test_port_ref_display() {
        let port = PortRef::output(NodeId(3), "Series", PortType::TimeSeries);
        assert_eq!(port.to_string(), "3:TimeSeries:Series:Output");
        assert!(port.is_output());
        assert!(!port.is_input());
    }
}
