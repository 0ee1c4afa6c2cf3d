// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values produced by node updates.

use crate::port::PortType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single evenly sampled series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Display label
    pub label: String,
    /// Free-form tags (host, region, ...)
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Timestamp of the first sample, epoch milliseconds
    pub start_ms: i64,
    /// Sample spacing in milliseconds
    pub step_ms: i64,
    /// Sample values
    pub values: Vec<f64>,
}

impl Series {
    /// Create an untagged series
    pub fn new(label: impl Into<String>, start_ms: i64, step_ms: i64, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            tags: BTreeMap::new(),
            start_ms,
            step_ms,
            values,
        }
    }

    /// Timestamp of the sample at `index`, `None` when it does not fit in an `i64`
    pub fn timestamp(&self, index: usize) -> Option<i64> {
        let index = i64::try_from(index).ok()?;
        self.step_ms
            .checked_mul(index)
            .and_then(|offset| self.start_ms.checked_add(offset))
    }

    /// Timestamp one step past the last sample
    pub fn end_ms(&self) -> Option<i64> {
        self.timestamp(self.values.len())
    }

    /// Latest sample, if any
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// Tabular data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataFrame {
    /// Column names
    pub columns: Vec<String>,
    /// Row values, one entry per column
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Chart specification handed to a renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Chart title
    pub title: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Plotted series
    pub series: Vec<Series>,
}

/// Half-open time window `[start_ms, end_ms)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Window start, epoch milliseconds
    pub start_ms: i64,
    /// Window end, epoch milliseconds
    pub end_ms: i64,
    /// Preferred resolution in milliseconds
    pub step_ms: i64,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start_ms: 0,
            end_ms: i64::MAX,
            step_ms: 60_000,
        }
    }
}

impl TimeRange {
    /// Whether `timestamp` falls inside the window
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start_ms && timestamp < self.end_ms
    }
}

/// Comparison used by an alert rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    /// Fires when the value is above the threshold
    Above,
    /// Fires when the value is below the threshold
    Below,
}

/// Threshold alert rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule name
    pub name: String,
    /// Threshold value
    pub threshold: f64,
    /// Comparison against the threshold
    pub comparison: Comparison,
}

impl AlertRule {
    /// Whether `value` trips this rule
    pub fn fires(&self, value: f64) -> bool {
        match self.comparison {
            Comparison::Above => value > self.threshold,
            Comparison::Below => value < self.threshold,
        }
    }
}

/// Data written by a node for its downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputPayload {
    /// Time series
    TimeSeries(Vec<Series>),
    /// Tabular data
    DataFrame(DataFrame),
    /// Chart specification
    Chart(ChartSpec),
    /// Query text
    Query(String),
    /// Free-form metadata
    Metadata(serde_json::Value),
    /// Time window
    TimeRange(TimeRange),
    /// Alerting rule
    AlertRule(AlertRule),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Text
    Text(String),
}

impl OutputPayload {
    /// Get the port type for this payload
    pub fn port_type(&self) -> PortType {
        match self {
            Self::TimeSeries(_) => PortType::TimeSeries,
            Self::DataFrame(_) => PortType::DataFrame,
            Self::Chart(_) => PortType::Chart,
            Self::Query(_) => PortType::Query,
            Self::Metadata(_) => PortType::Metadata,
            Self::TimeRange(_) => PortType::TimeRange,
            Self::AlertRule(_) => PortType::AlertRule,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Text(_) => PortType::Text,
        }
    }

    /// Series, if this is a time series payload
    pub fn as_time_series(&self) -> Option<&[Series]> {
        match self {
            Self::TimeSeries(series) => Some(series),
            _ => None,
        }
    }

    /// Time window, if this is a time range payload
    pub fn as_time_range(&self) -> Option<TimeRange> {
        match self {
            Self::TimeRange(range) => Some(*range),
            _ => None,
        }
    }

    /// Integer, if this is an int payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

/// Status information a node reports alongside its output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ResultPayload {
    /// Nothing to report
    #[default]
    Empty,
    /// Human readable status line
    Status(String),
    /// Structured metadata
    Metadata(serde_json::Value),
}
