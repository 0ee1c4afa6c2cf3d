// SPDX-License-Identifier: MIT OR Apache-2.0
//! Data source kinds: nodes with no inputs.

use crate::evaluation::UpdateContext;
use crate::node::{
    NodeBehavior, NodeCategory, NodeKind, NodeOutput, NodeRegistry, NodeSettings, NodeUpdateError,
};
use crate::payload::{OutputPayload, ResultPayload, Series, TimeRange};
use crate::port::{PortSpec, PortType};
use serde::{Deserialize, Serialize};

/// Start of the generated sample wave (2023-11-14T22:13:20Z)
const SAMPLE_START_MS: i64 = 1_700_000_000_000;
const SAMPLE_STEP_MS: i64 = 60_000;
const SAMPLE_POINTS: usize = 60;

/// Settings of a `sample_series` node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSeriesSettings {
    /// Series emitted on every update
    pub series: Vec<Series>,
}

impl Default for SampleSeriesSettings {
    fn default() -> Self {
        let values = (0..SAMPLE_POINTS)
            .map(|i| 50.0 + 10.0 * (i as f64 / 6.0).sin())
            .collect();
        let mut series = Series::new("sample", SAMPLE_START_MS, SAMPLE_STEP_MS, values);
        series.tags.insert("source".to_string(), "sample_series".to_string());
        Self {
            series: vec![series],
        }
    }
}

#[derive(Default)]
struct SampleSeries {
    settings: SampleSeriesSettings,
}

impl NodeBehavior for SampleSeries {
    fn update(&mut self, _ctx: &UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> {
        let series = &self.settings.series;
        let data_points: usize = series.iter().map(|s| s.values.len()).sum();
        Ok(NodeOutput::data(OutputPayload::TimeSeries(series.clone())).with_result(
            ResultPayload::Metadata(serde_json::json!({
                "status": "success",
                "series": series.len(),
                "data_points": data_points,
            })),
        ))
    }

    fn settings(&self) -> NodeSettings {
        NodeSettings::from_json(&self.settings).unwrap_or_default()
    }

    fn apply_settings(&mut self, settings: &NodeSettings) -> Result<(), NodeUpdateError> {
        self.settings = settings.to_json()?;
        Ok(())
    }

    fn close(&mut self) {
        self.settings.series.clear();
    }
}

#[derive(Default)]
struct TimeRangeSource {
    range: TimeRange,
}

impl NodeBehavior for TimeRangeSource {
    fn update(&mut self, _ctx: &UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> {
        if self.range.end_ms <= self.range.start_ms {
            return Err(NodeUpdateError::Settings(format!(
                "empty time range {}..{}",
                self.range.start_ms, self.range.end_ms
            )));
        }
        Ok(NodeOutput::data(OutputPayload::TimeRange(self.range)))
    }

    fn settings(&self) -> NodeSettings {
        NodeSettings::from_json(&self.range).unwrap_or_default()
    }

    fn apply_settings(&mut self, settings: &NodeSettings) -> Result<(), NodeUpdateError> {
        self.range = settings.to_json()?;
        Ok(())
    }
}

/// Settings of an `int_value` node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntValueSettings {
    /// Emitted value
    pub value: i64,
}

#[derive(Default)]
struct IntValue {
    settings: IntValueSettings,
}

impl NodeBehavior for IntValue {
    fn update(&mut self, _ctx: &UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> {
        Ok(NodeOutput::data(OutputPayload::Int(self.settings.value)))
    }

    fn settings(&self) -> NodeSettings {
        NodeSettings::from_json(&self.settings).unwrap_or_default()
    }

    fn apply_settings(&mut self, settings: &NodeSettings) -> Result<(), NodeUpdateError> {
        self.settings = settings.to_json()?;
        Ok(())
    }
}

/// Register the data source kinds
pub fn register(registry: &mut NodeRegistry) {
    registry.register_kind(
        NodeKind::new("sample_series", "Sample Series", NodeCategory::DataSource)
            .with_description("Emits the time series held in its settings")
            .with_output(PortSpec::new("Series", PortType::TimeSeries)),
        || Box::new(SampleSeries::default()),
    );

    registry.register_kind(
        NodeKind::new("time_range", "Time Range", NodeCategory::DataSource)
            .with_description("Emits a configured time window")
            .with_output(PortSpec::new("Range", PortType::TimeRange)),
        || Box::new(TimeRangeSource::default()),
    );

    registry.register_kind(
        NodeKind::new("int_value", "Integer", NodeCategory::Utility)
            .with_description("Constant integer value")
            .with_output(PortSpec::new("Value", PortType::Int)),
        || Box::new(IntValue::default()),
    );
}
