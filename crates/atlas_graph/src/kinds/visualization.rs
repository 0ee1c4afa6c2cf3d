// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visualization kinds.

use crate::evaluation::UpdateContext;
use crate::node::{
    NodeBehavior, NodeCategory, NodeKind, NodeOutput, NodeRegistry, NodeSettings, NodeUpdateError,
};
use crate::payload::{ChartSpec, OutputPayload, ResultPayload};
use crate::port::{PortSpec, PortType};
use serde::{Deserialize, Serialize};

/// Width used when neither an input, the settings nor the graph config give one
pub const DEFAULT_CHART_WIDTH: u32 = 640;
/// Height used when neither an input, the settings nor the graph config give one
pub const DEFAULT_CHART_HEIGHT: u32 = 320;

/// Settings of a `line_chart` node.
///
/// Each dimension resolves from the linked input first, then these settings,
/// then `/chart_settings/{width,height}` in the graph config, then the
/// built-in default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineChartSettings {
    /// Chart title
    pub title: String,
    /// Width used when the `Width` input is not linked
    pub width: Option<u32>,
    /// Height used when the `Height` input is not linked
    pub height: Option<u32>,
}

impl Default for LineChartSettings {
    fn default() -> Self {
        Self {
            title: "Line Chart".to_string(),
            width: None,
            height: None,
        }
    }
}

#[derive(Default)]
struct LineChart {
    settings: LineChartSettings,
}

impl LineChart {
    fn dimension(
        ctx: &UpdateContext<'_>,
        port: &str,
        configured: Option<u32>,
        config_pointer: &str,
        default: u32,
    ) -> Result<u32, NodeUpdateError> {
        if let Some(value) = ctx.input(port).and_then(OutputPayload::as_int) {
            return u32::try_from(value).map_err(|_| NodeUpdateError::InvalidInput {
                port: port.to_string(),
                expected: "non-negative integer".to_string(),
            });
        }
        // Config entries that are not unsigned 32-bit integers are ignored
        let from_config = || {
            ctx.config_value(config_pointer)
                .and_then(serde_json::Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
        };
        Ok(configured.or_else(from_config).unwrap_or(default))
    }
}

impl NodeBehavior for LineChart {
    fn update(&mut self, ctx: &UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> {
        let Some(series) = ctx.input("Series").and_then(OutputPayload::as_time_series) else {
            return Ok(NodeOutput::result(ResultPayload::Status(
                "waiting for time series input".to_string(),
            )));
        };

        let chart = ChartSpec {
            title: self.settings.title.clone(),
            width: Self::dimension(
                ctx,
                "Width",
                self.settings.width,
                "/chart_settings/width",
                DEFAULT_CHART_WIDTH,
            )?,
            height: Self::dimension(
                ctx,
                "Height",
                self.settings.height,
                "/chart_settings/height",
                DEFAULT_CHART_HEIGHT,
            )?,
            series: series.to_vec(),
        };
        let series_count = chart.series.len();
        Ok(NodeOutput::data(OutputPayload::Chart(chart)).with_result(ResultPayload::Metadata(
            serde_json::json!({ "chart_type": "line", "series_count": series_count }),
        )))
    }

    fn settings(&self) -> NodeSettings {
        NodeSettings::from_json(&self.settings).unwrap_or_default()
    }

    fn apply_settings(&mut self, settings: &NodeSettings) -> Result<(), NodeUpdateError> {
        self.settings = settings.to_json()?;
        Ok(())
    }
}

/// Register the visualization kinds
pub fn register(registry: &mut NodeRegistry) {
    registry.register_kind(
        NodeKind::new("line_chart", "Line Chart", NodeCategory::Visualization)
            .with_description("Builds a line chart from time series")
            .with_input(PortSpec::new("Series", PortType::TimeSeries))
            .with_input(PortSpec::new("Width", PortType::Int))
            .with_input(PortSpec::new("Height", PortType::Int))
            .with_output(PortSpec::new("Chart", PortType::Chart)),
        || Box::new(LineChart::default()),
    );
}
