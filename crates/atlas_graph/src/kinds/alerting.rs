// SPDX-License-Identifier: MIT OR Apache-2.0
//! Alerting kinds.

use crate::evaluation::UpdateContext;
use crate::node::{
    NodeBehavior, NodeCategory, NodeKind, NodeOutput, NodeRegistry, NodeSettings, NodeUpdateError,
};
use crate::payload::{AlertRule, Comparison, OutputPayload, ResultPayload};
use crate::port::{PortSpec, PortType};
use serde::{Deserialize, Serialize};

/// Settings of a `threshold_alert` node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdAlertSettings {
    /// Rule evaluated against the latest sample of each series
    pub rule: AlertRule,
}

impl Default for ThresholdAlertSettings {
    fn default() -> Self {
        Self {
            rule: AlertRule {
                name: "threshold".to_string(),
                threshold: 0.0,
                comparison: Comparison::Above,
            },
        }
    }
}

#[derive(Default)]
struct ThresholdAlert {
    settings: ThresholdAlertSettings,
}

impl NodeBehavior for ThresholdAlert {
    fn update(&mut self, ctx: &UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> {
        let series = ctx
            .require("Series")?
            .as_time_series()
            .ok_or_else(|| NodeUpdateError::InvalidInput {
                port: "Series".to_string(),
                expected: "time series".to_string(),
            })?;

        let rule = &self.settings.rule;
        let firing: Vec<&str> = series
            .iter()
            .filter(|s| s.last().is_some_and(|v| rule.fires(v)))
            .map(|s| s.label.as_str())
            .collect();
        if !firing.is_empty() {
            tracing::info!(rule = %rule.name, series = ?firing, "alert firing");
        }

        Ok(NodeOutput::data(OutputPayload::AlertRule(rule.clone())).with_result(
            ResultPayload::Metadata(serde_json::json!({
                "rule": rule.name,
                "firing": firing,
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
}

/// Register the alerting kinds
pub fn register(registry: &mut NodeRegistry) {
    registry.register_kind(
        NodeKind::new("threshold_alert", "Threshold Alert", NodeCategory::Alerting)
            .with_description("Checks the latest sample of each series against a threshold")
            .with_input(PortSpec::new("Series", PortType::TimeSeries))
            .with_output(PortSpec::new("Rule", PortType::AlertRule)),
        || Box::new(ThresholdAlert::default()),
    );
}
