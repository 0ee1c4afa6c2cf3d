// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node kinds.
//!
//! | Kind | Category | Inputs | Outputs |
//! |------|----------|--------|---------|
//! | `sample_series` | DataSource | | `Series` |
//! | `time_range` | DataSource | | `Range` |
//! | `int_value` | Utility | | `Value` |
//! | `range_filter` | Transform | `Series`, `Range` | `Series` |
//! | `line_chart` | Visualization | `Series`, `Width`, `Height` | `Chart` |
//! | `threshold_alert` | Alerting | `Series` | `Rule` |

mod alerting;
mod sources;
mod transform;
mod visualization;

pub use alerting::ThresholdAlertSettings;
pub use sources::{IntValueSettings, SampleSeriesSettings};
pub use transform::clip_series;
pub use visualization::{LineChartSettings, DEFAULT_CHART_HEIGHT, DEFAULT_CHART_WIDTH};

use crate::node::NodeRegistry;

/// Graph configuration installed by hosts that do not load one from a snapshot
pub fn default_graph_config() -> serde_json::Value {
    serde_json::json!({
        "chart_settings": { "width": 800, "height": 400 }
    })
}

/// Registry holding every built-in kind
pub fn builtin_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_builtins(&mut registry);
    registry
}

/// Add the built-in kinds to `registry`
pub fn register_builtins(registry: &mut NodeRegistry) {
    sources::register(registry);
    transform::register(registry);
    visualization::register(registry);
    alerting::register(registry);
}
