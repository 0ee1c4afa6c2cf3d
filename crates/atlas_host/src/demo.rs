// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo dashboard used when no snapshot is configured.

use crate::error::Result;
use atlas_graph::kinds::{
    IntValueSettings, LineChartSettings, SampleSeriesSettings, ThresholdAlertSettings,
};
use atlas_graph::payload::{AlertRule, Comparison, TimeRange};
use atlas_graph::{NodeId, NodeSettings, Session};
use serde::Serialize;

/// Build a sample dashboard in an empty session:
///
/// ```text
/// sample_series ──► range_filter ──► line_chart
/// time_range ─────┘        │          ▲
/// int_value ───────────────┼──────────┘ (Width)
///                          └──► threshold_alert
/// ```
pub fn build_demo_graph(session: &mut Session) -> Result<()> {
    let sample = SampleSeriesSettings::default();
    let window = sample
        .series
        .first()
        .and_then(|series| {
            Some(TimeRange {
                start_ms: series.timestamp(15)?,
                end_ms: series.timestamp(45)?,
                step_ms: series.step_ms,
            })
        })
        .unwrap_or_default();

    let source = session.add_node("sample_series")?;
    let range = session.add_node("time_range")?;
    let filter = session.add_node("range_filter")?;
    let width = session.add_node("int_value")?;
    let chart = session.add_node("line_chart")?;
    let alert = session.add_node("threshold_alert")?;

    configure(session, source, &sample)?;
    configure(session, range, &window)?;
    configure(session, width, &IntValueSettings { value: 960 })?;
    configure(
        session,
        chart,
        &LineChartSettings {
            title: "Sample load".to_string(),
            ..LineChartSettings::default()
        },
    )?;
    configure(
        session,
        alert,
        &ThresholdAlertSettings {
            rule: AlertRule {
                name: "sample_high".to_string(),
                threshold: 55.0,
                comparison: Comparison::Above,
            },
        },
    )?;

    session.connect(source, "Series", filter, "Series")?;
    session.connect(range, "Range", filter, "Range")?;
    session.connect(filter, "Series", chart, "Series")?;
    session.connect(width, "Value", chart, "Width")?;
    session.connect(filter, "Series", alert, "Series")?;

    tracing::info!(
        nodes = session.graph().node_count(),
        links = session.graph().link_count(),
        "demo graph built"
    );
    Ok(())
}

fn configure<T: Serialize>(session: &mut Session, node: NodeId, settings: &T) -> Result<()> {
    session.set_settings(node, &NodeSettings::from_json(settings)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_graph::kinds::{builtin_registry, default_graph_config};
    use atlas_graph::OutputPayload;
    use std::sync::Arc;

    #[test]
    fn test_demo_graph_runs_clean() {
        let mut session = Session::new(Arc::new(builtin_registry()));
        session.set_graph_config(default_graph_config());
        build_demo_graph(&mut session).unwrap();

        assert_eq!(session.graph().node_count(), 6);
        assert_eq!(session.graph().link_count(), 5);
        assert!(session.graph().order().warning().is_none());

        let report = session.tick();
        assert!(report.is_clean(), "{:?}", report.failures);
        assert_eq!(report.executed.len(), 6);

        let chart = session
            .graph()
            .nodes()
            .find(|n| n.kind().as_str() == "line_chart")
            .map(|n| n.id())
            .unwrap();
        let Some(OutputPayload::Chart(spec)) = session.state().data(chart) else {
            panic!("expected a chart");
        };
        assert_eq!(spec.width, 960);
        assert_eq!(spec.height, 400);
        assert_eq!(spec.series[0].values.len(), 30);
    }
}
