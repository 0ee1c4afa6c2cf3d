// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transform kinds.

use crate::evaluation::UpdateContext;
use crate::node::{NodeCategory, NodeKind, NodeOutput, NodeRegistry, NodeUpdateError};
use crate::payload::{OutputPayload, ResultPayload, Series, TimeRange};
use crate::port::{PortSpec, PortType};

/// Keep the samples of `series` that fall inside `range`.
///
/// Samples whose timestamp overflows an `i64` are dropped.
pub fn clip_series(series: &Series, range: &TimeRange) -> Series {
    let mut clipped = Series {
        values: Vec::new(),
        ..series.clone()
    };
    if series.step_ms <= 0 {
        return clipped;
    }

    let kept: Vec<(i64, f64)> = series
        .values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let ts = series.timestamp(i)?;
            range.contains(ts).then_some((ts, *v))
        })
        .collect();
    if let Some((first, _)) = kept.first() {
        clipped.start_ms = *first;
    }
    clipped.values = kept.into_iter().map(|(_, v)| v).collect();
    clipped
}

fn range_filter(ctx: &UpdateContext<'_>) -> Result<NodeOutput, NodeUpdateError> {
    let series = ctx
        .require("Series")?
        .as_time_series()
        .ok_or_else(|| NodeUpdateError::InvalidInput {
            port: "Series".to_string(),
            expected: "time series".to_string(),
        })?;

    let Some(range) = ctx.input("Range").and_then(OutputPayload::as_time_range) else {
        return Ok(NodeOutput::data(OutputPayload::TimeSeries(series.to_vec()))
            .with_result(ResultPayload::Status("no range connected; passing through".into())));
    };

    let clipped: Vec<Series> = series.iter().map(|s| clip_series(s, &range)).collect();
    let data_points: usize = clipped.iter().map(|s| s.values.len()).sum();
    Ok(NodeOutput::data(OutputPayload::TimeSeries(clipped)).with_result(
        ResultPayload::Metadata(serde_json::json!({
            "start_ms": range.start_ms,
            "end_ms": range.end_ms,
            "data_points": data_points,
        })),
    ))
}

/// Register the transform kinds
pub fn register(registry: &mut NodeRegistry) {
    registry.register_fn(
        NodeKind::new("range_filter", "Range Filter", NodeCategory::Transform)
            .with_description("Clips each series to a time window")
            .with_input(PortSpec::new("Series", PortType::TimeSeries))
            .with_input(PortSpec::new("Range", PortType::TimeRange))
            .with_output(PortSpec::new("Series", PortType::TimeSeries)),
        range_filter,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_series() {
        let series = Series::new("cpu", 0, 10, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let range = TimeRange {
            start_ms: 10,
            end_ms: 40,
            step_ms: 10,
        };
        let clipped = clip_series(&series, &range);
        assert_eq!(clipped.start_ms, 10);
        assert_eq!(clipped.values, vec![2.0, 3.0, 4.0]);
        assert_eq!(clipped.label, "cpu");
    }

    #[test]
    fn test_clip_outside_range() {
        let series = Series::new("cpu", 0, 10, vec![1.0, 2.0]);
        let range = TimeRange {
            start_ms: 100,
            end_ms: 200,
            step_ms: 10,
        };
        assert!(clip_series(&series, &range).values.is_empty());
    }

    #[test]
    fn test_clip_skips_overflowing_samples() {
        let series = Series::new("cpu", i64::MAX - 100, 60, vec![1.0, 2.0, 3.0, 4.0]);
        let range = TimeRange {
            start_ms: i64::MAX - 150,
            end_ms: i64::MAX,
            step_ms: 60,
        };
        let clipped = clip_series(&series, &range);
        assert_eq!(clipped.start_ms, i64::MAX - 100);
        assert_eq!(clipped.values, vec![1.0, 2.0]);
    }
}
