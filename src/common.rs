use gstreamer as gst;

use crate::analysis::FrameReport;

/// Name of the element message carrying per-frame chart statistics.
pub const CHART_STATS_MESSAGE: &str = "markerdetect-chart-stats";

/// Builds the structure posted on the bus for an analyzed frame.
///
/// Returns `None` when the frame produced no statistics. The `result` field
/// holds the statistics as a JSON string:
///
/// ```json
/// {"white-reference": {"mean": {"b": 40.0, "g": 80.0, "r": 120.0}}}
/// ```
pub fn create_stats_message(
    timestamp: gst::ClockTime,
    report: &FrameReport,
) -> Option<Result<gst::Structure, serde_json::Error>> {
    let stats = report.stats()?;
    Some(serde_json::to_string(stats).map(|result| {
        gst::Structure::builder(CHART_STATS_MESSAGE)
            .field("timestamp", timestamp)
            .field("frame", report.frame)
            .field("mode", report.mode.as_str())
            .field("result", result)
            .build()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ChartStats, FrameOutcome};
    use crate::chart::ChartMode;
    use crate::colorspace::Bgr;

    fn report(outcome: FrameOutcome) -> FrameReport {
        FrameReport {
            frame: 7,
            mode: ChartMode::WhiteReference,
            anchors: None,
            outcome,
            texts: Vec::new(),
            invocations: Vec::new(),
        }
    }

    #[test]
    fn stats_message_carries_json_result() {
        gst::init().unwrap();
        let report = report(FrameOutcome::Analyzed(ChartStats::WhiteReference {
            mean: Bgr::new(40.0, 80.0, 120.0),
        }));
        let s = create_stats_message(gst::ClockTime::from_seconds(1), &report)
            .unwrap()
            .unwrap();

        assert_eq!(s.name(), CHART_STATS_MESSAGE);
        assert_eq!(s.get::<gst::ClockTime>("timestamp").unwrap(), gst::ClockTime::from_seconds(1));
        assert_eq!(s.get::<u64>("frame").unwrap(), 7);
        assert_eq!(s.get::<&str>("mode").unwrap(), ChartMode::WhiteReference.as_str());
        let result: serde_json::Value =
            serde_json::from_str(s.get::<&str>("result").unwrap()).unwrap();
        assert_eq!(result["white-reference"]["mean"]["r"], 120.0);
    }

    #[test]
    fn frames_without_stats_post_nothing() {
        gst::init().unwrap();
        let report = report(FrameOutcome::NoChart);
        assert!(create_stats_message(gst::ClockTime::ZERO, &report).is_none());
    }
}
