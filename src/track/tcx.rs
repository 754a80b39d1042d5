// ABOUTME: TCX fallback parser for activity tracks
// ABOUTME: Reads namespace-qualified trackpoints per lap, tolerating unparsable numerics
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use crate::convert::parse_gmt_fractional;
use crate::errors::TrackParseError;
use crate::models::TrackSample;
use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};

const TCX_NS: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const EXT_NS: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";

/// One activity from a TCX document: its start instant and trackpoints in
/// document order.
#[derive(Debug)]
pub struct TcxActivity {
    pub start_time: DateTime<Utc>,
    pub samples: Vec<TrackSample>,
}

/// Parse a TCX export.
///
/// A trackpoint with an unparsable numeric field keeps the sample with that
/// field absent; only a missing document structure is an error.
///
/// # Errors
///
/// `Malformed` when the XML cannot be parsed or holds no activity with a
/// start timestamp.
pub fn parse(xml: &str) -> Result<Vec<TcxActivity>, TrackParseError> {
    let doc = Document::parse(xml)
        .map_err(|e| TrackParseError::Malformed(format!("TCX parse failed: {e}")))?;

    let mut activities = Vec::new();
    for activity in doc
        .descendants()
        .filter(|node| node.has_tag_name((TCX_NS, "Activity")))
    {
        let start_time = activity
            .children()
            .find(|node| node.has_tag_name((TCX_NS, "Id")))
            .and_then(|node| node.text())
            .and_then(|raw| parse_gmt_fractional(raw.trim()));
        let Some(start_time) = start_time else {
            continue;
        };

        let mut samples = Vec::new();
        for (lap_index, lap) in activity
            .children()
            .filter(|node| node.has_tag_name((TCX_NS, "Lap")))
            .enumerate()
        {
            for trackpoint in lap
                .descendants()
                .filter(|node| node.has_tag_name((TCX_NS, "Trackpoint")))
            {
                let time = descendant_text(trackpoint, TCX_NS, "Time")
                    .and_then(|raw| parse_gmt_fractional(raw.trim()));
                let Some(time) = time else {
                    continue;
                };
                samples.push(TrackSample {
                    timestamp: Some(time),
                    latitude: parse_float(descendant_text(trackpoint, TCX_NS, "LatitudeDegrees")),
                    longitude: parse_float(descendant_text(trackpoint, TCX_NS, "LongitudeDegrees")),
                    altitude: parse_float(descendant_text(trackpoint, TCX_NS, "AltitudeMeters")),
                    distance: parse_float(descendant_text(trackpoint, TCX_NS, "DistanceMeters")),
                    heart_rate: parse_float(heart_rate_text(trackpoint)),
                    speed: parse_float(descendant_text(trackpoint, EXT_NS, "Speed")),
                    lap: Some(lap_index as i64 + 1),
                    ..TrackSample::default()
                });
            }
        }
        activities.push(TcxActivity {
            start_time,
            samples,
        });
    }

    if activities.is_empty() {
        return Err(TrackParseError::Malformed(
            "no activity with a start timestamp in TCX document".into(),
        ));
    }
    Ok(activities)
}

fn descendant_text<'a>(node: Node<'a, '_>, ns: &str, name: &str) -> Option<&'a str> {
    node.descendants()
        .find(|child| child.has_tag_name((ns, name)))
        .and_then(|child| child.text())
}

/// Heart rate lives one level deeper: `HeartRateBpm/Value`.
fn heart_rate_text<'a>(trackpoint: Node<'a, '_>) -> Option<&'a str> {
    trackpoint
        .descendants()
        .find(|child| child.has_tag_name((TCX_NS, "HeartRateBpm")))
        .and_then(|bpm| descendant_text(bpm, TCX_NS, "Value"))
}

fn parse_float(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|value| value.trim().parse().ok())
}
