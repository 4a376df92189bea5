//! JSON decoding for effort summaries and effort streams.

use anyhow::{Context, Result};

use crate::analyzers::types::{EffortSummary, StreamRecord};

/// Decodes the array returned by the segment `all_efforts` endpoint.
///
/// Fields other than the ones [`EffortSummary`] needs are ignored.
///
/// # Errors
///
/// Returns an error if the bytes are not a JSON array of effort summaries.
pub fn parse_summaries(bytes: &[u8]) -> Result<Vec<EffortSummary>> {
    serde_json::from_slice(bytes).context("decoding effort summaries")
}

/// Decodes the array returned by the effort streams endpoint.
///
/// # Errors
///
/// Returns an error if the bytes are not a JSON array of `{type, data}`
/// stream objects.
pub fn parse_streams(bytes: &[u8]) -> Result<Vec<StreamRecord>> {
    serde_json::from_slice(bytes).context("decoding effort streams")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::StreamData;

    #[test]
    fn test_parse_summary_ignores_extra_fields() {
        let json = br#"[{
            "id": 1234,
            "resource_state": 2,
            "name": "Stocking Lane",
            "athlete": {"id": 99, "resource_state": 1},
            "elapsed_time": 600,
            "moving_time": 600,
            "start_date": "2014-05-01T10:00:00Z",
            "distance": 3012.5,
            "start_index": 10,
            "end_index": 609,
            "segment": {"id": 3538533, "distance": 3000.0, "maximum_grade": 14.2}
        }]"#;

        let summaries = parse_summaries(json).unwrap();
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.id, 1234);
        assert_eq!(s.athlete.id, 99);
        assert_eq!(s.elapsed_time, 600.0);
        assert_eq!(s.declared_rows(), 600);
        assert_eq!(s.segment.maximum_grade, 14.2);
    }

    #[test]
    fn test_parse_summary_missing_field_fails() {
        let json = br#"[{"id": 1, "athlete": {"id": 2}}]"#;
        assert!(parse_summaries(json).is_err());
    }

    #[test]
    fn test_parse_streams() {
        let json = br#"[
            {"type": "latlng", "data": [[1.0, 2.0]], "series_type": "distance", "original_size": 1, "resolution": "high"},
            {"type": "distance", "data": [0.0]},
            {"type": "time", "data": [3]}
        ]"#;

        let streams = parse_streams(json).unwrap();
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].data, StreamData::Pairs(vec![[1.0, 2.0]]));
        assert_eq!(streams[2].data, StreamData::Scalars(vec![3.0]));
    }

    #[test]
    fn test_parse_invalid_bytes() {
        assert!(parse_streams(&[0xFF, 0xFE, 0x00, 0x01]).is_err());
        assert!(parse_streams(br#"{"message": "Authorization Error"}"#).is_err());
    }
}
