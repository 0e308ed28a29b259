use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::TransportError;

/// Inbound event kinds pushed by the analysis backend. Subscribers are
/// keyed by these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    VideoAnalysis,
    BiometricAnalysis,
    TextAnalysis,
    AnalysisComplete,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoAnalysis => "video_analysis",
            Self::BiometricAnalysis => "biometric_analysis",
            Self::TextAnalysis => "text_analysis",
            Self::AnalysisComplete => "analysis_complete",
            Self::Error => "error",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "video_analysis" => Some(Self::VideoAnalysis),
            "biometric_analysis" => Some(Self::BiometricAnalysis),
            "text_analysis" => Some(Self::TextAnalysis),
            "analysis_complete" => Some(Self::AnalysisComplete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound event names sent to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutboundKind {
    VideoFrame,
    BiometricUpdate,
    TextAnalysis,
    StartSession,
    StopSession,
}

impl OutboundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoFrame => "video_frame",
            Self::BiometricUpdate => "biometric_update",
            Self::TextAnalysis => "text_analysis",
            Self::StartSession => "start_multimodal_analysis",
            Self::StopSession => "stop_multimodal_analysis",
        }
    }
}

impl std::fmt::Display for OutboundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One framed message on the wire: `{"event": ..., "data": ...}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WireFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    pub fn decode(raw: &str) -> Result<Self, TransportError> {
        serde_json::from_str(raw).map_err(|e| TransportError::MalformedFrame(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_kind_wire_names() {
        assert_eq!(EventKind::VideoAnalysis.as_str(), "video_analysis");
        assert_eq!(EventKind::from_wire("analysis_complete"), Some(EventKind::AnalysisComplete));
        assert_eq!(EventKind::from_wire("unknown_event"), None);
    }

    #[test]
    fn outbound_wire_names() {
        assert_eq!(OutboundKind::StartSession.as_str(), "start_multimodal_analysis");
        assert_eq!(OutboundKind::StopSession.as_str(), "stop_multimodal_analysis");
        assert_eq!(OutboundKind::VideoFrame.as_str(), "video_frame");
    }

    #[test]
    fn wire_frame_roundtrip() {
        let frame = WireFrame::new("video_analysis", json!({"stress_level": 0.4}));
        let raw = frame.encode().unwrap();
        let parsed = WireFrame::decode(&raw).unwrap();
        assert_eq!(parsed.event, "video_analysis");
        assert_eq!(parsed.data["stress_level"], 0.4);
    }

    #[test]
    fn wire_frame_missing_data_defaults_null() {
        let parsed = WireFrame::decode(r#"{"event": "error"}"#).unwrap();
        assert!(parsed.data.is_null());
    }

    #[test]
    fn wire_frame_decode_rejects_garbage() {
        let err = WireFrame::decode("not json").unwrap_err();
        assert_eq!(err.kind(), "malformed_frame");
    }
}
