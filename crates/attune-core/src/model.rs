use std::collections::BTreeMap;

use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{DeviceKind, VideoConfig};
use crate::errors::TransportError;
use crate::events::{EventKind, OutboundKind, WireFrame};
use crate::ids::SessionId;

/// A distinct analysis input/output category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Video,
    Biometric,
    Text,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Biometric => "biometric",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw captured video frame, before wire encoding.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Bytes,
    pub captured_at_ms: u64,
}

/// Analysis toggles attached to each video frame request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoOptions {
    pub enable_emotions: bool,
    pub enable_microexpressions: bool,
    pub enable_gaze_tracking: bool,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            enable_emotions: true,
            enable_microexpressions: true,
            enable_gaze_tracking: false,
        }
    }
}

impl From<&VideoConfig> for VideoOptions {
    fn from(cfg: &VideoConfig) -> Self {
        Self {
            enable_emotions: cfg.enable_emotions,
            enable_microexpressions: cfg.enable_microexpressions,
            enable_gaze_tracking: cfg.enable_gaze_tracking,
        }
    }
}

/// Analysis toggles attached to each text snippet request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    pub sentiment_tracking: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            sentiment_tracking: true,
        }
    }
}

/// One wearable reading. Channels the device does not provide stay `None`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BiometricReading {
    pub device: Option<DeviceKind>,
    pub heart_rate: Option<f64>,
    pub hrv: Option<f64>,
    pub stress: Option<f64>,
    pub spo2: Option<f64>,
    pub activity: Option<f64>,
}

/// Modality-tagged request payload. Created by an adapter at capture time,
/// consumed exactly once by the channel (or dropped on queue overflow).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "snake_case")]
pub enum RequestPayload {
    VideoFrame {
        /// Base64-encoded frame bytes.
        data: String,
        options: VideoOptions,
    },
    BiometricSample {
        reading: BiometricReading,
    },
    TextSnippet {
        text: String,
        options: TextOptions,
    },
}

impl RequestPayload {
    pub fn video_frame(frame: &Frame, options: VideoOptions) -> Self {
        Self::VideoFrame {
            data: base64::engine::general_purpose::STANDARD.encode(&frame.data),
            options,
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            Self::VideoFrame { .. } => Modality::Video,
            Self::BiometricSample { .. } => Modality::Biometric,
            Self::TextSnippet { .. } => Modality::Text,
        }
    }
}

/// An outgoing analysis request. Immutable once stamped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(flatten)]
    pub payload: RequestPayload,
    pub session_id: Option<SessionId>,
    pub captured_at_ms: u64,
}

impl AnalysisRequest {
    pub fn modality(&self) -> Modality {
        self.payload.modality()
    }

    pub fn outbound_kind(&self) -> OutboundKind {
        match self.payload {
            RequestPayload::VideoFrame { .. } => OutboundKind::VideoFrame,
            RequestPayload::BiometricSample { .. } => OutboundKind::BiometricUpdate,
            RequestPayload::TextSnippet { .. } => OutboundKind::TextAnalysis,
        }
    }

    pub fn to_wire(&self) -> Result<WireFrame, TransportError> {
        let data =
            serde_json::to_value(self).map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(WireFrame::new(self.outbound_kind().as_str(), data))
    }
}

/// A brief facial event detected inside the 10-second buffer window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Microexpression {
    pub name: String,
    #[serde(default)]
    pub intensity: f64,
}

/// Video analysis pushed by the backend. Only the fields the rolling
/// windows read are typed; everything else rides along in `extra`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VideoResult {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub emotions: BTreeMap<String, f64>,
    #[serde(default)]
    pub stress_level: Option<f64>,
    #[serde(default)]
    pub engagement_level: Option<f64>,
    #[serde(default)]
    pub microexpressions: Vec<Microexpression>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl VideoResult {
    /// Highest-scoring emotion; see [`dominant_emotion`].
    pub fn dominant_emotion(&self) -> Option<(&str, f64)> {
        dominant_emotion(&self.emotions)
    }
}

/// Highest-scoring key of an emotion map. Ties resolve to the
/// lexicographically smallest key: iteration is over a BTreeMap and only
/// a strictly greater score displaces the current pick.
pub fn dominant_emotion(emotions: &BTreeMap<String, f64>) -> Option<(&str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for (name, score) in emotions {
        match best {
            Some((_, s)) if *score <= s => {}
            _ => best = Some((name.as_str(), *score)),
        }
    }
    best
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BiometricState {
    #[serde(default)]
    pub heart_rate: Option<f64>,
    #[serde(default)]
    pub hrv: Option<f64>,
    #[serde(default)]
    pub stress: Option<f64>,
    #[serde(default)]
    pub spo2: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BiometricAlert {
    #[serde(default)]
    pub severity: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BiometricResult {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub current_state: BiometricState,
    #[serde(default)]
    pub alerts: Vec<BiometricAlert>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TextResult {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// End-of-session cross-modality synthesis. Opaque to the core.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ComprehensiveResult {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

/// Tagged union over the backend's typed results. Validated at the channel
/// boundary before dispatch; the event name on the wire selects the variant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisResult {
    Video(VideoResult),
    Biometric(BiometricResult),
    Text(TextResult),
    Comprehensive(ComprehensiveResult),
}

impl AnalysisResult {
    /// Decode an inbound payload for a known event kind. `Error` frames
    /// carry no result and are handled by the channel, not here.
    pub fn decode(kind: EventKind, data: Value) -> Result<Self, TransportError> {
        let map_err = |e: serde_json::Error| TransportError::MalformedFrame(e.to_string());
        match kind {
            EventKind::VideoAnalysis => Ok(Self::Video(serde_json::from_value(data).map_err(map_err)?)),
            EventKind::BiometricAnalysis => {
                Ok(Self::Biometric(serde_json::from_value(data).map_err(map_err)?))
            }
            EventKind::TextAnalysis => Ok(Self::Text(serde_json::from_value(data).map_err(map_err)?)),
            EventKind::AnalysisComplete => {
                Ok(Self::Comprehensive(serde_json::from_value(data).map_err(map_err)?))
            }
            EventKind::Error => Err(TransportError::MalformedFrame(
                "error frames carry no analysis result".into(),
            )),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Video(_) => EventKind::VideoAnalysis,
            Self::Biometric(_) => EventKind::BiometricAnalysis,
            Self::Text(_) => EventKind::TextAnalysis,
            Self::Comprehensive(_) => EventKind::AnalysisComplete,
        }
    }

    pub fn modality(&self) -> Option<Modality> {
        match self {
            Self::Video(_) => Some(Modality::Video),
            Self::Biometric(_) => Some(Modality::Biometric),
            Self::Text(_) => Some(Modality::Text),
            Self::Comprehensive(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Video(r) => r.session_id.as_ref(),
            Self::Biometric(r) => r.session_id.as_ref(),
            Self::Text(r) => r.session_id.as_ref(),
            Self::Comprehensive(r) => r.session_id.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame() -> Frame {
        Frame {
            data: Bytes::from_static(b"\xff\xd8\xff\xe0 fake jpeg"),
            captured_at_ms: 1_000,
        }
    }

    #[test]
    fn payload_modality_tags() {
        let video = RequestPayload::video_frame(&frame(), VideoOptions::default());
        assert_eq!(video.modality(), Modality::Video);

        let bio = RequestPayload::BiometricSample {
            reading: BiometricReading::default(),
        };
        assert_eq!(bio.modality(), Modality::Biometric);

        let text = RequestPayload::TextSnippet {
            text: "I feel better today".into(),
            options: TextOptions::default(),
        };
        assert_eq!(text.modality(), Modality::Text);
    }

    #[test]
    fn video_frame_is_base64() {
        let RequestPayload::VideoFrame { data, .. } =
            RequestPayload::video_frame(&frame(), VideoOptions::default())
        else {
            panic!("expected video frame");
        };
        let decoded = base64::engine::general_purpose::STANDARD.decode(&data).unwrap();
        assert!(decoded.starts_with(&[0xff, 0xd8]));
    }

    #[test]
    fn request_wire_event_names() {
        let req = AnalysisRequest {
            payload: RequestPayload::TextSnippet {
                text: "hello".into(),
                options: TextOptions::default(),
            },
            session_id: Some(SessionId::from_raw("session_1")),
            captured_at_ms: 42,
        };
        let wire = req.to_wire().unwrap();
        assert_eq!(wire.event, "text_analysis");
        assert_eq!(wire.data["modality"], "text_snippet");
        assert_eq!(wire.data["session_id"], "session_1");
        assert_eq!(wire.data["captured_at_ms"], 42);
    }

    #[test]
    fn decode_video_result_reads_window_fields() {
        let data = json!({
            "session_id": "session_9",
            "emotions": {"calm": 0.7, "joy": 0.2},
            "stress_level": 0.35,
            "engagement_level": 0.8,
            "microexpressions": [{"name": "brow_raise", "intensity": 0.4}],
            "gaze": {"x": 0.1, "y": 0.9}
        });
        let result = AnalysisResult::decode(EventKind::VideoAnalysis, data).unwrap();
        let AnalysisResult::Video(v) = &result else {
            panic!("expected video");
        };
        assert_eq!(v.stress_level, Some(0.35));
        assert_eq!(v.microexpressions.len(), 1);
        // Unknown fields are preserved, not rejected.
        assert!(v.extra.contains_key("gaze"));
        assert_eq!(result.kind(), EventKind::VideoAnalysis);
        assert_eq!(result.session_id().unwrap().as_str(), "session_9");
    }

    #[test]
    fn decode_biometric_nested_heart_rate() {
        let data = json!({
            "current_state": {"heart_rate": 72.0, "hrv": 48.0},
            "alerts": [{"severity": "warning", "message": "elevated heart rate"}]
        });
        let result = AnalysisResult::decode(EventKind::BiometricAnalysis, data).unwrap();
        let AnalysisResult::Biometric(b) = result else {
            panic!("expected biometric");
        };
        assert_eq!(b.current_state.heart_rate, Some(72.0));
        assert_eq!(b.alerts[0].severity, "warning");
    }

    #[test]
    fn decode_rejects_mistyped_payload() {
        let err = AnalysisResult::decode(EventKind::TextAnalysis, json!({"sentiment": "very"}))
            .unwrap_err();
        assert_eq!(err.kind(), "malformed_frame");
    }

    #[test]
    fn decode_error_kind_is_not_a_result() {
        assert!(AnalysisResult::decode(EventKind::Error, json!({"message": "boom"})).is_err());
    }

    #[test]
    fn dominant_emotion_max_score() {
        let v: VideoResult = serde_json::from_value(json!({
            "emotions": {"anger": 0.1, "calm": 0.6, "joy": 0.3}
        }))
        .unwrap();
        assert_eq!(v.dominant_emotion(), Some(("calm", 0.6)));
    }

    #[test]
    fn dominant_emotion_tie_breaks_lexicographically() {
        let v: VideoResult = serde_json::from_value(json!({
            "emotions": {"joy": 0.5, "anger": 0.5, "calm": 0.5}
        }))
        .unwrap();
        assert_eq!(v.dominant_emotion(), Some(("anger", 0.5)));
    }

    #[test]
    fn dominant_emotion_empty_is_none() {
        let v = VideoResult::default();
        assert!(v.dominant_emotion().is_none());
    }

    #[test]
    fn comprehensive_is_opaque() {
        let data = json!({"session_id": "session_3", "overall_state": "stable", "score": 7});
        let result = AnalysisResult::decode(EventKind::AnalysisComplete, data).unwrap();
        assert_eq!(result.modality(), None);
        let AnalysisResult::Comprehensive(c) = result else {
            panic!("expected comprehensive");
        };
        assert_eq!(c.data["overall_state"], "stable");
    }
}
