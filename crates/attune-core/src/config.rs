use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Wearable kinds the biometric adapter can negotiate with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    SmartWatch,
    FitnessBand,
    ChestStrap,
    PulseOximeter,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmartWatch => "smart_watch",
            Self::FitnessBand => "fitness_band",
            Self::ChestStrap => "chest_strap",
            Self::PulseOximeter => "pulse_oximeter",
        }
    }

    /// Feature set negotiated at connect time. Fixed per device kind.
    pub fn features(&self) -> &'static [Feature] {
        use Feature::*;
        match self {
            Self::SmartWatch => &[HeartRate, Hrv, Stress, Activity, Sleep],
            Self::FitnessBand => &[HeartRate, Activity, Sleep],
            Self::ChestStrap => &[HeartRate, Hrv],
            Self::PulseOximeter => &[HeartRate, Spo2],
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single measurement channel a device can provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    HeartRate,
    Hrv,
    Stress,
    Spo2,
    Activity,
    Sleep,
}

/// Per-session configuration. Every field has a documented default so a
/// caller can start a session from `SessionConfig::default()` or a partial
/// JSON object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub video: VideoConfig,
    pub biometric: BiometricConfig,
    pub text: TextConfig,
    pub session: SessionMeta,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub enabled: bool,
    /// Frames captured and submitted per second.
    pub frame_rate: u32,
    pub enable_emotions: bool,
    pub enable_microexpressions: bool,
    pub enable_gaze_tracking: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frame_rate: 1,
            enable_emotions: true,
            enable_microexpressions: true,
            enable_gaze_tracking: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BiometricConfig {
    pub enabled: bool,
    /// Milliseconds between readings.
    pub update_interval_ms: u64,
    pub devices: Vec<DeviceKind>,
}

impl Default for BiometricConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_interval_ms: 5_000,
            devices: vec![DeviceKind::SmartWatch],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub enabled: bool,
    pub real_time_analysis: bool,
    pub sentiment_tracking: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            real_time_analysis: true,
            sentiment_tracking: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionMeta {
    pub session_id: Option<SessionId>,
    pub session_type: String,
    pub patient_id: Option<String>,
}

impl Default for SessionMeta {
    fn default() -> Self {
        Self {
            session_id: None,
            session_type: "individual".into(),
            patient_id: None,
        }
    }
}
