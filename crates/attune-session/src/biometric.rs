//! Biometric source adapter: zero or more wearable data sources producing
//! periodic readings. The cadence task lives in the orchestrator; this
//! module owns connection state and reading production.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use attune_core::config::{DeviceKind, Feature};
use attune_core::errors::DeviceError;
use attune_core::model::BiometricReading;

/// A wearable backend. `connect` negotiates the feature set for a device
/// kind; `read` returns `None` for devices that are not connected.
pub trait BiometricSource: Send + Sync {
    fn connect(&self, kind: DeviceKind) -> Result<&'static [Feature], DeviceError>;
    fn read(&self, kind: DeviceKind) -> Option<BiometricReading>;
    fn disconnect(&self);
}

/// Tracks which device kinds are connected and fans reads out to the
/// underlying source.
pub struct BiometricAdapter {
    source: Arc<dyn BiometricSource>,
    connected: Mutex<Vec<DeviceKind>>,
}

impl BiometricAdapter {
    pub fn new(source: Arc<dyn BiometricSource>) -> Self {
        Self {
            source,
            connected: Mutex::new(Vec::new()),
        }
    }

    /// Negotiate a device's feature set. Idempotent per kind.
    pub fn connect(&self, kind: DeviceKind) -> Result<&'static [Feature], DeviceError> {
        let features = self.source.connect(kind)?;
        let mut connected = self.connected.lock();
        if !connected.contains(&kind) {
            connected.push(kind);
        }
        Ok(features)
    }

    /// One reading per connected device, in connect order.
    pub fn read_all(&self) -> Vec<BiometricReading> {
        let kinds = self.connected.lock().clone();
        kinds
            .into_iter()
            .filter_map(|kind| self.source.read(kind))
            .collect()
    }

    /// Synchronously releases every device; no further readings.
    pub fn disconnect(&self) {
        self.connected.lock().clear();
        self.source.disconnect();
    }

    pub fn connected_devices(&self) -> Vec<DeviceKind> {
        self.connected.lock().clone()
    }
}

/// Simulated wearable fleet generating plausible readings. The upstream
/// sensors are simulated too; ranges mirror its generator.
pub struct SimulatedWearable {
    connected: Mutex<HashSet<DeviceKind>>,
}

impl SimulatedWearable {
    pub fn new() -> Self {
        Self {
            connected: Mutex::new(HashSet::new()),
        }
    }
}

impl Default for SimulatedWearable {
    fn default() -> Self {
        Self::new()
    }
}

impl BiometricSource for SimulatedWearable {
    fn connect(&self, kind: DeviceKind) -> Result<&'static [Feature], DeviceError> {
        self.connected.lock().insert(kind);
        Ok(kind.features())
    }

    fn read(&self, kind: DeviceKind) -> Option<BiometricReading> {
        if !self.connected.lock().contains(&kind) {
            return None;
        }
        let mut rng = rand::thread_rng();
        let features = kind.features();
        let mut reading = BiometricReading {
            device: Some(kind),
            ..Default::default()
        };
        for feature in features {
            match feature {
                Feature::HeartRate => reading.heart_rate = Some(rng.gen_range(58.0..96.0)),
                Feature::Hrv => reading.hrv = Some(rng.gen_range(20.0..80.0)),
                Feature::Stress => reading.stress = Some(rng.gen_range(0.0..1.0)),
                Feature::Spo2 => reading.spo2 = Some(rng.gen_range(0.94..1.0)),
                Feature::Activity => reading.activity = Some(rng.gen_range(0.0..1.0)),
                Feature::Sleep => {}
            }
        }
        Some(reading)
    }

    fn disconnect(&self) {
        self.connected.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_negotiates_feature_set() {
        let adapter = BiometricAdapter::new(Arc::new(SimulatedWearable::new()));
        let features = adapter.connect(DeviceKind::PulseOximeter).unwrap();
        assert!(features.contains(&Feature::Spo2));
        assert_eq!(adapter.connected_devices(), vec![DeviceKind::PulseOximeter]);
    }

    #[test]
    fn readings_respect_device_features() {
        let adapter = BiometricAdapter::new(Arc::new(SimulatedWearable::new()));
        adapter.connect(DeviceKind::ChestStrap).unwrap();

        let readings = adapter.read_all();
        assert_eq!(readings.len(), 1);
        let r = &readings[0];
        assert!(r.heart_rate.is_some());
        assert!(r.hrv.is_some());
        // Chest straps have no oximeter or stress channel.
        assert!(r.spo2.is_none());
        assert!(r.stress.is_none());
    }

    #[test]
    fn disconnect_stops_readings() {
        let adapter = BiometricAdapter::new(Arc::new(SimulatedWearable::new()));
        adapter.connect(DeviceKind::SmartWatch).unwrap();
        assert_eq!(adapter.read_all().len(), 1);

        adapter.disconnect();
        assert!(adapter.connected_devices().is_empty());
        assert!(adapter.read_all().is_empty());
    }

    #[test]
    fn multiple_devices_read_in_connect_order() {
        let adapter = BiometricAdapter::new(Arc::new(SimulatedWearable::new()));
        adapter.connect(DeviceKind::SmartWatch).unwrap();
        adapter.connect(DeviceKind::PulseOximeter).unwrap();

        let readings = adapter.read_all();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].device, Some(DeviceKind::SmartWatch));
        assert_eq!(readings[1].device, Some(DeviceKind::PulseOximeter));
    }

    #[test]
    fn connect_is_idempotent_per_kind() {
        let adapter = BiometricAdapter::new(Arc::new(SimulatedWearable::new()));
        adapter.connect(DeviceKind::SmartWatch).unwrap();
        adapter.connect(DeviceKind::SmartWatch).unwrap();
        assert_eq!(adapter.connected_devices().len(), 1);
    }

    #[test]
    fn heart_rate_range_is_plausible() {
        let wearable = SimulatedWearable::new();
        wearable.connect(DeviceKind::FitnessBand).unwrap();
        for _ in 0..50 {
            let r = wearable.read(DeviceKind::FitnessBand).unwrap();
            let hr = r.heart_rate.unwrap();
            assert!((58.0..96.0).contains(&hr), "hr out of range: {hr}");
        }
    }
}
