//! Capture adapter: owns a media capture device and produces timestamped
//! frame snapshots on demand. No analysis logic lives here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use rand::RngCore;
use tracing::warn;

use attune_core::errors::DeviceError;
use attune_core::model::Frame;
use attune_core::time::epoch_ms;

/// A frame-producing device. `frame` returns `None` on transient
/// unavailability and never fails; unrecoverable access failure is
/// surfaced once, at `start`.
pub trait FrameSource: Send + Sync {
    fn start(&self) -> Result<(), DeviceError>;
    fn stop(&self);
    fn frame(&self) -> Option<Frame>;
}

/// Wraps a source with the pipeline's denial semantics: a failed start
/// leaves the adapter permanently quiet — later `current_frame` calls
/// return `None` without erroring.
pub struct CaptureAdapter {
    source: Arc<dyn FrameSource>,
    started: AtomicBool,
    denied: AtomicBool,
}

impl CaptureAdapter {
    pub fn new(source: Arc<dyn FrameSource>) -> Self {
        Self {
            source,
            started: AtomicBool::new(false),
            denied: AtomicBool::new(false),
        }
    }

    pub fn start(&self) -> Result<(), DeviceError> {
        match self.source.start() {
            Ok(()) => {
                self.started.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                if e.is_permission_denied() {
                    self.denied.store(true, Ordering::Relaxed);
                }
                warn!(error = %e, "capture start failed");
                Err(e)
            }
        }
    }

    /// Synchronously releases the device; no further frames are produced.
    pub fn stop(&self) {
        if self.started.swap(false, Ordering::Relaxed) {
            self.source.stop();
        }
    }

    pub fn current_frame(&self) -> Option<Frame> {
        if self.denied.load(Ordering::Relaxed) || !self.started.load(Ordering::Relaxed) {
            return None;
        }
        self.source.frame()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }
}

/// Stand-in camera producing noise frames. The upstream system's video
/// path is explicitly simulated; this keeps the pipeline exercisable
/// without a real device.
pub struct SimulatedCamera {
    active: AtomicBool,
    frame_len: usize,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            frame_len: 1024,
        }
    }

    pub fn with_frame_len(frame_len: usize) -> Self {
        Self {
            active: AtomicBool::new(false),
            frame_len,
        }
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SimulatedCamera {
    fn start(&self) -> Result<(), DeviceError> {
        self.active.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    fn frame(&self) -> Option<Frame> {
        if !self.active.load(Ordering::Relaxed) {
            return None;
        }
        let mut data = vec![0u8; self.frame_len];
        rand::thread_rng().fill_bytes(&mut data);
        Some(Frame {
            data: Bytes::from(data),
            captured_at_ms: epoch_ms(),
        })
    }
}

/// A source whose capability prompt was refused. Useful in tests and as
/// the behavior model for real permission failures.
pub struct DeniedCamera;

impl FrameSource for DeniedCamera {
    fn start(&self) -> Result<(), DeviceError> {
        Err(DeviceError::PermissionDenied("camera access refused".into()))
    }

    fn stop(&self) {}

    fn frame(&self) -> Option<Frame> {
        None
    }
}
