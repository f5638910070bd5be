//! Caméra simulée (sans vraie webcam)
//!
//! Sert aux tests et aux essais à blanc : les webcams sont déclarées à la
//! main, les images sont poussées par le test, et les branchements sont
//! diffusés comme le ferait un vrai backend.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use image::RgbImage;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    CameraBackend, CameraListener, CameraSession, DiscoveryEvent, RawFrame, Resolution,
    VideoDevice, VideoError, VideoResult,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct ActiveCamera {
    id: u64,
    device: VideoDevice,
    resolution: Option<Resolution>,
    frame_interval: Duration,
    listener: Arc<dyn CameraListener>,
}

struct SimulatedState {
    devices: Vec<VideoDevice>,
    active: Option<ActiveCamera>,
    next_id: u64,
    fail_open: Option<String>,
    open_count: usize,
}

struct SimulatedInner {
    state: Mutex<SimulatedState>,
    events: broadcast::Sender<DiscoveryEvent>,
}

/// Backend caméra en mémoire
#[derive(Clone)]
pub struct SimulatedCamera {
    inner: Arc<SimulatedInner>,
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCamera {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SimulatedInner {
                state: Mutex::new(SimulatedState {
                    devices: Vec::new(),
                    active: None,
                    next_id: 0,
                    fail_open: None,
                    open_count: 0,
                }),
                events,
            }),
        }
    }

    /// Branche une webcam
    pub fn plug(&self, device: VideoDevice) {
        let name = device.name.clone();
        lock(&self.inner.state).devices.push(device);
        let _ = self.inner.events.send(DiscoveryEvent::Found(name));
    }

    /// Débranche une webcam ; si elle était ouverte, le listener reçoit `on_disposed`
    pub fn unplug(&self, name: &str) {
        let disposed = {
            let mut state = lock(&self.inner.state);
            state.devices.retain(|device| device.name != name);
            match &state.active {
                Some(active) if active.device.name == name => state.active.take(),
                _ => None,
            }
        };
        if let Some(active) = disposed {
            active.listener.on_disposed();
        }
        let _ = self.inner.events.send(DiscoveryEvent::Gone(name.to_string()));
    }

    /// Livre une image horodatée maintenant ; `false` si aucune webcam n'est ouverte
    pub fn emit_frame(&self, image: RgbImage) -> bool {
        self.emit_frame_at(image, Utc::now())
    }

    pub fn emit_frame_at(&self, image: RgbImage, captured_at: DateTime<Utc>) -> bool {
        let target = {
            let state = lock(&self.inner.state);
            state
                .active
                .as_ref()
                .map(|active| (Arc::clone(&active.listener), active.device.fps))
        };
        match target {
            Some((listener, device_fps)) => {
                listener.on_image(RawFrame {
                    image,
                    captured_at,
                    device_fps,
                });
                true
            }
            None => false,
        }
    }

    /// Force l'échec des prochaines ouvertures (`None` pour rétablir)
    pub fn fail_open(&self, reason: Option<&str>) {
        lock(&self.inner.state).fail_open = reason.map(str::to_string);
    }

    /// Webcam ouverte, avec la résolution demandée au backend
    pub fn active(&self) -> Option<(String, Option<Resolution>)> {
        let state = lock(&self.inner.state);
        state
            .active
            .as_ref()
            .map(|active| (active.device.name.clone(), active.resolution))
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        lock(&self.inner.state).active.as_ref().map(|active| active.frame_interval)
    }

    pub fn open_count(&self) -> usize {
        lock(&self.inner.state).open_count
    }
}

impl CameraBackend for SimulatedCamera {
    fn devices(&self) -> VideoResult<Vec<VideoDevice>> {
        Ok(lock(&self.inner.state).devices.clone())
    }

    fn discovery(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.inner.events.subscribe()
    }

    fn open(
        &self,
        device: &str,
        resolution: Option<Resolution>,
        frame_interval: Duration,
        listener: Arc<dyn CameraListener>,
    ) -> VideoResult<Box<dyn CameraSession>> {
        let id = {
            let mut state = lock(&self.inner.state);
            if let Some(reason) = &state.fail_open {
                return Err(VideoError::OpenFailed {
                    device: device.to_string(),
                    reason: reason.clone(),
                });
            }
            let found = state
                .devices
                .iter()
                .find(|d| d.name == device)
                .cloned()
                .ok_or_else(|| VideoError::DeviceNotFound(device.to_string()))?;

            state.next_id += 1;
            state.open_count += 1;
            let id = state.next_id;
            state.active = Some(ActiveCamera {
                id,
                device: found,
                resolution,
                frame_interval,
                listener: Arc::clone(&listener),
            });
            id
        };

        debug!(device, ?resolution, "webcam simulée ouverte");
        listener.on_open();
        Ok(Box::new(SimulatedSession {
            id,
            resolution,
            inner: Arc::clone(&self.inner),
            closed: false,
        }))
    }
}

struct SimulatedSession {
    id: u64,
    resolution: Option<Resolution>,
    inner: Arc<SimulatedInner>,
    closed: bool,
}

impl CameraSession for SimulatedSession {
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let active = {
            let mut state = lock(&self.inner.state);
            match &state.active {
                Some(active) if active.id == self.id => state.active.take(),
                _ => None,
            }
        };
        if let Some(active) = active {
            active.listener.on_closed();
        }
    }

    fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }
}
