//! Adaptateur de capture webcam
//!
//! Fait le miroir des événements du backend dans des cellules observables :
//!
//! ```text
//! backend ──on_open/on_closed/on_disposed──→ state        (watch<VideoState>)
//!         ──on_image──→ FrameRateCounter ──→ latest_frame (watch<Option<Arc<CapturedFrame>>>)
//! open()/close() ─────────────────────────→ current      (watch<Option<VideoDevice>>)
//! ```
//!
//! Seule la dernière image compte : chaque nouvelle image remplace la
//! précédente, rien n'est mis en file.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    CameraBackend, CameraListener, CameraSession, CapturedFrame, FrameRateCounter, RawFrame,
    Resolution, VideoConfig, VideoDevice, VideoError, VideoResult, VideoState,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// État partagé entre l'adaptateur et les listeners de session
struct Shared {
    state: watch::Sender<VideoState>,
    latest: watch::Sender<Option<Arc<CapturedFrame>>>,
    current: watch::Sender<Option<VideoDevice>>,
    counter: Mutex<FrameRateCounter>,
    /// Incrémenté à chaque ouverture/fermeture ; les événements d'une
    /// session périmée sont ignorés
    generation: AtomicU64,
}

/// Listener enregistré auprès du backend pour une session donnée
struct SessionListener {
    shared: Arc<Shared>,
    generation: u64,
}

impl SessionListener {
    fn is_current(&self) -> bool {
        self.shared.generation.load(Ordering::Acquire) == self.generation
    }
}

impl CameraListener for SessionListener {
    fn on_open(&self) {
        if self.is_current() {
            self.shared.state.send_replace(VideoState::Open);
        }
    }

    fn on_closed(&self) {
        if self.is_current() {
            self.shared.state.send_replace(VideoState::Closed);
        }
    }

    /// La webcam a disparu : plus de webcam courante, images suivantes ignorées
    ///
    /// Le handle de session reste détenu jusqu'au prochain `close()`/`open()`.
    fn on_disposed(&self) {
        let retired = self.shared.generation.compare_exchange(
            self.generation,
            self.generation + 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if retired.is_ok() {
            self.shared.state.send_replace(VideoState::Disposed);
            self.shared.current.send_replace(None);
        }
    }

    fn on_image(&self, frame: RawFrame) {
        if !self.is_current() {
            return;
        }
        let measured = lock(&self.shared.counter).tick(frame.captured_at.timestamp_millis());
        self.shared.state.send_replace(VideoState::ImageObtained);
        self.shared.latest.send_replace(Some(Arc::new(CapturedFrame {
            image: frame.image,
            timestamp: frame.captured_at,
            device_frame_rate: frame.device_fps,
            measured_frame_rate: measured,
        })));
    }
}

/// Adaptateur entre le backend caméra et l'état observable de la webcam courante
pub struct VideoCaptureAdapter {
    backend: Arc<dyn CameraBackend>,
    config: VideoConfig,
    shared: Arc<Shared>,
    /// Verrouillé pendant tout `open()` : deux ouvertures concurrentes
    /// s'exécutent l'une après l'autre
    session: Mutex<Option<Box<dyn CameraSession>>>,
}

impl VideoCaptureAdapter {
    pub fn new(backend: Arc<dyn CameraBackend>, config: VideoConfig) -> Self {
        let (state, _) = watch::channel(VideoState::Closed);
        let (latest, _) = watch::channel(None);
        let (current, _) = watch::channel(None);
        Self {
            backend,
            config,
            shared: Arc::new(Shared {
                state,
                latest,
                current,
                counter: Mutex::new(FrameRateCounter::new()),
                generation: AtomicU64::new(0),
            }),
            session: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> Arc<dyn CameraBackend> {
        Arc::clone(&self.backend)
    }

    /// Ouvre une webcam, en fermant d'abord celle qui est ouverte
    ///
    /// Sans résolution demandée, la première résolution supportée est utilisée.
    ///
    /// # Erreurs
    /// - `VideoError::DeviceNotFound` : aucune webcam de ce nom
    /// - `VideoError::OpenFailed` : le backend a refusé l'ouverture
    ///
    /// En cas d'erreur l'adaptateur reste fermé.
    pub fn open(&self, name: &str, resolution: Option<Resolution>) -> VideoResult<VideoDevice> {
        let mut slot = lock(&self.session);
        self.release(&mut slot);

        let device = self
            .backend
            .devices()?
            .into_iter()
            .find(|device| device.name == name)
            .ok_or_else(|| VideoError::DeviceNotFound(name.to_string()))?;
        let resolution = resolution.or_else(|| device.default_resolution());

        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        lock(&self.shared.counter).reset();
        let listener = Arc::new(SessionListener {
            shared: Arc::clone(&self.shared),
            generation,
        });

        let session = self
            .backend
            .open(&device.name, resolution, self.config.frame_interval(), listener)?;

        *slot = Some(session);
        self.shared.current.send_replace(Some(device.clone()));
        info!(device = %device.name, resolution = ?resolution, "webcam ouverte");
        Ok(device)
    }

    /// Ferme la webcam courante. Sans effet si rien n'est ouvert.
    pub fn close(&self) {
        let mut slot = lock(&self.session);
        self.release(&mut slot);
    }

    fn release(&self, slot: &mut Option<Box<dyn CameraSession>>) {
        let Some(mut session) = slot.take() else {
            return;
        };
        session.close();
        // Les images encore en vol de cette session seront ignorées
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        self.shared.state.send_replace(VideoState::Closed);
        self.shared.current.send_replace(None);
        debug!("webcam fermée");
    }

    /// Une webcam est ouverte et n'a pas disparu
    pub fn is_open(&self) -> bool {
        lock(&self.session).is_some() && self.state() != VideoState::Disposed
    }

    pub fn current_device(&self) -> Option<VideoDevice> {
        self.shared.current.borrow().clone()
    }

    pub fn current_resolution(&self) -> Option<Resolution> {
        if !self.is_open() {
            return None;
        }
        lock(&self.session).as_ref().and_then(|session| session.resolution())
    }

    pub fn state(&self) -> VideoState {
        *self.shared.state.borrow()
    }

    /// Dernière image publiée (conservée après fermeture)
    pub fn latest_frame(&self) -> Option<Arc<CapturedFrame>> {
        self.shared.latest.borrow().clone()
    }

    pub fn subscribe_frames(&self) -> watch::Receiver<Option<Arc<CapturedFrame>>> {
        self.shared.latest.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<VideoState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe_current(&self) -> watch::Receiver<Option<VideoDevice>> {
        self.shared.current.subscribe()
    }
}

impl Drop for VideoCaptureAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedCamera;
    use chrono::{TimeZone, Utc};
    use image::RgbImage;
    use std::sync::atomic::AtomicUsize;

    fn setup() -> (SimulatedCamera, VideoCaptureAdapter) {
        let camera = SimulatedCamera::new();
        camera.plug(VideoDevice::new(
            "C920",
            30.0,
            vec![Resolution::new(640, 480), Resolution::new(1920, 1080)],
        ));
        camera.plug(VideoDevice::new("Integrated", 15.0, vec![Resolution::new(1280, 720)]));
        let adapter = VideoCaptureAdapter::new(Arc::new(camera.clone()), VideoConfig::default());
        (camera, adapter)
    }

    #[test]
    fn test_open_uses_first_resolution_by_default() {
        let (camera, adapter) = setup();

        let device = adapter.open("C920", None).unwrap();
        assert_eq!(device.name, "C920");
        assert_eq!(adapter.state(), VideoState::Open);
        assert_eq!(adapter.current_resolution(), Some(Resolution::new(640, 480)));
        assert_eq!(camera.active(), Some(("C920".to_string(), Some(Resolution::new(640, 480)))));
        assert_eq!(camera.frame_interval(), Some(VideoConfig::default().frame_interval()));
    }

    #[test]
    fn test_open_with_requested_resolution() {
        let (camera, adapter) = setup();
        adapter.open("C920", Some(Resolution::new(1920, 1080))).unwrap();
        assert_eq!(camera.active().unwrap().1, Some(Resolution::new(1920, 1080)));
    }

    #[test]
    fn test_frames_publish_latest_and_rate() {
        let (camera, adapter) = setup();
        adapter.open("C920", None).unwrap();

        let t0 = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let rates: Vec<f64> = [0, 100, 150]
            .into_iter()
            .map(|offset| {
                let at = t0 + chrono::Duration::milliseconds(offset);
                assert!(camera.emit_frame_at(RgbImage::new(8, 6), at));
                adapter.latest_frame().unwrap().measured_frame_rate
            })
            .collect();

        assert_eq!(rates, vec![0.0, 10.0, 20.0]);
        let latest = adapter.latest_frame().unwrap();
        assert_eq!(latest.device_frame_rate, 30.0);
        assert_eq!(latest.resolution(), Resolution::new(8, 6));
        assert_eq!(adapter.state(), VideoState::ImageObtained);
    }

    #[test]
    fn test_reopen_resets_rate_and_closes_previous() {
        let (camera, adapter) = setup();
        adapter.open("C920", None).unwrap();
        let t0 = Utc::now();
        camera.emit_frame_at(RgbImage::new(2, 2), t0);
        camera.emit_frame_at(RgbImage::new(2, 2), t0 + chrono::Duration::milliseconds(40));

        adapter.open("Integrated", None).unwrap();
        assert_eq!(camera.active().unwrap().0, "Integrated");
        assert_eq!(adapter.current_device().unwrap().name, "Integrated");

        camera.emit_frame_at(RgbImage::new(2, 2), t0 + chrono::Duration::milliseconds(80));
        assert_eq!(adapter.latest_frame().unwrap().measured_frame_rate, 0.0);
        assert_eq!(adapter.latest_frame().unwrap().device_frame_rate, 15.0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (camera, adapter) = setup();
        adapter.close();

        adapter.open("C920", None).unwrap();
        adapter.close();
        adapter.close();

        assert!(!adapter.is_open());
        assert_eq!(adapter.state(), VideoState::Closed);
        assert!(adapter.current_device().is_none());
        assert!(!camera.emit_frame(RgbImage::new(2, 2)));
    }

    #[test]
    fn test_unknown_device_leaves_adapter_closed() {
        let (_camera, adapter) = setup();
        adapter.open("C920", None).unwrap();

        let result = adapter.open("Absent", None);
        assert!(matches!(result, Err(VideoError::DeviceNotFound(_))));
        assert!(!adapter.is_open());
        assert_eq!(adapter.state(), VideoState::Closed);
    }

    #[test]
    fn test_unplug_marks_disposed() {
        let (camera, adapter) = setup();
        let mut state = adapter.subscribe_state();
        adapter.open("C920", None).unwrap();
        assert_eq!(*state.borrow_and_update(), VideoState::Open);

        camera.unplug("C920");
        assert_eq!(*state.borrow_and_update(), VideoState::Disposed);
        assert!(!adapter.is_open());
        assert!(adapter.current_device().is_none());
        assert!(adapter.current_resolution().is_none());

        // La webcam rebranchée peut être rouverte
        camera.plug(VideoDevice::new("C920", 30.0, vec![Resolution::new(640, 480)]));
        adapter.open("C920", None).unwrap();
        assert!(adapter.is_open());
        assert_eq!(adapter.current_device().unwrap().name, "C920");
    }

    /// Backend qui compte les sessions ouvertes et non fermées
    #[derive(Default)]
    struct CountingBackend {
        live: Arc<AtomicUsize>,
        max_live: Arc<AtomicUsize>,
    }

    struct CountingSession {
        live: Arc<AtomicUsize>,
        closed: bool,
    }

    impl CameraSession for CountingSession {
        fn close(&mut self) {
            if !std::mem::replace(&mut self.closed, true) {
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
        }

        fn resolution(&self) -> Option<Resolution> {
            None
        }
    }

    impl CameraBackend for CountingBackend {
        fn devices(&self) -> VideoResult<Vec<VideoDevice>> {
            Ok(vec![
                VideoDevice::new("A", 30.0, vec![Resolution::new(640, 480)]),
                VideoDevice::new("B", 30.0, vec![Resolution::new(640, 480)]),
            ])
        }

        fn discovery(&self) -> tokio::sync::broadcast::Receiver<crate::DiscoveryEvent> {
            tokio::sync::broadcast::channel(1).1
        }

        fn open(
            &self,
            _device: &str,
            _resolution: Option<Resolution>,
            _frame_interval: std::time::Duration,
            listener: Arc<dyn CameraListener>,
        ) -> VideoResult<Box<dyn CameraSession>> {
            let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_live.fetch_max(live, Ordering::SeqCst);
            // Élargit la fenêtre où une autre ouverture pourrait s'intercaler
            std::thread::sleep(std::time::Duration::from_millis(5));
            listener.on_open();
            Ok(Box::new(CountingSession {
                live: Arc::clone(&self.live),
                closed: false,
            }))
        }
    }

    #[test]
    fn test_concurrent_opens_never_leak_a_session() {
        let backend = CountingBackend::default();
        let live = Arc::clone(&backend.live);
        let max_live = Arc::clone(&backend.max_live);
        let adapter = VideoCaptureAdapter::new(Arc::new(backend), VideoConfig::default());

        std::thread::scope(|scope| {
            for name in ["A", "B", "A", "B"] {
                let adapter = &adapter;
                scope.spawn(move || {
                    for _ in 0..5 {
                        adapter.open(name, None).unwrap();
                    }
                });
            }
        });

        assert_eq!(live.load(Ordering::SeqCst), 1);
        assert_eq!(max_live.load(Ordering::SeqCst), 1);
        adapter.close();
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
