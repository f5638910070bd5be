//! Coordinateur de l'application
//!
//! Reçoit les choix de l'utilisateur (webcam, résolution, entrée et sortie
//! audio), pilote le routeur audio et l'adaptateur vidéo, et publie l'état
//! de sélection résultant. Aucune logique de périphérique ici : uniquement
//! de l'orchestration et la tenue des indicateurs d'erreur.

use std::sync::Arc;
use std::time::Duration;

use audio::{
    AudioConfig, AudioHost, AudioRouter, DeviceWatcher, Direction, PassthroughEngine,
    PlaybackStatus, RouteStats,
};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use video::{
    CameraBackend, CapturedFrame, Resolution, VideoCaptureAdapter, VideoConfig,
    VideoDeviceWatcher, VideoState,
};

use crate::selection::SelectionState;

/// Listes de périphériques suivies en continu
///
/// Les tâches de suivi s'arrêtent quand cette structure est détruite.
pub struct DeviceLists {
    pub audio_inputs: DeviceWatcher,
    pub audio_outputs: DeviceWatcher,
    pub videos: VideoDeviceWatcher,
}

pub struct Coordinator {
    audio_host: Arc<dyn AudioHost>,
    poll_interval: Duration,
    /// Sérialise les reconfigurations audio
    router: Mutex<Box<dyn AudioRouter>>,
    /// Sérialise les changements de webcam et de résolution
    video_lock: std::sync::Mutex<()>,
    video: VideoCaptureAdapter,
    state: watch::Sender<SelectionState>,
}

impl Coordinator {
    /// Construit le coordinateur avec le moteur de passthrough standard
    pub fn new(
        audio_host: Arc<dyn AudioHost>,
        audio_config: AudioConfig,
        camera: Arc<dyn CameraBackend>,
        video_config: VideoConfig,
    ) -> Self {
        let poll_interval = audio_config.poll_interval();
        let engine = PassthroughEngine::new(Arc::clone(&audio_host), audio_config);
        Self::with_router(
            audio_host,
            poll_interval,
            Box::new(engine),
            VideoCaptureAdapter::new(camera, video_config),
        )
    }

    pub fn with_router(
        audio_host: Arc<dyn AudioHost>,
        poll_interval: Duration,
        router: Box<dyn AudioRouter>,
        video: VideoCaptureAdapter,
    ) -> Self {
        let (state, _) = watch::channel(SelectionState::default());
        Self {
            audio_host,
            poll_interval,
            router: Mutex::new(router),
            video_lock: std::sync::Mutex::new(()),
            video,
            state,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SelectionState> {
        self.state.subscribe()
    }

    /// Démarre le suivi des périphériques audio (scrutation) et vidéo (événements)
    pub fn observe_devices(&self) -> DeviceLists {
        DeviceLists {
            audio_inputs: DeviceWatcher::spawn(
                Arc::clone(&self.audio_host),
                Direction::Input,
                self.poll_interval,
            ),
            audio_outputs: DeviceWatcher::spawn(
                Arc::clone(&self.audio_host),
                Direction::Output,
                self.poll_interval,
            ),
            videos: VideoDeviceWatcher::spawn(self.video.backend()),
        }
    }

    /// Choisit la webcam affichée (`None` la ferme)
    ///
    /// Un échec d'ouverture garde la sélection et lève `video_error`.
    pub fn select_video(&self, device: Option<&str>) -> SelectionState {
        let _guard = self.lock_video();
        if self.state.borrow().video.as_deref() == device {
            return self.state();
        }

        let Some(name) = device else {
            self.video.close();
            self.state.send_modify(|state| {
                state.video = None;
                state.video_resolution = None;
                state.video_error = false;
            });
            return self.state();
        };

        let error = match self.video.open(name, None) {
            Ok(opened) => {
                debug!(device = %opened.name, fps = opened.fps, "webcam sélectionnée");
                false
            }
            Err(err) => {
                warn!(device = name, error = %err, "ouverture de la webcam impossible");
                true
            }
        };
        self.state.send_modify(|state| {
            state.video = Some(name.to_string());
            state.video_resolution = None;
            state.video_error = error;
        });
        self.state()
    }

    /// Rouvre la webcam choisie dans une autre résolution, sans changer de webcam
    pub fn set_video_resolution(&self, resolution: Resolution) -> SelectionState {
        let _guard = self.lock_video();
        let selected = self.state.borrow().video.clone();
        let Some(name) = selected else {
            debug!(%resolution, "aucune webcam choisie, résolution ignorée");
            return self.state();
        };

        let error = match self.video.open(&name, Some(resolution)) {
            Ok(_) => false,
            Err(err) => {
                warn!(device = %name, %resolution, error = %err, "changement de résolution impossible");
                true
            }
        };
        self.state.send_modify(|state| {
            state.video_resolution = Some(resolution);
            state.video_error = error;
        });
        self.state()
    }

    fn lock_video(&self) -> std::sync::MutexGuard<'_, ()> {
        self.video_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn select_audio_input(&self, device: Option<String>) -> SelectionState {
        self.select_audio(Direction::Input, device).await
    }

    pub async fn select_audio_output(&self, device: Option<String>) -> SelectionState {
        self.select_audio(Direction::Output, device).await
    }

    async fn select_audio(&self, direction: Direction, device: Option<String>) -> SelectionState {
        let mut router = self.router.lock().await;

        let unchanged = self.state.borrow().audio_device(direction) == device.as_deref();
        if unchanged {
            return self.state();
        }

        let Some(name) = device else {
            router.stop().await;
            match direction {
                Direction::Input => router.set_input(None),
                Direction::Output => router.set_output(None),
            }
            self.state.send_modify(|state| state.clear_audio(direction));
            info!(%direction, "aucun périphérique audio, passthrough arrêté");
            return self.state();
        };

        let status = router.reconfigure(direction, Some(name.clone())).await;
        match status {
            PlaybackStatus::Playing => info!(%direction, device = %name, "passthrough audio actif"),
            failed => debug!(%direction, device = %name, ?failed, "passthrough audio inactif"),
        }
        self.state
            .send_modify(|state| state.apply_audio_status(direction, name, status));
        self.state()
    }

    pub async fn is_playing(&self) -> bool {
        self.router.lock().await.is_playing()
    }

    pub async fn audio_stats(&self) -> RouteStats {
        self.router.lock().await.stats()
    }

    pub fn video_state(&self) -> VideoState {
        self.video.state()
    }

    pub fn latest_frame(&self) -> Option<Arc<CapturedFrame>> {
        self.video.latest_frame()
    }

    pub fn subscribe_frames(&self) -> watch::Receiver<Option<Arc<CapturedFrame>>> {
        self.video.subscribe_frames()
    }

    /// Arrête le passthrough et ferme la webcam ; la sélection est conservée
    pub async fn shutdown(&self) {
        self.router.lock().await.stop().await;
        let _guard = self.lock_video();
        self.video.close();
        info!("coordinateur arrêté");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::SimulatedHost;
    use video::{SimulatedCamera, VideoDevice};

    fn coordinator() -> (Arc<SimulatedHost>, SimulatedCamera, Coordinator) {
        let host = Arc::new(SimulatedHost::new());
        let camera = SimulatedCamera::new();
        let coordinator = Coordinator::new(
            host.clone(),
            AudioConfig::default(),
            Arc::new(camera.clone()),
            VideoConfig::default(),
        );
        (host, camera, coordinator)
    }

    #[test]
    fn test_select_video_opens_and_closes() {
        let (_host, camera, coordinator) = coordinator();
        camera.plug(VideoDevice::new("C920", 30.0, vec![Resolution::new(640, 480)]));

        let state = coordinator.select_video(Some("C920"));
        assert_eq!(state.video.as_deref(), Some("C920"));
        assert!(!state.video_error);
        assert_eq!(coordinator.video_state(), VideoState::Open);

        let state = coordinator.select_video(None);
        assert_eq!(state.video, None);
        assert!(camera.active().is_none());
    }

    #[test]
    fn test_same_video_is_noop() {
        let (_host, camera, coordinator) = coordinator();
        camera.plug(VideoDevice::new("C920", 30.0, vec![Resolution::new(640, 480)]));

        coordinator.select_video(Some("C920"));
        coordinator.select_video(Some("C920"));
        assert_eq!(camera.open_count(), 1);
    }

    #[test]
    fn test_missing_video_sets_flag() {
        let (_host, _camera, coordinator) = coordinator();

        let state = coordinator.select_video(Some("Absente"));
        assert_eq!(state.video.as_deref(), Some("Absente"));
        assert!(state.video_error);

        let state = coordinator.select_video(None);
        assert!(!state.video_error);
    }

    #[test]
    fn test_resolution_reopens_same_device() {
        let (_host, camera, coordinator) = coordinator();
        camera.plug(VideoDevice::new(
            "C920",
            30.0,
            vec![Resolution::new(640, 480), Resolution::new(1920, 1080)],
        ));
        coordinator.select_video(Some("C920"));

        let state = coordinator.set_video_resolution(Resolution::new(1920, 1080));
        assert_eq!(state.video.as_deref(), Some("C920"));
        assert_eq!(state.video_resolution, Some(Resolution::new(1920, 1080)));
        assert_eq!(camera.active(), Some(("C920".to_string(), Some(Resolution::new(1920, 1080)))));
        assert_eq!(camera.open_count(), 2);
    }

    #[test]
    fn test_resolution_without_video_is_ignored() {
        let (_host, camera, coordinator) = coordinator();
        let state = coordinator.set_video_resolution(Resolution::new(1280, 720));
        assert_eq!(state, SelectionState::default());
        assert_eq!(camera.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_audio_input_is_noop() {
        let (host, _camera, coordinator) = coordinator();
        let micro = host.add_input("Micro");
        host.add_output("Casque");

        coordinator.select_audio_output(Some("Casque".into())).await;
        coordinator.select_audio_input(Some("Micro".into())).await;
        coordinator.select_audio_input(Some("Micro".into())).await;

        assert_eq!(micro.open_count(), 1);
        assert!(coordinator.is_playing().await);
        coordinator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_sees_audio_selection() {
        let (host, _camera, coordinator) = coordinator();
        host.add_input("Micro");
        let mut receiver = coordinator.subscribe();

        coordinator.select_audio_input(Some("Micro".into())).await;

        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().audio_input.as_deref(), Some("Micro"));
    }
}
