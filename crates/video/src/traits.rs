//! Traits abstraits pour l'accès aux webcams
//!
//! L'API webcam de la plateforme est consommée derrière ces traits ; la
//! crate fournit `SimulatedCamera` pour les tests et les essais à blanc.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::{DiscoveryEvent, RawFrame, Resolution, VideoDevice, VideoResult};

/// Récepteur des événements d'une webcam ouverte
///
/// Le backend appelle ces méthodes depuis son propre thread d'acquisition.
pub trait CameraListener: Send + Sync {
    fn on_open(&self);

    fn on_closed(&self);

    /// La webcam a été débranchée ou libérée par le système
    fn on_disposed(&self);

    fn on_image(&self, frame: RawFrame);
}

/// Session ouverte sur une webcam
pub trait CameraSession: Send {
    /// Ferme la webcam et retire le listener. Idempotent.
    fn close(&mut self);

    fn resolution(&self) -> Option<Resolution>;
}

/// Backend caméra de la plateforme
pub trait CameraBackend: Send + Sync {
    /// Webcams actuellement branchées
    fn devices(&self) -> VideoResult<Vec<VideoDevice>>;

    /// Flux des branchements/débranchements
    fn discovery(&self) -> broadcast::Receiver<DiscoveryEvent>;

    /// Ouvre une webcam en mode non bloquant : les images arrivent sur `listener`
    ///
    /// `resolution` à `None` laisse le pilote choisir. `frame_interval` est
    /// l'intervalle visé entre deux acquisitions.
    fn open(
        &self,
        device: &str,
        resolution: Option<Resolution>,
        frame_interval: Duration,
        listener: Arc<dyn CameraListener>,
    ) -> VideoResult<Box<dyn CameraSession>>;
}
