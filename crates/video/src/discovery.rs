//! Suivi des webcams branchées
//!
//! Pas de scrutation : la liste est publiée dès l'abonnement, puis à chaque
//! branchement ou débranchement signalé par le backend.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{CameraBackend, VideoDevice, VideoResult};

/// Liste des webcams, sans doublon de nom
pub fn list_devices(backend: &dyn CameraBackend) -> VideoResult<Vec<VideoDevice>> {
    let mut seen = HashSet::new();
    Ok(backend
        .devices()?
        .into_iter()
        .filter(|device| seen.insert(device.name.clone()))
        .collect())
}

fn publish(backend: &dyn CameraBackend, sender: &watch::Sender<Vec<VideoDevice>>) {
    match list_devices(backend) {
        Ok(devices) => {
            sender.send_if_modified(|current| {
                if *current == devices {
                    return false;
                }
                debug!(count = devices.len(), "liste des webcams mise à jour");
                *current = devices;
                true
            });
        }
        Err(err) => warn!(error = %err, "énumération des webcams impossible"),
    }
}

/// Tâche de suivi des webcams, annulée à la destruction
pub struct VideoDeviceWatcher {
    receiver: watch::Receiver<Vec<VideoDevice>>,
    task: JoinHandle<()>,
}

impl VideoDeviceWatcher {
    pub fn spawn(backend: Arc<dyn CameraBackend>) -> Self {
        // Abonnement avant la première énumération pour ne rater aucun événement
        let mut events = backend.discovery();
        let (sender, receiver) = watch::channel(Vec::new());
        publish(backend.as_ref(), &sender);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!(?event, "événement de découverte webcam");
                        publish(backend.as_ref(), &sender);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "événements de découverte perdus, nouvelle énumération");
                        publish(backend.as_ref(), &sender);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { receiver, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<VideoDevice>> {
        self.receiver.clone()
    }

    pub fn current(&self) -> Vec<VideoDevice> {
        self.receiver.borrow().clone()
    }
}

impl Drop for VideoDeviceWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
