//! Énumération périodique des périphériques audio
//!
//! `snapshot()` fait une passe d'énumération filtrée ; `DeviceWatcher` la
//! répète à intervalle fixe sur une tâche tokio et publie la liste dans une
//! cellule `watch` (un écrivain, plusieurs lecteurs).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{AudioDevice, AudioHost, AudioResult, Direction};

/// Liste des périphériques utilisables dans un sens donné
///
/// Ne garde que les périphériques qui exposent la ligne demandée, sans
/// doublon de nom (la première occurrence gagne), dans l'ordre de la plateforme.
pub fn snapshot(host: &dyn AudioHost, direction: Direction) -> AudioResult<Vec<AudioDevice>> {
    let mut seen = HashSet::new();
    let devices = host
        .devices()?
        .into_iter()
        .filter(|device| device.direction == direction && device.supports_line)
        .filter(|device| seen.insert(device.name.clone()))
        .collect();
    Ok(devices)
}

/// Tâche de scrutation des périphériques d'un sens
///
/// La tâche est annulée quand le watcher est détruit. Pour relancer la
/// séquence, il suffit de créer un nouveau watcher.
pub struct DeviceWatcher {
    direction: Direction,
    receiver: watch::Receiver<Vec<AudioDevice>>,
    task: JoinHandle<()>,
}

impl DeviceWatcher {
    /// Lance la scrutation ; la première énumération a lieu immédiatement
    pub fn spawn(host: Arc<dyn AudioHost>, direction: Direction, interval: Duration) -> Self {
        let (sender, receiver) = watch::channel(Vec::new());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match snapshot(host.as_ref(), direction) {
                    Ok(devices) => {
                        // Pas de notification si la liste n'a pas changé
                        sender.send_if_modified(|current| {
                            if *current == devices {
                                return false;
                            }
                            debug!(?direction, count = devices.len(), "liste des périphériques mise à jour");
                            *current = devices;
                            true
                        });
                    }
                    Err(err) => warn!(?direction, error = %err, "énumération audio impossible"),
                }
                if sender.is_closed() {
                    break;
                }
            }
        });

        Self {
            direction,
            receiver,
            task,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Nouvel abonné à la liste courante
    pub fn subscribe(&self) -> watch::Receiver<Vec<AudioDevice>> {
        self.receiver.clone()
    }

    /// Dernière liste publiée
    pub fn current(&self) -> Vec<AudioDevice> {
        self.receiver.borrow().clone()
    }
}

impl Drop for DeviceWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedHost;

    #[test]
    fn test_snapshot_filters_by_capability() {
        let host = SimulatedHost::new();
        host.add_input("Mic");
        host.add_output("Speakers");
        host.add_duplex("Headset");

        let inputs: Vec<_> = snapshot(&host, Direction::Input).unwrap().into_iter().map(|d| d.name).collect();
        let outputs: Vec<_> = snapshot(&host, Direction::Output).unwrap().into_iter().map(|d| d.name).collect();

        assert_eq!(inputs, vec!["Mic", "Headset"]);
        assert_eq!(outputs, vec!["Speakers", "Headset"]);
    }

    #[test]
    fn test_snapshot_has_no_duplicates() {
        let host = SimulatedHost::new();
        host.add_input("USB Audio");
        host.add_input("Mic");
        host.add_input("USB Audio");

        let names: Vec<_> = snapshot(&host, Direction::Input).unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["USB Audio", "Mic"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_publishes_changes() {
        let host = Arc::new(SimulatedHost::new());
        host.add_input("Mic");

        let watcher = DeviceWatcher::spawn(host.clone(), Direction::Input, Duration::from_secs(1));
        let mut receiver = watcher.subscribe();

        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().len(), 1);

        host.add_input("USB Audio");
        receiver.changed().await.unwrap();
        let names: Vec<_> = receiver.borrow_and_update().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names, vec!["Mic", "USB Audio"]);

        host.remove("Mic");
        receiver.changed().await.unwrap();
        assert_eq!(watcher.current().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_skips_identical_lists() {
        let host = Arc::new(SimulatedHost::new());
        host.add_input("Mic");

        let watcher = DeviceWatcher::spawn(host.clone(), Direction::Input, Duration::from_secs(1));
        let mut receiver = watcher.subscribe();
        receiver.changed().await.unwrap();
        let _ = receiver.borrow_and_update();

        // Plusieurs ticks sans changement : aucune notification
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(!receiver.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let host = Arc::new(SimulatedHost::new());
        let watcher = DeviceWatcher::spawn(host, Direction::Output, Duration::from_secs(1));
        let mut receiver = watcher.subscribe();

        drop(watcher);
        // L'émetteur disparaît avec la tâche annulée
        assert!(receiver.changed().await.is_err());
    }
}
