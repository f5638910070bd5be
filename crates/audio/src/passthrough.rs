//! Moteur de passthrough audio
//!
//! Copie en continu les bytes d'une ligne de capture vers une ligne de
//! lecture, sans les modifier :
//!
//! ```text
//! Entrée → [CaptureLine::read] → bloc de N bytes → [PlaybackLine::write] → Sortie
//! ```
//!
//! La boucle de copie bloque sur la lecture ; elle tourne donc sur le pool
//! bloquant de tokio (`spawn_blocking`). Une seule route est active à la fois.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::types::RouteCounters;
use crate::{
    AudioConfig, AudioError, AudioHost, AudioResult, AudioRouter, CaptureLine, Direction,
    PlaybackLine, PlaybackStatus, RouteStats,
};

/// Route audio active : les deux lignes ouvertes et la tâche de copie
struct ActiveAudioRoute {
    input: Arc<dyn CaptureLine>,
    output: Arc<dyn PlaybackLine>,
    cancel: Arc<AtomicBool>,
    counters: Arc<RouteCounters>,
    task: JoinHandle<RouteStats>,
}

impl ActiveAudioRoute {
    /// Demande l'arrêt de la boucle et libère les lignes, sans attendre
    fn release(&self) {
        self.cancel.store(true, Ordering::Release);
        // Fermer l'entrée débloque une lecture en cours
        self.input.close();
        self.output.close();
    }

    /// Libère les lignes puis attend la fin de la boucle de copie
    async fn shutdown(self) -> RouteStats {
        self.release();
        match self.task.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "la boucle de copie s'est terminée anormalement");
                self.counters.snapshot()
            }
        }
    }
}

/// Moteur de passthrough : une entrée, une sortie, une boucle de copie
pub struct PassthroughEngine {
    host: Arc<dyn AudioHost>,
    config: AudioConfig,
    input: Option<String>,
    output: Option<String>,
    route: Option<ActiveAudioRoute>,
    last_stats: RouteStats,
}

impl PassthroughEngine {
    pub fn new(host: Arc<dyn AudioHost>, config: AudioConfig) -> Self {
        Self {
            host,
            config,
            input: None,
            output: None,
            route: None,
            last_stats: RouteStats::default(),
        }
    }

    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    fn acquire_input(&self) -> AudioResult<Arc<dyn CaptureLine>> {
        let name = self
            .input
            .as_deref()
            .ok_or(AudioError::NoDeviceSelected(Direction::Input))?;
        self.host.capture_line(name)
    }

    fn acquire_output(&self) -> AudioResult<Arc<dyn PlaybackLine>> {
        let name = self
            .output
            .as_deref()
            .ok_or(AudioError::NoDeviceSelected(Direction::Output))?;
        self.host.playback_line(name)
    }
}

#[async_trait]
impl AudioRouter for PassthroughEngine {
    fn set_input(&mut self, device: Option<String>) {
        self.input = device;
    }

    fn set_output(&mut self, device: Option<String>) {
        self.output = device;
    }

    async fn start(&mut self) -> PlaybackStatus {
        if self.route.is_some() {
            self.stop().await;
        }

        // Ordre canonique : acquisition entrée, acquisition sortie, ouverture
        // entrée, ouverture sortie. Le premier échec est retourné.
        let input = match self.acquire_input() {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "entrée audio indisponible");
                return PlaybackStatus::InputUnavailable;
            }
        };
        let output = match self.acquire_output() {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "sortie audio indisponible");
                return PlaybackStatus::OutputUnavailable;
            }
        };

        let format = self.config.line_format();
        if let Err(err) = input.open(format) {
            warn!(device = input.device_name(), error = %err, "ouverture de l'entrée impossible");
            return PlaybackStatus::InputUnavailable;
        }
        if let Err(err) = output.open(format) {
            warn!(device = output.device_name(), error = %err, "ouverture de la sortie impossible");
            input.close();
            return PlaybackStatus::OutputUnavailable;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(RouteCounters::default());
        let task = {
            let input = Arc::clone(&input);
            let output = Arc::clone(&output);
            let cancel = Arc::clone(&cancel);
            let counters = Arc::clone(&counters);
            let block_size = self.config.block_size;
            tokio::task::spawn_blocking(move || copy_loop(input, output, block_size, cancel, counters))
        };

        info!(
            input = input.device_name(),
            output = output.device_name(),
            host = self.host.name(),
            block_size = self.config.block_size,
            "passthrough audio démarré"
        );

        self.route = Some(ActiveAudioRoute {
            input,
            output,
            cancel,
            counters,
            task,
        });
        PlaybackStatus::Playing
    }

    async fn stop(&mut self) {
        let Some(route) = self.route.take() else {
            return;
        };
        let stats = route.shutdown().await;
        info!(bytes = stats.bytes_copied, blocks = stats.blocks, "passthrough audio arrêté");
        self.last_stats = stats;
    }

    async fn reconfigure(&mut self, direction: Direction, device: Option<String>) -> PlaybackStatus {
        self.stop().await;
        tokio::time::sleep(self.config.settle_delay()).await;
        match direction {
            Direction::Input => self.set_input(device),
            Direction::Output => self.set_output(device),
        }
        self.start().await
    }

    fn is_playing(&self) -> bool {
        self.route
            .as_ref()
            .is_some_and(|route| !route.task.is_finished())
    }

    fn stats(&self) -> RouteStats {
        match &self.route {
            Some(route) => route.counters.snapshot(),
            None => self.last_stats,
        }
    }
}

impl Drop for PassthroughEngine {
    fn drop(&mut self) {
        if let Some(route) = self.route.take() {
            debug!("libération de la route audio à la destruction du moteur");
            route.release();
        }
    }
}

/// Boucle de copie entrée → sortie
///
/// S'arrête quand l'annulation est demandée, quand l'entrée signale la fin du
/// flux, ou sur une erreur de lecture/écriture.
fn copy_loop(
    input: Arc<dyn CaptureLine>,
    output: Arc<dyn PlaybackLine>,
    block_size: usize,
    cancel: Arc<AtomicBool>,
    counters: Arc<RouteCounters>,
) -> RouteStats {
    let mut buffer = vec![0u8; block_size];

    while !cancel.load(Ordering::Acquire) {
        let read = match input.read(&mut buffer) {
            Ok(Some(read)) => read,
            Ok(None) => {
                debug!(device = input.device_name(), "fin du flux d'entrée");
                break;
            }
            Err(err) => {
                warn!(device = input.device_name(), error = %err, "erreur de lecture");
                break;
            }
        };
        if read == 0 {
            continue;
        }

        if let Err(err) = output.write(&buffer[..read]) {
            if cancel.load(Ordering::Acquire) {
                debug!("écriture interrompue par l'arrêt de la route");
            } else {
                warn!(device = output.device_name(), error = %err, "erreur d'écriture");
            }
            break;
        }
        counters.record(read);
    }

    counters.snapshot()
}
