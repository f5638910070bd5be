//! Host audio simulé (sans vrai matériel)
//!
//! Permet de tester le moteur de passthrough et le coordinateur sans carte
//! son : les lignes de capture rejouent des bytes injectés, les lignes de
//! lecture enregistrent tout ce qui leur est écrit, et l'ouverture peut être
//! forcée en échec.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::{
    AudioDevice, AudioError, AudioHost, AudioResult, CaptureLine, Direction, LineFormat,
    PlaybackLine,
};

/// Verrouille en récupérant l'état même si un thread a paniqué
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct SimulatedDevice {
    name: String,
    capture: Option<Arc<SimulatedCaptureLine>>,
    playback: Option<Arc<SimulatedPlaybackLine>>,
}

/// Host audio en mémoire
#[derive(Default)]
pub struct SimulatedHost {
    devices: Mutex<Vec<SimulatedDevice>>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute un périphérique de capture uniquement
    pub fn add_input(&self, name: &str) -> Arc<SimulatedCaptureLine> {
        let line = Arc::new(SimulatedCaptureLine::new(name));
        lock(&self.devices).push(SimulatedDevice {
            name: name.to_string(),
            capture: Some(Arc::clone(&line)),
            playback: None,
        });
        line
    }

    /// Ajoute un périphérique de lecture uniquement
    pub fn add_output(&self, name: &str) -> Arc<SimulatedPlaybackLine> {
        let line = Arc::new(SimulatedPlaybackLine::new(name));
        lock(&self.devices).push(SimulatedDevice {
            name: name.to_string(),
            capture: None,
            playback: Some(Arc::clone(&line)),
        });
        line
    }

    /// Ajoute un périphérique qui sait capturer et lire (casque USB, carte externe)
    pub fn add_duplex(&self, name: &str) -> (Arc<SimulatedCaptureLine>, Arc<SimulatedPlaybackLine>) {
        let capture = Arc::new(SimulatedCaptureLine::new(name));
        let playback = Arc::new(SimulatedPlaybackLine::new(name));
        lock(&self.devices).push(SimulatedDevice {
            name: name.to_string(),
            capture: Some(Arc::clone(&capture)),
            playback: Some(Arc::clone(&playback)),
        });
        (capture, playback)
    }

    /// Simule un débranchement : le périphérique disparaît de l'énumération
    pub fn remove(&self, name: &str) {
        lock(&self.devices).retain(|device| device.name != name);
    }
}

impl AudioHost for SimulatedHost {
    fn devices(&self) -> AudioResult<Vec<AudioDevice>> {
        let devices = lock(&self.devices);
        let mut result = Vec::with_capacity(devices.len() * 2);
        for device in devices.iter() {
            result.push(AudioDevice::new(&device.name, Direction::Input, device.capture.is_some()));
            result.push(AudioDevice::new(&device.name, Direction::Output, device.playback.is_some()));
        }
        Ok(result)
    }

    fn capture_line(&self, device: &str) -> AudioResult<Arc<dyn CaptureLine>> {
        let devices = lock(&self.devices);
        let found = devices
            .iter()
            .find(|d| d.name == device)
            .ok_or_else(|| AudioError::DeviceNotFound(device.to_string()))?;
        match &found.capture {
            Some(line) => Ok(Arc::clone(line) as Arc<dyn CaptureLine>),
            None => Err(AudioError::LineNotSupported {
                device: device.to_string(),
                direction: Direction::Input,
            }),
        }
    }

    fn playback_line(&self, device: &str) -> AudioResult<Arc<dyn PlaybackLine>> {
        let devices = lock(&self.devices);
        let found = devices
            .iter()
            .find(|d| d.name == device)
            .ok_or_else(|| AudioError::DeviceNotFound(device.to_string()))?;
        match &found.playback {
            Some(line) => Ok(Arc::clone(line) as Arc<dyn PlaybackLine>),
            None => Err(AudioError::LineNotSupported {
                device: device.to_string(),
                direction: Direction::Output,
            }),
        }
    }

    fn name(&self) -> &str {
        "simulé"
    }
}

#[derive(Default)]
struct CaptureState {
    open: bool,
    pending: VecDeque<u8>,
    finished: bool,
    fail_open: Option<String>,
    open_count: usize,
    format: Option<LineFormat>,
}

/// Ligne de capture qui rejoue les bytes injectés via `push()`
pub struct SimulatedCaptureLine {
    name: String,
    state: Mutex<CaptureState>,
    readable: Condvar,
}

impl SimulatedCaptureLine {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(CaptureState::default()),
            readable: Condvar::new(),
        }
    }

    /// Injecte des bytes qui seront retournés par les prochaines lectures
    pub fn push(&self, bytes: &[u8]) {
        lock(&self.state).pending.extend(bytes.iter().copied());
        self.readable.notify_all();
    }

    /// Signale la fin du flux : une fois le tampon vidé, `read` retourne `None`
    pub fn finish(&self) {
        lock(&self.state).finished = true;
        self.readable.notify_all();
    }

    /// Force l'échec des prochaines ouvertures (`None` pour rétablir)
    pub fn fail_open(&self, reason: Option<&str>) {
        lock(&self.state).fail_open = reason.map(str::to_string);
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    pub fn format(&self) -> Option<LineFormat> {
        lock(&self.state).format
    }
}

impl CaptureLine for SimulatedCaptureLine {
    fn open(&self, format: LineFormat) -> AudioResult<()> {
        let mut state = lock(&self.state);
        if let Some(reason) = &state.fail_open {
            return Err(AudioError::LineUnavailable {
                device: self.name.clone(),
                reason: reason.clone(),
            });
        }
        state.open = true;
        state.open_count += 1;
        state.format = Some(format);
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> AudioResult<Option<usize>> {
        let mut state = lock(&self.state);
        loop {
            if !state.open {
                return Ok(None);
            }
            if !state.pending.is_empty() {
                let count = buf.len().min(state.pending.len());
                for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..count)) {
                    *slot = byte;
                }
                return Ok(Some(count));
            }
            if state.finished {
                return Ok(None);
            }
            state = self
                .readable
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn close(&self) {
        lock(&self.state).open = false;
        self.readable.notify_all();
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn device_name(&self) -> &str {
        &self.name
    }
}

#[derive(Default)]
struct PlaybackState {
    open: bool,
    written: Vec<u8>,
    /// Total écrit depuis la création, y compris les bytes oubliés
    total_written: usize,
    /// Nombre maximal de bytes conservés (`None` = tout garder)
    retain: Option<usize>,
    fail_open: Option<String>,
    open_count: usize,
}

/// Ligne de lecture qui enregistre ce qui lui est écrit
pub struct SimulatedPlaybackLine {
    name: String,
    state: Mutex<PlaybackState>,
    written: Condvar,
}

impl SimulatedPlaybackLine {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(PlaybackState::default()),
            written: Condvar::new(),
        }
    }

    /// Copie des bytes conservés (tous, sauf si `retain_last` a été appelé)
    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).written.clone()
    }

    /// Nombre total de bytes écrits depuis la création de la ligne
    pub fn total_written(&self) -> usize {
        lock(&self.state).total_written
    }

    /// Ne conserve que les `limit` derniers bytes écrits
    ///
    /// Pour les essais de longue durée, où l'enregistrement complet
    /// grossirait sans fin.
    pub fn retain_last(&self, limit: usize) {
        let mut state = lock(&self.state);
        state.retain = Some(limit);
        trim_front(&mut state.written, limit);
    }

    pub fn fail_open(&self, reason: Option<&str>) {
        lock(&self.state).fail_open = reason.map(str::to_string);
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    /// Attend (en bloquant le thread courant) qu'au moins `len` bytes aient été écrits
    ///
    /// Retourne `false` si le délai expire avant.
    pub fn wait_for_bytes(&self, len: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.state);
        while state.total_written < len {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.written.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

fn trim_front(bytes: &mut Vec<u8>, limit: usize) {
    if bytes.len() > limit {
        let excess = bytes.len() - limit;
        bytes.drain(..excess);
    }
}

impl PlaybackLine for SimulatedPlaybackLine {
    fn open(&self, _format: LineFormat) -> AudioResult<()> {
        let mut state = lock(&self.state);
        if let Some(reason) = &state.fail_open {
            return Err(AudioError::LineUnavailable {
                device: self.name.clone(),
                reason: reason.clone(),
            });
        }
        state.open = true;
        state.open_count += 1;
        Ok(())
    }

    fn write(&self, buf: &[u8]) -> AudioResult<()> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(AudioError::LineClosed(self.name.clone()));
        }
        state.written.extend_from_slice(buf);
        state.total_written += buf.len();
        if let Some(limit) = state.retain {
            trim_front(&mut state.written, limit);
        }
        self.written.notify_all();
        Ok(())
    }

    fn close(&self) {
        lock(&self.state).open = false;
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn device_name(&self) -> &str {
        &self.name
    }
}
