//! Host audio réel utilisant cpal
//!
//! cpal fonctionne avec des callbacks alors que le moteur de passthrough
//! attend des lignes bloquantes (read/write). Chaque ligne fait donc le pont :
//!
//! ```text
//! callback entrée cpal → canal borné → CaptureLine::read
//! PlaybackLine::write → canal borné → callback sortie cpal
//! ```
//!
//! Le `cpal::Stream` n'est pas transférable entre threads sur toutes les
//! plateformes : chaque ligne ouverte le garde sur un thread dédié
//! (`StreamKeeper`) qui le détruit à la fermeture.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::{debug, warn};

use crate::{
    AudioDevice, AudioError, AudioHost, AudioResult, CaptureLine, Direction, LineFormat,
    PlaybackLine,
};

/// Nombre de chunks en attente entre le callback et la ligne
const CHANNEL_CAPACITY: usize = 64;

/// Période de réveil d'une lecture bloquée, pour observer la fermeture
const READ_POLL: Duration = Duration::from_millis(100);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Nom lisible d'un périphérique cpal
fn device_name(device: &Device) -> String {
    device
        .description()
        .ok()
        .map(|desc| desc.name().to_string())
        .unwrap_or_else(|| "Périphérique inconnu".to_string())
}

fn supports_capture(device: &Device) -> bool {
    device
        .supported_input_configs()
        .map(|mut configs| configs.next().is_some())
        .unwrap_or(false)
}

fn supports_playback(device: &Device) -> bool {
    device
        .supported_output_configs()
        .map(|mut configs| configs.next().is_some())
        .unwrap_or(false)
}

fn find_device(name: &str) -> AudioResult<Device> {
    let host = cpal::default_host();
    host.devices()?
        .find(|device| device_name(device) == name)
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}

/// Choisit une configuration de stream compatible avec le format des lignes
///
/// Préfère i16 (aucune conversion), puis f32, puis u16.
fn select_config(
    ranges: impl Iterator<Item = SupportedStreamConfigRange>,
    format: LineFormat,
) -> Option<(StreamConfig, SampleFormat)> {
    let rank = |sample_format: SampleFormat| match sample_format {
        SampleFormat::I16 => 0,
        SampleFormat::F32 => 1,
        SampleFormat::U16 => 2,
        _ => 3,
    };

    let best = ranges
        .filter(|range| {
            range.channels() == format.channels
                && range.min_sample_rate() <= format.sample_rate
                && format.sample_rate <= range.max_sample_rate()
        })
        .min_by_key(|range| rank(range.sample_format()))?;

    let config = StreamConfig {
        channels: format.channels,
        sample_rate: format.sample_rate,
        buffer_size: BufferSize::Default,
    };
    Some((config, best.sample_format()))
}

fn unsupported_format(device: &str, format: LineFormat) -> AudioError {
    AudioError::LineUnavailable {
        device: device.to_string(),
        reason: format!(
            "format non supporté : {} Hz, {} canaux",
            format.sample_rate, format.channels
        ),
    }
}

/// Host audio par défaut du système (WASAPI, CoreAudio, ALSA/PulseAudio)
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalHost;

impl CpalHost {
    pub fn new() -> Self {
        Self
    }
}

impl AudioHost for CpalHost {
    fn devices(&self) -> AudioResult<Vec<AudioDevice>> {
        let host = cpal::default_host();
        let mut result = Vec::new();
        for device in host.devices()? {
            let name = device_name(&device);
            result.push(AudioDevice::new(&name, Direction::Input, supports_capture(&device)));
            result.push(AudioDevice::new(name, Direction::Output, supports_playback(&device)));
        }
        Ok(result)
    }

    fn capture_line(&self, device: &str) -> AudioResult<Arc<dyn CaptureLine>> {
        let found = find_device(device)?;
        if !supports_capture(&found) {
            return Err(AudioError::LineNotSupported {
                device: device.to_string(),
                direction: Direction::Input,
            });
        }
        Ok(Arc::new(CpalCaptureLine::new(device)))
    }

    fn playback_line(&self, device: &str) -> AudioResult<Arc<dyn PlaybackLine>> {
        let found = find_device(device)?;
        if !supports_playback(&found) {
            return Err(AudioError::LineNotSupported {
                device: device.to_string(),
                direction: Direction::Output,
            });
        }
        Ok(Arc::new(CpalPlaybackLine::new(device)))
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

/// Thread propriétaire d'un `cpal::Stream` en cours de lecture
struct StreamKeeper {
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl StreamKeeper {
    /// Construit le stream sur un thread dédié et attend qu'il soit démarré
    fn spawn<F>(device: &str, build: F) -> AudioResult<Self>
    where
        F: FnOnce() -> AudioResult<Stream> + Send + 'static,
    {
        let (ready_tx, ready_rx) = bounded::<AudioResult<()>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread = std::thread::Builder::new()
            .name(format!("audio-line-{device}"))
            .spawn(move || {
                let stream = match build().and_then(|stream| {
                    stream.play()?;
                    Ok(stream)
                }) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Bloque jusqu'à la fermeture de la ligne
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|err| AudioError::LineUnavailable {
                device: device.to_string(),
                reason: format!("thread audio: {err}"),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop: stop_tx,
                thread: Some(thread),
            }),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => Err(AudioError::LineUnavailable {
                device: device.to_string(),
                reason: "le thread audio s'est arrêté avant le démarrage".to_string(),
            }),
        }
    }

    fn shutdown(mut self) {
        let _ = self.stop.try_send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for StreamKeeper {
    fn drop(&mut self) {
        let _ = self.stop.try_send(());
    }
}

/// Encode des échantillons en i16 little-endian
fn encode_samples<T: Copy>(data: &[T], to_i16: impl Fn(T) -> i16) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 2);
    for &sample in data {
        bytes.extend_from_slice(&to_i16(sample).to_le_bytes());
    }
    bytes
}

/// Remplit le buffer de sortie depuis les chunks i16 reçus, avec du silence en cas d'underrun
fn fill_output<T: Copy>(
    data: &mut [T],
    pending: &mut VecDeque<u8>,
    receiver: &Receiver<Vec<u8>>,
    from_i16: impl Fn(i16) -> T,
    silence: T,
) {
    for slot in data.iter_mut() {
        while pending.len() < 2 {
            match receiver.try_recv() {
                Ok(chunk) => pending.extend(chunk),
                Err(_) => break,
            }
        }
        *slot = match (pending.pop_front(), pending.pop_front()) {
            (Some(lo), Some(hi)) => from_i16(i16::from_le_bytes([lo, hi])),
            _ => silence,
        };
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn u16_to_i16(sample: u16) -> i16 {
    (sample as i32 - 32_768) as i16
}

fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}

fn i16_to_u16(sample: i16) -> u16 {
    (sample as i32 + 32_768) as u16
}

fn build_capture_stream(name: &str, format: LineFormat, sender: Sender<Vec<u8>>) -> AudioResult<Stream> {
    let device = find_device(name)?;
    let ranges = device
        .supported_input_configs()
        .map_err(|err| AudioError::ConfigError(format!("configs d'entrée indisponibles: {err}")))?;
    let (config, sample_format) =
        select_config(ranges, format).ok_or_else(|| unsupported_format(name, format))?;

    debug!(device = name, ?sample_format, sample_rate = format.sample_rate, channels = format.channels, "ouverture capture");

    let err_name = name.to_string();
    let err_fn = move |err: cpal::StreamError| warn!(device = %err_name, error = %err, "erreur du stream de capture");

    // Chunk perdu si la boucle de copie est en retard : on ne bloque jamais le callback
    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = sender.try_send(encode_samples(data, |s| s));
            },
            err_fn,
            None,
        )?,
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = sender.try_send(encode_samples(data, f32_to_i16));
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let _ = sender.try_send(encode_samples(data, u16_to_i16));
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(AudioError::ConfigError(format!("Format d'échantillon non supporté : {:?}", other)));
        }
    };
    Ok(stream)
}

fn build_playback_stream(name: &str, format: LineFormat, receiver: Receiver<Vec<u8>>) -> AudioResult<Stream> {
    let device = find_device(name)?;
    let ranges = device
        .supported_output_configs()
        .map_err(|err| AudioError::ConfigError(format!("configs de sortie indisponibles: {err}")))?;
    let (config, sample_format) =
        select_config(ranges, format).ok_or_else(|| unsupported_format(name, format))?;

    debug!(device = name, ?sample_format, sample_rate = format.sample_rate, channels = format.channels, "ouverture lecture");

    let err_name = name.to_string();
    let err_fn = move |err: cpal::StreamError| warn!(device = %err_name, error = %err, "erreur du stream de lecture");
    let mut pending = VecDeque::new();

    let stream = match sample_format {
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                fill_output(data, &mut pending, &receiver, |s| s, 0);
            },
            err_fn,
            None,
        )?,
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                fill_output(data, &mut pending, &receiver, i16_to_f32, 0.0);
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_output_stream(
            &config,
            move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                fill_output(data, &mut pending, &receiver, i16_to_u16, 32_768);
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(AudioError::ConfigError(format!("Format d'échantillon non supporté : {:?}", other)));
        }
    };
    Ok(stream)
}

#[derive(Default)]
struct CaptureReader {
    receiver: Option<Receiver<Vec<u8>>>,
    leftover: VecDeque<u8>,
}

/// Ligne de capture cpal
pub struct CpalCaptureLine {
    name: String,
    open: AtomicBool,
    keeper: Mutex<Option<StreamKeeper>>,
    reader: Mutex<CaptureReader>,
}

impl CpalCaptureLine {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            open: AtomicBool::new(false),
            keeper: Mutex::new(None),
            reader: Mutex::new(CaptureReader::default()),
        }
    }
}

impl CaptureLine for CpalCaptureLine {
    fn open(&self, format: LineFormat) -> AudioResult<()> {
        self.close();

        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let name = self.name.clone();
        let keeper = StreamKeeper::spawn(&self.name, move || build_capture_stream(&name, format, sender))?;

        {
            let mut reader = lock(&self.reader);
            reader.receiver = Some(receiver);
            reader.leftover.clear();
        }
        *lock(&self.keeper) = Some(keeper);
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> AudioResult<Option<usize>> {
        let mut reader = lock(&self.reader);
        loop {
            if !self.open.load(Ordering::Acquire) {
                return Ok(None);
            }
            if !reader.leftover.is_empty() {
                let count = buf.len().min(reader.leftover.len());
                for (slot, byte) in buf.iter_mut().zip(reader.leftover.drain(..count)) {
                    *slot = byte;
                }
                return Ok(Some(count));
            }
            let Some(receiver) = reader.receiver.clone() else {
                return Ok(None);
            };
            match receiver.recv_timeout(READ_POLL) {
                Ok(chunk) => reader.leftover.extend(chunk),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    reader.receiver = None;
                    return Ok(None);
                }
            }
        }
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
        if let Some(keeper) = lock(&self.keeper).take() {
            keeper.shutdown();
            debug!(device = %self.name, "ligne de capture fermée");
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn device_name(&self) -> &str {
        &self.name
    }
}

/// Ligne de lecture cpal
pub struct CpalPlaybackLine {
    name: String,
    keeper: Mutex<Option<StreamKeeper>>,
    sender: Mutex<Option<Sender<Vec<u8>>>>,
}

impl CpalPlaybackLine {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keeper: Mutex::new(None),
            sender: Mutex::new(None),
        }
    }
}

impl PlaybackLine for CpalPlaybackLine {
    fn open(&self, format: LineFormat) -> AudioResult<()> {
        self.close();

        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let name = self.name.clone();
        let keeper = StreamKeeper::spawn(&self.name, move || build_playback_stream(&name, format, receiver))?;

        *lock(&self.sender) = Some(sender);
        *lock(&self.keeper) = Some(keeper);
        Ok(())
    }

    fn write(&self, buf: &[u8]) -> AudioResult<()> {
        // Clone hors du verrou : l'envoi peut bloquer si la sortie est en retard
        let sender = lock(&self.sender)
            .clone()
            .ok_or_else(|| AudioError::LineClosed(self.name.clone()))?;
        sender
            .send(buf.to_vec())
            .map_err(|_| AudioError::LineClosed(self.name.clone()))
    }

    fn close(&self) {
        lock(&self.sender).take();
        if let Some(keeper) = lock(&self.keeper).take() {
            keeper.shutdown();
            debug!(device = %self.name, "ligne de lecture fermée");
        }
    }

    fn is_open(&self) -> bool {
        lock(&self.sender).is_some()
    }

    fn device_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::SupportedBufferSize;

    fn range(channels: u16, min: u32, max: u32, sample_format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(channels, min, max, SupportedBufferSize::Unknown, sample_format)
    }

    #[test]
    fn test_select_config_prefers_i16() {
        let format = LineFormat { sample_rate: 48000, channels: 2 };
        let ranges = vec![
            range(2, 44100, 48000, SampleFormat::F32),
            range(2, 8000, 96000, SampleFormat::I16),
            range(1, 8000, 96000, SampleFormat::I16),
        ];

        let (config, sample_format) = select_config(ranges.into_iter(), format).unwrap();
        assert_eq!(sample_format, SampleFormat::I16);
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, 48000);
    }

    #[test]
    fn test_select_config_rejects_unsupported_rate() {
        let format = LineFormat { sample_rate: 48000, channels: 2 };
        let ranges = vec![range(2, 8000, 44100, SampleFormat::F32)];
        assert!(select_config(ranges.into_iter(), format).is_none());
    }

    #[test]
    fn test_sample_conversions() {
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(2.0), i16::MAX); // écrêté
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(u16_to_i16(32_768), 0);
        assert_eq!(i16_to_u16(0), 32_768);
        assert_eq!(i16_to_f32(-32_768), -1.0);
    }

    #[test]
    fn test_encode_then_fill_output() {
        let bytes = encode_samples(&[1i16, -2, 300], |s| s);
        assert_eq!(bytes, vec![1, 0, 0xFE, 0xFF, 0x2C, 0x01]);

        let (sender, receiver) = bounded(4);
        sender.send(bytes).unwrap();
        let mut pending = VecDeque::new();
        let mut out = [9i16; 5];
        fill_output(&mut out, &mut pending, &receiver, |s| s, 0);

        // Les deux derniers échantillons sont du silence (underrun)
        assert_eq!(out, [1, -2, 300, 0, 0]);
    }

    // Nécessite une vraie carte son
    #[test]
    #[ignore]
    fn test_list_real_devices() {
        let devices = CpalHost::new().devices().unwrap();
        assert!(!devices.is_empty());
    }
}
