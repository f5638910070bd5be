//! Périphériques simulés pour les essais à blanc (`--simulated`)

use std::f32::consts::TAU;
use std::sync::Arc;

use audio::{LineFormat, SimulatedCaptureLine, SimulatedHost, SimulatedPlaybackLine};
use tokio::task::JoinHandle;

pub const DEMO_INPUT: &str = "Micro simulé";
pub const DEMO_OUTPUT: &str = "Sortie simulée";
pub const DEMO_DUPLEX: &str = "Casque USB simulé";

/// Bytes gardés par chaque sortie simulée (~340ms en stéréo 48kHz)
pub const DEMO_RETAINED_BYTES: usize = 64 * 1024;

pub struct DemoHost {
    pub host: Arc<SimulatedHost>,
    /// Entrée alimentée par `spawn_tone`
    pub input: Arc<SimulatedCaptureLine>,
    pub outputs: Vec<Arc<SimulatedPlaybackLine>>,
}

/// Host simulé avec une entrée, une sortie et un périphérique mixte
///
/// Les sorties ne gardent que les derniers bytes reçus : une route peut
/// tourner des heures sans faire grossir la mémoire.
pub fn demo_host() -> DemoHost {
    let host = Arc::new(SimulatedHost::new());
    let input = host.add_input(DEMO_INPUT);
    let output = host.add_output(DEMO_OUTPUT);
    let (_, duplex_output) = host.add_duplex(DEMO_DUPLEX);

    let outputs = vec![output, duplex_output];
    for output in &outputs {
        output.retain_last(DEMO_RETAINED_BYTES);
    }
    DemoHost { host, input, outputs }
}

/// Bloc de sinus 440 Hz en i16 LE entrelacé, `frames` frames à partir de `start`
pub fn tone_block(format: LineFormat, start: u64, frames: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * format.bytes_per_frame());
    for frame in 0..frames as u64 {
        let t = (start + frame) as f32 / format.sample_rate as f32;
        let sample = ((t * 440.0 * TAU).sin() * 0.2 * i16::MAX as f32) as i16;
        for _ in 0..format.channels {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }
    bytes
}

/// Alimente la ligne simulée en temps réel (un bloc toutes les 10ms)
pub fn spawn_tone(line: Arc<SimulatedCaptureLine>, format: LineFormat) -> JoinHandle<()> {
    tokio::spawn(async move {
        let frames = (format.sample_rate / 100) as usize;
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(10));
        let mut position = 0u64;
        loop {
            ticker.tick().await;
            line.push(&tone_block(format, position, frames));
            position += frames as u64;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::{AudioHost, Direction, enumerator};

    #[test]
    fn test_demo_host_devices() {
        let DemoHost { host, .. } = demo_host();
        let inputs = enumerator::snapshot(host.as_ref(), Direction::Input).unwrap();
        let outputs = enumerator::snapshot(host.as_ref(), Direction::Output).unwrap();

        let names = |devices: Vec<audio::AudioDevice>| devices.into_iter().map(|d| d.name).collect::<Vec<_>>();
        assert_eq!(names(inputs), vec![DEMO_INPUT, DEMO_DUPLEX]);
        assert_eq!(names(outputs), vec![DEMO_OUTPUT, DEMO_DUPLEX]);
        assert_eq!(host.name(), "simulé");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_demo_outputs_stay_bounded() {
        use audio::{AudioConfig, AudioRouter, PassthroughEngine};
        use std::time::Duration;

        let demo = demo_host();
        let format = AudioConfig::default().line_format();
        let mut engine = PassthroughEngine::new(demo.host.clone(), AudioConfig::default());
        engine.set_input(Some(DEMO_INPUT.to_string()));
        engine.set_output(Some(DEMO_OUTPUT.to_string()));
        assert!(engine.start().await.is_playing());

        // Quatre fois plus que ce que la sortie garde
        let total = 4 * DEMO_RETAINED_BYTES;
        demo.input.push(&tone_block(format, 0, total / format.bytes_per_frame()));
        let output = Arc::clone(&demo.outputs[0]);
        let arrived = tokio::task::spawn_blocking(move || output.wait_for_bytes(total, Duration::from_secs(5)))
            .await
            .unwrap();
        engine.stop().await;

        assert!(arrived);
        assert_eq!(demo.outputs[0].total_written(), total);
        assert_eq!(demo.outputs[0].written().len(), DEMO_RETAINED_BYTES);
    }

    #[test]
    fn test_tone_block_layout() {
        let format = LineFormat { sample_rate: 48000, channels: 2 };
        let block = tone_block(format, 0, 480);
        assert_eq!(block.len(), 480 * 4);
        // Premier échantillon à zéro, canaux identiques
        assert_eq!(&block[..4], &[0, 0, 0, 0]);
        assert_eq!(block[4..6], block[6..8]);
    }
}
