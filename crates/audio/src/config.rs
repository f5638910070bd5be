//! Configuration audio pour le passthrough Backdrop
//!
//! Ce module regroupe les paramètres du routage audio : format PCM des lignes,
//! taille des blocs copiés, intervalle de scrutation des périphériques et
//! délai de stabilisation entre deux reconfigurations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::LineFormat;

/// Configuration principale du routage audio
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Fréquence d'échantillonnage en Hz, identique pour l'entrée et la sortie
    pub sample_rate: u32,

    /// Nombre de canaux (1 = mono, 2 = stéréo)
    pub channels: u16,

    /// Taille en bytes du bloc lu sur l'entrée puis écrit sur la sortie
    ///
    /// 1024 bytes = 256 frames stéréo 16 bits, soit ~5ms à 48kHz
    pub block_size: usize,

    /// Intervalle de scrutation des périphériques audio en millisecondes
    pub poll_interval_ms: u64,

    /// Délai entre l'arrêt et le redémarrage lors d'un changement de périphérique
    ///
    /// Certaines plateformes refusent de rouvrir immédiatement un périphérique
    /// qui vient d'être fermé.
    pub settle_delay_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            block_size: 1024,
            poll_interval_ms: 1000,
            settle_delay_ms: 300,
        }
    }
}

impl AudioConfig {
    /// Format PCM commun aux deux lignes
    pub fn line_format(&self) -> LineFormat {
        LineFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Valide que la configuration est cohérente
    ///
    /// Vérifie que tous les paramètres sont dans des plages acceptables
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(format!("Sample rate invalide: {} (doit être entre 8000 et 192000)", self.sample_rate));
        }

        if self.channels == 0 || self.channels > 8 {
            return Err(format!("Nombre de canaux invalide: {} (doit être entre 1 et 8)", self.channels));
        }

        let frame_bytes = self.line_format().bytes_per_frame();
        if self.block_size < frame_bytes || self.block_size % frame_bytes != 0 {
            return Err(format!(
                "Taille de bloc invalide: {} (doit être un multiple non nul de {} bytes)",
                self.block_size, frame_bytes
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err("Intervalle de scrutation invalide: 0ms".to_string());
        }

        Ok(())
    }

    /// Crée une configuration optimisée pour faible latence
    pub fn low_latency() -> Self {
        Self {
            block_size: 256,
            settle_delay_ms: 150,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();

        assert_eq!(config.block_size, 1024);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.settle_delay(), Duration::from_millis(300));
        assert_eq!(config.line_format().bytes_per_frame(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AudioConfig::default();

        config.sample_rate = 1000;
        assert!(config.validate().is_err());

        config.sample_rate = 48000;
        config.channels = 0;
        assert!(config.validate().is_err());

        config.channels = 2;
        config.block_size = 1023; // Coupe une frame stéréo en deux
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_low_latency_preset() {
        let config = AudioConfig::low_latency();
        assert_eq!(config.block_size, 256);
        assert!(config.validate().is_ok());
    }
}
