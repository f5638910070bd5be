//! Configuration de la capture vidéo

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Débit d'images visé par le backend (images par seconde)
    ///
    /// Le backend en déduit le délai entre deux acquisitions.
    pub target_fps: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self { target_fps: 60 }
    }
}

impl VideoConfig {
    /// Intervalle cible entre deux images (1000 / fps, arrondi à la milliseconde)
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.target_fps.max(1)))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.target_fps == 0 || self.target_fps > 240 {
            return Err(format!("Débit d'images invalide: {} (doit être entre 1 et 240)", self.target_fps));
        }
        Ok(())
    }

    /// Acquisition au plus vite que le pilote autorise (120 images/s)
    pub fn low_latency() -> Self {
        Self { target_fps: 120 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frame_interval() {
        let config = VideoConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_fps() {
        let config = VideoConfig { target_fps: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_low_latency_preset() {
        let config = VideoConfig::low_latency();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_interval(), Duration::from_millis(8));
    }
}
