//! Gestion d'erreurs pour le système audio
//!
//! Ces erreurs restent internes au moteur de passthrough : le moteur les
//! convertit en `PlaybackStatus` et en événements `tracing`, elles ne
//! remontent jamais jusqu'à l'interface.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles dans le système audio
#[derive(Error, Debug)]
pub enum AudioError {
    /// Aucun périphérique ne porte ce nom dans l'énumération courante
    #[error("Périphérique audio introuvable : {0}")]
    DeviceNotFound(String),

    /// Aucun périphérique sélectionné dans ce sens
    #[error("Aucun périphérique de {0} sélectionné")]
    NoDeviceSelected(crate::Direction),

    /// Le périphérique existe mais n'expose pas la ligne demandée
    /// (capture pour une entrée, lecture pour une sortie)
    #[error("Le périphérique {device} ne supporte pas une ligne de {direction}")]
    LineNotSupported { device: String, direction: crate::Direction },

    /// La plateforme a refusé d'ouvrir la ligne
    #[error("Impossible d'ouvrir la ligne {device}: {reason}")]
    LineUnavailable { device: String, reason: String },

    /// Opération sur une ligne fermée
    #[error("Ligne audio fermée : {0}")]
    LineClosed(String),

    /// Erreur lors de la configuration des paramètres audio (sample rate, etc.)
    #[error("Erreur de configuration audio: {0}")]
    ConfigError(String),

    /// Erreur provenant de la librairie cpal (Cross-Platform Audio Library)
    #[error("Erreur cpal: {0}")]
    CpalError(#[from] cpal::PlayStreamError),

    /// Erreur lors de l'énumération des périphériques
    #[error("Erreur d'énumération des périphériques: {0}")]
    EnumerationError(String),
}

/// Conversion des erreurs cpal::BuildStreamError
impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioError::ConfigError(format!("Erreur construction stream: {:?}", err))
    }
}

/// Conversion des erreurs cpal::DevicesError
impl From<cpal::DevicesError> for AudioError {
    fn from(err: cpal::DevicesError) -> Self {
        AudioError::EnumerationError(err.to_string())
    }
}

/// Type Result personnalisé pour notre crate
pub type AudioResult<T> = Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    #[test]
    fn test_error_display() {
        let error = AudioError::DeviceNotFound("USB Mic".to_string());
        assert_eq!(error.to_string(), "Périphérique audio introuvable : USB Mic");

        let error = AudioError::LineNotSupported {
            device: "HDMI".to_string(),
            direction: Direction::Input,
        };
        assert_eq!(error.to_string(), "Le périphérique HDMI ne supporte pas une ligne de capture");
    }
}
