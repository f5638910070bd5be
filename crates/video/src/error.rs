//! Gestion d'erreurs pour la capture vidéo

use thiserror::Error;

/// Erreurs possibles lors de l'accès aux webcams
#[derive(Error, Debug)]
pub enum VideoError {
    /// Aucune webcam ne porte ce nom dans la découverte courante
    #[error("Webcam introuvable : {0}")]
    DeviceNotFound(String),

    /// Le backend a refusé d'ouvrir la webcam
    #[error("Impossible d'ouvrir la webcam {device}: {reason}")]
    OpenFailed { device: String, reason: String },
}

/// Type Result personnalisé pour notre crate
pub type VideoResult<T> = Result<T, VideoError>;
