//! Types de données pour la capture vidéo
//!
//! - VideoDevice : webcam découverte et ses résolutions
//! - CapturedFrame : dernière image publiée avec ses débits
//! - VideoState : cycle de vie de la webcam courante

use std::fmt;

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Résolution d'une webcam en pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Ratio largeur / hauteur, utilisé pour ajuster la fenêtre à la vidéo
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Webcam découverte
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoDevice {
    /// Nom fourni par la plateforme, sert d'identifiant
    pub name: String,
    /// Débit nominal annoncé par le pilote
    pub fps: f64,
    /// Résolutions supportées ; la première est la résolution par défaut
    pub resolutions: Vec<Resolution>,
}

impl VideoDevice {
    pub fn new(name: impl Into<String>, fps: f64, resolutions: Vec<Resolution>) -> Self {
        Self {
            name: name.into(),
            fps,
            resolutions,
        }
    }

    pub fn default_resolution(&self) -> Option<Resolution> {
        self.resolutions.first().copied()
    }
}

/// Cycle de vie de la webcam courante
///
/// `Closed -> Open -> (ImageObtained)* -> Closed | Disposed`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoState {
    #[default]
    Closed,
    Open,
    ImageObtained,
    /// La webcam a disparu (débranchée) pendant l'utilisation
    Disposed,
}

/// Image brute livrée par le backend
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub image: RgbImage,
    /// Instant d'acquisition
    pub captured_at: DateTime<Utc>,
    /// Débit que le pilote annonce au moment de la capture
    pub device_fps: f64,
}

/// Dernière image publiée par l'adaptateur
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub image: RgbImage,
    pub timestamp: DateTime<Utc>,
    /// Débit annoncé par la webcam
    pub device_frame_rate: f64,
    /// Débit mesuré localement entre les deux dernières images
    pub measured_frame_rate: f64,
}

impl CapturedFrame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }
}

/// Notification de branchement/débranchement d'une webcam
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Found(String),
    Gone(String),
}
