//! Types de données pour le routage audio
//!
//! - AudioDevice : instantané d'un périphérique découvert
//! - LineFormat : format PCM des lignes (i16 little-endian entrelacé)
//! - PlaybackStatus : résultat d'un démarrage de route
//! - RouteStats : compteurs d'une boucle de copie

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Sens d'une ligne audio
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Ligne de capture (microphone, carte d'acquisition, ...)
    Input,
    /// Ligne de lecture (haut-parleurs, sortie virtuelle, ...)
    Output,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Input => Direction::Output,
            Direction::Output => Direction::Input,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "capture"),
            Direction::Output => write!(f, "lecture"),
        }
    }
}

/// Périphérique audio découvert lors d'une énumération
///
/// Le nom est l'identifiant : deux périphériques de même nom sont
/// considérés comme identiques.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioDevice {
    pub name: String,
    pub direction: Direction,
    /// Le périphérique expose une ligne du type demandé par `direction`
    pub supports_line: bool,
}

impl AudioDevice {
    pub fn new(name: impl Into<String>, direction: Direction, supports_line: bool) -> Self {
        Self {
            name: name.into(),
            direction,
            supports_line,
        }
    }
}

impl PartialEq for AudioDevice {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.direction == other.direction
    }
}

impl Eq for AudioDevice {}

/// Format PCM des lignes : échantillons i16 little-endian entrelacés
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl LineFormat {
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Taille d'une frame (un échantillon par canal)
    pub fn bytes_per_frame(&self) -> usize {
        Self::BYTES_PER_SAMPLE * self.channels as usize
    }

    /// Durée couverte par un bloc de `bytes` bytes
    pub fn duration_of(&self, bytes: usize) -> std::time::Duration {
        let frames = bytes / self.bytes_per_frame().max(1);
        std::time::Duration::from_secs_f64(frames as f64 / self.sample_rate.max(1) as f64)
    }
}

/// Résultat du démarrage d'une route audio
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// Les deux lignes sont ouvertes et la boucle de copie tourne
    Playing,
    /// L'entrée sélectionnée est absente, ne supporte pas la capture ou a refusé de s'ouvrir
    InputUnavailable,
    /// Idem pour la sortie (vérifiée après l'entrée)
    OutputUnavailable,
}

impl PlaybackStatus {
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackStatus::Playing)
    }

    /// Sens en échec, s'il y en a un
    pub fn failed_direction(self) -> Option<Direction> {
        match self {
            PlaybackStatus::Playing => None,
            PlaybackStatus::InputUnavailable => Some(Direction::Input),
            PlaybackStatus::OutputUnavailable => Some(Direction::Output),
        }
    }
}

/// Statistiques d'une boucle de copie
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStats {
    /// Nombre total de bytes recopiés de l'entrée vers la sortie
    pub bytes_copied: u64,
    /// Nombre de blocs recopiés
    pub blocks: u64,
}

/// Compteurs partagés entre la boucle de copie et le moteur
#[derive(Debug, Default)]
pub(crate) struct RouteCounters {
    bytes_copied: AtomicU64,
    blocks: AtomicU64,
}

impl RouteCounters {
    pub(crate) fn record(&self, bytes: usize) {
        self.bytes_copied.fetch_add(bytes as u64, Ordering::Relaxed);
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RouteStats {
        RouteStats {
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
        }
    }
}
