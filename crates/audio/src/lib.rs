//! Crate audio pour Backdrop - passthrough audio temps réel
//!
//! Ce crate gère toute la chaîne audio :
//! - Énumération périodique des périphériques d'entrée/sortie
//! - Lignes de capture et de lecture (cpal ou simulées)
//! - Moteur de passthrough : copie entrée → sortie sur une tâche de fond

pub mod config;      // Configuration audio
pub mod types;       // Types de données (AudioDevice, PlaybackStatus, etc.)
pub mod traits;      // Traits abstraits (host, lignes, routeur)
pub mod cpal_host;   // Implémentation host avec cpal
pub mod simulated;   // Host simulé pour les tests
pub mod enumerator;  // Scrutation des périphériques
pub mod passthrough; // Moteur de passthrough
pub mod error;       // Gestion d'erreurs

// Réexports pour faciliter l'utilisation
pub use config::*;
pub use types::*;
pub use traits::*;
pub use error::*;

// Réexports des implémentations principales
pub use cpal_host::CpalHost;
pub use simulated::{SimulatedCaptureLine, SimulatedHost, SimulatedPlaybackLine};
pub use enumerator::DeviceWatcher;
pub use passthrough::PassthroughEngine;
