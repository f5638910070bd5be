//! Backdrop - cœur de l'application sans interface graphique
//!
//! - Coordinateur : sélection des périphériques et indicateurs d'erreur
//! - Ligne de commande et logs du binaire `backdrop`
//! - Périphériques simulés pour les essais à blanc

pub mod cli;         // Options de ligne de commande
pub mod coordinator; // Orchestration audio + vidéo
pub mod demo;        // Host audio simulé
pub mod logging;     // Initialisation de tracing
pub mod selection;   // État de sélection

pub use coordinator::{Coordinator, DeviceLists};
pub use selection::SelectionState;

/// Libellé affiché pour "aucun périphérique"
pub const NONE_LABEL: &str = "None";

/// Libellé d'un périphérique optionnel, pour l'affichage
pub fn device_label(device: Option<&str>) -> &str {
    device.unwrap_or(NONE_LABEL)
}
