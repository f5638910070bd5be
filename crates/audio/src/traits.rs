//! Traits abstraits pour le système audio
//!
//! Ces traits séparent le moteur de passthrough de l'API audio de la
//! plateforme. Deux implémentations existent :
//! - CpalHost : vrais périphériques via cpal
//! - SimulatedHost : périphériques en mémoire pour les tests

use std::sync::Arc;

use async_trait::async_trait;

use crate::{AudioDevice, AudioResult, LineFormat, PlaybackStatus, RouteStats};

/// Accès au sous-système audio de la plateforme
///
/// Un "host" énumère les périphériques et fournit des lignes de capture ou de
/// lecture. Acquérir une ligne ne l'ouvre pas : l'ouverture se fait ensuite
/// via `open()` sur la ligne.
pub trait AudioHost: Send + Sync {
    /// Énumère tous les périphériques connus, dans l'ordre de la plateforme
    ///
    /// Un même périphérique peut apparaître deux fois (une fois par sens).
    fn devices(&self) -> AudioResult<Vec<AudioDevice>>;

    /// Acquiert la ligne de capture d'un périphérique
    ///
    /// # Erreurs
    /// - `AudioError::DeviceNotFound` : aucun périphérique de ce nom
    /// - `AudioError::LineNotSupported` : le périphérique ne sait pas capturer
    fn capture_line(&self, device: &str) -> AudioResult<Arc<dyn CaptureLine>>;

    /// Acquiert la ligne de lecture d'un périphérique
    fn playback_line(&self, device: &str) -> AudioResult<Arc<dyn PlaybackLine>>;

    /// Nom du backend, pour les logs
    fn name(&self) -> &str {
        "inconnu"
    }
}

/// Ligne de capture PCM
///
/// Les méthodes prennent `&self` : la boucle de copie lit pendant que
/// `stop()` ferme la ligne depuis une autre tâche.
pub trait CaptureLine: Send + Sync {
    /// Ouvre et démarre la ligne dans le format demandé
    fn open(&self, format: LineFormat) -> AudioResult<()>;

    /// Lit au plus `buf.len()` bytes, en bloquant jusqu'à ce que des données arrivent
    ///
    /// Retourne `Ok(None)` en fin de flux, notamment après `close()`.
    fn read(&self, buf: &mut [u8]) -> AudioResult<Option<usize>>;

    /// Ferme la ligne et débloque une lecture en cours. Idempotent.
    fn close(&self);

    fn is_open(&self) -> bool;

    fn device_name(&self) -> &str;
}

/// Ligne de lecture PCM
pub trait PlaybackLine: Send + Sync {
    fn open(&self, format: LineFormat) -> AudioResult<()>;

    /// Écrit tout le buffer, en bloquant si la plateforme est en retard
    ///
    /// # Erreurs
    /// - `AudioError::LineClosed` : la ligne a été fermée
    fn write(&self, buf: &[u8]) -> AudioResult<()>;

    /// Ferme la ligne. Idempotent.
    fn close(&self);

    fn is_open(&self) -> bool;

    fn device_name(&self) -> &str;
}

/// Routeur audio piloté par le coordinateur
///
/// `PassthroughEngine` est l'implémentation principale. Le coordinateur ne
/// dépend que de ce trait.
#[async_trait]
pub trait AudioRouter: Send + Sync {
    /// Mémorise l'entrée sélectionnée, sans démarrer de route
    fn set_input(&mut self, device: Option<String>);

    /// Mémorise la sortie sélectionnée, sans démarrer de route
    fn set_output(&mut self, device: Option<String>);

    /// Ouvre les deux lignes sélectionnées et lance la boucle de copie
    ///
    /// L'entrée est vérifiée avant la sortie ; le premier échec est retourné.
    async fn start(&mut self) -> PlaybackStatus;

    /// Arrête la route active. Sans effet si rien ne tourne.
    async fn stop(&mut self);

    /// Arrête, attend le délai de stabilisation, change la sélection, redémarre
    async fn reconfigure(&mut self, direction: crate::Direction, device: Option<String>) -> PlaybackStatus;

    fn is_playing(&self) -> bool;

    /// Statistiques de la route active (ou de la dernière route arrêtée)
    fn stats(&self) -> RouteStats;
}
