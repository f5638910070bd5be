//! Crate video pour Backdrop - acquisition webcam
//!
//! Ce crate suit le cycle de vie de la webcam sélectionnée et publie la
//! dernière image capturée :
//! - Découverte des webcams (événementielle, sans scrutation)
//! - Ouverture/fermeture via un backend de caméra abstrait
//! - Mesure du débit d'images instantané

pub mod config;      // Configuration vidéo
pub mod types;       // Types de données (VideoDevice, CapturedFrame, etc.)
pub mod traits;      // Traits abstraits (backend caméra, listener)
pub mod frame_rate;  // Mesure du débit d'images
pub mod simulated;   // Caméra simulée pour les tests
pub mod discovery;   // Suivi des webcams branchées
pub mod capture;     // Adaptateur de capture
pub mod error;       // Gestion d'erreurs

pub use config::*;
pub use types::*;
pub use traits::*;
pub use error::*;

pub use frame_rate::FrameRateCounter;
pub use simulated::SimulatedCamera;
pub use discovery::VideoDeviceWatcher;
pub use capture::VideoCaptureAdapter;
