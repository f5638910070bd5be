//! État de sélection des périphériques
//!
//! Webcam, entrée et sortie audio choisies par l'utilisateur, avec un
//! indicateur d'erreur par périphérique. `None` signifie "aucun périphérique" ;
//! un indicateur d'erreur n'a de sens que si le périphérique associé est choisi.

use audio::{Direction, PlaybackStatus};
use video::Resolution;

/// Instantané de la sélection courante
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub video: Option<String>,
    /// Résolution demandée pour la webcam (`None` = résolution par défaut)
    pub video_resolution: Option<Resolution>,
    pub audio_input: Option<String>,
    pub audio_output: Option<String>,
    pub video_error: bool,
    pub input_error: bool,
    pub output_error: bool,
}

impl SelectionState {
    pub fn audio_device(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Input => self.audio_input.as_deref(),
            Direction::Output => self.audio_output.as_deref(),
        }
    }

    pub fn audio_error(&self, direction: Direction) -> bool {
        match direction {
            Direction::Input => self.input_error,
            Direction::Output => self.output_error,
        }
    }

    fn set_audio_device(&mut self, direction: Direction, device: Option<String>) {
        match direction {
            Direction::Input => self.audio_input = device,
            Direction::Output => self.audio_output = device,
        }
    }

    fn set_audio_error(&mut self, direction: Direction, error: bool) {
        match direction {
            Direction::Input => self.input_error = error,
            Direction::Output => self.output_error = error,
        }
    }

    /// Aucun périphérique audio dans ce sens : les deux erreurs sont effacées
    pub fn clear_audio(&mut self, direction: Direction) {
        self.set_audio_device(direction, None);
        self.input_error = false;
        self.output_error = false;
    }

    /// Enregistre le résultat du redémarrage après le choix de `device`
    ///
    /// Le sens choisi prend l'erreur si c'est lui qui a échoué. L'autre sens
    /// ne garde une erreur que s'il a échoué et qu'un périphérique y est choisi.
    pub fn apply_audio_status(&mut self, direction: Direction, device: String, status: PlaybackStatus) {
        let other = direction.opposite();
        let failed = status.failed_direction();

        self.set_audio_device(direction, Some(device));
        self.set_audio_error(direction, failed == Some(direction));
        let other_error = failed == Some(other) && self.audio_device(other).is_some();
        self.set_audio_error(other, other_error);
    }

    pub fn has_audio_error(&self) -> bool {
        self.input_error || self.output_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_devices(input: Option<&str>, output: Option<&str>) -> SelectionState {
        SelectionState {
            audio_input: input.map(str::to_string),
            audio_output: output.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_clear_resets_both_flags() {
        let mut state = with_devices(Some("Micro"), Some("Casque"));
        state.input_error = true;
        state.output_error = true;

        state.clear_audio(Direction::Input);

        assert_eq!(state.audio_input, None);
        assert_eq!(state.audio_output.as_deref(), Some("Casque"));
        assert!(!state.has_audio_error());
    }

    #[test]
    fn test_failed_direction_gets_the_flag() {
        let mut state = with_devices(None, Some("Casque"));
        state.apply_audio_status(Direction::Input, "Micro".into(), PlaybackStatus::InputUnavailable);

        assert!(state.input_error);
        assert!(!state.output_error);
        assert_eq!(state.audio_input.as_deref(), Some("Micro"));
    }

    #[test]
    fn test_other_direction_keeps_error_when_selected() {
        let mut state = with_devices(Some("Micro"), Some("Casque"));
        state.output_error = true;

        state.apply_audio_status(Direction::Input, "Ligne".into(), PlaybackStatus::OutputUnavailable);

        assert!(!state.input_error);
        assert!(state.output_error);
    }

    #[test]
    fn test_other_direction_without_device_has_no_error() {
        let mut state = with_devices(None, None);
        state.apply_audio_status(Direction::Input, "Micro".into(), PlaybackStatus::OutputUnavailable);

        assert!(!state.input_error);
        assert!(!state.output_error);
    }

    #[test]
    fn test_success_clears_flags() {
        let mut state = with_devices(Some("Micro"), Some("Casque"));
        state.input_error = true;
        state.output_error = true;

        state.apply_audio_status(Direction::Output, "Enceintes".into(), PlaybackStatus::Playing);

        assert!(!state.has_audio_error());
        assert_eq!(state.audio_device(Direction::Output), Some("Enceintes"));
    }
}
