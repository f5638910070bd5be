//! Mesure du débit d'images
//!
//! Débit instantané : 1000 / (écart en ms avec l'image précédente). Pas de
//! lissage, la valeur suit exactement la gigue de la webcam.

/// Compteur de débit instantané
#[derive(Debug, Default, Clone)]
pub struct FrameRateCounter {
    last_timestamp_ms: Option<i64>,
    frame_count: u64,
}

impl FrameRateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre une image et retourne le débit instantané en images/s
    ///
    /// Retourne 0 pour la première image et pour un écart nul ou négatif.
    pub fn tick(&mut self, timestamp_ms: i64) -> f64 {
        self.frame_count += 1;
        let rate = match self.last_timestamp_ms {
            Some(last) if timestamp_ms > last => 1000.0 / (timestamp_ms - last) as f64,
            _ => 0.0,
        };
        self.last_timestamp_ms = Some(timestamp_ms);
        rate
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
