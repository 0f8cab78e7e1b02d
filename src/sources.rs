use geo::Coord;
use serde::{Deserialize, Serialize};

/// An isotropic point source. The deck's position and intensity are the
/// nominal values; evaluation takes both as explicit arguments.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "R", with = "crate::deck::coord")]
    pub position: Coord<f64>,
    #[serde(rename = "I0")]
    pub intensity: f64,
}

impl Source {
    pub fn new(position: Coord<f64>, intensity: f64) -> Self {
        Self {
            position,
            intensity,
        }
    }
}
