use ndarray::{ArrayBase, Data, Ix1};
use serde::{Deserialize, Serialize};

/// A homogeneous medium. Two materials are equal when both their number
/// density and microscopic cross-section are equal.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub number_density: f64,
    pub cross_section: f64,
}

impl Material {
    pub const fn new(number_density: f64, cross_section: f64) -> Self {
        Self {
            number_density,
            cross_section,
        }
    }

    /// A material described only by its macroscopic cross-section.
    pub const fn from_sigma_t(sigma_t: f64) -> Self {
        Self::new(1.0, sigma_t)
    }

    /// Macroscopic cross-section, per unit length.
    pub fn sigma_t(&self) -> f64 {
        self.number_density * self.cross_section
    }

    pub fn alpha(&self, dx: f64) -> f64 {
        (-self.sigma_t() * dx).exp()
    }
}

/// `exp(-path . sigma_t)` for a path split by medium and the matching
/// macroscopic cross-sections.
pub fn attenuation<S, T>(path: &ArrayBase<S, Ix1>, sigma_t: &ArrayBase<T, Ix1>) -> f64
where
    S: Data<Elem = f64>,
    T: Data<Elem = f64>,
{
    (-path.dot(sigma_t)).exp()
}
