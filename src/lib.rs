// Straight-line (Beer-Lambert) detector response for a point source among 2D shielding solids.
#![allow(clippy::many_single_char_names)]
#[macro_use]
extern crate derive_more;

mod error;
pub use crate::error::{Error, Result};
mod vector;
pub use crate::vector::{UnitVector, Vector};
mod geometry;
pub use crate::geometry::{Domain, Solid};
mod material;
pub use crate::material::{attenuation, Material};
mod sources;
pub use crate::sources::Source;
mod detectors;
pub use crate::detectors::{
    detector_registry, Detector, Facet, OrientedPrismDetector, OrientedPrismIntrinsicDetector,
    OrientedPrismIntrinsicParams, OrientedPrismParams, PointDetector,
};
mod problem;
pub use crate::problem::{problem_registry, PerturbableXsProblem, Problem, ProblemComponents, Scene, SimpleProblem};
mod registry;
pub use crate::registry::{Constructor, Registries, Registry};
pub mod deck;
pub use crate::deck::{compact_references, resolve_references, Deck, MaterialReferences, MaterialTable};

pub use geo::Coord;
