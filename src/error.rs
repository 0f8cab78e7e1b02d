use thiserror::Error;

/// Configuration and deck errors.
///
/// Every variant is raised while building a domain, a problem, or loading a
/// deck. Evaluation itself never fails.
#[derive(Error, Debug)]
pub enum Error {
    /// Part of the union of solids lies outside the bounding polygon.
    #[error("solids extend outside the bounding box (excess area {excess_area})")]
    SolidsOutsideBoundingBox { excess_area: f64 },

    /// A polygon needs at least three vertices.
    #[error("polygon has {vertices} vertices, at least 3 are required")]
    DegeneratePolygon { vertices: usize },

    #[error("{materials} materials supplied for {solids} solids")]
    MaterialCountMismatch { materials: usize, solids: usize },

    /// No constructor is registered for a deck type tag.
    #[error("unknown {kind} type `{tag}`")]
    UnknownTag { kind: &'static str, tag: String },

    #[error("material reference {index} is not in the material table")]
    UnresolvedMaterial { index: usize },

    #[error("malformed deck: {0}")]
    Deck(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
