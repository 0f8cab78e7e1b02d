use std::iter;
use std::sync::Arc;

use geo::Coord;
use ndarray::{Array1, Array2};

use crate::detectors::Detector;
use crate::error::{Error, Result};
use crate::geometry::Domain;
use crate::material::{attenuation, Material};
use crate::registry::Registry;
use crate::sources::Source;

/// The fixed parts of a problem: geometry, nominal source and detectors.
#[derive(Debug)]
pub struct Scene {
    pub domain: Domain,
    pub source: Source,
    pub detectors: Vec<Box<dyn Detector>>,
}

impl Scene {
    pub fn new(domain: Domain, source: Source, detectors: Vec<Box<dyn Detector>>) -> Self {
        Self {
            domain,
            source,
            detectors,
        }
    }

    pub fn dwell_times(&self) -> Array1<f64> {
        self.detectors.iter().map(|d| d.dwell()).collect()
    }
}

/// Fixed materials, single source.
///
/// `sigma_t` is `[interstitial, solid_1, ..., solid_n]`, computed once.
#[derive(Debug, Clone)]
pub struct SimpleProblem {
    scene: Arc<Scene>,
    interstitial_material: Material,
    materials: Vec<Material>,
    sigma_t: Array1<f64>,
}

impl SimpleProblem {
    /// `materials` must line up with the domain's solids.
    pub fn new(scene: Arc<Scene>, interstitial_material: Material, materials: Vec<Material>) -> Result<Self> {
        let solids = scene.domain.solids().len();
        if materials.len() != solids {
            return Err(Error::MaterialCountMismatch {
                materials: materials.len(),
                solids,
            });
        }
        let sigma_t = iter::once(&interstitial_material)
            .chain(&materials)
            .map(Material::sigma_t)
            .collect();
        Ok(Self {
            scene,
            interstitial_material,
            materials,
            sigma_t,
        })
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    pub fn interstitial_material(&self) -> &Material {
        &self.interstitial_material
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn sigma_t(&self) -> &Array1<f64> {
        &self.sigma_t
    }

    /// Response and medium decomposition of the source-detector path, per detector.
    fn detector_terms(&self, r: Coord<f64>, intensity: f64) -> impl Iterator<Item = (f64, Array1<f64>)> + '_ {
        self.scene.detectors.iter().map(move |detector| {
            let path = self.scene.domain.construct_path(r, detector.position());
            let alpha = attenuation(&path, &self.sigma_t);
            (detector.compute_response(intensity * alpha, r), path)
        })
    }

    /// Expected response of every detector, in detector order, to a source of
    /// strength `intensity` at `r`.
    pub fn evaluate(&self, r: Coord<f64>, intensity: f64) -> Array1<f64> {
        self.detector_terms(r, intensity).map(|(response, _)| response).collect()
    }

    /// Derivative of each response with respect to each medium's Sigma_T,
    /// shape `(detectors, 1 + solids)`.
    ///
    /// Entry `(i, j)` is `-response_i * path_ij`. It is non-positive, because
    /// a denser medium only ever lowers the counts.
    pub fn jacobian(&self, r: Coord<f64>, intensity: f64) -> Array2<f64> {
        self.evaluate_with_jacobian(r, intensity).1
    }

    pub fn evaluate_with_jacobian(&self, r: Coord<f64>, intensity: f64) -> (Array1<f64>, Array2<f64>) {
        let n = self.scene.detectors.len();
        let mut responses = Array1::zeros(n);
        let mut jacobian = Array2::zeros((n, self.sigma_t.len()));
        for (i, (response, path)) in self.detector_terms(r, intensity).enumerate() {
            responses[i] = response;
            jacobian.row_mut(i).assign(&(path * -response));
        }
        (responses, jacobian)
    }
}

/// Problem whose cross-sections are redrawn on every evaluation.
///
/// Keeps the deck's nominal materials; each perturbed evaluation builds a
/// throwaway [`SimpleProblem`] that shares only the immutable [`Scene`].
#[derive(Debug, Clone)]
pub struct PerturbableXsProblem {
    nominal: SimpleProblem,
}

impl PerturbableXsProblem {
    pub fn new(scene: Arc<Scene>, interstitial_material: Material, materials: Vec<Material>) -> Result<Self> {
        Ok(Self {
            nominal: SimpleProblem::new(scene, interstitial_material, materials)?,
        })
    }

    pub fn scene(&self) -> &Arc<Scene> {
        self.nominal.scene()
    }

    pub fn interstitial_material(&self) -> &Material {
        self.nominal.interstitial_material()
    }

    pub fn materials(&self) -> &[Material] {
        self.nominal.materials()
    }

    /// `materials` must be in solid order.
    pub fn evaluate(
        &self,
        r: Coord<f64>,
        intensity: f64,
        interstitial_material: &Material,
        materials: &[Material],
    ) -> Result<Array1<f64>> {
        let problem = SimpleProblem::new(Arc::clone(self.scene()), *interstitial_material, materials.to_vec())?;
        Ok(problem.evaluate(r, intensity))
    }

    pub fn evaluate_nominal(&self, r: Coord<f64>, intensity: f64) -> Array1<f64> {
        self.nominal.evaluate(r, intensity)
    }
}

/// Materials and scene parts resolved from a deck, before a problem type is chosen.
#[derive(Debug)]
pub struct ProblemComponents {
    pub domain: Domain,
    pub interstitial_material: Material,
    pub materials: Vec<Material>,
    pub source: Source,
    pub detectors: Vec<Box<dyn Detector>>,
}

impl ProblemComponents {
    fn split(self) -> (Arc<Scene>, Material, Vec<Material>) {
        let scene = Arc::new(Scene::new(self.domain, self.source, self.detectors));
        (scene, self.interstitial_material, self.materials)
    }
}

#[derive(Debug, Clone)]
pub enum Problem {
    Simple(SimpleProblem),
    PerturbableXs(PerturbableXsProblem),
}

impl Problem {
    pub const SIMPLE: &'static str = "Simple_Problem";
    pub const PERTURBABLE_XS: &'static str = "Perturbable_XS_Problem";

    pub fn type_tag(&self) -> &'static str {
        match self {
            Problem::Simple(_) => Self::SIMPLE,
            Problem::PerturbableXs(_) => Self::PERTURBABLE_XS,
        }
    }

    fn nominal(&self) -> &SimpleProblem {
        match self {
            Problem::Simple(p) => p,
            Problem::PerturbableXs(p) => &p.nominal,
        }
    }

    pub fn scene(&self) -> &Scene {
        self.nominal().scene()
    }

    pub fn domain(&self) -> &Domain {
        &self.scene().domain
    }

    pub fn source(&self) -> &Source {
        &self.scene().source
    }

    pub fn detectors(&self) -> &[Box<dyn Detector>] {
        &self.scene().detectors
    }

    pub fn interstitial_material(&self) -> &Material {
        self.nominal().interstitial_material()
    }

    pub fn materials(&self) -> &[Material] {
        self.nominal().materials()
    }

    pub fn dwell_times(&self) -> Array1<f64> {
        self.scene().dwell_times()
    }

    pub fn as_simple(&self) -> Option<&SimpleProblem> {
        match self {
            Problem::Simple(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_perturbable_xs(&self) -> Option<&PerturbableXsProblem> {
        match self {
            Problem::PerturbableXs(p) => Some(p),
            _ => None,
        }
    }
}

fn simple(components: ProblemComponents) -> Result<Problem> {
    let (scene, interstitial_material, materials) = components.split();
    SimpleProblem::new(scene, interstitial_material, materials).map(Problem::Simple)
}

fn perturbable_xs(components: ProblemComponents) -> Result<Problem> {
    let (scene, interstitial_material, materials) = components.split();
    PerturbableXsProblem::new(scene, interstitial_material, materials).map(Problem::PerturbableXs)
}

/// Registry preloaded with the built-in problem types.
pub fn problem_registry() -> Registry<ProblemComponents, Problem> {
    let mut registry = Registry::new("problem");
    registry.register(Problem::SIMPLE, simple);
    registry.register(Problem::PERTURBABLE_XS, perturbable_xs);
    registry
}
