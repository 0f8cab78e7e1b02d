use core::f64::consts::PI;
use core::fmt;

use geo::{Coord, LineString, Polygon};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::deck::DetectorRecord;
use crate::error::Result;
use crate::geometry::{clipped_length, segment};
use crate::registry::Registry;
use crate::vector::{UnitVector, Vector};

const FOUR_PI: f64 = 4.0 * PI;

pub trait Detector: fmt::Debug + Send + Sync {
    fn position(&self) -> Coord<f64>;

    fn dwell(&self) -> f64;

    /// Expected counts from a source at `source` whose intensity has already
    /// been attenuated along the path to this detector.
    fn compute_response(&self, attenuated_intensity: f64, source: Coord<f64>) -> f64;

    fn type_tag(&self) -> &'static str;

    fn to_record(&self) -> Result<DetectorRecord>;
}

fn construct<D: Detector + DeserializeOwned + 'static>(fields: serde_json::Value) -> Result<Box<dyn Detector>> {
    Ok(Box::new(serde_json::from_value::<D>(fields)?))
}

/// Registry preloaded with the built-in detector types.
pub fn detector_registry() -> Registry<serde_json::Value, Box<dyn Detector>> {
    let mut registry = Registry::new("detector");
    registry.register(PointDetector::TAG, construct::<PointDetector>);
    registry.register(OrientedPrismDetector::TAG, construct::<OrientedPrismDetector>);
    registry.register(
        OrientedPrismIntrinsicDetector::TAG,
        construct::<OrientedPrismIntrinsicDetector>,
    );
    registry
}

fn distance_sqr(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d = a - b;
    d.x * d.x + d.y * d.y
}

/// Isotropic detector treated as a small flat area facing the source.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointDetector {
    #[serde(rename = "R", with = "crate::deck::coord")]
    pub position: Coord<f64>,
    pub epsilon: f64,
    pub area: f64,
    pub dwell: f64,
}

impl PointDetector {
    pub const TAG: &'static str = "Point";
}

impl Detector for PointDetector {
    fn position(&self) -> Coord<f64> {
        self.position
    }

    fn dwell(&self) -> f64 {
        self.dwell
    }

    fn compute_response(&self, attenuated_intensity: f64, source: Coord<f64>) -> f64 {
        attenuated_intensity * self.area * self.dwell * self.epsilon
            / (FOUR_PI * distance_sqr(self.position, source))
    }

    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn to_record(&self) -> Result<DetectorRecord> {
        DetectorRecord::new(Self::TAG, self)
    }
}

/// One planar rectangular face of a prism.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Facet {
    pub center: Vector<f64>,
    pub normal: UnitVector<f64>,
    pub u: UnitVector<f64>,
    pub v: UnitVector<f64>,
    pub half_extents: [f64; 2],
}

/// Signed solid angle of the rectangle `[0, x] x [0, y]` seen from height `d`
/// above its corner.
fn corner_solid_angle(x: f64, y: f64, d: f64) -> f64 {
    (x * y / (d * (x * x + y * y + d * d).sqrt())).atan()
}

impl Facet {
    /// Whether the outward normal points towards `p`.
    pub fn faces(&self, p: Vector<f64>) -> bool {
        self.normal.dot(p - self.center) > 0.0
    }

    /// Solid angle subtended at `p`, as a sum of four corner-anchored rectangles.
    pub fn solid_angle(&self, p: Vector<f64>) -> f64 {
        let rel = p - self.center;
        let d = self.normal.dot(rel);
        let (u0, v0) = (self.u.dot(rel), self.v.dot(rel));
        let [a, b] = self.half_extents;
        let (x1, x2) = (-a - u0, a - u0);
        let (y1, y2) = (-b - v0, b - v0);
        corner_solid_angle(x2, y2, d) - corner_solid_angle(x1, y2, d) - corner_solid_angle(x2, y1, d)
            + corner_solid_angle(x1, y1, d)
    }
}

/// Position and shape shared by the prism detectors.
///
/// `dims` is `[length, width, height]`; length runs along the local x axis,
/// which is rotated `theta` radians counter-clockwise about the vertical.
/// The source is taken to sit at the prism's mid-height.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Prism {
    center: Vector<f64>,
    axes: [UnitVector<f64>; 2],
    dims: [f64; 3],
    facets: [Facet; 4],
}

impl Prism {
    fn new(position: Coord<f64>, dims: [f64; 3], theta: f64) -> Self {
        let center = Vector::from_planar(position, 0.0);
        let ex = UnitVector(Vector::new(1.0, 0.0, 0.0).rotate_z(theta));
        let ey = UnitVector(Vector::new(0.0, 1.0, 0.0).rotate_z(theta));
        let ez = UnitVector(Vector::new(0.0, 0.0, 1.0));
        let [l, w, h] = dims;
        let side = |normal: UnitVector<f64>, u: UnitVector<f64>, depth: f64, width: f64| Facet {
            center: center + *normal * depth,
            normal,
            u,
            v: ez,
            half_extents: [0.5 * width, 0.5 * h],
        };
        let facets = [
            side(ex, ey, 0.5 * l, w),
            side(UnitVector(-*ex), ey, 0.5 * l, w),
            side(ey, ex, 0.5 * w, l),
            side(UnitVector(-*ey), ex, 0.5 * w, l),
        ];
        Self {
            center,
            axes: [ex, ey],
            dims,
            facets,
        }
    }

    fn encloses(&self, p: Vector<f64>) -> bool {
        let rel = p - self.center;
        let [ex, ey] = self.axes;
        ex.dot(rel).abs() <= 0.5 * self.dims[0] && ey.dot(rel).abs() <= 0.5 * self.dims[1]
    }

    fn solid_angle(&self, source: Coord<f64>) -> f64 {
        let p = Vector::from_planar(source, 0.0);
        if self.encloses(p) {
            return FOUR_PI;
        }
        let omega: f64 = self
            .facets
            .iter()
            .filter(|f| f.faces(p))
            .map(|f| f.solid_angle(p))
            .sum();
        omega.clamp(0.0, FOUR_PI)
    }

    fn footprint(&self) -> Polygon<f64> {
        let [ex, ey] = self.axes;
        let (a, b) = (0.5 * self.dims[0], 0.5 * self.dims[1]);
        let corners = [(a, b), (-a, b), (-a, -b), (a, -b)]
            .iter()
            .map(|&(s, t)| (self.center + *ex * s + *ey * t).planar())
            .collect::<Vec<_>>();
        Polygon::new(LineString::from(corners), Vec::new())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientedPrismParams {
    #[serde(rename = "R", with = "crate::deck::coord")]
    pub position: Coord<f64>,
    pub dims: [f64; 3],
    pub theta: f64,
    pub epsilon: f64,
    pub dwell: f64,
}

/// Rectangular box detector whose geometric efficiency is the solid angle its
/// side faces subtend at the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OrientedPrismParams", into = "OrientedPrismParams")]
pub struct OrientedPrismDetector {
    params: OrientedPrismParams,
    prism: Prism,
}

impl From<OrientedPrismParams> for OrientedPrismDetector {
    fn from(params: OrientedPrismParams) -> Self {
        Self::new(params)
    }
}

impl From<OrientedPrismDetector> for OrientedPrismParams {
    fn from(detector: OrientedPrismDetector) -> Self {
        detector.params
    }
}

impl OrientedPrismDetector {
    pub const TAG: &'static str = "Oriented_Prism";

    pub fn new(params: OrientedPrismParams) -> Self {
        Self {
            prism: Prism::new(params.position, params.dims, params.theta),
            params,
        }
    }

    pub fn params(&self) -> &OrientedPrismParams {
        &self.params
    }

    /// Front, back, left and right faces. Top and bottom never face a
    /// coplanar source.
    pub fn facets(&self) -> &[Facet; 4] {
        &self.prism.facets
    }

    /// Solid angle in `[0, 4pi]`; a source inside the prism sees `4pi`.
    pub fn solid_angle(&self, source: Coord<f64>) -> f64 {
        self.prism.solid_angle(source)
    }
}

impl Detector for OrientedPrismDetector {
    fn position(&self) -> Coord<f64> {
        self.params.position
    }

    fn dwell(&self) -> f64 {
        self.params.dwell
    }

    fn compute_response(&self, attenuated_intensity: f64, source: Coord<f64>) -> f64 {
        attenuated_intensity * (self.solid_angle(source) / FOUR_PI) * self.params.dwell * self.params.epsilon
    }

    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn to_record(&self) -> Result<DetectorRecord> {
        DetectorRecord::new(Self::TAG, self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientedPrismIntrinsicParams {
    #[serde(rename = "R", with = "crate::deck::coord")]
    pub position: Coord<f64>,
    pub dims: [f64; 3],
    pub theta: f64,
    /// Macroscopic interaction cross-section of the active volume.
    pub sigma_det: f64,
    pub dwell: f64,
}

/// Oriented prism whose efficiency is the probability of interacting along
/// the chord the incoming ray cuts through the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OrientedPrismIntrinsicParams", into = "OrientedPrismIntrinsicParams")]
pub struct OrientedPrismIntrinsicDetector {
    params: OrientedPrismIntrinsicParams,
    prism: Prism,
    footprint: Polygon<f64>,
}

impl From<OrientedPrismIntrinsicParams> for OrientedPrismIntrinsicDetector {
    fn from(params: OrientedPrismIntrinsicParams) -> Self {
        Self::new(params)
    }
}

impl From<OrientedPrismIntrinsicDetector> for OrientedPrismIntrinsicParams {
    fn from(detector: OrientedPrismIntrinsicDetector) -> Self {
        detector.params
    }
}

impl OrientedPrismIntrinsicDetector {
    pub const TAG: &'static str = "Oriented_Prism_Intrinsic";

    pub fn new(params: OrientedPrismIntrinsicParams) -> Self {
        let prism = Prism::new(params.position, params.dims, params.theta);
        Self {
            footprint: prism.footprint(),
            prism,
            params,
        }
    }

    pub fn params(&self) -> &OrientedPrismIntrinsicParams {
        &self.params
    }

    pub fn footprint(&self) -> &Polygon<f64> {
        &self.footprint
    }

    pub fn solid_angle(&self, source: Coord<f64>) -> f64 {
        self.prism.solid_angle(source)
    }

    /// Chord cut through the footprint by the ray from `source` through the
    /// detector center. A source at the center looks along the local x axis.
    pub fn chord_length(&self, source: Coord<f64>) -> f64 {
        if !(source.x.is_finite() && source.y.is_finite()) {
            return f64::NAN;
        }
        let center = self.prism.center;
        let reach = self.params.dims.iter().cloned().fold(0.0, f64::max);
        let direction = UnitVector::normalize(center - Vector::from_planar(source, 0.0))
            .unwrap_or(self.prism.axes[0]);
        let end = (center + *direction * reach).planar();
        clipped_length(&self.footprint, &segment(source, end))
    }

    pub fn intrinsic_efficiency(&self, source: Coord<f64>) -> f64 {
        1.0 - (-self.params.sigma_det * self.chord_length(source)).exp()
    }
}

impl Detector for OrientedPrismIntrinsicDetector {
    fn position(&self) -> Coord<f64> {
        self.params.position
    }

    fn dwell(&self) -> f64 {
        self.params.dwell
    }

    fn compute_response(&self, attenuated_intensity: f64, source: Coord<f64>) -> f64 {
        attenuated_intensity
            * (self.solid_angle(source) / FOUR_PI)
            * self.params.dwell
            * self.intrinsic_efficiency(source)
    }

    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn to_record(&self) -> Result<DetectorRecord> {
        DetectorRecord::new(Self::TAG, self)
    }
}
