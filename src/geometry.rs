use geo::{
    Area, BooleanOps, BoundingRect, Coord, EuclideanLength, Intersects, Line, LineString,
    MultiLineString, MultiPolygon, Polygon, Rect,
};
use ndarray::{s, Array1};

use crate::error::{Error, Result};

/// Relative area (of the bounding box) the solids may exceed it by before the
/// domain is rejected. Absorbs round-off from the polygon overlay.
const CONTAINMENT_TOLERANCE: f64 = 1e-9;

pub(crate) fn polygon_from(vertices: &[Coord<f64>]) -> Result<Polygon<f64>> {
    if vertices.len() < 3 {
        return Err(Error::DegeneratePolygon {
            vertices: vertices.len(),
        });
    }
    Ok(Polygon::new(LineString::from(vertices.to_vec()), Vec::new()))
}

fn is_finite(p: Coord<f64>) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

pub(crate) fn segment(a: Coord<f64>, b: Coord<f64>) -> MultiLineString<f64> {
    MultiLineString::new(vec![LineString::from(vec![a, b])])
}

/// Length of the part of `segment` lying inside `region`.
pub(crate) fn clipped_length<R>(region: &R, segment: &MultiLineString<f64>) -> f64
where
    R: BooleanOps<Scalar = f64>,
{
    region.clip(segment, false).euclidean_length()
}

/// Length of `[a, b]` running along the exterior ring of `polygon`.
fn boundary_run(polygon: &Polygon<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d = b - a;
    let len_sqr = d.x * d.x + d.y * d.y;
    let on_line = |p: Coord<f64>| {
        let r = p - a;
        (d.x * r.y - d.y * r.x).abs() <= 1e-12 * len_sqr.max(r.x * r.x + r.y * r.y)
    };
    let along = |p: Coord<f64>| {
        let r = p - a;
        (d.x * r.x + d.y * r.y) / len_sqr
    };
    polygon
        .exterior()
        .lines()
        .filter(|Line { start, end }| on_line(*start) && on_line(*end))
        .map(|Line { start, end }| {
            let (s, t) = (along(start), along(end));
            (s.max(t).min(1.0) - s.min(t).max(0.0)).max(0.0)
        })
        .sum::<f64>()
        * len_sqr.sqrt()
}

/// A shielding solid: a simple polygon.
#[derive(Debug, Clone)]
pub struct Solid {
    vertices: Vec<Coord<f64>>,
    polygon: Polygon<f64>,
}

impl Solid {
    pub fn new(vertices: Vec<Coord<f64>>) -> Result<Self> {
        let polygon = polygon_from(&vertices)?;
        Ok(Self { vertices, polygon })
    }

    pub fn vertices(&self) -> &[Coord<f64>] {
        &self.vertices
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Length of `[a, b]` inside this solid. Disjoint or touching segments give `0.0`.
    pub fn find_path_length(&self, a: Coord<f64>, b: Coord<f64>) -> f64 {
        if a == b {
            return 0.0;
        }
        if !(is_finite(a) && is_finite(b)) {
            return f64::NAN;
        }
        clipped_length(&self.polygon, &segment(a, b))
    }
}

/// The bounded 2D world: a bounding polygon and the solids inside it.
#[derive(Debug, Clone)]
pub struct Domain {
    bbox_vertices: Vec<Coord<f64>>,
    bbox: Polygon<f64>,
    solids: Vec<Solid>,
    all: MultiPolygon<f64>,
    empty: MultiPolygon<f64>,
}

impl Domain {
    pub fn new(bbox_vertices: Vec<Coord<f64>>, solids: Vec<Solid>) -> Result<Self> {
        let bbox = polygon_from(&bbox_vertices)?;
        let bbox_region = MultiPolygon::new(vec![bbox.clone()]);

        let all = solids.iter().fold(MultiPolygon::new(Vec::new()), |acc, solid| {
            let next = MultiPolygon::new(vec![solid.polygon.clone()]);
            if acc.0.is_empty() {
                next
            } else {
                acc.union(&next)
            }
        });

        let empty = if all.0.is_empty() {
            bbox_region
        } else {
            let excess_area = all.difference(&bbox_region).unsigned_area();
            if excess_area > CONTAINMENT_TOLERANCE * bbox.unsigned_area() {
                return Err(Error::SolidsOutsideBoundingBox { excess_area });
            }
            bbox_region.difference(&all)
        };

        let solid_area: f64 = solids.iter().map(|s| s.polygon.unsigned_area()).sum();
        let union_area = all.unsigned_area();
        if solid_area - union_area > CONTAINMENT_TOLERANCE * bbox.unsigned_area() {
            tracing::warn!(
                overlap_area = solid_area - union_area,
                "solids overlap, path lengths through the overlap count once per solid"
            );
        }
        tracing::debug!(
            solids = solids.len(),
            free_area = empty.unsigned_area(),
            "built domain"
        );

        Ok(Self {
            bbox_vertices,
            bbox,
            solids,
            all,
            empty,
        })
    }

    pub fn solids(&self) -> &[Solid] {
        &self.solids
    }

    pub fn bbox(&self) -> &Polygon<f64> {
        &self.bbox
    }

    pub fn bbox_vertices(&self) -> &[Coord<f64>] {
        &self.bbox_vertices
    }

    /// Union of every solid.
    pub fn all(&self) -> &MultiPolygon<f64> {
        &self.all
    }

    /// Free space: the bounding polygon minus the solids.
    pub fn empty(&self) -> &MultiPolygon<f64> {
        &self.empty
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bbox.bounding_rect()
    }

    pub fn solid_bounds(&self) -> Option<Rect<f64>> {
        self.all.bounding_rect()
    }

    /// Whether `p` lies in the bounding polygon, boundary included.
    pub fn contains(&self, p: Coord<f64>) -> bool {
        self.bbox.intersects(&p)
    }

    /// Split `[a, b]` by medium: `[free, solid_1, ..., solid_n]`.
    ///
    /// Free space is whatever the segment covers in the closed bounding polygon
    /// that no solid claims, so runs along a solid's edge or along the bounding
    /// polygon itself count as free. Any part of the segment outside the
    /// bounding polygon is not counted. Non-finite endpoints give a path of NaN.
    pub fn construct_path(&self, a: Coord<f64>, b: Coord<f64>) -> Array1<f64> {
        let mut path = Array1::zeros(self.solids.len() + 1);
        if a == b {
            return path;
        }
        if !(is_finite(a) && is_finite(b)) {
            path.fill(f64::NAN);
            return path;
        }
        let line = segment(a, b);
        for (length, solid) in path.iter_mut().skip(1).zip(&self.solids) {
            *length = clipped_length(&solid.polygon, &line);
        }
        let inside = clipped_length(&self.bbox, &line) + boundary_run(&self.bbox, a, b);
        path[0] = (inside - path.slice(s![1..]).sum()).max(0.0);
        path
    }
}
