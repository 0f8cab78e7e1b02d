//! The canonical deck schema.
//!
//! A deck is a `problem_type` tag plus the problem data. Solids refer to
//! materials by index into a compact table in which each distinct material
//! appears once; the interstitial material lives in the same table.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Domain, Solid};
use crate::material::Material;
use crate::problem::{Problem, ProblemComponents};
use crate::registry::Registries;
use crate::sources::Source;

/// Serde adapter storing a point as `[x, y]`.
pub(crate) mod coord {
    use geo::Coord;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(p: &Coord<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        [p.x, p.y].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Coord<f64>, D::Error> {
        let [x, y] = <[f64; 2]>::deserialize(deserializer)?;
        Ok(Coord { x, y })
    }
}

/// Serde adapter storing a vertex list as `[[x, y], ...]`.
pub(crate) mod coords {
    use geo::Coord;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(ps: &[Coord<f64>], serializer: S) -> Result<S::Ok, S::Error> {
        ps.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Coord<f64>>, D::Error> {
        let ps = Vec::<[f64; 2]>::deserialize(deserializer)?;
        Ok(ps.into_iter().map(|[x, y]| Coord { x, y }).collect())
    }
}

/// First-occurrence index of each distinct material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialTable {
    entries: Vec<Material>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `material`, adding it if no equal material is present.
    pub fn intern(&mut self, material: Material) -> usize {
        match self.entries.iter().position(|m| *m == material) {
            Some(index) => index,
            None => {
                self.entries.push(material);
                self.entries.len() - 1
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<usize, Material> {
        self.entries.into_iter().enumerate().collect()
    }
}

/// Per-solid indices into a compact material table.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialReferences {
    pub refs: Vec<usize>,
    pub table: BTreeMap<usize, Material>,
}

pub fn compact_references(materials: &[Material]) -> MaterialReferences {
    let mut table = MaterialTable::new();
    let refs = materials.iter().map(|&m| table.intern(m)).collect();
    MaterialReferences {
        refs,
        table: table.into_map(),
    }
}

pub fn resolve_references(refs: &[usize], table: &BTreeMap<usize, Material>) -> Result<Vec<Material>> {
    refs.iter().map(|&index| lookup(table, index)).collect()
}

fn lookup(table: &BTreeMap<usize, Material>, index: usize) -> Result<Material> {
    table
        .get(&index)
        .copied()
        .ok_or(Error::UnresolvedMaterial { index })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidRecord {
    #[serde(with = "coords")]
    pub vertices: Vec<Coord<f64>>,
    #[serde(rename = "material_ref")]
    pub material: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    #[serde(with = "coords")]
    pub bbox: Vec<Coord<f64>>,
    pub solids: Vec<SolidRecord>,
}

/// A detector's type tag and its variant-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorRecord {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl DetectorRecord {
    pub fn new<T: Serialize + ?Sized>(type_tag: &str, detector: &T) -> Result<Self> {
        match serde_json::to_value(detector)? {
            serde_json::Value::Object(fields) => Ok(Self {
                type_tag: type_tag.to_owned(),
                fields,
            }),
            _ => Err(Error::Deck(serde::ser::Error::custom(format!(
                "`{}` detector did not serialize to a map",
                type_tag
            )))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckData {
    pub domain: DomainRecord,
    pub interstitial_material: usize,
    pub materials: BTreeMap<usize, Material>,
    pub source: Source,
    pub detectors: Vec<DetectorRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub problem_type: String,
    pub data: DeckData,
}

impl Deck {
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<()> {
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Canonical deck for `problem`, with materials de-duplicated.
    pub fn from_problem(problem: &Problem) -> Result<Self> {
        let mut table = MaterialTable::new();
        let interstitial_material = table.intern(*problem.interstitial_material());
        let domain = problem.domain();
        let solids = domain
            .solids()
            .iter()
            .zip(problem.materials())
            .map(|(solid, &material)| SolidRecord {
                vertices: solid.vertices().to_vec(),
                material: table.intern(material),
            })
            .collect();
        let detectors = problem
            .detectors()
            .iter()
            .map(|d| d.to_record())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            problem_type: problem.type_tag().to_owned(),
            data: DeckData {
                domain: DomainRecord {
                    bbox: domain.bbox_vertices().to_vec(),
                    solids,
                },
                interstitial_material,
                materials: table.into_map(),
                source: *problem.source(),
                detectors,
            },
        })
    }

    pub fn build(&self, registries: &Registries) -> Result<Problem> {
        self.build_as(&self.problem_type, registries)
    }

    /// Build the deck's contents as `problem_type`, whatever the deck names.
    pub fn build_as(&self, problem_type: &str, registries: &Registries) -> Result<Problem> {
        let data = &self.data;
        let solids = data
            .domain
            .solids
            .iter()
            .map(|s| Solid::new(s.vertices.clone()))
            .collect::<Result<Vec<_>>>()?;
        let domain = Domain::new(data.domain.bbox.clone(), solids)?;
        let refs: Vec<usize> = data.domain.solids.iter().map(|s| s.material).collect();
        let materials = resolve_references(&refs, &data.materials)?;
        let interstitial_material = lookup(&data.materials, data.interstitial_material)?;
        let detectors = data
            .detectors
            .iter()
            .map(|record| {
                registries
                    .detectors
                    .construct(&record.type_tag, serde_json::Value::Object(record.fields.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            problem_type,
            solids = materials.len(),
            materials = data.materials.len(),
            detectors = detectors.len(),
            "loaded deck"
        );
        registries.problems.construct(
            problem_type,
            ProblemComponents {
                domain,
                interstitial_material,
                materials,
                source: data.source,
                detectors,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::coord;
    use proptest::prelude::*;

    const DECK: &str = r#"{
        "problem_type": "Simple_Problem",
        "data": {
            "domain": {
                "bbox": [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
                "solids": [
                    {"vertices": [[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0]], "material_ref": 1},
                    {"vertices": [[1.0, 7.0], [3.0, 7.0], [3.0, 9.0], [1.0, 9.0]], "material_ref": 2},
                    {"vertices": [[7.0, 1.0], [9.0, 1.0], [9.0, 3.0], [7.0, 3.0]], "material_ref": 1}
                ]
            },
            "interstitial_material": 0,
            "materials": {
                "0": {"number_density": 1.0, "cross_section": 0.01},
                "1": {"number_density": 2.0, "cross_section": 0.25},
                "2": {"number_density": 1.0, "cross_section": 0.8}
            },
            "source": {"R": [0.5, 5.0], "I0": 1000000000.0},
            "detectors": [
                {"type": "Point", "R": [9.5, 5.0], "epsilon": 1.0, "area": 0.01, "dwell": 60.0},
                {"type": "Oriented_Prism", "R": [5.0, 9.5], "dims": [0.4, 0.1, 0.1], "theta": 0.5, "epsilon": 0.8, "dwell": 30.0},
                {"type": "Oriented_Prism_Intrinsic", "R": [9.0, 9.0], "dims": [0.4, 0.1, 0.1], "theta": 1.0, "sigma_det": 2.0, "dwell": 30.0}
            ]
        }
    }"#;

    fn pool() -> [Material; 4] {
        [
            Material::new(1.0, 0.01),
            Material::new(2.0, 0.25),
            Material::new(1.0, 0.8),
            Material::new(0.25, 2.0),
        ]
    }

    #[test]
    fn compaction_dedupes_in_first_occurrence_order() {
        let [a, b, c, _] = pool();
        let materials = vec![b, a, b, c, a];
        let compact = compact_references(&materials);
        assert_eq!(compact.refs, vec![0, 1, 0, 2, 1]);
        assert_eq!(compact.table.len(), 3);
        assert_eq!(compact.table[&0], b);
        assert_eq!(resolve_references(&compact.refs, &compact.table).unwrap(), materials);
    }

    #[test]
    fn equal_sigma_t_is_not_equal_material() {
        let [_, b, _, d] = pool();
        assert_eq!(b.sigma_t(), 0.5);
        assert_eq!(d.sigma_t(), 0.5);
        assert_eq!(compact_references(&[b, d]).refs, vec![0, 1]);
    }

    #[test]
    fn dangling_reference() {
        let table = compact_references(&pool()).table;
        let err = resolve_references(&[0, 7], &table).unwrap_err();
        assert!(matches!(err, Error::UnresolvedMaterial { index: 7 }));
    }

    #[test]
    fn load_and_evaluate() {
        let deck = Deck::from_json_str(DECK).unwrap();
        let problem = deck.build(&Registries::default()).unwrap();
        assert_eq!(problem.type_tag(), Problem::SIMPLE);
        assert_eq!(problem.materials(), &[pool()[1], pool()[2], pool()[1]]);
        assert_eq!(*problem.interstitial_material(), pool()[0]);
        assert_eq!(problem.detectors().len(), 3);
        assert_eq!(problem.source().position, coord! { x: 0.5, y: 5.0 });

        let simple = problem.as_simple().unwrap();
        let response = simple.evaluate(problem.source().position, problem.source().intensity);
        assert_eq!(response.len(), 3);
        // 7 units of air and 2 through the first block to the point detector
        let expected = 1e9 * (-(7.0 * 0.01 + 2.0 * 0.5f64)).exp() * 0.01 * 60.0 / (4.0 * core::f64::consts::PI * 81.0);
        assert_relative_eq!(response[0], expected, max_relative = 1e-9);
        assert!(response.iter().all(|&r| r > 0.0));
    }

    #[test]
    fn round_trip() {
        let deck = Deck::from_json_str(DECK).unwrap();
        let problem = deck.build(&Registries::default()).unwrap();
        let dumped = Deck::from_problem(&problem).unwrap();
        assert_eq!(dumped, deck);
        let reloaded = Deck::from_json_str(&dumped.to_json_string().unwrap()).unwrap();
        assert_eq!(reloaded, deck);
    }

    #[test]
    fn solids_name_their_material_ref() {
        let deck = Deck::from_json_str(DECK).unwrap();
        let value = serde_json::to_value(&deck).unwrap();
        let solid = &value["data"]["domain"]["solids"][1];
        assert_eq!(solid["material_ref"], 2);
        assert!(solid.get("material").is_none());
    }

    #[test]
    fn problem_type_override() {
        let deck = Deck::from_json_str(DECK).unwrap();
        let problem = deck.build_as(Problem::PERTURBABLE_XS, &Registries::default()).unwrap();
        let perturbable = problem.as_perturbable_xs().unwrap();
        let r = coord! { x: 2.0, y: 2.0 };
        let nominal = perturbable.evaluate_nominal(r, 1e9);
        let simple = deck.build(&Registries::default()).unwrap();
        assert_eq!(nominal, simple.as_simple().unwrap().evaluate(r, 1e9));
        assert_eq!(Deck::from_problem(&problem).unwrap().problem_type, "Perturbable_XS_Problem");
    }

    #[test]
    fn unknown_tags_are_fatal() {
        let mut deck = Deck::from_json_str(DECK).unwrap();
        let err = deck.build_as("Transport_Problem", &Registries::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownTag { kind: "problem", .. }));
        deck.data.detectors[0].type_tag = "Cylinder".to_owned();
        let err = deck.build(&Registries::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownTag { kind: "detector", .. }));
    }

    #[test]
    fn missing_field_is_a_deck_error() {
        let mut deck = Deck::from_json_str(DECK).unwrap();
        deck.data.detectors[0].fields.remove("area");
        assert!(matches!(deck.build(&Registries::default()), Err(Error::Deck(_))));
        assert!(matches!(Deck::from_json_str("{\"problem_type\": 1}"), Err(Error::Deck(_))));
    }

    #[test]
    fn solids_outside_bbox_abort_loading() {
        let mut deck = Deck::from_json_str(DECK).unwrap();
        deck.data.domain.solids[0].vertices[1] = coord! { x: 16.0, y: 4.0 };
        assert!(matches!(
            deck.build(&Registries::default()),
            Err(Error::SolidsOutsideBoundingBox { .. })
        ));
    }

    proptest! {
        #[test]
        fn references_round_trip(picks in prop::collection::vec(0usize..4, 0..24)) {
            let pool = pool();
            let materials: Vec<Material> = picks.iter().map(|&i| pool[i]).collect();
            let compact = compact_references(&materials);
            prop_assert!(compact.table.len() <= 4);
            prop_assert_eq!(resolve_references(&compact.refs, &compact.table).unwrap(), materials);
        }
    }
}
