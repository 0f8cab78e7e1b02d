use std::collections::BTreeMap;
use std::fmt;

use crate::detectors::{detector_registry, Detector};
use crate::error::{Error, Result};
use crate::problem::{problem_registry, Problem, ProblemComponents};

pub type Constructor<I, T> = fn(I) -> Result<T>;

/// String-keyed table of constructors for one family of deck types.
///
/// The built-in variants are registered up front; callers may add their own
/// tags with [`Registry::register`] without touching the deck schema.
pub struct Registry<I, T> {
    kind: &'static str,
    constructors: BTreeMap<String, Constructor<I, T>>,
}

impl<I, T> Registry<I, T> {
    /// An empty registry. `kind` names the family in lookup errors.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            constructors: BTreeMap::new(),
        }
    }

    /// Adds or replaces the constructor for `tag`, returning the one it replaced.
    pub fn register(&mut self, tag: impl Into<String>, constructor: Constructor<I, T>) -> Option<Constructor<I, T>> {
        self.constructors.insert(tag.into(), constructor)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn construct(&self, tag: &str, input: I) -> Result<T> {
        let constructor = self.constructors.get(tag).ok_or_else(|| Error::UnknownTag {
            kind: self.kind,
            tag: tag.to_owned(),
        })?;
        constructor(input)
    }
}

impl<I, T> Clone for Registry<I, T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            constructors: self.constructors.clone(),
        }
    }
}

impl<I, T> fmt::Debug for Registry<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("tags", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The detector and problem registries a deck is built against.
#[derive(Debug, Clone)]
pub struct Registries {
    pub detectors: Registry<serde_json::Value, Box<dyn Detector>>,
    pub problems: Registry<ProblemComponents, Problem>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            detectors: detector_registry(),
            problems: problem_registry(),
        }
    }
}
