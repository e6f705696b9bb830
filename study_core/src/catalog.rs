//! Content catalog of study units.
//!
//! [`ContentSource`] is the content-fetch collaborator the daily cache and
//! the study commands depend on. [`Catalog`] is the in-process source: the
//! built-in devotional units, or a JSON file of units loaded from disk.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::path::Path;

/// Fetches study units. Every call may fail.
pub trait ContentSource: Send + Sync {
    fn fetch_unit_by_id(&self, id: &UnitId) -> Result<StudyUnit>;
    fn fetch_random_unit(&self) -> Result<StudyUnit>;
    fn fetch_unit_list(&self, filter: Option<&UnitFilter>) -> Result<Vec<StudyUnit>>;
}

/// Optional narrowing for unit listings
#[derive(Clone, Debug, Default)]
pub struct UnitFilter {
    /// Exact category match, case-insensitive
    pub category: Option<String>,
    /// Substring of the title, case-insensitive
    pub search: Option<String>,
}

impl UnitFilter {
    pub fn matches(&self, unit: &StudyUnit) -> bool {
        if let Some(ref category) = self.category {
            if !unit.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(ref search) = self.search {
            if !unit.title.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// An ordered collection of study units
#[derive(Clone, Debug)]
pub struct Catalog {
    pub units: Vec<StudyUnit>,
}

/// Cached default catalog, built once
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Shared reference to the built-in catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

fn unit(id: &str, title: &str, category: &str, reference: &str) -> StudyUnit {
    StudyUnit {
        id: Some(UnitId::new(id)),
        title: title.into(),
        category: category.into(),
        steps: default_steps(),
        reference: Some(reference.into()),
    }
}

/// Builds the catalog of built-in devotional units
pub fn build_default_catalog() -> Catalog {
    Catalog {
        units: vec![
            unit("1", "Be Still and Know", "peace", "Psalm 46:10"),
            unit("2", "The Good Shepherd", "trust", "Psalm 23:1-3"),
            unit("3", "Love Is Patient", "love", "1 Corinthians 13:4-7"),
            unit("4", "Faith Like a Mustard Seed", "faith", "Matthew 17:20"),
            unit("5", "Renewed Strength", "hope", "Isaiah 40:31"),
            unit("6", "Do Not Worry", "peace", "Matthew 6:25-34"),
            unit("7", "The Fruit of the Spirit", "growth", "Galatians 5:22-23"),
            StudyUnit {
                id: Some(UnitId::new("8")),
                title: "A Lamp to My Feet".into(),
                category: "scripture".into(),
                steps: vec![
                    Step::new("verse", "Verse"),
                    Step::new("explanation", "Explanation"),
                    Step::new("reflection", "Reflection"),
                ],
                reference: Some("Psalm 119:105".into()),
            },
        ],
    }
}

impl Catalog {
    /// Load a catalog from a JSON array of units
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let units: Vec<StudyUnit> = serde_json::from_str(&contents)?;
        let catalog = Catalog { units };

        let errors = catalog.validate();
        if !errors.is_empty() {
            return Err(Error::Content(format!(
                "invalid catalog {:?}: {}",
                path,
                errors.join("; ")
            )));
        }

        tracing::info!("Loaded {} units from {:?}", catalog.units.len(), path);
        Ok(catalog)
    }

    /// Validate catalog integrity
    ///
    /// Returns a list of problems (empty if valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.units.is_empty() {
            errors.push("Catalog has no units".to_string());
        }

        let mut seen_units = HashSet::new();
        for unit in &self.units {
            let Some(ref id) = unit.id else {
                errors.push(format!("Unit '{}' has no ID", unit.title));
                continue;
            };

            if id.as_str().is_empty() {
                errors.push(format!("Unit '{}' has empty ID", unit.title));
            }
            if !seen_units.insert(id.clone()) {
                errors.push(format!("Duplicate unit ID '{}'", id));
            }
            if unit.title.is_empty() {
                errors.push(format!("Unit '{}' has empty title", id));
            }
            if unit.steps.is_empty() {
                errors.push(format!("Unit '{}' has no steps", id));
            }

            let mut seen_steps = HashSet::new();
            for step in &unit.steps {
                if step.id.as_str().is_empty() {
                    errors.push(format!("Unit '{}' has a step with empty ID", id));
                }
                if !seen_steps.insert(&step.id) {
                    errors.push(format!("Unit '{}' repeats step '{}'", id, step.id));
                }
            }
        }

        errors
    }
}

impl ContentSource for Catalog {
    fn fetch_unit_by_id(&self, id: &UnitId) -> Result<StudyUnit> {
        self.units
            .iter()
            .find(|u| u.id.as_ref() == Some(id))
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn fetch_random_unit(&self) -> Result<StudyUnit> {
        let unit = self
            .units
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| Error::Content("catalog is empty".into()))?;
        tracing::debug!("Picked random unit {:?}", unit.id);
        Ok(unit)
    }

    fn fetch_unit_list(&self, filter: Option<&UnitFilter>) -> Result<Vec<StudyUnit>> {
        Ok(self
            .units
            .iter()
            .filter(|u| filter.map_or(true, |f| f.matches(u)))
            .cloned()
            .collect())
    }
}
