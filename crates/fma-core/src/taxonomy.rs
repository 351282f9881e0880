//! Two-level taxonomy definitions
//!
//! A taxonomy file is a JSON document whose single top-level key is the
//! taxonomy name, mapping to an object of level1 categories, each mapping
//! level2 subcategories to lists of example strings. The raw JSON text is
//! kept alongside the parsed mapping because classification prompts embed
//! it verbatim as reference material.

use crate::error::TaxonomyError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Level2 subcategory -> example strings
pub type SubcategoryMap = BTreeMap<String, Vec<String>>;

/// A named two-level category scheme
#[derive(Debug, Clone)]
pub struct Taxonomy {
    name: String,
    levels: BTreeMap<String, SubcategoryMap>,
    raw: String,
}

impl Taxonomy {
    /// Load and validate a taxonomy from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TaxonomyError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TaxonomyError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a taxonomy from a JSON string
    pub fn from_json_str(raw: &str) -> Result<Self, TaxonomyError> {
        let value: Value = serde_json::from_str(raw)?;

        let root = match &value {
            Value::Object(map) if map.len() == 1 => map,
            _ => return Err(TaxonomyError::NotSingleRoot),
        };
        // Single-entry object checked above
        let (name, mapping) = root.iter().next().ok_or(TaxonomyError::NotSingleRoot)?;

        let categories = mapping
            .as_object()
            .ok_or_else(|| TaxonomyError::RootNotObject { name: name.clone() })?;

        let mut levels = BTreeMap::new();
        for (level1, submap) in categories {
            let subcategories =
                submap
                    .as_object()
                    .ok_or_else(|| TaxonomyError::CategoryNotObject {
                        category: level1.clone(),
                    })?;

            let mut parsed = SubcategoryMap::new();
            for (level2, examples) in subcategories {
                let list = examples
                    .as_array()
                    .ok_or_else(|| TaxonomyError::ExamplesNotList {
                        category: level1.clone(),
                        subcategory: level2.clone(),
                    })?;
                let strings = list
                    .iter()
                    .map(|e| match e {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                parsed.insert(level2.clone(), strings);
            }
            levels.insert(level1.clone(), parsed);
        }

        Ok(Self {
            name: name.clone(),
            levels,
            raw: raw.trim().to_string(),
        })
    }

    /// Taxonomy name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// level1 -> level2 -> examples mapping
    #[inline]
    #[must_use]
    pub fn levels(&self) -> &BTreeMap<String, SubcategoryMap> {
        &self.levels
    }

    /// Sorted level1 category names
    #[must_use]
    pub fn level1_categories(&self) -> Vec<String> {
        self.levels.keys().cloned().collect()
    }

    /// The original JSON text, trimmed, for verbatim prompt embedding
    #[inline]
    #[must_use]
    pub fn raw_json(&self) -> &str {
        &self.raw
    }
}
