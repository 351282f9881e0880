//! Merge algorithm
//!
//! Input discovery accepts a mixture of file and directory paths;
//! directories contribute their contained `.json` files (recursively when
//! asked). Resolved paths are de-duplicated and sorted so processing
//! order never depends on argument order. Entries are accumulated per
//! taxonomy name behind a seen-set keyed by (node_id, issue, level1,
//! level2); an entry already seen for that name is dropped, which is what
//! makes merging rerun outputs idempotent.

use crate::error::MergeError;
use fma_core::{ClassificationEntry, MergedResult, TaxonomyFile};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const KNOWN_FIELDS: [&str; 4] = ["issue", "node_id", "level1", "level2"];

/// Resolve input paths into a de-duplicated, sorted list of JSON files.
///
/// Files are kept as given; directories are scanned for `.json` files,
/// recursively when `recursive` is set. Nonexistent paths are skipped.
#[must_use]
pub fn gather_input_files(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();
    for path in paths {
        if path.is_file() {
            files.insert(resolve(path));
        } else if path.is_dir() {
            if recursive {
                for entry in WalkDir::new(path).into_iter().flatten() {
                    if entry.file_type().is_file() && is_json(entry.path()) {
                        files.insert(resolve(entry.path()));
                    }
                }
            } else if let Ok(entries) = std::fs::read_dir(path) {
                for entry in entries.flatten() {
                    let file = entry.path();
                    if file.is_file() && is_json(&file) {
                        files.insert(resolve(&file));
                    }
                }
            }
        } else {
            tracing::debug!(path = %path.display(), "skipping nonexistent input path");
        }
    }
    files.into_iter().collect()
}

/// Merge taxonomy files into a single result.
///
/// A file that cannot be read, parsed, or shape-validated is skipped when
/// `ignore_errors` is set and raised otherwise. Fails with
/// [`MergeError::NothingValid`] when no file contributed.
pub fn merge(files: &[PathBuf], ignore_errors: bool) -> Result<MergedResult, MergeError> {
    let mut entries_by_taxonomy: BTreeMap<String, Vec<ClassificationEntry>> = BTreeMap::new();
    let mut seen_by_taxonomy: BTreeMap<String, HashSet<(String, String, String, String)>> =
        BTreeMap::new();

    for path in files {
        let value = match load_json(path) {
            Ok(value) => value,
            Err(e) => {
                if ignore_errors {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable input");
                    continue;
                }
                return Err(e);
            }
        };

        let Some((taxonomy_name, raw_entries)) = taxonomy_file_shape(&value) else {
            if ignore_errors {
                tracing::warn!(path = %path.display(), "skipping file with invalid shape");
                continue;
            }
            return Err(MergeError::InvalidShape { path: path.clone() });
        };

        let entries = entries_by_taxonomy.entry(taxonomy_name.clone()).or_default();
        let seen = seen_by_taxonomy.entry(taxonomy_name).or_default();

        for raw in raw_entries {
            let Some(entry) = entry_from_value(raw) else {
                continue;
            };
            if seen.insert(entry.dedup_key()) {
                entries.push(entry);
            }
        }
    }

    if entries_by_taxonomy.is_empty() {
        return Err(MergeError::NothingValid);
    }

    // Deterministic output order within each taxonomy
    for entries in entries_by_taxonomy.values_mut() {
        entries.sort_by_key(|e| (e.node_id.clone(), e.issue.to_lowercase()));
    }

    if entries_by_taxonomy.len() == 1 {
        // Single-entry map checked above
        let (taxonomy_name, classifications) = entries_by_taxonomy
            .into_iter()
            .next()
            .ok_or(MergeError::NothingValid)?;
        return Ok(MergedResult::Single(TaxonomyFile {
            taxonomy_name,
            classifications,
        }));
    }

    Ok(MergedResult::Aggregate {
        taxonomies: entries_by_taxonomy
            .into_iter()
            .map(|(taxonomy_name, classifications)| TaxonomyFile {
                taxonomy_name,
                classifications,
            })
            .collect(),
    })
}

/// Write a merged result as pretty-printed JSON
pub fn write_merged(path: impl AsRef<Path>, merged: &MergedResult) -> Result<(), MergeError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let payload = serde_json::to_string_pretty(merged).map_err(|e| MergeError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, payload)?;
    Ok(())
}

fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn load_json(path: &Path) -> Result<Value, MergeError> {
    let raw = std::fs::read_to_string(path).map_err(|e| MergeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&raw).map_err(|e| MergeError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Validate the `{taxonomy_name, classifications}` shape
fn taxonomy_file_shape(value: &Value) -> Option<(String, &Vec<Value>)> {
    let map = value.as_object()?;
    let name = map.get("taxonomy_name")?.as_str()?;
    let entries = map.get("classifications")?.as_array()?;
    Some((name.to_string(), entries))
}

/// Lenient entry extraction: missing known fields default to empty
/// strings, non-object entries are dropped, unknown fields are preserved.
fn entry_from_value(value: &Value) -> Option<ClassificationEntry> {
    let map = value.as_object()?;
    let field = |key: &str| map.get(key).map(stringify).unwrap_or_default();

    let mut extra = Map::new();
    for (key, val) in map {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            extra.insert(key.clone(), val.clone());
        }
    }

    Some(ClassificationEntry {
        issue: field("issue"),
        node_id: field("node_id"),
        level1: field("level1"),
        level2: field("level2"),
        extra,
    })
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
