//! Column reconciliation: mapping arbitrary upload headers onto a canonical
//! schema.
//!
//! Matching runs per canonical column, in schema order, first match wins:
//! exact, then case-insensitive (trimmed), then a fixed list of fuzzy header
//! variants. A source header consumed by an earlier canonical column is never
//! reused, so two canonical columns cannot collapse onto one source column.
//! Unmatched columns are a normal outcome, not an error.

use serde::Serialize;

use crate::schema::CanonicalSchema;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnMatch {
    pub canonical: String,
    /// Source header this canonical column was matched to, if any.
    pub source: Option<String>,
    #[serde(skip)]
    source_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnMapping {
    pub matches: Vec<ColumnMatch>,
}

impl ColumnMapping {
    pub fn source_index(&self, canonical: &str) -> Option<usize> {
        self.matches
            .iter()
            .find(|m| m.canonical == canonical)
            .and_then(|m| m.source_index)
    }

    pub fn matched_count(&self) -> usize {
        self.matches.iter().filter(|m| m.source.is_some()).count()
    }

    pub fn unmatched_columns(&self) -> Vec<&str> {
        self.matches
            .iter()
            .filter(|m| m.source.is_none())
            .map(|m| m.canonical.as_str())
            .collect()
    }

    /// True when every canonical column matched a source header of the same
    /// name, i.e. the upload already uses canonical headers.
    pub fn is_identity(&self) -> bool {
        self.matches
            .iter()
            .all(|m| m.source.as_deref() == Some(m.canonical.as_str()))
    }
}

/// Fuzzy header variants for a lowercased, trimmed canonical name, in match
/// priority order.
fn header_variants(lowered: &str) -> Vec<String> {
    vec![
        lowered.to_string(),
        lowered.replace(' ', "_"),
        lowered.replace('_', " "),
        lowered.chars().filter(char::is_ascii_alphanumeric).collect(),
        lowered.replace("name", "").trim().to_string(),
        lowered.replace("no", "number").replace("num", "number"),
    ]
}

fn squash(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase()
}

pub fn reconcile(headers: &[String], schema: &CanonicalSchema) -> ColumnMapping {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    // Source headers squashed the same way as the strip-punctuation variant,
    // so spacing and punctuation differences cancel from both sides
    // ("Ref Id" meets "refId" at "refid").
    let squashed: Vec<String> = headers.iter().map(|h| squash(h)).collect();
    let mut used = vec![false; headers.len()];
    let mut matches = Vec::with_capacity(schema.len());

    for column in &schema.columns {
        let found = find_source(&column.name, headers, &normalized, &squashed, &used);
        if let Some(idx) = found {
            used[idx] = true;
        }
        matches.push(ColumnMatch {
            canonical: column.name.clone(),
            source: found.map(|idx| headers[idx].clone()),
            source_index: found,
        });
    }

    ColumnMapping { matches }
}

fn find_source(
    canonical: &str,
    headers: &[String],
    normalized: &[String],
    squashed: &[String],
    used: &[bool],
) -> Option<usize> {
    if let Some(idx) = headers
        .iter()
        .enumerate()
        .position(|(i, h)| !used[i] && h.as_str() == canonical)
    {
        return Some(idx);
    }

    let lowered = canonical.trim().to_lowercase();
    if let Some(idx) = position_unused(normalized, used, &lowered) {
        return Some(idx);
    }

    for variant in header_variants(&lowered) {
        if let Some(idx) = position_unused(normalized, used, &variant)
            .or_else(|| position_unused(squashed, used, &variant))
        {
            return Some(idx);
        }
    }
    None
}

fn position_unused(normalized: &[String], used: &[bool], target: &str) -> Option<usize> {
    normalized
        .iter()
        .enumerate()
        .position(|(i, h)| !used[i] && h.as_str() == target)
}
