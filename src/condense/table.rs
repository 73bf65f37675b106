//! Row flattening, table detection, and identity-column selection.

use indexmap::{IndexMap, IndexSet};

use crate::value::{format_scalar, Value};

/// Flattening recursion limit. Sub-trees below this depth render as raw
/// JSON text instead of columns.
pub const MAX_FLATTEN_DEPTH: usize = 64;

/// Identity keyword list, walked in order. Exact leaf matches win over
/// suffix matches.
pub const IDENTITY_KEYWORDS: &[&str] = &["name", "id", "key", "host", "pod", "node", "instance"];

/// Flatten a nested object into dot-notation keys. Only objects are
/// descended; array values are kept whole under their dotted key so the
/// preprocessor can decide a single cross-row policy for them (pivot,
/// positional expansion, extraction, or JSON cell).
pub fn flatten_row(obj: &IndexMap<String, Value>) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    flatten_into(&mut out, "", obj, 0);
    out
}

/// Flatten `map` into `out` under an explicit prefix. Used when a
/// single-element object array expands positionally into its parent row.
pub(crate) fn flatten_with_prefix(
    out: &mut IndexMap<String, Value>,
    prefix: &str,
    map: &IndexMap<String, Value>,
) {
    flatten_into(out, prefix, map, 0);
}

fn flatten_into(
    out: &mut IndexMap<String, Value>,
    prefix: &str,
    map: &IndexMap<String, Value>,
    depth: usize,
) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Obj(inner) => {
                if depth + 1 >= MAX_FLATTEN_DEPTH {
                    out.insert(path, Value::Str(value.to_json_text()));
                } else {
                    flatten_into(out, &path, inner, depth + 1);
                }
            }
            other => {
                out.insert(path, other.clone());
            }
        }
    }
}

/// An array qualifies as a table when every element is an object and the
/// union of flattened scalar columns (list fields excluded) has at least
/// two entries, with at least one data row.
pub fn is_table(arr: &[Value]) -> bool {
    if arr.is_empty() || !arr.iter().all(|v| v.as_obj().is_some()) {
        return false;
    }
    let mut union: IndexSet<String> = IndexSet::new();
    for item in arr {
        if let Some(obj) = item.as_obj() {
            for (key, value) in flatten_row(obj) {
                if !matches!(value, Value::Arr(_)) {
                    union.insert(key);
                }
            }
        }
    }
    union.len() >= 2
}

/// Union of scalar (non-array) columns across flattened rows, in
/// first-seen order.
pub fn scalar_columns(rows: &[IndexMap<String, Value>]) -> Vec<String> {
    let mut union: IndexSet<String> = IndexSet::new();
    for row in rows {
        for (key, value) in row {
            if !matches!(value, Value::Arr(_)) {
                union.insert(key.clone());
            }
        }
    }
    union.into_iter().collect()
}

/// Number of distinct non-null rendered values in a column.
pub fn cardinality(column: &str, rows: &[IndexMap<String, Value>]) -> usize {
    let mut distinct: IndexSet<String> = IndexSet::new();
    for row in rows {
        let rendered = row.get(column).map(format_scalar).unwrap_or_default();
        if !rendered.is_empty() {
            distinct.insert(rendered);
        }
    }
    distinct.len()
}

fn leaf(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}

/// Pick the row-label column.
///
/// Walks the keyword list twice (exact leaf match, then leaf suffix
/// match); within a keyword the candidate of highest distinct-value
/// cardinality wins, ties broken by first-seen order. Falls back to the
/// first column whose cardinality equals the row count.
pub fn pick_identity(columns: &[String], rows: &[IndexMap<String, Value>]) -> Option<String> {
    for keyword in IDENTITY_KEYWORDS {
        let exact: Vec<&String> = columns
            .iter()
            .filter(|c| leaf(c).eq_ignore_ascii_case(keyword))
            .collect();
        if let Some(best) = highest_cardinality(&exact, rows) {
            return Some(best.clone());
        }
    }
    for keyword in IDENTITY_KEYWORDS {
        let suffix: Vec<&String> = columns
            .iter()
            .filter(|c| {
                let l = leaf(c).to_ascii_lowercase();
                l.ends_with(keyword) && l != *keyword
            })
            .collect();
        if let Some(best) = highest_cardinality(&suffix, rows) {
            return Some(best.clone());
        }
    }
    columns
        .iter()
        .find(|c| cardinality(c, rows) == rows.len())
        .cloned()
}

fn highest_cardinality<'a>(
    candidates: &[&'a String],
    rows: &[IndexMap<String, Value>],
) -> Option<&'a String> {
    let mut best: Option<(&'a String, usize)> = None;
    for &candidate in candidates {
        let card = cardinality(candidate, rows);
        if best.map(|(_, b)| card > b).unwrap_or(true) {
            best = Some((candidate, card));
        }
    }
    best.map(|(c, _)| c)
}
