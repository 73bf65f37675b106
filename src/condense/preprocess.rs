//! Fixed-order table preprocessing.
//!
//! Steps run in the order: flatten, key-value pivot, column union, constant
//! elision, all-zero/all-null elision, mostly-zero elision, timestamp
//! clustering, tuple grouping, column cap, wide-table reshape. Later steps
//! observe the state earlier steps leave behind, so the order is load-bearing.
//! Each step checks its own shape preconditions and skips instead of
//! aborting; the identity column is never elided.

use chrono::{DateTime, FixedOffset};
use indexmap::{IndexMap, IndexSet};

use crate::condense::heuristics::{Heuristics, WideTableFormat};
use crate::condense::table::{
    flatten_row, flatten_with_prefix, pick_identity, scalar_columns, MAX_FLATTEN_DEPTH,
};
use crate::encoder::{Block, TableBlock, VerticalBlock};
use crate::value::{format_scalar, Value};

/// Timestamp columns spanning at most this window collapse to one note.
const TIMESTAMP_CLUSTER_WINDOW_SECS: i64 = 60;
/// Smallest sibling group worth fusing into a tuple.
const MIN_TUPLE_SIZE: usize = 3;
/// Strings longer than this disqualify a column from tuple grouping.
const TUPLE_SHORT_STRING_MAX: usize = 12;
/// Mostly-zero outliers listed before the annotation trails off.
const MAX_LISTED_OUTLIERS: usize = 5;

/// Preprocess a detected table and append its rendered block(s),
/// including any extracted sub-tables.
pub fn process_table(name: &str, arr: &[Value], heur: &Heuristics, blocks: &mut Vec<Block>) {
    let rows: Vec<IndexMap<String, Value>> = arr
        .iter()
        .filter_map(|v| v.as_obj())
        .map(flatten_row)
        .collect();
    process_rows(name, rows, heur, true, blocks);
}

pub(crate) fn process_rows(
    name: &str,
    mut rows: Vec<IndexMap<String, Value>>,
    heur: &Heuristics,
    allow_extract: bool,
    blocks: &mut Vec<Block>,
) {
    let (deferred, pivoted) = resolve_array_fields(&mut rows, heur, allow_extract);

    let columns = scalar_columns(&rows);
    if columns.is_empty() || rows.is_empty() {
        return;
    }
    let identity = pick_identity(&columns, &rows);
    let is_identity = |c: &str| identity.as_deref() == Some(c);
    // Pivoted key-value columns stay visible per row: exempt from every
    // elision step and from tuple grouping, like the identity column.
    let is_protected = |c: &str| is_identity(c) || pivoted.contains(c);

    let stats: IndexMap<String, ColStats> = columns
        .iter()
        .map(|c| (c.clone(), ColStats::analyze(c, &rows)))
        .collect();

    let mut elided: IndexSet<String> = IndexSet::new();
    let mut annotations: Vec<String> = Vec::new();

    // Constant columns. All-zero/all-null columns are left for the
    // dedicated steps so their annotations stay distinguishable.
    if heur.elide_constants {
        for col in &columns {
            if is_protected(col) || elided.contains(col) {
                continue;
            }
            let st = &stats[col];
            if st.all_null() || st.all_zero() {
                continue;
            }
            if let Some(value) = st.constant() {
                annotations.push(format!("{col}={value}"));
                elided.insert(col.clone());
            }
        }
    }

    if heur.elide_all_zero {
        let zero_cols: Vec<String> = columns
            .iter()
            .filter(|c| !is_protected(c) && !elided.contains(*c) && stats[*c].all_zero())
            .cloned()
            .collect();
        if !zero_cols.is_empty() {
            annotations.push(format!("all-zero: [{}]", zero_cols.join(", ")));
            elided.extend(zero_cols);
        }
    }

    if heur.elide_all_null {
        let null_cols: Vec<String> = columns
            .iter()
            .filter(|c| !is_protected(c) && !elided.contains(*c) && stats[*c].all_null())
            .cloned()
            .collect();
        if !null_cols.is_empty() {
            annotations.push(format!("all-null: [{}]", null_cols.join(", ")));
            elided.extend(null_cols);
        }
    }

    if heur.elide_mostly_zero_pct > 0.0 {
        for col in &columns {
            if is_protected(col) || elided.contains(col) {
                continue;
            }
            let st = &stats[col];
            let zeros = st.formatted.iter().filter(|v| is_zeroish(v)).count();
            if (zeros as f64) / (rows.len() as f64) < heur.elide_mostly_zero_pct {
                continue;
            }
            let mut outliers: Vec<String> = Vec::new();
            for (i, value) in st.formatted.iter().enumerate() {
                if is_zeroish(value) {
                    continue;
                }
                if outliers.len() >= MAX_LISTED_OUTLIERS {
                    outliers.push("…".to_string());
                    break;
                }
                let label = row_label(&rows[i], identity.as_deref(), i);
                outliers.push(format!("{label}={value}"));
            }
            if outliers.is_empty() {
                annotations.push(format!("mostly-zero {col}"));
            } else {
                annotations.push(format!("mostly-zero {col}: [{}]", outliers.join(", ")));
            }
            elided.insert(col.clone());
        }
    }

    if heur.elide_timestamps {
        for col in &columns {
            if is_protected(col) || elided.contains(col) {
                continue;
            }
            if let Some(earliest) = timestamp_cluster(col, &rows) {
                annotations.push(format!("{col}~{earliest}"));
                elided.insert(col.clone());
            }
        }
    }

    // Tuple grouping over surviving columns.
    let mut sources: Vec<(String, ColSource)> = columns
        .iter()
        .filter(|c| !elided.contains(*c))
        .map(|c| (c.clone(), ColSource::Single(c.clone())))
        .collect();

    if heur.group_tuples {
        let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
        for (header, _) in &sources {
            if is_protected(header) {
                continue;
            }
            if let Some(pos) = header.rfind('.') {
                groups
                    .entry(header[..pos].to_string())
                    .or_default()
                    .push(header.clone());
            }
        }
        for (prefix, members) in groups {
            if members.len() < MIN_TUPLE_SIZE || members.len() > heur.max_tuple_size {
                continue;
            }
            if !members.iter().all(|m| tuple_eligible(m, &rows)) {
                continue;
            }
            let leaves: Vec<&str> = members
                .iter()
                .map(|m| m.rsplit('.').next().unwrap_or(m))
                .collect();
            let fused = format!("{prefix}.({})", leaves.join(","));
            let first = sources
                .iter()
                .position(|(h, _)| h == &members[0])
                .expect("member present");
            sources[first] = (fused, ColSource::Tuple(members.clone()));
            sources.retain(|(h, _)| !members[1..].contains(h));
        }
    }

    // Identity column renders first.
    if let Some(id) = &identity {
        if let Some(pos) = sources.iter().position(|(h, _)| h == id) {
            let entry = sources.remove(pos);
            sources.insert(0, entry);
        }
    }

    if heur.max_table_columns > 0 && sources.len() > heur.max_table_columns {
        let dropped = sources.split_off(heur.max_table_columns);
        let names: Vec<String> = dropped.into_iter().map(|(h, _)| h).collect();
        annotations.push(format!(
            "dropped {} columns: [{}]",
            names.len(),
            names.join(", ")
        ));
    }

    if heur.wide_table_threshold > 0 && sources.len() >= heur.wide_table_threshold {
        match heur.wide_table_format {
            WideTableFormat::Vertical => {
                emit_vertical(name, annotations, &sources, &rows, identity.as_deref(), blocks)
            }
            WideTableFormat::Split => {
                emit_split(name, annotations, &sources, &rows, identity.as_deref(), blocks)
            }
        }
    } else {
        let headers: Vec<String> = sources.iter().map(|(h, _)| h.clone()).collect();
        let rendered: Vec<Vec<String>> = rows
            .iter()
            .map(|row| sources.iter().map(|(_, s)| cell(row, s)).collect())
            .collect();
        blocks.push(Block::Table(TableBlock {
            name: name.to_string(),
            annotations,
            columns: headers,
            rows: rendered,
        }));
    }

    // Extracted sub-tables render after their parent, in field order.
    for (field, occurrences) in deferred {
        let sub_rows = sub_table_rows(&rows, identity.as_deref(), &occurrences);
        if !sub_rows.is_empty() {
            process_rows(&format!("{name}.{field}"), sub_rows, heur, false, blocks);
        }
    }
}

/// Render a table with every heuristic disabled: flatten, expand arrays
/// positionally, union columns, emit. Used by the raw TOON encode path.
pub fn raw_table(name: &str, arr: &[Value], blocks: &mut Vec<Block>) {
    let mut rows: Vec<IndexMap<String, Value>> = arr
        .iter()
        .filter_map(|v| v.as_obj())
        .map(flatten_row)
        .collect();

    for _ in 0..MAX_FLATTEN_DEPTH {
        let keys = array_valued_keys(&rows);
        if keys.is_empty() {
            break;
        }
        for key in keys {
            let occ = occurrences(&rows, &key);
            let all_scalar = occ
                .iter()
                .all(|(_, items)| items.iter().all(Value::is_scalar));
            let all_objects = occ
                .iter()
                .all(|(_, items)| items.iter().all(|v| v.as_obj().is_some()));
            for row in rows.iter_mut() {
                let Some(Value::Arr(items)) = row.get(&key).cloned() else {
                    continue;
                };
                row.shift_remove(&key);
                if all_scalar {
                    for (i, item) in items.iter().enumerate() {
                        row.insert(format!("{key}.{i}"), item.clone());
                    }
                } else if all_objects {
                    for (i, item) in items.iter().enumerate() {
                        if let Some(obj) = item.as_obj() {
                            flatten_with_prefix(row, &format!("{key}.{i}"), obj);
                        }
                    }
                } else {
                    row.insert(key.clone(), Value::Str(Value::Arr(items).to_json_text()));
                }
            }
        }
    }
    jsonify_leftover_arrays(&mut rows);

    let columns = scalar_columns(&rows);
    if columns.is_empty() || rows.is_empty() {
        return;
    }
    let rendered: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c.as_str()).map(format_scalar).unwrap_or_default())
                .collect()
        })
        .collect();
    blocks.push(Block::Table(TableBlock {
        name: name.to_string(),
        annotations: vec![],
        columns,
        rows: rendered,
    }));
}

// ── array-field policy ───────────────────────────────────────────────────

type Deferred = Vec<(String, Vec<(usize, Vec<Value>)>)>;

/// Decide one cross-row policy per array-valued field: key-value pivot,
/// positional expansion, sub-table extraction, or a raw JSON cell.
/// Returns the deferred sub-table fields and the set of columns the
/// key-value pivot created.
fn resolve_array_fields(
    rows: &mut Vec<IndexMap<String, Value>>,
    heur: &Heuristics,
    allow_extract: bool,
) -> (Deferred, IndexSet<String>) {
    let mut deferred: Deferred = Vec::new();
    let mut pivoted: IndexSet<String> = IndexSet::new();

    for _ in 0..MAX_FLATTEN_DEPTH {
        let keys = array_valued_keys(rows);
        if keys.is_empty() {
            break;
        }
        for key in keys {
            let occ = occurrences(rows, &key);
            let mixed = rows.iter().any(|r| {
                r.get(&key)
                    .map(|v| !matches!(v, Value::Arr(_)) && !v.is_null())
                    .unwrap_or(false)
            });
            let all_scalar = occ.iter().all(|(_, items)| items.iter().all(Value::is_scalar));
            let all_objects = occ
                .iter()
                .all(|(_, items)| items.iter().all(|v| v.as_obj().is_some()));
            let max_len = occ.iter().map(|(_, items)| items.len()).max().unwrap_or(0);
            let total: usize = occ.iter().map(|(_, items)| items.len()).sum();

            if mixed {
                jsonify_field(rows, &key);
            } else if heur.pivot_key_value_arrays
                && occ.iter().all(|(_, items)| items.iter().all(is_kv_pair))
            {
                pivot_field(rows, &key, &mut pivoted);
            } else if all_scalar {
                expand_scalars(rows, &key);
            } else if all_objects && max_len <= 1 {
                expand_single_objects(rows, &key);
            } else if allow_extract && all_objects && total >= 2 && extractable(&occ) {
                let mut collected = Vec::new();
                for row_idx in 0..rows.len() {
                    if let Some(Value::Arr(items)) = rows[row_idx].get(&key).cloned() {
                        rows[row_idx].shift_remove(&key);
                        collected.push((row_idx, items));
                    }
                }
                deferred.push((key, collected));
            } else {
                jsonify_field(rows, &key);
            }
        }
    }
    jsonify_leftover_arrays(rows);
    (deferred, pivoted)
}

fn array_valued_keys(rows: &[IndexMap<String, Value>]) -> Vec<String> {
    let mut keys: IndexSet<String> = IndexSet::new();
    for row in rows {
        for (key, value) in row {
            if matches!(value, Value::Arr(_)) {
                keys.insert(key.clone());
            }
        }
    }
    keys.into_iter().collect()
}

fn occurrences(rows: &[IndexMap<String, Value>], key: &str) -> Vec<(usize, Vec<Value>)> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| match row.get(key) {
            Some(Value::Arr(items)) => Some((i, items.clone())),
            _ => None,
        })
        .collect()
}

/// The AWS-tag convention: an object with exactly `Key` and `Value`,
/// the key itself a scalar.
fn is_kv_pair(value: &Value) -> bool {
    match value.as_obj() {
        Some(obj) => {
            obj.len() == 2
                && obj.get("Key").map(|k| k.is_scalar() && !k.is_null()).unwrap_or(false)
                && obj.contains_key("Value")
        }
        None => false,
    }
}

fn pivot_field(
    rows: &mut [IndexMap<String, Value>],
    key: &str,
    pivoted: &mut IndexSet<String>,
) {
    for row in rows.iter_mut() {
        let Some(Value::Arr(items)) = row.get(key).cloned() else {
            row.shift_remove(key);
            continue;
        };
        row.shift_remove(key);
        for item in items {
            let Some(obj) = item.as_obj() else { continue };
            let tag = obj.get("Key").map(format_scalar).unwrap_or_default();
            let value = match obj.get("Value") {
                Some(v) if v.is_scalar() => v.clone(),
                Some(v) => Value::Str(v.to_json_text()),
                None => Value::Null,
            };
            let column = format!("{key}.{tag}");
            pivoted.insert(column.clone());
            row.insert(column, value);
        }
    }
}

fn expand_scalars(rows: &mut [IndexMap<String, Value>], key: &str) {
    for row in rows.iter_mut() {
        let Some(Value::Arr(items)) = row.get(key).cloned() else {
            continue;
        };
        row.shift_remove(key);
        for (i, item) in items.iter().enumerate() {
            row.insert(format!("{key}.{i}"), item.clone());
        }
    }
}

fn expand_single_objects(rows: &mut [IndexMap<String, Value>], key: &str) {
    for row in rows.iter_mut() {
        let Some(Value::Arr(items)) = row.get(key).cloned() else {
            continue;
        };
        row.shift_remove(key);
        if let Some(obj) = items.first().and_then(Value::as_obj) {
            flatten_with_prefix(row, &format!("{key}.0"), obj);
        }
    }
}

fn jsonify_field(rows: &mut [IndexMap<String, Value>], key: &str) {
    for row in rows.iter_mut() {
        if let Some(value @ Value::Arr(_)) = row.get(key).cloned() {
            row.insert(key.to_string(), Value::Str(value.to_json_text()));
        }
    }
}

fn jsonify_leftover_arrays(rows: &mut [IndexMap<String, Value>]) {
    for row in rows.iter_mut() {
        let arr_keys: Vec<String> = row
            .iter()
            .filter(|(_, v)| matches!(v, Value::Arr(_)))
            .map(|(k, _)| k.clone())
            .collect();
        for key in arr_keys {
            if let Some(value) = row.get(&key).cloned() {
                row.insert(key, Value::Str(value.to_json_text()));
            }
        }
    }
}

/// Homogeneity check for sub-table extraction: every element shares at
/// least two flattened scalar keys.
fn extractable(occ: &[(usize, Vec<Value>)]) -> bool {
    let mut common: Option<IndexSet<String>> = None;
    for (_, items) in occ {
        for item in items {
            let Some(obj) = item.as_obj() else { return false };
            let keys: IndexSet<String> = flatten_row(obj)
                .into_iter()
                .filter(|(_, v)| !matches!(v, Value::Arr(_)))
                .map(|(k, _)| k)
                .collect();
            common = Some(match common {
                None => keys,
                Some(prev) => prev.intersection(&keys).cloned().collect(),
            });
        }
    }
    common.map(|c| c.len() >= 2).unwrap_or(false)
}

fn sub_table_rows(
    rows: &[IndexMap<String, Value>],
    identity: Option<&str>,
    occurrences: &[(usize, Vec<Value>)],
) -> Vec<IndexMap<String, Value>> {
    let mut out = Vec::new();
    for (row_idx, items) in occurrences {
        let (ref_key, ref_value) = match identity {
            Some(id) => (
                format!("_parent.{id}"),
                rows[*row_idx].get(id).cloned().unwrap_or(Value::Null),
            ),
            None => ("_parent.row".to_string(), Value::Int(*row_idx as i64)),
        };
        for item in items {
            if let Some(obj) = item.as_obj() {
                let mut map = IndexMap::new();
                map.insert(ref_key.clone(), ref_value.clone());
                for (k, v) in flatten_row(obj) {
                    map.insert(k, v);
                }
                out.push(map);
            }
        }
    }
    out
}

// ── column analysis ──────────────────────────────────────────────────────

struct ColStats {
    formatted: Vec<String>,
    distinct: IndexSet<String>,
}

impl ColStats {
    fn analyze(column: &str, rows: &[IndexMap<String, Value>]) -> Self {
        let formatted: Vec<String> = rows
            .iter()
            .map(|row| row.get(column).map(format_scalar).unwrap_or_default())
            .collect();
        let distinct: IndexSet<String> = formatted.iter().cloned().collect();
        Self { formatted, distinct }
    }

    fn all_null(&self) -> bool {
        self.distinct.iter().all(|v| v.is_empty())
    }

    fn all_zero(&self) -> bool {
        self.formatted.iter().all(|v| is_zeroish(v)) && self.formatted.iter().any(|v| v == "0")
    }

    /// The single non-null value, when there is exactly one.
    fn constant(&self) -> Option<&String> {
        let mut non_empty = self.distinct.iter().filter(|v| !v.is_empty());
        match (non_empty.next(), non_empty.next()) {
            (Some(value), None) => Some(value),
            _ => None,
        }
    }
}

fn is_zeroish(formatted: &str) -> bool {
    formatted.is_empty() || formatted == "0"
}

fn row_label(row: &IndexMap<String, Value>, identity: Option<&str>, index: usize) -> String {
    match identity {
        Some(id) => {
            let label = row.get(id).map(format_scalar).unwrap_or_default();
            if label.is_empty() {
                index.to_string()
            } else {
                label
            }
        }
        None => index.to_string(),
    }
}

/// When every non-null cell parses as an absolute instant and the span
/// between the extremes is within the cluster window, return the raw text
/// of the earliest one.
fn timestamp_cluster(column: &str, rows: &[IndexMap<String, Value>]) -> Option<String> {
    let mut parsed: Vec<(DateTime<FixedOffset>, String)> = Vec::new();
    for row in rows {
        match row.get(column) {
            None | Some(Value::Null) => {}
            Some(Value::Str(s)) if s.is_empty() => {}
            Some(Value::Str(s)) => {
                parsed.push((parse_instant(s)?, s.clone()));
            }
            Some(_) => return None,
        }
    }
    let (min, max) = (
        parsed.iter().min_by_key(|(t, _)| *t)?,
        parsed.iter().max_by_key(|(t, _)| *t)?,
    );
    if (max.0 - min.0).num_seconds() <= TIMESTAMP_CLUSTER_WINDOW_SECS {
        Some(min.1.clone())
    } else {
        None
    }
}

fn parse_instant(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text).ok().or_else(|| {
        chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

fn tuple_eligible(column: &str, rows: &[IndexMap<String, Value>]) -> bool {
    rows.iter().all(|row| match row.get(column) {
        None | Some(Value::Null) | Some(Value::Int(_)) | Some(Value::Float(_)) => true,
        Some(Value::Str(s)) => {
            !s.is_empty()
                && s.chars().count() <= TUPLE_SHORT_STRING_MAX
                && !s.chars().any(char::is_whitespace)
        }
        _ => false,
    })
}

// ── rendering ────────────────────────────────────────────────────────────

enum ColSource {
    Single(String),
    Tuple(Vec<String>),
}

fn cell(row: &IndexMap<String, Value>, source: &ColSource) -> String {
    match source {
        ColSource::Single(column) => row.get(column.as_str()).map(format_scalar).unwrap_or_default(),
        ColSource::Tuple(members) => {
            let parts: Vec<String> = members
                .iter()
                .map(|m| row.get(m.as_str()).map(format_scalar).unwrap_or_default())
                .collect();
            format!("({})", parts.join(","))
        }
    }
}

fn emit_vertical(
    name: &str,
    annotations: Vec<String>,
    sources: &[(String, ColSource)],
    rows: &[IndexMap<String, Value>],
    identity: Option<&str>,
    blocks: &mut Vec<Block>,
) {
    let entries = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let label = row_label(row, identity, i);
            let pairs = sources
                .iter()
                .filter(|(h, _)| identity != Some(h.as_str()))
                .map(|(h, s)| (h.clone(), cell(row, s)))
                .collect();
            (label, pairs)
        })
        .collect();
    blocks.push(Block::Vertical(VerticalBlock {
        name: name.to_string(),
        annotations,
        entries,
    }));
}

fn emit_split(
    name: &str,
    mut annotations: Vec<String>,
    sources: &[(String, ColSource)],
    rows: &[IndexMap<String, Value>],
    identity: Option<&str>,
    blocks: &mut Vec<Block>,
) {
    let id_header = identity.unwrap_or("row").to_string();
    let mut groups: IndexMap<String, Vec<&(String, ColSource)>> = IndexMap::new();
    for entry in sources {
        if identity == Some(entry.0.as_str()) {
            continue;
        }
        let segment = entry.0.split('.').next().unwrap_or(&entry.0).to_string();
        groups.entry(segment).or_default().push(entry);
    }

    for (segment, members) in groups {
        let mut columns = vec![id_header.clone()];
        columns.extend(members.iter().map(|(h, _)| h.clone()));
        let rendered: Vec<Vec<String>> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut cells = vec![row_label(row, identity, i)];
                cells.extend(members.iter().map(|(_, s)| cell(row, s)));
                cells
            })
            .collect();
        blocks.push(Block::Table(TableBlock {
            name: format!("{name}.{segment}"),
            annotations: std::mem::take(&mut annotations),
            columns,
            rows: rendered,
        }));
    }
}
