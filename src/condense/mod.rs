//! The condensation pipeline: walk a parsed tree, split scalars from
//! arrays, preprocess detected tables, and render everything as TOON
//! blocks in source order.

pub mod heuristics;
pub mod preprocess;
pub mod table;

use indexmap::IndexMap;

use crate::encoder::{self, Block};
use crate::value::{format_scalar, Value};

pub use heuristics::{Heuristics, HeuristicsOverride, Profile, WideTableFormat};

/// Condense a pre-parsed tree with the full preprocessing pipeline.
pub fn condense_value(tree: &Value, heur: &Heuristics) -> String {
    let mut blocks = Vec::new();
    walk_root(tree, Some(heur), &mut blocks);
    encoder::render(&blocks)
}

/// Raw TOON encode of a tree: same rendering, no semantic preprocessing.
pub fn encode_toon(tree: &Value) -> String {
    let mut blocks = Vec::new();
    walk_root(tree, None, &mut blocks);
    encoder::render(&blocks)
}

fn walk_root(tree: &Value, heur: Option<&Heuristics>, blocks: &mut Vec<Block>) {
    match tree {
        Value::Obj(map) => walk_object("", map, heur, blocks),
        Value::Arr(items) => walk_array("root", items, heur, blocks),
        scalar => blocks.push(Block::Scalars(vec![(
            "root".to_string(),
            format_scalar(scalar),
        )])),
    }
}

fn walk_object(
    name: &str,
    map: &IndexMap<String, Value>,
    heur: Option<&Heuristics>,
    blocks: &mut Vec<Block>,
) {
    let flat = table::flatten_row(map);
    let mut scalars: Vec<(String, String)> = Vec::new();
    let mut arrays: Vec<(String, Vec<Value>)> = Vec::new();
    for (key, value) in flat {
        let qualified = qualify(name, &key);
        match value {
            Value::Arr(items) => arrays.push((qualified, items)),
            other => scalars.push((qualified, format_scalar(&other))),
        }
    }
    if !scalars.is_empty() {
        blocks.push(Block::Scalars(scalars));
    }
    for (array_name, items) in arrays {
        walk_array(&array_name, &items, heur, blocks);
    }
}

fn walk_array(name: &str, items: &[Value], heur: Option<&Heuristics>, blocks: &mut Vec<Block>) {
    if table::is_table(items) {
        match heur {
            Some(h) => preprocess::process_table(name, items, h, blocks),
            None => preprocess::raw_table(name, items, blocks),
        }
        return;
    }
    if !items.is_empty() && items.iter().all(|v| v.as_obj().is_some()) {
        // Objects too narrow for a table: render each element in place.
        for (i, item) in items.iter().enumerate() {
            if let Some(obj) = item.as_obj() {
                walk_object(&format!("{name}[{i}]"), obj, heur, blocks);
            }
        }
        return;
    }
    // Primitive or mixed arrays render as one JSON line.
    blocks.push(Block::Scalars(vec![(
        name.to_string(),
        Value::Arr(items.to_vec()).to_json_text(),
    )]));
}

fn qualify(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
