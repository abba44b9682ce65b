//! JSON tree helpers shared by the store backends.
//!
//! The store never keeps `null`s or empty containers: writing one deletes the
//! node, and parents left empty by a delete disappear too. The exception is a
//! hole inside an array, which stays `null` so later indices keep their place.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::Query;

/// Split a path into non-empty segments.
#[must_use]
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Read the node at `path`.
#[must_use]
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments(path) {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!node.is_null()).then_some(node)
}

/// Drop nulls and empty containers, recursively.
#[must_use]
pub fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(normalize).collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        other => Some(other),
    }
}

/// Replace the node at `path`. A null (after normalizing) deletes it.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let segments = segments(path);
    set_at(root, &segments, normalize(value));
}

fn set_at(node: &mut Value, segments: &[&str], value: Option<Value>) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value.unwrap_or(Value::Null);
        return;
    };
    if let Value::Array(items) = node {
        if let Ok(index) = first.parse::<usize>() {
            set_in_array(items, index, rest, value);
            return;
        }
        let items = std::mem::take(items);
        *node = array_to_object(items);
    }
    if !node.is_object() {
        if value.is_none() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };
    if rest.is_empty() {
        match value {
            Some(value) => {
                map.insert((*first).to_owned(), value);
            }
            None => {
                map.remove(*first);
            }
        }
        return;
    }
    let child = map.entry((*first).to_owned()).or_insert(Value::Null);
    set_at(child, rest, value);
    if is_empty_node(child) {
        map.remove(*first);
    }
}

/// Write at `index` of an array. Missing indices in between are holes
/// (`null`), and trailing holes are trimmed.
fn set_in_array(items: &mut Vec<Value>, index: usize, rest: &[&str], value: Option<Value>) {
    if index >= items.len() {
        if value.is_none() {
            return;
        }
        items.resize(index + 1, Value::Null);
    }
    if let Some(slot) = items.get_mut(index) {
        set_at(slot, rest, value);
        if is_empty_node(slot) {
            *slot = Value::Null;
        }
    }
    while items.last().is_some_and(Value::is_null) {
        items.pop();
    }
}

fn array_to_object(items: Vec<Value>) -> Value {
    Value::Object(
        items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
    )
}

fn is_empty_node(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Shallow-merge `fields` into the node at `path`.
///
/// Keys may themselves be relative paths (`"a/b": 1`), as in the store's
/// multi-location update.
pub fn merge(root: &mut Value, path: &str, fields: Map<String, Value>) {
    let base = path.trim_matches('/');
    for (key, value) in fields {
        let target = if base.is_empty() {
            key
        } else {
            format!("{base}/{key}")
        };
        set(root, &target, value);
    }
}

const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) | Value::Object(_) => 5,
    }
}

/// Order two values the way the store orders children by a child value:
/// null, false, true, numbers, strings, then objects.
#[must_use]
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Apply `query` to the children of `node`.
#[must_use]
pub fn query_children(node: Option<&Value>, query: &Query) -> Vec<(String, Value)> {
    let mut children: Vec<(String, Value)> = match node {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        _ => Vec::new(),
    };

    let null = Value::Null;
    let sort_value = |value: &Value| -> Value {
        query
            .order_by_child
            .as_deref()
            .and_then(|child| get(value, child))
            .unwrap_or(&null)
            .clone()
    };

    match &query.order_by_child {
        Some(_) => children.sort_by(|(ka, va), (kb, vb)| {
            compare(&sort_value(va), &sort_value(vb)).then_with(|| ka.cmp(kb))
        }),
        None => children.sort_by(|(ka, _), (kb, _)| ka.cmp(kb)),
    }

    if let Some(expected) = &query.equal_to {
        children.retain(|(key, value)| {
            let actual = if query.order_by_child.is_some() {
                sort_value(value)
            } else {
                Value::String(key.clone())
            };
            compare(&actual, expected) == Ordering::Equal && type_rank(&actual) == type_rank(expected)
        });
    }

    if let Some(n) = query.limit_to_last {
        let skip = children.len().saturating_sub(n);
        children.drain(..skip);
    }
    children
}

/// Collect query results back into an object snapshot.
#[must_use]
pub fn children_to_snapshot(children: Vec<(String, Value)>) -> Option<Value> {
    (!children.is_empty()).then(|| Value::Object(children.into_iter().collect()))
}
