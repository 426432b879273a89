//! Dotted/indexed locators into JSON payloads: `data.items[0].name`, `results.0.id`,
//! `meta["next-page"]`.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    for ch in path.trim().chars() {
        match ch {
            '.' if !in_brackets => {
                push_segment(&mut segments, &current);
                current.clear();
            }
            '[' if !in_brackets => {
                push_segment(&mut segments, &current);
                current.clear();
                in_brackets = true;
            }
            ']' if in_brackets => {
                push_segment(&mut segments, &current);
                current.clear();
                in_brackets = false;
            }
            _ => current.push(ch),
        }
    }
    push_segment(&mut segments, &current);
    segments
}

fn push_segment(segments: &mut Vec<PathSegment>, raw: &str) {
    let trimmed = raw.trim().trim_matches('"').trim_matches('\'').trim();
    if trimmed.is_empty() {
        return;
    }
    match trimmed.parse::<usize>() {
        Ok(index) => segments.push(PathSegment::Index(index)),
        Err(_) => segments.push(PathSegment::Key(trimmed.to_string())),
    }
}

/// Walks `path` through `target`. A blank path selects the whole value; any missing
/// segment yields `None`.
pub fn lookup_path<'a>(target: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = target;
    for segment in parse_path(path) {
        current = match (&segment, current) {
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
            (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            _ => return None,
        };
    }
    Some(current)
}
