//! Goal predicate engine and stock queries over a world snapshot.
//!
//! A goal selects a set of entities, resolves a dotted attribute path on each,
//! and compares the aggregate against an expected value. Numeric values are
//! summed across the selection; a non-numeric value only compares when it is
//! the single value found, and then only for `==` / `!=`.

use contracts::{Comparator, EntityState, Goal, GoalValue, ItemId, Selector, WorldSnapshot};
use serde_json::Value;

const INVENTORY_ROOT: &str = "inventory";

/// A resolved attribute: numbers are widened to `f64` for aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Number(f64),
    Value(&'a Value),
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

pub fn evaluate(goal: &Goal, snapshot: &WorldSnapshot) -> bool {
    match aggregate(goal, snapshot) {
        Aggregate::Sum(sum) => compare_number(sum, goal.comparator, &goal.expected),
        Aggregate::Single(value) => compare_scalar(value, goal.comparator, &goal.expected),
        Aggregate::Nothing | Aggregate::Ambiguous => false,
    }
}

pub fn all_hold(goals: &[Goal], snapshot: &WorldSnapshot) -> bool {
    goals.iter().all(|goal| evaluate(goal, snapshot))
}

/// Human-readable aggregate the goal currently sees, for board printouts.
pub fn current_value(goal: &Goal, snapshot: &WorldSnapshot) -> Option<String> {
    match aggregate(goal, snapshot) {
        Aggregate::Sum(sum) => Some(format_number(sum)),
        Aggregate::Single(Value::String(text)) => Some(text.clone()),
        Aggregate::Single(value) => Some(value.to_string()),
        Aggregate::Nothing | Aggregate::Ambiguous => None,
    }
}

enum Aggregate<'a> {
    Sum(f64),
    Single(&'a Value),
    Nothing,
    Ambiguous,
}

fn aggregate<'a>(goal: &Goal, snapshot: &'a WorldSnapshot) -> Aggregate<'a> {
    let mut sum = 0.0;
    let mut numeric = 0usize;
    let mut others = Vec::new();

    for entity in select(goal, snapshot) {
        match resolve(entity, &goal.attribute) {
            Some(Resolved::Number(value)) => {
                sum += value;
                numeric += 1;
            }
            Some(Resolved::Value(Value::Null)) | None => {}
            Some(Resolved::Value(value)) => others.push(value),
        }
    }

    if numeric > 0 {
        Aggregate::Sum(sum)
    } else {
        match others.as_slice() {
            [] => Aggregate::Nothing,
            [single] => Aggregate::Single(*single),
            _ => Aggregate::Ambiguous,
        }
    }
}

/// Entities a goal looks at, in snapshot order, minus the exclusion.
pub fn select<'g, 's: 'g>(
    goal: &'g Goal,
    snapshot: &'s WorldSnapshot,
) -> impl Iterator<Item = &'s EntityState> + 'g {
    snapshot
        .entities
        .iter()
        .filter(move |entity| match &goal.target {
            Selector::Global => !entity.is_agent(),
            Selector::Named(name) => entity.name == *name,
            Selector::Prefix(prefix) => {
                entity.category.starts_with(prefix.as_str())
                    || entity.name.starts_with(prefix.as_str())
            }
        })
        .filter(move |entity| goal.exclude.as_deref() != Some(entity.name.as_str()))
}

/// Resolve a dotted path on one entity.
///
/// `inventory.<item>` reads the inventory map, absent items count as 0. Any
/// other path walks the attribute tree: a missing root means "no value", while
/// a missing key inside an existing object counts as 0 (so a drained work
/// queue entry reads as zero remaining).
pub fn resolve<'a>(entity: &'a EntityState, path: &str) -> Option<Resolved<'a>> {
    let mut segments = path.split('.');
    let root = segments.next()?;

    if root == INVENTORY_ROOT {
        let item_id = segments.next()?.trim().parse::<ItemId>().ok()?;
        if segments.next().is_some() {
            return None;
        }
        return Some(Resolved::Number(entity.stock(item_id) as f64));
    }

    let mut current = entity.attributes.get(root)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(next) => next,
                None => return Some(Resolved::Number(0.0)),
            },
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(match current.as_f64() {
        Some(number) => Resolved::Number(number),
        None => Resolved::Value(current),
    })
}

/// String attribute at `path`, if it resolves to one.
pub fn attribute_text<'a>(entity: &'a EntityState, path: &str) -> Option<&'a str> {
    match resolve(entity, path)? {
        Resolved::Value(Value::String(text)) => Some(text),
        _ => None,
    }
}

fn compare_number(actual: f64, comparator: Comparator, expected: &GoalValue) -> bool {
    let Some(expected) = expected.as_number() else {
        return comparator == Comparator::Ne;
    };
    match comparator {
        Comparator::Eq => actual == expected,
        Comparator::Ne => actual != expected,
        Comparator::Lt => actual < expected,
        Comparator::Gt => actual > expected,
        Comparator::Le => actual <= expected,
        Comparator::Ge => actual >= expected,
    }
}

fn compare_scalar(actual: &Value, comparator: Comparator, expected: &GoalValue) -> bool {
    let equal = match (actual, expected) {
        (Value::String(text), GoalValue::Text(want)) => text == want,
        (Value::Bool(flag), GoalValue::Bool(want)) => flag == want,
        _ => false,
    };
    match comparator {
        Comparator::Eq => equal,
        Comparator::Ne => !equal,
        _ => false,
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ---------------------------------------------------------------------------
// Stock queries
// ---------------------------------------------------------------------------

/// Total stock of an item across all non-agent entities, optionally skipping one.
pub fn global_stock(snapshot: &WorldSnapshot, item_id: ItemId, exclude: Option<&str>) -> i64 {
    snapshot
        .facilities()
        .filter(|entity| exclude != Some(entity.name.as_str()))
        .map(|entity| entity.stock(item_id))
        .fold(0, i64::saturating_add)
}

pub fn local_stock(snapshot: &WorldSnapshot, entity: &str, item_id: ItemId) -> i64 {
    snapshot
        .entity(entity)
        .map(|entity| entity.stock(item_id))
        .unwrap_or(0)
}

/// First facility of a category. The facility at `near` wins when it fits;
/// exact category matches beat prefix matches on category or name.
pub fn find_facility<'a>(
    snapshot: &'a WorldSnapshot,
    category: &str,
    near: Option<&str>,
) -> Option<&'a EntityState> {
    let loose = |entity: &EntityState| {
        entity.category.starts_with(category) || entity.name.starts_with(category)
    };

    if let Some(here) = near
        .and_then(|name| snapshot.entity(name))
        .filter(|entity| !entity.is_agent() && loose(entity))
    {
        return Some(here);
    }

    snapshot
        .facilities()
        .find(|entity| entity.category == category)
        .or_else(|| snapshot.facilities().find(|entity| loose(entity)))
}

/// A facility holding at least `min` of the item, storage first.
pub fn find_holder<'a>(
    snapshot: &'a WorldSnapshot,
    item_id: ItemId,
    min: i64,
    exclude: Option<&str>,
    storage_category: &str,
) -> Option<&'a EntityState> {
    let holds = |entity: &&EntityState| {
        exclude != Some(entity.name.as_str()) && entity.stock(item_id) >= min.max(1)
    };
    snapshot
        .facilities()
        .filter(holds)
        .find(|entity| entity.category.starts_with(storage_category))
        .or_else(|| snapshot.facilities().find(holds))
}
