//! Predicate AST and compiler.
//!
//! Loosely-typed query objects compile eagerly into a closed tagged AST.
//! Malformed shapes fail compilation with `InvalidQuery`; operator names the
//! engine does not implement compile to a never-matching condition so that
//! peers running newer predicate vocabularies degrade instead of erroring.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::{errors::SyncGraphError, store::NodeRecord};

#[derive(Debug, Clone)]
pub enum Predicate {
    /// Condition on one field path. An empty path targets the whole node.
    Field { path: String, op: FieldOp },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Traversal over outgoing edges; filters transitive descendants of the
    /// sibling-condition root set. Set-valued, evaluated by the engine.
    Edge(Box<Predicate>),
}

#[derive(Debug, Clone)]
pub enum FieldOp {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Between(Value, Value),
    Exists(bool),
    /// Folded needle for the diacritic- and case-insensitive substring scan.
    Text(String),
    Like(Regex),
    Matches(Regex),
    /// Operator name this version does not implement; never matches.
    Unsupported(String),
}

pub fn compile(source: &Value) -> Result<Predicate, SyncGraphError> {
    let Value::Object(fields) = source else {
        return Err(SyncGraphError::invalid_query("query must be an object"));
    };
    let mut parts = Vec::with_capacity(fields.len());
    for (key, operand) in fields {
        match key.as_str() {
            "$and" => parts.push(Predicate::And(compile_list(operand, "$and")?)),
            "$or" => parts.push(Predicate::Or(compile_list(operand, "$or")?)),
            "$not" => parts.push(Predicate::Not(Box::new(compile(operand)?))),
            "$edge" => parts.push(Predicate::Edge(Box::new(compile(operand)?))),
            "$text" => parts.push(Predicate::Field {
                path: String::new(),
                op: compile_text(operand)?,
            }),
            other if other.starts_with('$') => {
                warn!(operator = other, "unsupported operator in query");
                parts.push(Predicate::Field {
                    path: String::new(),
                    op: FieldOp::Unsupported(other.to_string()),
                });
            }
            field => compile_field(field, operand, &mut parts)?,
        }
    }
    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(Predicate::And(parts))
    }
}

fn compile_list(operand: &Value, combinator: &str) -> Result<Vec<Predicate>, SyncGraphError> {
    let Value::Array(items) = operand else {
        return Err(SyncGraphError::invalid_query(format!(
            "{combinator} expects an array of query objects"
        )));
    };
    items.iter().map(compile).collect()
}

/// Sibling conditions under one field key. An operator object applies each
/// operator to the path; a plain object descends with a dotted path; any
/// other value is `$eq` shorthand.
fn compile_field(
    path: &str,
    operand: &Value,
    parts: &mut Vec<Predicate>,
) -> Result<(), SyncGraphError> {
    match operand {
        Value::Object(entries) if !entries.is_empty() => {
            let operator_keys = entries.keys().filter(|key| key.starts_with('$')).count();
            if operator_keys == entries.len() {
                for (name, arg) in entries {
                    parts.push(compile_operator(path, name, arg)?);
                }
                Ok(())
            } else if operator_keys == 0 {
                for (key, nested) in entries {
                    compile_field(&format!("{path}.{key}"), nested, parts)?;
                }
                Ok(())
            } else {
                Err(SyncGraphError::invalid_query(format!(
                    "field {path} mixes operators and nested fields"
                )))
            }
        }
        literal => {
            parts.push(Predicate::Field {
                path: path.to_string(),
                op: FieldOp::Eq(literal.clone()),
            });
            Ok(())
        }
    }
}

fn compile_operator(path: &str, name: &str, operand: &Value) -> Result<Predicate, SyncGraphError> {
    let op = match name {
        "$eq" => FieldOp::Eq(operand.clone()),
        "$ne" => FieldOp::Ne(operand.clone()),
        "$gt" => FieldOp::Gt(operand.clone()),
        "$gte" => FieldOp::Gte(operand.clone()),
        "$lt" => FieldOp::Lt(operand.clone()),
        "$lte" => FieldOp::Lte(operand.clone()),
        "$in" => {
            let Value::Array(items) = operand else {
                return Err(SyncGraphError::invalid_query("$in expects an array"));
            };
            FieldOp::In(items.clone())
        }
        "$between" => {
            let Value::Array(bounds) = operand else {
                return Err(SyncGraphError::invalid_query("$between expects [min, max]"));
            };
            let [min, max] = bounds.as_slice() else {
                return Err(SyncGraphError::invalid_query("$between expects [min, max]"));
            };
            FieldOp::Between(min.clone(), max.clone())
        }
        "$exists" => {
            let Value::Bool(expected) = operand else {
                return Err(SyncGraphError::invalid_query("$exists expects a boolean"));
            };
            FieldOp::Exists(*expected)
        }
        "$text" => compile_text(operand)?,
        "$like" => {
            let Value::String(pattern) = operand else {
                return Err(SyncGraphError::invalid_query("$like expects a string"));
            };
            FieldOp::Like(like_to_regex(pattern)?)
        }
        "$regex" => {
            let Value::String(pattern) = operand else {
                return Err(SyncGraphError::invalid_query("$regex expects a string"));
            };
            let compiled = Regex::new(&format!("(?i){pattern}"))
                .map_err(|e| SyncGraphError::invalid_query(e.to_string()))?;
            FieldOp::Matches(compiled)
        }
        "$and" | "$or" | "$not" | "$edge" => {
            return Err(SyncGraphError::invalid_query(format!(
                "{name} is not valid under field {path}"
            )));
        }
        other => {
            warn!(operator = other, field = path, "unsupported operator in query");
            FieldOp::Unsupported(other.to_string())
        }
    };
    Ok(Predicate::Field {
        path: path.to_string(),
        op,
    })
}

fn compile_text(operand: &Value) -> Result<FieldOp, SyncGraphError> {
    let Value::String(needle) = operand else {
        return Err(SyncGraphError::invalid_query("$text expects a string"));
    };
    Ok(FieldOp::Text(fold_text(needle)))
}

/// Boolean evaluation of a predicate against one node. `Edge` conditions are
/// set-valued and rejected here; the engine evaluates them over candidate
/// sets. Strict mode raises `FieldNotFound` for a missing path.
pub fn matches_node(
    predicate: &Predicate,
    record: &NodeRecord,
    strict: bool,
) -> Result<bool, SyncGraphError> {
    match predicate {
        Predicate::Field { path, op } => eval_field(path, op, record, strict),
        Predicate::And(parts) => {
            for part in parts {
                if !matches_node(part, record, strict)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(parts) => {
            for part in parts {
                if matches_node(part, record, strict)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Not(inner) => Ok(!matches_node(inner, record, strict)?),
        Predicate::Edge(_) => Err(SyncGraphError::invalid_query(
            "$edge cannot be evaluated against a single node",
        )),
    }
}

pub(crate) fn eval_field(
    path: &str,
    op: &FieldOp,
    record: &NodeRecord,
    strict: bool,
) -> Result<bool, SyncGraphError> {
    if path.is_empty() {
        return Ok(match op {
            FieldOp::Text(needle) => value_contains_text(&record.value, needle),
            _ => false,
        });
    }
    let field = resolve_path(&record.value, path);
    if field.is_none() && strict && !matches!(op, FieldOp::Exists(_)) {
        return Err(SyncGraphError::field_not_found(format!(
            "{path} on node {}",
            record.id
        )));
    }
    Ok(op_matches(op, field))
}

fn op_matches(op: &FieldOp, field: Option<&Value>) -> bool {
    match op {
        FieldOp::Eq(expected) => field.is_some_and(|actual| actual == expected),
        FieldOp::Ne(expected) => field.is_none_or(|actual| actual != expected),
        FieldOp::Gt(bound) => compare(field, bound) == Some(Ordering::Greater),
        FieldOp::Gte(bound) => matches!(
            compare(field, bound),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        FieldOp::Lt(bound) => compare(field, bound) == Some(Ordering::Less),
        FieldOp::Lte(bound) => matches!(
            compare(field, bound),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        FieldOp::In(set) => field.is_some_and(|actual| set.contains(actual)),
        FieldOp::Between(min, max) => {
            matches!(
                compare(field, min),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ) && matches!(
                compare(field, max),
                Some(Ordering::Less) | Some(Ordering::Equal)
            )
        }
        FieldOp::Exists(expected) => field.is_some() == *expected,
        FieldOp::Text(needle) => field.is_some_and(|actual| field_contains_text(actual, needle)),
        FieldOp::Like(re) | FieldOp::Matches(re) => field
            .and_then(Value::as_str)
            .is_some_and(|actual| re.is_match(actual)),
        FieldOp::Unsupported(_) => false,
    }
}

/// Numbers compare numerically, strings lexicographically; any other pairing
/// is unordered.
fn compare(field: Option<&Value>, bound: &Value) -> Option<Ordering> {
    let actual = field?;
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Substring scan over one field: a string, or any element of an array of
/// strings.
fn field_contains_text(field: &Value, needle: &str) -> bool {
    match field {
        Value::String(text) => fold_text(text).contains(needle),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|text| fold_text(text).contains(needle)),
        _ => false,
    }
}

/// Whole-node scan: every string reachable through objects and arrays.
fn value_contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(text) => fold_text(text).contains(needle),
        Value::Array(items) => items.iter().any(|item| value_contains_text(item, needle)),
        Value::Object(entries) => entries
            .values()
            .any(|entry| value_contains_text(entry, needle)),
        _ => false,
    }
}

/// NFD-decompose, strip combining marks, lowercase.
pub(crate) fn fold_text(text: &str) -> String {
    text.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect::<String>()
        .to_lowercase()
}

/// Dotted path resolution through nested objects; numeric segments index
/// into arrays.
pub(crate) fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(entries) => entries.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// SQL wildcard pattern to an anchored, case-insensitive regex: `%` is any
/// run, `_` one character, everything else literal.
fn like_to_regex(pattern: &str) -> Result<Regex, SyncGraphError> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push_str("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated).map_err(|e| SyncGraphError::invalid_query(e.to_string()))
}
