//! Mountebank-compatible predicate evaluation over JSON requests.
//!
//! Supports `equals`, `deepEquals`, `contains`, `startsWith`, `endsWith`,
//! `matches`, `exists` and the logical `not` / `or` / `and` operators, with
//! the `caseSensitive` and `except` parameters. Matching is case-insensitive
//! unless `caseSensitive` is set, as in Mountebank.
//!
//! Requests are plain JSON objects, so the same evaluator serves every
//! protocol adapter. String fields holding JSON (such as an HTTP body) are
//! parsed when a predicate expects an object.

use crate::imposter::ImposterRequest;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

impl Operator {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "equals" => Some(Self::Equals),
            "contains" => Some(Self::Contains),
            "startsWith" => Some(Self::StartsWith),
            "endsWith" => Some(Self::EndsWith),
            "matches" => Some(Self::Matches),
            _ => None,
        }
    }
}

/// Predicate parameters that apply to every operator in the same predicate
#[derive(Debug, Default)]
struct PredicateOptions {
    case_sensitive: bool,
    except: Option<Regex>,
    /// `matches` patterns compiled so far; `None` marks an invalid pattern
    patterns: RefCell<HashMap<String, Option<Regex>>>,
}

impl PredicateOptions {
    fn from_predicate(predicate: &Map<String, Value>) -> Self {
        let case_sensitive = predicate
            .get("caseSensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let except = predicate
            .get("except")
            .and_then(Value::as_str)
            .filter(|pattern| !pattern.is_empty())
            .and_then(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|e| warn!("Invalid except pattern '{}': {}", pattern, e))
                    .ok()
            });
        Self {
            case_sensitive,
            except,
            patterns: RefCell::new(HashMap::new()),
        }
    }

    /// Compiled `matches` pattern, built once per predicate evaluation
    fn pattern(&self, pattern: &str) -> Option<Regex> {
        if let Some(compiled) = self.patterns.borrow().get(pattern) {
            return compiled.clone();
        }
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|e| warn!("Invalid matches pattern '{}': {}", pattern, e))
            .ok();
        self.patterns
            .borrow_mut()
            .insert(pattern.to_string(), compiled.clone());
        compiled
    }
}

/// True when every predicate matches (an empty list matches everything)
pub fn predicates_match(predicates: &[Value], request: &ImposterRequest) -> bool {
    predicates
        .iter()
        .all(|predicate| predicate_matches(predicate, request))
}

/// Evaluate a single predicate object against a request
pub fn predicate_matches(predicate: &Value, request: &ImposterRequest) -> bool {
    let Some(predicate) = predicate.as_object() else {
        warn!("Ignoring non-object predicate: {}", predicate);
        return false;
    };
    let options = PredicateOptions::from_predicate(predicate);

    predicate.iter().all(|(key, expected)| match key.as_str() {
        "caseSensitive" | "except" | "keyCaseSensitive" => true,
        "deepEquals" => fields(expected).is_some_and(|fields| {
            fields
                .iter()
                .all(|(name, value)| deep_equals(value, lookup(request, name, &options), &options))
        }),
        "exists" => fields(expected).is_some_and(|fields| {
            fields
                .iter()
                .all(|(name, value)| exists(value, lookup(request, name, &options), &options))
        }),
        "not" => !predicate_matches(expected, request),
        "or" => expected
            .as_array()
            .is_some_and(|ps| ps.iter().any(|p| predicate_matches(p, request))),
        "and" => expected
            .as_array()
            .is_some_and(|ps| ps.iter().all(|p| predicate_matches(p, request))),
        other => match Operator::from_key(other) {
            Some(op) => fields(expected).is_some_and(|fields| {
                fields.iter().all(|(name, value)| {
                    value_matches(op, value, lookup(request, name, &options), &options)
                })
            }),
            None => {
                warn!("Unsupported predicate operator '{}'", other);
                false
            }
        },
    })
}

fn fields(expected: &Value) -> Option<&Map<String, Value>> {
    expected.as_object()
}

/// Field lookup; keys are case-insensitive unless `caseSensitive` is set
fn lookup<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    options: &PredicateOptions,
) -> Option<&'a Value> {
    object.get(key).or_else(|| {
        if options.case_sensitive {
            return None;
        }
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// View `actual` as an object, parsing JSON text when needed
fn as_object(actual: Option<&Value>) -> Option<Cow<'_, Map<String, Value>>> {
    match actual? {
        Value::Object(map) => Some(Cow::Borrowed(map)),
        Value::String(text) => serde_json::from_str::<Map<String, Value>>(text)
            .ok()
            .map(Cow::Owned),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_matches(
    op: Operator,
    expected: &Value,
    actual: Option<&Value>,
    options: &PredicateOptions,
) -> bool {
    match expected {
        Value::Object(expected_fields) => {
            let actual_fields = as_object(actual);
            expected_fields.iter().all(|(name, value)| {
                let field = actual_fields
                    .as_deref()
                    .and_then(|fields| lookup(fields, name, options));
                value_matches(op, value, field, options)
            })
        }
        Value::Array(expected_items) => match actual {
            Some(Value::Array(actual_items)) => expected_items.iter().all(|item| {
                actual_items
                    .iter()
                    .any(|candidate| value_matches(op, item, Some(candidate), options))
            }),
            _ => false,
        },
        scalar => match actual {
            // Repeated fields (e.g. query keys) match if any value does
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| value_matches(op, scalar, Some(item), options)),
            _ => {
                let actual_text = actual.map(as_text).unwrap_or_default();
                compare_text(op, &as_text(scalar), &actual_text, options)
            }
        },
    }
}

fn deep_equals(expected: &Value, actual: Option<&Value>, options: &PredicateOptions) -> bool {
    match expected {
        Value::Object(expected_fields) => {
            let Some(actual_fields) = as_object(actual) else {
                return expected_fields.is_empty() && is_empty(actual);
            };
            actual_fields.len() == expected_fields.len()
                && expected_fields.iter().all(|(name, value)| {
                    deep_equals(value, lookup(&actual_fields, name, options), options)
                })
        }
        Value::Array(expected_items) => match actual {
            Some(Value::Array(actual_items)) => {
                actual_items.len() == expected_items.len()
                    && expected_items
                        .iter()
                        .zip(actual_items)
                        .all(|(e, a)| deep_equals(e, Some(a), options))
            }
            _ => false,
        },
        scalar => {
            let actual_text = actual.map(as_text).unwrap_or_default();
            compare_text(Operator::Equals, &as_text(scalar), &actual_text, options)
        }
    }
}

fn exists(expected: &Value, actual: Option<&Value>, options: &PredicateOptions) -> bool {
    match expected {
        Value::Bool(should_exist) => *should_exist == !is_empty(actual),
        Value::Object(expected_fields) => {
            let actual_fields = as_object(actual);
            expected_fields.iter().all(|(name, value)| {
                let field = actual_fields
                    .as_deref()
                    .and_then(|fields| lookup(fields, name, options));
                exists(value, field, options)
            })
        }
        _ => false,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Object(m)) => m.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(_) => false,
    }
}

fn compare_text(op: Operator, expected: &str, actual: &str, options: &PredicateOptions) -> bool {
    let actual: Cow<'_, str> = match &options.except {
        Some(except) => except.replace_all(actual, ""),
        None => Cow::Borrowed(actual),
    };

    let fold = |text: &str| {
        if options.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    };

    match op {
        Operator::Equals => fold(&actual) == fold(expected),
        Operator::Contains => fold(&actual).contains(&fold(expected)),
        Operator::StartsWith => fold(&actual).starts_with(&fold(expected)),
        Operator::EndsWith => fold(&actual).ends_with(&fold(expected)),
        Operator::Matches => options
            .pattern(expected)
            .is_some_and(|regex| regex.is_match(&actual)),
    }
}
