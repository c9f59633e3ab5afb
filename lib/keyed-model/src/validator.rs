//! Compiled, immutable validators built from constraint descriptors.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use crate::constraint::{Constraint, DateConstraint, NumberConstraint, StringConstraint};
use crate::{ModelError, ValidationError, ViolationKind};

#[derive(Debug, Clone)]
pub(crate) enum Validator {
    Boolean,
    Number(NumberConstraint),
    String {
        rules: StringConstraint,
        pattern: Option<Regex>,
    },
    Object {
        properties: Vec<(String, Validator)>,
        allow_unknown: bool,
    },
    Date(DateConstraint),
}

impl Validator {
    /// Compile `constraint` for the field called `field`.
    pub(crate) fn compile(field: &str, constraint: &Constraint) -> Result<Self, ModelError> {
        match constraint {
            Constraint::Boolean => Ok(Validator::Boolean),
            Constraint::Number(rules) => {
                check_bounds(field, rules.min, rules.max)?;
                Ok(Validator::Number(rules.clone()))
            }
            Constraint::String(rules) => {
                check_bounds(field, rules.min_length, rules.max_length)?;
                let pattern = match &rules.pattern {
                    // Anchored so the whole value has to match
                    Some(p) => Some(Regex::new(&format!("^(?:{})$", p)).map_err(|e| {
                        ModelError::Configuration(format!(
                            "field '{}' has an invalid pattern: {}",
                            field, e
                        ))
                    })?),
                    None => None,
                };
                Ok(Validator::String {
                    rules: rules.clone(),
                    pattern,
                })
            }
            Constraint::Object(rules) => {
                let properties = rules
                    .properties
                    .iter()
                    .map(|(name, c)| {
                        Validator::compile(&join_path(field, name), c).map(|v| (name.clone(), v))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Validator::Object {
                    properties,
                    allow_unknown: rules.allow_unknown,
                })
            }
            Constraint::Date(rules) => {
                check_bounds(field, rules.min, rules.max)?;
                Ok(Validator::Date(rules.clone()))
            }
        }
    }

    /// Check `value`, appending every violation under `path` to `errors`.
    pub(crate) fn validate(&self, path: &str, value: &Value, errors: &mut ValidationError) {
        match self {
            Validator::Boolean => {
                if !value.is_boolean() {
                    errors.add(path, ViolationKind::Type, "must be a boolean");
                }
            }
            Validator::Number(rules) => validate_number(rules, path, value, errors),
            Validator::String { rules, pattern } => {
                validate_string(rules, pattern.as_ref(), path, value, errors)
            }
            Validator::Object {
                properties,
                allow_unknown,
            } => {
                let Some(map) = value.as_object() else {
                    errors.add(path, ViolationKind::Type, "must be an object");
                    return;
                };
                for (name, inner) in map {
                    let child = join_path(path, name);
                    match properties.iter().find(|(p, _)| p == name) {
                        Some((_, validator)) => validator.validate(&child, inner, errors),
                        None if *allow_unknown => {}
                        None => errors.add(child, ViolationKind::Unknown, "is not allowed"),
                    }
                }
            }
            Validator::Date(rules) => validate_date(rules, path, value, errors),
        }
    }
}

fn check_bounds<T: PartialOrd + std::fmt::Debug>(
    field: &str,
    min: Option<T>,
    max: Option<T>,
) -> Result<(), ModelError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(ModelError::Configuration(format!(
            "field '{}' has min {:?} greater than max {:?}",
            field, min, max
        ))),
        _ => Ok(()),
    }
}

fn validate_number(rules: &NumberConstraint, path: &str, value: &Value, errors: &mut ValidationError) {
    let Value::Number(n) = value else {
        errors.add(path, ViolationKind::Type, "must be a number");
        return;
    };
    let Some(f) = n.as_f64() else {
        errors.add(path, ViolationKind::Type, "must be a finite number");
        return;
    };

    if rules.integer && !(n.is_i64() || n.is_u64() || f.fract() == 0.0) {
        errors.add(path, ViolationKind::Integer, "must be an integer");
    }
    if let Some(min) = rules.min.filter(|min| f < *min) {
        errors.add(path, ViolationKind::Min, format!("must be greater than or equal to {}", min));
    }
    if let Some(max) = rules.max.filter(|max| f > *max) {
        errors.add(path, ViolationKind::Max, format!("must be less than or equal to {}", max));
    }
}

fn validate_string(
    rules: &StringConstraint,
    pattern: Option<&Regex>,
    path: &str,
    value: &Value,
    errors: &mut ValidationError,
) {
    let Some(s) = value.as_str() else {
        errors.add(path, ViolationKind::Type, "must be a string");
        return;
    };
    let len = s.chars().count();

    if let Some(min) = rules.min_length.filter(|min| len < *min) {
        errors.add(path, ViolationKind::MinLength, format!("length must be at least {}", min));
    }
    if let Some(max) = rules.max_length.filter(|max| len > *max) {
        errors.add(path, ViolationKind::MaxLength, format!("length must be at most {}", max));
    }
    if let Some(regex) = pattern.filter(|regex| !regex.is_match(s)) {
        errors.add(path, ViolationKind::Pattern, format!("must match {}", regex.as_str()));
    }
    if !rules.allowed.is_empty() && !rules.allowed.iter().any(|a| a == s) {
        errors.add(
            path,
            ViolationKind::NotAllowed,
            format!("must be one of [{}]", rules.allowed.join(", ")),
        );
    }
}

fn validate_date(rules: &DateConstraint, path: &str, value: &Value, errors: &mut ValidationError) {
    let Some(date) = value.as_str().and_then(parse_date) else {
        errors.add(path, ViolationKind::Type, "must be an RFC 3339 date");
        return;
    };

    if let Some(min) = rules.min.filter(|min| date < *min) {
        errors.add(path, ViolationKind::Min, format!("must be on or after {}", min.to_rfc3339()));
    }
    if let Some(max) = rules.max.filter(|max| date > *max) {
        errors.add(path, ViolationKind::Max, format!("must be on or before {}", max.to_rfc3339()));
    }
}

pub(crate) fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// `parent.key`, or just `key` at the root.
pub(crate) fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// `parent[index]`.
pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}
