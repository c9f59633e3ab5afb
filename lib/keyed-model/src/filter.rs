//! Filter expressions and the schema that validates them.
//!
//! A filter expression is either one item or a list of items. Items are
//! OR-combined and the fields inside one item are AND-combined:
//!
//! ```text
//! [{"status": "open"}, {"!status": ["closed", "archived"]}]
//! ```
//!
//! reads "status is open, OR status is neither closed nor archived".
//!
//! For every registry field `f` the schema generates the key pair `(f, !f)`.
//! Both keys accept a single value or a list of values checked against the
//! field's constraint, and the two keys of a pair exclude each other within
//! one item.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validator::{Validator, index_path, join_path, parse_date};
use crate::{FieldRegistry, KEY_FIELD, KeyValue, ModelError, ValidationError, ViolationKind};

/// Prefix that turns a field name into its negated filter key.
pub const NEGATION_PREFIX: &str = "!";

/// The negated filter key of `field`.
pub fn negated_key(field: &str) -> String {
    format!("{}{}", NEGATION_PREFIX, field)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negated,
}

/// The generated key pair of one field.
#[derive(Debug, Clone)]
struct KeyPair {
    field: String,
    positive: String,
    negated: String,
    validator: Validator,
    optional: bool,
}

/// Compiled validator for filter expressions over one registry.
#[derive(Debug, Clone)]
pub struct FilterSchema {
    pairs: Vec<KeyPair>,
    index: HashMap<String, (usize, Polarity)>,
}

impl FilterSchema {
    /// Compile the schema for every field of `registry`.
    ///
    /// Fails when a generated key collides with another field's key, e.g. for
    /// fields named `x` and `!x`, or when a constraint does not compile.
    pub fn compile(registry: &FieldRegistry) -> Result<Self, ModelError> {
        let mut pairs: Vec<KeyPair> = Vec::with_capacity(registry.len());
        let mut index = HashMap::with_capacity(registry.len() * 2);

        for field in registry.iter() {
            let pair = KeyPair {
                field: field.name().to_string(),
                positive: field.name().to_string(),
                negated: negated_key(field.name()),
                validator: Validator::compile(field.name(), field.constraint())?,
                optional: field.is_optional(),
            };

            for (key, polarity) in [
                (&pair.positive, Polarity::Positive),
                (&pair.negated, Polarity::Negated),
            ] {
                if let Some((other, _)) = index.insert(key.clone(), (pairs.len(), polarity)) {
                    return Err(ModelError::Configuration(format!(
                        "filter key '{}' of field '{}' collides with field '{}'",
                        key, pair.field, pairs[other].field
                    )));
                }
            }

            pairs.push(pair);
        }

        Ok(Self { pairs, index })
    }

    /// The generated `(positive, negated)` key pairs in registry order.
    pub fn keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|p| (p.positive.as_str(), p.negated.as_str()))
    }

    pub fn validate(&self, expression: &Value) -> Result<(), ValidationError> {
        self.parse(expression).map(|_| ())
    }

    /// Validate `expression` and normalize it, reporting every violation.
    pub fn parse(&self, expression: &Value) -> Result<FilterExpression, ValidationError> {
        self.read(expression, true)
    }

    /// Normalize `expression` without checking it against the field
    /// constraints.
    ///
    /// Only structural problems are reported. Unknown keys are taken at face
    /// value, with a leading `!` read as negation.
    pub fn parse_unchecked(&self, expression: &Value) -> Result<FilterExpression, ValidationError> {
        self.read(expression, false)
    }

    fn read(&self, expression: &Value, checked: bool) -> Result<FilterExpression, ValidationError> {
        let mut errors = ValidationError::new();

        let items = match expression {
            Value::Null => {
                errors.add("", ViolationKind::Required, "filter expression is required");
                Vec::new()
            }
            Value::Object(item) => vec![self.read_item("", item, checked, &mut errors)],
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match item {
                    Value::Object(item) => {
                        Some(self.read_item(&index_path("", i), item, checked, &mut errors))
                    }
                    _ => {
                        errors.add(index_path("", i), ViolationKind::Type, "must be an object");
                        None
                    }
                })
                .collect(),
            _ => {
                errors.add(
                    "",
                    ViolationKind::Type,
                    "must be an object or an array of objects",
                );
                Vec::new()
            }
        };

        errors.into_result()?;
        Ok(FilterExpression { items })
    }

    fn read_item(
        &self,
        path: &str,
        item: &Map<String, Value>,
        checked: bool,
        errors: &mut ValidationError,
    ) -> FilterItem {
        let mut conditions = Vec::with_capacity(item.len());
        let mut seen: HashMap<usize, Polarity> = HashMap::new();

        for (key, raw) in item {
            let key_path = join_path(path, key);

            let condition = match self.index.get(key) {
                Some(&(pair_idx, polarity)) => {
                    let pair = &self.pairs[pair_idx];
                    if checked {
                        match seen.insert(pair_idx, polarity) {
                            Some(previous) if previous != polarity => errors.add(
                                join_path(path, &pair.positive),
                                ViolationKind::Exclusive,
                                format!(
                                    "'{}' and '{}' cannot both be present",
                                    pair.positive, pair.negated
                                ),
                            ),
                            _ => {}
                        }
                        check_values(pair, &key_path, raw, errors);
                    }
                    Condition::new(&pair.field, polarity == Polarity::Negated, raw)
                }
                None if checked => {
                    errors.add(key_path, ViolationKind::Unknown, "is not allowed");
                    continue;
                }
                None => match key.strip_prefix(NEGATION_PREFIX) {
                    Some(field) => Condition::new(field, true, raw),
                    None => Condition::new(key, false, raw),
                },
            };

            conditions.push(condition);
        }

        FilterItem { conditions }
    }
}

/// Check a single value, or each value of a list, against the field of
/// `pair`. `null` stands for an absent value of an optional field.
fn check_values(pair: &KeyPair, path: &str, raw: &Value, errors: &mut ValidationError) {
    let check = |path: &str, value: &Value, errors: &mut ValidationError| {
        if !(pair.optional && value.is_null()) {
            pair.validator.validate(path, value, errors);
        }
    };

    match raw {
        Value::Array(values) if values.is_empty() => {
            errors.add(path, ViolationKind::EmptyList, "must contain at least one value")
        }
        Value::Array(values) => {
            for (i, value) in values.iter().enumerate() {
                check(&index_path(path, i), value, errors);
            }
        }
        value => check(path, value, errors),
    }
}

/// A normalized filter expression: OR over its items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpression {
    items: Vec<FilterItem>,
}

impl FilterExpression {
    /// One empty item, matching every record.
    pub fn all() -> Self {
        Self {
            items: vec![FilterItem::default()],
        }
    }

    /// The filter `{key: <key>}`.
    pub fn by_key(key: &KeyValue) -> Self {
        Self {
            items: vec![FilterItem {
                conditions: vec![Condition {
                    field: KEY_FIELD.to_string(),
                    negated: false,
                    values: vec![key.to_json()],
                }],
            }],
        }
    }

    pub fn items(&self) -> &[FilterItem] {
        &self.items
    }

    /// Whether `record` satisfies at least one item. An expression without
    /// items matches nothing.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        self.items.iter().any(|item| item.matches(record))
    }
}

/// AND over conditions; empty matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterItem {
    conditions: Vec<Condition>,
}

impl FilterItem {
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

/// `field IN values`, or `field NOT IN values` when negated.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    negated: bool,
    values: Vec<Value>,
}

impl Condition {
    fn new(field: &str, negated: bool, raw: &Value) -> Self {
        let values = match raw {
            Value::Array(values) => values.clone(),
            value => vec![value.clone()],
        };
        Self {
            field: field.to_string(),
            negated,
            values,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        let found = self
            .values
            .iter()
            .any(|v| compare_values(v, actual) == Some(Ordering::Equal));
        found != self.negated
    }
}

/// Compare two record values: numbers numerically, RFC 3339 strings as
/// instants, everything else structurally. `None` when not comparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_date(x), parse_date(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

/// A caller-side filter expression: one item, or a list of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Where<T> {
    Any(Vec<T>),
    One(T),
}

impl<T> Where<T> {
    pub fn one(item: T) -> Self {
        Where::One(item)
    }

    pub fn any(items: impl IntoIterator<Item = T>) -> Self {
        Where::Any(items.into_iter().collect())
    }
}

/// A single filter value, or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        OneOrMany::One(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Constraint, StringConstraint};
    use serde_json::json;

    fn schema() -> FilterSchema {
        let registry = FieldRegistry::new()
            .with_key(Constraint::integer())
            .with_field(
                "status",
                StringConstraint::default().allow(["open", "closed", "archived"]),
            )
            .with_field("priority", Constraint::integer());
        FilterSchema::compile(&registry).unwrap()
    }

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_generated_key_pairs() {
        let schema = schema();
        let keys: Vec<_> = schema.keys().collect();
        assert_eq!(
            keys,
            vec![("key", "!key"), ("status", "!status"), ("priority", "!priority")]
        );
    }

    #[test]
    fn test_or_of_items_validates() {
        let expression = json!([{"status": "open"}, {"!status": ["closed", "archived"]}]);
        let parsed = schema().parse(&expression).unwrap();

        assert_eq!(parsed.items().len(), 2);
        let negated = &parsed.items()[1].conditions()[0];
        assert_eq!(negated.field(), "status");
        assert!(negated.is_negated());
        assert_eq!(negated.values(), &[json!("closed"), json!("archived")]);

        assert!(parsed.matches(&record(json!({"status": "open"}))));
        assert!(!parsed.matches(&record(json!({"status": "closed"}))));
        assert!(!parsed.matches(&record(json!({"status": "archived"}))));
    }

    #[test]
    fn test_empty_item_and_empty_list() {
        let schema = schema();
        let any = record(json!({"key": 1, "status": "open"}));

        assert!(schema.parse(&json!({})).unwrap().matches(&any));
        assert!(FilterExpression::all().matches(&any));
        assert!(!schema.parse(&json!([])).unwrap().matches(&any));
    }

    #[test]
    fn test_missing_expression_is_required() {
        let err = schema().validate(&Value::Null).unwrap_err();
        assert!(err.contains("", ViolationKind::Required));

        let err = schema().validate(&json!("open")).unwrap_err();
        assert!(err.contains("", ViolationKind::Type));
    }

    #[test]
    fn test_positive_and_negated_keys_are_exclusive() {
        let err = schema()
            .validate(&json!({"status": "open", "!status": "closed"}))
            .unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.contains("status", ViolationKind::Exclusive));

        let err = schema()
            .validate(&json!([{}, {"!priority": 1, "priority": [2]}]))
            .unwrap_err();
        assert!(err.contains("[1].priority", ViolationKind::Exclusive));
    }

    #[test]
    fn test_all_violations_are_reported() {
        let expression = json!([
            {"status": "open", "!status": "closed", "priority": "1"},
            {"color": "red", "!priority": [1, 2.5]},
            7
        ]);
        let err = schema().validate(&expression).unwrap_err();

        assert_eq!(err.len(), 5);
        assert!(err.contains("[0].status", ViolationKind::Exclusive));
        assert!(err.contains("[0].priority", ViolationKind::Type));
        assert!(err.contains("[1].color", ViolationKind::Unknown));
        assert!(err.contains("[1].!priority[1]", ViolationKind::Integer));
        assert!(err.contains("[2]", ViolationKind::Type));
    }

    #[test]
    fn test_numeric_looking_string_is_not_coerced() {
        let err = schema().validate(&json!({"priority": "3"})).unwrap_err();
        assert!(err.contains("priority", ViolationKind::Type));
    }

    #[test]
    fn test_empty_value_list_is_rejected() {
        let err = schema()
            .validate(&json!({"status": [], "!priority": []}))
            .unwrap_err();
        assert!(err.contains("status", ViolationKind::EmptyList));
        assert!(err.contains("!priority", ViolationKind::EmptyList));
    }

    #[test]
    fn test_value_and_list_semantics() {
        let schema = schema();
        let rows = [
            record(json!({"key": 1, "priority": 1})),
            record(json!({"key": 2, "priority": 2})),
            record(json!({"key": 3, "priority": 3})),
        ];
        let keys = |expression: Value| -> Vec<i64> {
            let filter = schema.parse(&expression).unwrap();
            rows.iter()
                .filter(|r| filter.matches(r))
                .filter_map(|r| r["key"].as_i64())
                .collect()
        };

        assert_eq!(keys(json!({"priority": 2})), vec![2]);
        assert_eq!(keys(json!({"priority": [1, 3]})), vec![1, 3]);
        assert_eq!(keys(json!({"!priority": [1, 3]})), vec![2]);
        assert_eq!(keys(json!({"key": [1, 2], "!priority": 1})), vec![2]);
    }

    #[test]
    fn test_by_key_matches_numerically() {
        let filter = FilterExpression::by_key(&KeyValue::from(5_i64));
        assert!(filter.matches(&record(json!({"key": 5.0}))));
        assert!(!filter.matches(&record(json!({"key": "5"}))));
    }

    #[test]
    fn test_colliding_field_names_fail_to_compile() {
        let registry = FieldRegistry::new()
            .with_field("x", Constraint::integer())
            .with_field("!x", Constraint::integer());
        let result = FilterSchema::compile(&registry);
        assert!(matches!(result, Err(ModelError::Configuration(_))));
    }

    #[test]
    fn test_field_named_with_prefix_is_matched_structurally() {
        let registry = FieldRegistry::new().with_field("!flag", Constraint::boolean());
        let schema = FilterSchema::compile(&registry).unwrap();

        let parsed = schema.parse(&json!({"!!flag": true})).unwrap();
        let condition = &parsed.items()[0].conditions()[0];
        assert_eq!(condition.field(), "!flag");
        assert!(condition.is_negated());

        let err = schema.validate(&json!({"flag": true})).unwrap_err();
        assert!(err.contains("flag", ViolationKind::Unknown));
    }

    #[test]
    fn test_unchecked_parse_skips_constraints() {
        let schema = schema();
        let parsed = schema
            .parse_unchecked(&json!({"priority": "high", "!color": "red"}))
            .unwrap();

        let conditions = parsed.items()[0].conditions();
        assert_eq!(conditions[1].field(), "color");
        assert!(conditions[1].is_negated());

        assert!(schema.parse_unchecked(&Value::Null).is_err());
    }

    #[test]
    fn test_optional_field_filters_on_null() {
        let registry = FieldRegistry::new()
            .with_key(Constraint::integer())
            .with_optional_field("nickname", Constraint::string());
        let schema = FilterSchema::compile(&registry).unwrap();

        let unset = schema.parse(&json!({"nickname": null})).unwrap();
        assert!(unset.matches(&record(json!({"key": 1}))));
        assert!(unset.matches(&record(json!({"key": 1, "nickname": null}))));
        assert!(!unset.matches(&record(json!({"key": 1, "nickname": "ace"}))));

        let set = schema.parse(&json!({"!nickname": [null, "ace"]})).unwrap();
        assert!(set.matches(&record(json!({"key": 2, "nickname": "bee"}))));

        let err = schema.validate(&json!({"key": null})).unwrap_err();
        assert!(err.contains("key", ViolationKind::Type));
    }

    #[test]
    fn test_where_serializes_untagged() {
        assert_eq!(
            serde_json::to_value(Where::one(json!({"status": "open"}))).unwrap(),
            json!({"status": "open"})
        );
        assert_eq!(
            serde_json::to_value(Where::any([OneOrMany::from(1), OneOrMany::Many(vec![2, 3])]))
                .unwrap(),
            json!([1, [2, 3]])
        );
    }
}
