//! Base constraint descriptors for registry fields.
//!
//! Descriptors are plain data: they can be built in code, derived with
//! `#[derive(Entity)]`, or loaded from JSON. They are compiled into
//! validators once, when a schema is built.
//!
//! ```text
//! {"type": "number", "min": 0, "integer": true}
//! {"type": "string", "maxLength": 32, "allowed": ["open", "closed"]}
//! {"type": "date", "min": "2020-01-01T00:00:00Z"}
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Constraint on the values a field accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Constraint {
    Boolean,
    Number(NumberConstraint),
    String(StringConstraint),
    Object(ObjectConstraint),
    Date(DateConstraint),
}

impl Constraint {
    pub fn boolean() -> Self {
        Constraint::Boolean
    }

    pub fn number() -> Self {
        Constraint::Number(NumberConstraint::default())
    }

    /// A number that must have no fractional part.
    pub fn integer() -> Self {
        Constraint::Number(NumberConstraint::default().integer())
    }

    pub fn string() -> Self {
        Constraint::String(StringConstraint::default())
    }

    /// An object accepting any keys.
    pub fn object() -> Self {
        Constraint::Object(ObjectConstraint::default().allow_unknown())
    }

    pub fn date() -> Self {
        Constraint::Date(DateConstraint::default())
    }

    /// Whether a key field may carry this constraint.
    pub fn is_key_compatible(&self) -> bool {
        matches!(self, Constraint::Number(_) | Constraint::String(_))
    }

    /// Short type name used in messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Constraint::Boolean => "boolean",
            Constraint::Number(_) => "number",
            Constraint::String(_) => "string",
            Constraint::Object(_) => "object",
            Constraint::Date(_) => "date",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NumberConstraint {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer: bool,
}

impl NumberConstraint {
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn integer(mut self) -> Self {
        self.integer = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StringConstraint {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Regular expression the whole value must match.
    pub pattern: Option<String>,
    /// When non-empty, the only accepted values.
    pub allowed: Vec<String>,
}

impl StringConstraint {
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn allow<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.extend(values.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectConstraint {
    /// Known properties; each is optional but validated when present.
    pub properties: BTreeMap<String, Constraint>,
    pub allow_unknown: bool,
}

impl ObjectConstraint {
    pub fn property(mut self, name: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        self.properties.insert(name.into(), constraint.into());
        self
    }

    pub fn allow_unknown(mut self) -> Self {
        self.allow_unknown = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConstraint {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

impl DateConstraint {
    pub fn min(mut self, min: DateTime<Utc>) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: DateTime<Utc>) -> Self {
        self.max = Some(max);
        self
    }
}

impl From<NumberConstraint> for Constraint {
    fn from(c: NumberConstraint) -> Self {
        Constraint::Number(c)
    }
}

impl From<StringConstraint> for Constraint {
    fn from(c: StringConstraint) -> Self {
        Constraint::String(c)
    }
}

impl From<ObjectConstraint> for Constraint {
    fn from(c: ObjectConstraint) -> Self {
        Constraint::Object(c)
    }
}

impl From<DateConstraint> for Constraint {
    fn from(c: DateConstraint) -> Self {
        Constraint::Date(c)
    }
}
