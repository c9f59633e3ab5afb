//! The per-model field registry.
//!
//! A registry is the ordered mapping from field name to base constraint that
//! every schema of a model is compiled from. It is fixed once a model is
//! constructed.
//!
//! In JSON a field is its constraint descriptor, plus `"optional": true` for
//! fields that may be absent or `null`:
//!
//! ```text
//! {"key": {"type": "number"}, "nickname": {"type": "string", "optional": true}}
//! ```

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Constraint, ModelError};

/// Name of the field that identifies a record.
pub const KEY_FIELD: &str = "key";

/// One registered field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    name: String,
    constraint: Constraint,
    optional: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
            optional: false,
        }
    }

    /// Mark the field as optional: it accepts `null` and may be left out of
    /// create values.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_key(&self) -> bool {
        self.name == KEY_FIELD
    }
}

/// Ordered set of field definitions, unique by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRegistry {
    fields: Vec<FieldDefinition>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any existing field of the same name in place.
    pub fn with_field(mut self, name: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        self.insert(name, constraint);
        self
    }

    /// Add a field that accepts `null` and is not required on create.
    pub fn with_optional_field(
        mut self,
        name: impl Into<String>,
        constraint: impl Into<Constraint>,
    ) -> Self {
        self.define(FieldDefinition::new(name, constraint).optional());
        self
    }

    /// Add the key field.
    pub fn with_key(self, constraint: impl Into<Constraint>) -> Self {
        self.with_field(KEY_FIELD, constraint)
    }

    pub fn insert(&mut self, name: impl Into<String>, constraint: impl Into<Constraint>) {
        self.define(FieldDefinition::new(name, constraint));
    }

    /// Add `field`, replacing any existing field of the same name in place.
    pub fn define(&mut self, field: FieldDefinition) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn key(&self) -> Option<&FieldDefinition> {
        self.get(KEY_FIELD)
    }

    /// The key definition, or a configuration error when the registry has no
    /// usable key.
    pub fn require_key(&self) -> Result<&FieldDefinition, ModelError> {
        let key = self.key().ok_or_else(|| {
            ModelError::Configuration(format!("field registry has no '{}' field", KEY_FIELD))
        })?;

        if !key.constraint.is_key_compatible() {
            return Err(ModelError::Configuration(format!(
                "'{}' field must be a number or a string, found {}",
                KEY_FIELD,
                key.constraint.type_name()
            )));
        }
        if key.optional {
            return Err(ModelError::Configuration(format!(
                "'{}' field cannot be optional",
                KEY_FIELD
            )));
        }

        Ok(key)
    }

    /// Registered field names in declaration order.
    pub fn field_names(&self, exclude_key: bool) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !(exclude_key && f.is_key()))
            .map(|f| f.name.as_str())
            .collect()
    }

    /// A copy of this registry without the key field.
    pub fn without_key(&self) -> FieldRegistry {
        self.fields.iter().filter(|f| !f.is_key()).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<FieldDefinition> for FieldRegistry {
    fn from_iter<I: IntoIterator<Item = FieldDefinition>>(iter: I) -> Self {
        let mut registry = FieldRegistry::new();
        for field in iter {
            registry.define(field);
        }
        registry
    }
}

impl<S: Into<String>> FromIterator<(S, Constraint)> for FieldRegistry {
    fn from_iter<I: IntoIterator<Item = (S, Constraint)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(name, constraint)| FieldDefinition::new(name, constraint))
            .collect()
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// JSON form of one field: the constraint descriptor with an optional flag.
#[derive(Serialize)]
struct FieldSpecRef<'a> {
    #[serde(flatten)]
    constraint: &'a Constraint,
    #[serde(skip_serializing_if = "is_false")]
    optional: bool,
}

#[derive(Deserialize)]
struct FieldSpec {
    #[serde(flatten)]
    constraint: Constraint,
    #[serde(default)]
    optional: bool,
}

impl Serialize for FieldRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            let spec = FieldSpecRef {
                constraint: &field.constraint,
                optional: field.optional,
            };
            map.serialize_entry(&field.name, &spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RegistryVisitor;

        impl<'de> Visitor<'de> for RegistryVisitor {
            type Value = FieldRegistry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field name to constraint")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut registry = FieldRegistry::new();
                while let Some((name, spec)) = access.next_entry::<String, FieldSpec>()? {
                    let field = FieldDefinition {
                        name,
                        constraint: spec.constraint,
                        optional: spec.optional,
                    };
                    registry.define(field);
                }
                Ok(registry)
            }
        }

        deserializer.deserialize_map(RegistryVisitor)
    }
}
