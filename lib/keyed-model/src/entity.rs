//! Create and update schemas over the non-key fields of a registry.

use serde_json::Value;

use crate::validator::Validator;
use crate::{FieldRegistry, ModelError, ValidationError, ViolationKind};

/// Whether a values schema requires every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone)]
struct ValueField {
    name: String,
    validator: Validator,
    optional: bool,
}

/// Compiled validator for a values object.
///
/// Unknown fields are always rejected and values are never coerced. Optional
/// fields accept `null` and are never required.
#[derive(Debug, Clone)]
pub struct ValuesSchema {
    presence: Presence,
    fields: Vec<ValueField>,
}

impl ValuesSchema {
    fn compile(registry: &FieldRegistry, presence: Presence) -> Result<Self, ModelError> {
        let fields = registry
            .iter()
            .map(|f| {
                Ok(ValueField {
                    name: f.name().to_string(),
                    validator: Validator::compile(f.name(), f.constraint())?,
                    optional: f.is_optional(),
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        Ok(Self { presence, fields })
    }

    pub fn presence(&self) -> Presence {
        self.presence
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn validate(&self, values: &Value) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        let Some(map) = values.as_object() else {
            errors.add("", ViolationKind::Type, "must be an object");
            return errors.into_result();
        };

        for field in &self.fields {
            match map.get(&field.name) {
                Some(Value::Null) if field.optional => {}
                Some(value) => field.validator.validate(&field.name, value, &mut errors),
                None if self.presence == Presence::Required && !field.optional => {
                    errors.add(field.name.as_str(), ViolationKind::Required, "is required")
                }
                None => {}
            }
        }

        for name in map.keys() {
            if !self.fields.iter().any(|f| &f.name == name) {
                errors.add(name.as_str(), ViolationKind::Unknown, "is not allowed");
            }
        }

        errors.into_result()
    }
}

/// The create and update schemas of one model.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    create: ValuesSchema,
    update: ValuesSchema,
}

impl EntitySchema {
    /// Compile both schemas from `registry`, leaving out the key field.
    pub fn compile(registry: &FieldRegistry) -> Result<Self, ModelError> {
        let fields = registry.without_key();
        Ok(Self {
            create: ValuesSchema::compile(&fields, Presence::Required)?,
            update: ValuesSchema::compile(&fields, Presence::Optional)?,
        })
    }

    /// Every non-key field required.
    pub fn create(&self) -> &ValuesSchema {
        &self.create
    }

    /// Any subset of non-key fields.
    pub fn update(&self) -> &ValuesSchema {
        &self.update
    }
}
