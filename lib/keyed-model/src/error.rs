use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ModelError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ModelError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound(_))
    }

    /// The accumulated violations, when this is a validation failure.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            ModelError::Validation(errors) => Some(errors.violations()),
            _ => None,
        }
    }
}

/// The constraint a single violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// A required value or the whole expression is missing
    Required,
    /// Key not declared in the schema
    Unknown,
    /// Value has the wrong type (no coercion is attempted)
    Type,
    /// Number or date below its lower bound
    Min,
    /// Number or date above its upper bound
    Max,
    /// Number is not an integer
    Integer,
    MinLength,
    MaxLength,
    /// String does not match the declared pattern
    Pattern,
    /// String is not one of the allowed values
    NotAllowed,
    /// A field and its negated form appear in the same filter item
    Exclusive,
    /// A value list under a filter key is empty
    EmptyList,
}

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Location of the offending value, e.g. `[1].!status[0]`; empty for the root
    pub path: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every violation found in one payload.
///
/// Validators append to a shared instance instead of returning on the first
/// failure, so callers see the complete set at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn add(
        &mut self,
        path: impl Into<String>,
        kind: ViolationKind,
        message: impl Into<String>,
    ) {
        self.violations.push(Violation {
            path: path.into(),
            kind,
            message: message.into(),
        });
    }

    /// Check whether a violation of `kind` was recorded at `path`.
    pub fn contains(&self, path: &str, kind: ViolationKind) -> bool {
        self.violations
            .iter()
            .any(|v| v.path == path && v.kind == kind)
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}
