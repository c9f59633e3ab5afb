//! Validated statements handed to a table client.
//!
//! Statements carry a normalized [`FilterExpression`]; translating them to
//! SQL (or anything else) is the client's business.

use std::fmt;

use serde_json::{Map, Value};

use crate::FilterExpression;

/// The untyped shape records take when exchanged with a table client.
pub type Record = Map<String, Value>;

/// A key value: the field that identifies a record is a number or a string.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
}

impl KeyValue {
    pub fn to_json(&self) -> Value {
        match self {
            KeyValue::Int(n) => Value::from(*n),
            KeyValue::UInt(n) => Value::from(*n),
            KeyValue::Float(n) => Value::from(*n),
            KeyValue::String(s) => Value::String(s.clone()),
        }
    }

    /// Read a key out of a record value; `None` unless it is a number or a
    /// string.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(KeyValue::String(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(KeyValue::Int)
                .or_else(|| n.as_u64().map(KeyValue::UInt))
                .or_else(|| n.as_f64().map(KeyValue::Float)),
            _ => None,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(n) => write!(f, "{}", n),
            KeyValue::UInt(n) => write!(f, "{}", n),
            KeyValue::Float(n) => write!(f, "{}", n),
            KeyValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::String(s.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        KeyValue::String(s)
    }
}

impl From<&String> for KeyValue {
    fn from(s: &String) -> Self {
        KeyValue::String(s.clone())
    }
}

impl From<i64> for KeyValue {
    fn from(n: i64) -> Self {
        KeyValue::Int(n)
    }
}

impl From<i32> for KeyValue {
    fn from(n: i32) -> Self {
        KeyValue::Int(i64::from(n))
    }
}

impl From<u64> for KeyValue {
    fn from(n: u64) -> Self {
        KeyValue::UInt(n)
    }
}

impl From<u32> for KeyValue {
    fn from(n: u32) -> Self {
        KeyValue::UInt(u64::from(n))
    }
}

impl From<f64> for KeyValue {
    fn from(n: f64) -> Self {
        KeyValue::Float(n)
    }
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A SELECT over one table.
#[derive(Debug, Clone)]
pub struct Query {
    /// The table to query.
    pub table: String,
    pub filter: FilterExpression,
    /// Order by clauses.
    pub order_by: Vec<(String, Order)>,
    /// Maximum number of results.
    pub limit: Option<u64>,
    /// Offset for pagination.
    pub offset: Option<u64>,
}

impl Query {
    pub fn new(table: impl Into<String>, filter: FilterExpression) -> Self {
        Self {
            table: table.into(),
            filter,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Add an order-by clause.
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    /// Set the maximum number of results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset for pagination.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// An UPDATE of the records matching a filter.
#[derive(Debug, Clone)]
pub struct Update {
    pub table: String,
    pub filter: FilterExpression,
    /// Fields to overwrite; absent fields are left untouched.
    pub values: Record,
    pub limit: Option<u64>,
}

impl Update {
    pub fn new(table: impl Into<String>, filter: FilterExpression, values: Record) -> Self {
        Self {
            table: table.into(),
            filter,
            values,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A DELETE of the records matching a filter.
#[derive(Debug, Clone)]
pub struct Delete {
    /// The table to delete from.
    pub table: String,
    pub filter: FilterExpression,
    pub limit: Option<u64>,
}

impl Delete {
    pub fn new(table: impl Into<String>, filter: FilterExpression) -> Self {
        Self {
            table: table.into(),
            filter,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
