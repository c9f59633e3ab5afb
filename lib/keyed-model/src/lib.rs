//! Keyed Model - schema-validated access to records in a relational table.
//!
//! Every model compiles its field registry once into three validators that
//! gate requests before they reach the table client:
//!
//! - a **filter schema** for read/update/delete filters, accepting one item
//!   or an OR-list of items, each field given as a value or list of values,
//!   positively (`status`) or negated (`!status`), never both;
//! - a **create schema** requiring every non-key field;
//! - an **update schema** accepting any subset of non-key fields.
//!
//! Validation reports every violation at once and never coerces values.
//!
//! # Core Concepts
//!
//! - [`FieldRegistry`]: ordered field name → [`Constraint`] mapping, with a
//!   `key` field identifying records
//! - [`GenericModel`]: filtered find/count/create/update/destroy
//! - [`KeyedModel`]: find/update/destroy by key, `save` and `delete` of
//!   entities
//! - [`TableClient`]: the backend executing validated statements; an
//!   in-memory [`MemoryTable`] is included

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::unwrap_in_result,
        clippy::panic
    )
)]

// Lets `#[derive(Entity)]` output resolve inside this crate too
extern crate self as keyed_model;

mod client;
mod constraint;
mod entity;
mod error;
mod filter;
mod keyed;
mod memory;
mod model;
mod options;
mod query;
mod registry;
mod validator;

pub use client::TableClient;
pub use constraint::{
    Constraint, DateConstraint, NumberConstraint, ObjectConstraint, StringConstraint,
};
pub use entity::{EntitySchema, Presence, ValuesSchema};
pub use error::{ModelError, ValidationError, Violation, ViolationKind};
pub use filter::{
    Condition, FilterExpression, FilterItem, FilterSchema, NEGATION_PREFIX, OneOrMany, Where,
    compare_values, negated_key,
};
pub use keyed::KeyedModel;
pub use memory::{MemoryTable, MemoryTransaction};
pub use model::{Entity, GenericModel, Model, Schemas};
pub use options::{CreateOptions, DestroyOptions, FindOptions, UpdateOptions};
pub use query::{Delete, KeyValue, Order, Query, Record, Update};
pub use registry::{FieldDefinition, FieldRegistry, KEY_FIELD};

// Re-export derive macro
pub use keyed_model_derive::Entity;
