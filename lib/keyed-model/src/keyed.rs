//! Key-addressed operations on top of the generic model core.

use std::ops::Deref;

use serde::ser::Error as _;
use serde_json::{Map, Value};

use crate::{
    DestroyOptions, Entity, FieldRegistry, FindOptions, GenericModel, KEY_FIELD, KeyValue, Model,
    ModelError, TableClient, UpdateOptions,
};

/// A model whose registry has a `key` field, addressable by that key.
///
/// Dereferences to [`GenericModel`] for the filtered operations.
pub struct KeyedModel<M, C> {
    inner: GenericModel<M, C>,
}

impl<M, C: Clone> Clone for KeyedModel<M, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Model, C: TableClient> KeyedModel<M, C> {
    /// Build the model over the registry `M` declares.
    ///
    /// Fails with [`ModelError::Configuration`] when the registry has no
    /// number or string `key` field.
    pub fn new(client: C) -> Result<Self, ModelError> {
        Self::with_registry(client, M::field_registry())
    }

    /// Build the model over a registry supplied at runtime.
    pub fn with_registry(client: C, registry: FieldRegistry) -> Result<Self, ModelError> {
        registry.require_key()?;
        Ok(Self {
            inner: GenericModel::with_registry(client, registry)?,
        })
    }

    /// Registered field names in declaration order, optionally without `key`.
    pub fn field_names(&self, exclude_key: bool) -> Vec<&str> {
        self.inner.field_names(exclude_key)
    }

    /// The record whose key equals `key`, if any.
    pub async fn find_by_key(
        &self,
        key: impl Into<KeyValue>,
        opts: FindOptions<'_, C::Transaction>,
    ) -> Result<Option<M::Entity>, ModelError> {
        let key = key.into();
        tracing::debug!(table = M::table_name(), key = %key, "find by key");
        self.inner.find_one_value(&key_filter(&key), opts).await
    }

    /// Apply `values` to the record at `key` and return it as updated.
    pub async fn update_by_key(
        &self,
        key: impl Into<KeyValue>,
        values: &M::UpdateValues,
        opts: UpdateOptions<'_, C::Transaction>,
    ) -> Result<M::Entity, ModelError> {
        let values = serde_json::to_value(values)?;
        self.update_values_by_key(key.into(), values, opts).await
    }

    /// Remove the record at `key`; `NotFound` when there is none.
    pub async fn destroy_by_key(
        &self,
        key: impl Into<KeyValue>,
        opts: DestroyOptions<'_, C::Transaction>,
    ) -> Result<(), ModelError> {
        let key = key.into();
        tracing::debug!(table = M::table_name(), key = %key, "destroy by key");
        self.inner.destroy_one_value(&key_filter(&key), opts).await
    }

    /// Write every non-key field of `entity` back to the record at its key.
    pub async fn save(
        &self,
        entity: &M::Entity,
        opts: UpdateOptions<'_, C::Transaction>,
    ) -> Result<M::Entity, ModelError> {
        let mut values = match serde_json::to_value(entity)? {
            Value::Object(values) => values,
            _ => {
                return Err(serde_json::Error::custom("entity must serialize to an object").into());
            }
        };
        values.remove(KEY_FIELD);
        self.update_values_by_key(entity.key(), Value::Object(values), opts)
            .await
    }

    /// Remove the record at the key of `entity`.
    pub async fn delete(
        &self,
        entity: &M::Entity,
        opts: DestroyOptions<'_, C::Transaction>,
    ) -> Result<(), ModelError> {
        self.destroy_by_key(entity.key(), opts).await
    }

    async fn update_values_by_key(
        &self,
        key: KeyValue,
        values: Value,
        opts: UpdateOptions<'_, C::Transaction>,
    ) -> Result<M::Entity, ModelError> {
        tracing::debug!(table = M::table_name(), key = %key, "update by key");
        self.inner
            .update_one_value(&key_filter(&key), values, opts)
            .await
    }
}

impl<M, C> Deref for KeyedModel<M, C> {
    type Target = GenericModel<M, C>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The filter item `{key: <key>}`.
fn key_filter(key: &KeyValue) -> Value {
    let mut item = Map::new();
    item.insert(KEY_FIELD.to_string(), key.to_json());
    Value::Object(item)
}
