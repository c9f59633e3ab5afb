//! Model traits and the generic filtered-operation core.
//!
//! - `Entity`: a persisted record type that knows its key and fields
//! - `Model`: binds the entity, create-values, update-values and query-item
//!   shapes of one table
//! - `GenericModel<M, C>`: validates filters and values against schemas
//!   compiled once from the model's registry, then delegates to a
//!   [`TableClient`]

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::entity::ValuesSchema;
use crate::{
    CreateOptions, Delete, DestroyOptions, EntitySchema, FieldRegistry, FilterExpression,
    FilterSchema, FindOptions, KeyValue, ModelError, Query, Record, TableClient, Update,
    UpdateOptions, ValidationError, ViolationKind, Where,
};

/// A record type persisted in a table.
///
/// Usually derived with `#[derive(Entity)]`, which only compiles for structs
/// with a `key` field of a number or string type.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// The value of the record's `key` field.
    fn key(&self) -> KeyValue;

    /// The fields of the record, `key` included.
    fn field_registry() -> FieldRegistry;
}

/// The four shapes one table is accessed through.
///
/// # Type Bounds
///
/// - `Entity`: a whole record, key included
/// - `CreateValues`: every non-key field
/// - `UpdateValues`: any subset of non-key fields (skip absent fields when
///   serializing, e.g. `#[serde(skip_serializing_if = "Option::is_none")]`)
/// - `QueryItem`: one filter item, keyed by field names and `!`-negations
pub trait Model: Send + Sync + 'static {
    type Entity: Entity;
    type CreateValues: Serialize + Send + Sync;
    type UpdateValues: Serialize + Send + Sync;
    type QueryItem: Serialize + Send + Sync;

    /// The table the model's records live in.
    fn table_name() -> &'static str;

    fn field_registry() -> FieldRegistry {
        <Self::Entity as Entity>::field_registry()
    }
}

/// The registry of a model and everything compiled from it.
#[derive(Debug)]
pub struct Schemas {
    registry: FieldRegistry,
    filter: FilterSchema,
    entity: EntitySchema,
}

impl Schemas {
    pub fn compile(registry: FieldRegistry) -> Result<Self, ModelError> {
        let filter = FilterSchema::compile(&registry)?;
        let entity = EntitySchema::compile(&registry)?;
        Ok(Self {
            registry,
            filter,
            entity,
        })
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn filter(&self) -> &FilterSchema {
        &self.filter
    }

    pub fn entity(&self) -> &EntitySchema {
        &self.entity
    }
}

/// Filtered CRUD over one table with input validation.
pub struct GenericModel<M, C> {
    client: C,
    schemas: Arc<Schemas>,
    _marker: PhantomData<fn() -> M>,
}

impl<M, C: Clone> Clone for GenericModel<M, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            schemas: Arc::clone(&self.schemas),
            _marker: PhantomData,
        }
    }
}

impl<M: Model, C: TableClient> GenericModel<M, C> {
    /// Build the model over the registry `M` declares.
    pub fn new(client: C) -> Result<Self, ModelError> {
        Self::with_registry(client, M::field_registry())
    }

    /// Build the model over a registry supplied at runtime.
    pub fn with_registry(client: C, registry: FieldRegistry) -> Result<Self, ModelError> {
        let schemas = Schemas::compile(registry)?;
        tracing::debug!(
            table = M::table_name(),
            fields = schemas.registry.len(),
            "compiled model schemas"
        );
        Ok(Self {
            client,
            schemas: Arc::new(schemas),
            _marker: PhantomData,
        })
    }

    pub fn table(&self) -> &'static str {
        M::table_name()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn schemas(&self) -> &Schemas {
        &self.schemas
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.schemas.registry
    }

    /// Registered field names in declaration order.
    pub fn field_names(&self, exclude_key: bool) -> Vec<&str> {
        self.schemas.registry.field_names(exclude_key)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(table = M::table_name()))]
    pub async fn find_all(
        &self,
        filter: Where<M::QueryItem>,
        opts: FindOptions<'_, C::Transaction>,
    ) -> Result<Vec<M::Entity>, ModelError> {
        let filter = serde_json::to_value(&filter)?;
        let (query, tx) = self.prepare_query(&filter, opts)?;
        let records = self.client.fetch(query, tx).await?;
        records.into_iter().map(decode).collect()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(table = M::table_name()))]
    pub async fn find_one(
        &self,
        filter: Where<M::QueryItem>,
        opts: FindOptions<'_, C::Transaction>,
    ) -> Result<Option<M::Entity>, ModelError> {
        let filter = serde_json::to_value(&filter)?;
        self.find_one_value(&filter, opts).await
    }

    pub(crate) async fn find_one_value(
        &self,
        filter: &Value,
        opts: FindOptions<'_, C::Transaction>,
    ) -> Result<Option<M::Entity>, ModelError> {
        let (query, tx) = self.prepare_query(filter, opts)?;
        self.client.fetch_optional(query, tx).await?.map(decode).transpose()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(table = M::table_name()))]
    pub async fn count(
        &self,
        filter: Where<M::QueryItem>,
        opts: FindOptions<'_, C::Transaction>,
    ) -> Result<u64, ModelError> {
        let filter = serde_json::to_value(&filter)?;
        let (query, tx) = self.prepare_query(&filter, opts)?;
        self.client.count(query, tx).await
    }

    /// Insert a record; the client assigns its key.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::table_name()))]
    pub async fn create(
        &self,
        values: &M::CreateValues,
        opts: CreateOptions<'_, C::Transaction>,
    ) -> Result<M::Entity, ModelError> {
        let values = serde_json::to_value(values)?;
        let record = prepare_values(values, self.schemas.entity.create(), opts.validate)?;
        let stored = self
            .client
            .insert(M::table_name(), record, opts.transaction)
            .await?;
        decode(stored)
    }

    /// Apply `values` to every matching record.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::table_name()))]
    pub async fn update(
        &self,
        filter: Where<M::QueryItem>,
        values: &M::UpdateValues,
        opts: UpdateOptions<'_, C::Transaction>,
    ) -> Result<Vec<M::Entity>, ModelError> {
        let filter = serde_json::to_value(&filter)?;
        let values = serde_json::to_value(values)?;
        let (update, tx) = self.prepare_update(&filter, values, opts)?;
        let records = self.client.update(update, tx).await?;
        records.into_iter().map(decode).collect()
    }

    /// Apply `values` to the first matching record; `NotFound` when nothing
    /// matches.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::table_name()))]
    pub async fn update_one(
        &self,
        filter: Where<M::QueryItem>,
        values: &M::UpdateValues,
        opts: UpdateOptions<'_, C::Transaction>,
    ) -> Result<M::Entity, ModelError> {
        let filter = serde_json::to_value(&filter)?;
        let values = serde_json::to_value(values)?;
        self.update_one_value(&filter, values, opts).await
    }

    pub(crate) async fn update_one_value(
        &self,
        filter: &Value,
        values: Value,
        opts: UpdateOptions<'_, C::Transaction>,
    ) -> Result<M::Entity, ModelError> {
        let (update, tx) = self.prepare_update(filter, values, opts)?;
        let records = self.client.update(update.limit(1), tx).await?;
        let record = records.into_iter().next().ok_or_else(not_found::<M>)?;
        decode(record)
    }

    /// Remove every matching record and return how many were removed.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::table_name()))]
    pub async fn destroy(
        &self,
        filter: Where<M::QueryItem>,
        opts: DestroyOptions<'_, C::Transaction>,
    ) -> Result<u64, ModelError> {
        let filter = serde_json::to_value(&filter)?;
        let filter = self.prepare_filter(&filter, opts.validate)?;
        self.client
            .delete(Delete::new(M::table_name(), filter), opts.transaction)
            .await
    }

    /// Remove the first matching record; `NotFound` when nothing matches.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::table_name()))]
    pub async fn destroy_one(
        &self,
        filter: Where<M::QueryItem>,
        opts: DestroyOptions<'_, C::Transaction>,
    ) -> Result<(), ModelError> {
        let filter = serde_json::to_value(&filter)?;
        self.destroy_one_value(&filter, opts).await
    }

    pub(crate) async fn destroy_one_value(
        &self,
        filter: &Value,
        opts: DestroyOptions<'_, C::Transaction>,
    ) -> Result<(), ModelError> {
        let filter = self.prepare_filter(filter, opts.validate)?;
        let removed = self
            .client
            .delete(Delete::new(M::table_name(), filter).limit(1), opts.transaction)
            .await?;
        if removed == 0 {
            return Err(not_found::<M>());
        }
        Ok(())
    }

    fn prepare_filter(&self, filter: &Value, validate: bool) -> Result<FilterExpression, ModelError> {
        let schema = &self.schemas.filter;
        let parsed = if validate {
            schema.parse(filter)
        } else {
            tracing::trace!("filter validation disabled");
            schema.parse_unchecked(filter)
        };
        parsed.map_err(|errors| {
            tracing::debug!(violations = errors.len(), "rejected filter expression");
            ModelError::Validation(errors)
        })
    }

    fn prepare_query<'a>(
        &self,
        filter: &Value,
        opts: FindOptions<'a, C::Transaction>,
    ) -> Result<(Query, Option<&'a mut C::Transaction>), ModelError> {
        let FindOptions {
            validate,
            order_by,
            limit,
            offset,
            transaction,
        } = opts;

        let filter = self.prepare_filter(filter, validate)?;

        if validate {
            let mut errors = ValidationError::new();
            for (field, _) in &order_by {
                if !self.schemas.registry.contains(field) {
                    errors.add(
                        format!("order_by.{}", field),
                        ViolationKind::Unknown,
                        "is not a registered field",
                    );
                }
            }
            errors.into_result()?;
        }

        let query = Query {
            table: M::table_name().to_string(),
            filter,
            order_by,
            limit,
            offset,
        };
        Ok((query, transaction))
    }

    fn prepare_update<'a>(
        &self,
        filter: &Value,
        values: Value,
        opts: UpdateOptions<'a, C::Transaction>,
    ) -> Result<(Update, Option<&'a mut C::Transaction>), ModelError> {
        let filter = self.prepare_filter(filter, opts.validate_query)?;
        let values = prepare_values(values, self.schemas.entity.update(), opts.validate_values)?;
        Ok((Update::new(M::table_name(), filter, values), opts.transaction))
    }
}

fn prepare_values(values: Value, schema: &ValuesSchema, validate: bool) -> Result<Record, ModelError> {
    if validate {
        schema.validate(&values).map_err(|errors| {
            tracing::debug!(violations = errors.len(), "rejected values");
            ModelError::Validation(errors)
        })?;
    } else {
        tracing::trace!("values validation disabled");
    }

    match values {
        Value::Object(record) => Ok(record),
        _ => {
            let mut errors = ValidationError::new();
            errors.add("", ViolationKind::Type, "must be an object");
            Err(errors.into())
        }
    }
}

fn decode<E: DeserializeOwned>(record: Record) -> Result<E, ModelError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

fn not_found<M: Model>() -> ModelError {
    ModelError::NotFound(format!("no {} record matches the filter", M::table_name()))
}
