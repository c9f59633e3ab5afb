//! In-memory implementation of [`TableClient`].
//!
//! Records live per table behind a lock. Filters are evaluated with
//! [`FilterExpression::matches`], so the semantics are exactly those the
//! filter schema validates for.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::filter::compare_values;
use crate::{
    Delete, FilterExpression, KEY_FIELD, ModelError, Order, Query, Record, TableClient, Update,
};

#[derive(Debug, Default)]
struct Table {
    records: Vec<Record>,
    next_key: u64,
}

impl Table {
    fn matching<'a>(&'a self, filter: &'a FilterExpression) -> impl Iterator<Item = usize> + 'a {
        self.records
            .iter()
            .enumerate()
            .filter(move |(_, record)| filter.matches(record))
            .map(|(idx, _)| idx)
    }

    /// Keep the key counter ahead of any numeric key stored explicitly.
    fn observe_key(&mut self, key: &Value) {
        if let Some(n) = key.as_u64() {
            self.next_key = self.next_key.max(n);
        }
    }
}

/// Transaction handle for [`MemoryTable`].
///
/// Statements run with the handle are appended to its journal; nothing is
/// staged or rolled back.
#[derive(Debug, Default)]
pub struct MemoryTransaction {
    journal: Vec<String>,
}

impl MemoryTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements executed under this transaction, oldest first.
    pub fn statements(&self) -> &[String] {
        &self.journal
    }
}

/// A [`TableClient`] keeping every table in memory.
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `records` as they are, keys included.
    pub fn seed(&self, table: &str, records: impl IntoIterator<Item = Record>) {
        let mut tables = self.write();
        let table = tables.entry(table.to_string()).or_default();
        for record in records {
            if let Some(key) = record.get(KEY_FIELD) {
                table.observe_key(key);
            }
            table.records.push(record);
        }
    }

    /// A snapshot of the records of `table`, in insertion order.
    pub fn records(&self, table: &str) -> Vec<Record> {
        self.read()
            .get(table)
            .map(|t| t.records.clone())
            .unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Table>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Table>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn journal(tx: Option<&mut MemoryTransaction>, statement: &str, table: &str) {
    tracing::trace!(statement, table, transaction = tx.is_some(), "memory statement");
    if let Some(tx) = tx {
        tx.journal.push(format!("{} {}", statement, table));
    }
}

fn compare_records(a: &Record, b: &Record, order_by: &[(String, Order)]) -> Ordering {
    for (field, order) in order_by {
        let left = a.get(field).unwrap_or(&Value::Null);
        let right = b.get(field).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right).unwrap_or(Ordering::Equal);
        let ordering = match order {
            Order::Asc => ordering,
            Order::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[async_trait]
impl TableClient for MemoryTable {
    type Transaction = MemoryTransaction;

    async fn fetch(
        &self,
        query: Query,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<Vec<Record>, ModelError> {
        journal(tx, "SELECT", &query.table);

        let tables = self.read();
        let Some(table) = tables.get(&query.table) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<Record> = table
            .matching(&query.filter)
            .map(|idx| table.records[idx].clone())
            .collect();
        records.sort_by(|a, b| compare_records(a, b, &query.order_by));

        let offset = query.offset.map_or(0, to_usize);
        let limit = query.limit.map_or(usize::MAX, to_usize);
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(
        &self,
        query: Query,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<u64, ModelError> {
        journal(tx, "COUNT", &query.table);

        let tables = self.read();
        let count = tables
            .get(&query.table)
            .map_or(0, |table| table.matching(&query.filter).count());
        Ok(count as u64)
    }

    async fn insert(
        &self,
        table: &str,
        mut values: Record,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<Record, ModelError> {
        journal(tx, "INSERT", table);

        let mut tables = self.write();
        let name = table;
        let table = tables.entry(name.to_string()).or_default();

        match values.get(KEY_FIELD) {
            Some(key) => {
                let key = key.clone();
                let exists = table.records.iter().any(|r| {
                    r.get(KEY_FIELD).and_then(|k| compare_values(k, &key)) == Some(Ordering::Equal)
                });
                if exists {
                    return Err(ModelError::StorageError(format!(
                        "duplicate key {} in table '{}'",
                        key, name
                    )));
                }
                table.observe_key(&key);
            }
            None => {
                table.next_key += 1;
                values.insert(KEY_FIELD.to_string(), Value::from(table.next_key));
            }
        }

        table.records.push(values.clone());
        Ok(values)
    }

    async fn update(
        &self,
        update: Update,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<Vec<Record>, ModelError> {
        journal(tx, "UPDATE", &update.table);

        // Keys are assigned on insert and never rewritten
        if update.values.contains_key(KEY_FIELD) {
            return Err(ModelError::StorageError(format!(
                "'{}' of table '{}' cannot be updated",
                KEY_FIELD, update.table
            )));
        }

        let mut tables = self.write();
        let Some(table) = tables.get_mut(&update.table) else {
            return Ok(Vec::new());
        };

        let limit = update.limit.map_or(usize::MAX, to_usize);
        let targets: Vec<usize> = table.matching(&update.filter).take(limit).collect();

        let mut updated = Vec::with_capacity(targets.len());
        for idx in targets {
            let record = &mut table.records[idx];
            for (field, value) in &update.values {
                record.insert(field.clone(), value.clone());
            }
            updated.push(record.clone());
        }
        Ok(updated)
    }

    async fn delete(
        &self,
        delete: Delete,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<u64, ModelError> {
        journal(tx, "DELETE", &delete.table);

        let mut tables = self.write();
        let Some(table) = tables.get_mut(&delete.table) else {
            return Ok(0);
        };

        let limit = delete.limit.map_or(usize::MAX, to_usize);
        let targets: Vec<usize> = table.matching(&delete.filter).take(limit).collect();
        for idx in targets.iter().rev() {
            table.records.remove(*idx);
        }
        Ok(targets.len() as u64)
    }
}
