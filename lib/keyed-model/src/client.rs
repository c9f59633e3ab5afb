//! The table client a model delegates its validated statements to.

use async_trait::async_trait;

use crate::{Delete, ModelError, Query, Record, Update};

/// Trait for executing validated statements against a table backend.
///
/// Implemented by backend-specific clients (a SQL pool, [`MemoryTable`], ...).
/// Every method receives the caller's transaction handle, if any, untouched;
/// beginning, committing and rolling back transactions is up to the caller
/// and the client.
///
/// [`MemoryTable`]: crate::MemoryTable
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Opaque transaction handle scoping several statements.
    type Transaction: Send;

    /// Execute a SELECT and return every matching record.
    async fn fetch(
        &self,
        query: Query,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<Vec<Record>, ModelError>;

    /// Execute a SELECT and return at most one record.
    async fn fetch_optional(
        &self,
        query: Query,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<Option<Record>, ModelError> {
        let records = self.fetch(query.limit(1), tx).await?;
        Ok(records.into_iter().next())
    }

    /// Count the records matching the query's filter.
    async fn count(
        &self,
        query: Query,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<u64, ModelError>;

    /// Insert one record and return it as stored, including its key.
    async fn insert(
        &self,
        table: &str,
        values: Record,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<Record, ModelError>;

    /// Apply an UPDATE and return the updated records.
    async fn update(
        &self,
        update: Update,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<Vec<Record>, ModelError>;

    /// Execute a DELETE and return the number of records removed.
    async fn delete(
        &self,
        delete: Delete,
        tx: Option<&mut Self::Transaction>,
    ) -> Result<u64, ModelError>;
}
