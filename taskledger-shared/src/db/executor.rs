/// Statement execution against a [`RelationalSession`]
///
/// Every operation here is its own atomic unit: it opens a transaction,
/// commits on success, and rolls back explicitly before surfacing a
/// `QueryError`. A failed statement therefore never leaves partial writes
/// behind and never poisons the session for the next call.
///
/// | Operation | Returns | Zero rows |
/// |---|---|---|
/// | [`read`](RelationalSession::read) | `Vec<Record>` | empty vec |
/// | [`fetch_as`](RelationalSession::fetch_as) | `Vec<T>` | empty vec |
/// | [`fetch_optional_as`](RelationalSession::fetch_optional_as) | `Option<T>` | `None` |
/// | [`write`](RelationalSession::write) | [`WriteOutcome`] | logical miss |
/// | [`insert`](RelationalSession::insert) | generated id | n/a |
/// | [`batch_insert`](RelationalSession::batch_insert) | generated ids | n/a |
use super::session::RelationalSession;
use super::statement::{Record, Statement};
use crate::error::{DataError, DataResult};
use sqlx::postgres::PgRow;
use sqlx::{Connection, Postgres, Transaction};
use tracing::{debug, info, warn};
use validator::Validate;

/// An entity that can be inserted with a single statement
///
/// The statement must end in `RETURNING id` so the generated identifier can
/// be handed back to the caller.
pub trait Insertable: Validate {
    /// Table name, used in logs and batch errors
    const ENTITY: &'static str;

    /// Builds the `INSERT ... RETURNING id` statement for this entity
    fn insert_statement(&self) -> Statement;
}

/// Result of a write-class statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Rows inserted, updated or deleted
    pub rows_affected: u64,
}

impl WriteOutcome {
    /// True when the statement matched nothing (a logical miss, not a fault)
    pub fn is_miss(&self) -> bool {
        self.rows_affected == 0
    }

    /// True when at least one row changed
    pub fn applied(&self) -> bool {
        self.rows_affected > 0
    }
}

impl RelationalSession {
    /// Runs a read-only statement and materializes every row
    ///
    /// # Errors
    ///
    /// Returns `QueryError` for malformed SQL, type mismatches, or columns
    /// that cannot be decoded. The session remains usable.
    pub async fn read(&mut self, statement: &Statement) -> DataResult<Vec<Record>> {
        debug!(sql = statement.summary(), params = statement.params().len(), "read");

        let mut tx = begin(&mut self.conn, "read").await?;
        let result = async {
            let rows = statement.query().fetch_all(&mut *tx).await?;
            rows.iter().map(Record::from_row).collect::<Result<Vec<_>, _>>()
        }
        .await;

        let records = settle(tx, result, "read").await?;
        debug!(rows = records.len(), "read complete");
        Ok(records)
    }

    /// Runs a statement and maps each row into `T`
    ///
    /// Also used for `INSERT/UPDATE ... RETURNING` statements; the
    /// transaction is committed on success either way.
    pub async fn fetch_as<T>(&mut self, statement: &Statement) -> DataResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        debug!(sql = statement.summary(), "fetch_as");

        let mut tx = begin(&mut self.conn, "fetch_as").await?;
        let result = statement.query_as::<T>().fetch_all(&mut *tx).await;
        settle(tx, result, "fetch_as").await
    }

    /// Runs a statement expected to match at most one row
    pub async fn fetch_optional_as<T>(&mut self, statement: &Statement) -> DataResult<Option<T>>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        debug!(sql = statement.summary(), "fetch_optional_as");

        let mut tx = begin(&mut self.conn, "fetch_optional_as").await?;
        let result = statement.query_as::<T>().fetch_optional(&mut *tx).await;
        settle(tx, result, "fetch_optional_as").await
    }

    /// Runs an insert/update/delete and commits it
    ///
    /// Zero affected rows is reported as a logical miss through
    /// [`WriteOutcome::is_miss`], never as an error.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` (after rolling back) on constraint violations or
    /// malformed SQL.
    pub async fn write(&mut self, statement: &Statement) -> DataResult<WriteOutcome> {
        debug!(sql = statement.summary(), params = statement.params().len(), "write");

        let mut tx = begin(&mut self.conn, "write").await?;
        let result = statement.query().execute(&mut *tx).await;
        let done = settle(tx, result, "write").await?;

        let outcome = WriteOutcome {
            rows_affected: done.rows_affected(),
        };
        if outcome.is_miss() {
            info!(sql = statement.summary(), "write matched no rows");
        } else {
            debug!(rows_affected = outcome.rows_affected, "write committed");
        }
        Ok(outcome)
    }

    /// Validates and inserts one entity in its own transaction
    ///
    /// # Returns
    ///
    /// The generated `id` of the new row
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the entity fails validation (nothing is sent)
    /// - `QueryError` if the store rejects the row
    pub async fn insert<E: Insertable>(&mut self, entity: &E) -> DataResult<i32> {
        entity.validate()?;
        let statement = entity.insert_statement();
        let operation = format!("insert {}", E::ENTITY);

        let mut tx = begin(&mut self.conn, &operation).await?;
        let result = statement.query_as::<(i32,)>().fetch_one(&mut *tx).await;
        let (id,) = settle(tx, result, &operation).await?;

        debug!(entity = E::ENTITY, id, "inserted");
        Ok(id)
    }

    /// Inserts `count` generated entities, committing each one separately
    ///
    /// `generate` is called with the item index (`0..count`). Each insert is
    /// its own commit boundary: if item `k` fails, items `0..k` stay
    /// committed and the error reports `committed: k`, so the caller can
    /// resume with the remaining `count - k` items. Wrap the calls in an
    /// outer transaction instead if all-or-nothing is required.
    ///
    /// # Errors
    ///
    /// Returns `BatchInterrupted` wrapping the failure of the first item
    /// that could not be inserted.
    pub async fn batch_insert<E, F>(&mut self, count: usize, mut generate: F) -> DataResult<Vec<i32>>
    where
        E: Insertable,
        F: FnMut(usize) -> E,
    {
        info!(entity = E::ENTITY, count, "Starting batch insert");
        let mut ids = Vec::with_capacity(count);

        for index in 0..count {
            let entity = generate(index);
            match self.insert(&entity).await {
                Ok(id) => ids.push(id),
                Err(err) => {
                    warn!(
                        entity = E::ENTITY,
                        committed = ids.len(),
                        error = %err,
                        "Batch insert interrupted"
                    );
                    return Err(DataError::BatchInterrupted {
                        entity: E::ENTITY,
                        committed: ids.len(),
                        source: Box::new(err),
                    });
                }
            }
        }

        info!(entity = E::ENTITY, inserted = ids.len(), "Batch insert completed");
        Ok(ids)
    }
}

async fn begin<'c>(
    conn: &'c mut sqlx::PgConnection,
    operation: &str,
) -> DataResult<Transaction<'c, Postgres>> {
    conn.begin().await.map_err(|e| DataError::query(operation, e))
}

/// Commits on success; rolls back explicitly on failure before surfacing it
async fn settle<T>(
    tx: Transaction<'_, Postgres>,
    result: Result<T, sqlx::Error>,
    operation: &str,
) -> DataResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| DataError::query(operation, e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(operation, error = %rollback_err, "Rollback failed");
            }
            warn!(operation, error = %err, "Statement failed and was rolled back");
            Err(DataError::query(operation, err))
        }
    }
}
