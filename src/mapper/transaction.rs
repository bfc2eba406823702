use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;

use super::SqlMapper;
use crate::error::SqlMapperError;

/// Flags the owning mapper if a transaction scope is dropped before it finished.
struct ScopeGuard {
    abandoned: Arc<AtomicBool>,
    armed: bool,
}

impl ScopeGuard {
    fn new(abandoned: Arc<AtomicBool>) -> Self {
        Self {
            abandoned,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.store(true, Ordering::Release);
        }
    }
}

impl SqlMapper {
    /// Run `scope` inside a transaction on this mapper's connection.
    ///
    /// The transaction commits when the scope returns `Ok` and rolls back when it returns `Err`,
    /// after which the scope's error is returned unchanged. A failed `COMMIT` is rolled back too
    /// and its error returned. Values the scope needs must be moved into it.
    ///
    /// If this future is dropped midway (cancelled, or a panic unwinds through it), including
    /// while `COMMIT` or `ROLLBACK` is in flight, the transaction is rolled back before this
    /// mapper runs its next statement.
    ///
    /// ```rust,no_run
    /// use sql_mapper::prelude::*;
    ///
    /// # async fn demo(mapper: &mut SqlMapper) -> Result<(), SqlMapperError> {
    /// mapper
    ///     .transaction(|tx| {
    ///         Box::pin(async move {
    ///             tx.execute("UPDATE accounts SET balance = balance - 10 WHERE id = :id",
    ///                 &named_params! { "id" => 1 }).await?;
    ///             tx.execute("UPDATE accounts SET balance = balance + 10 WHERE id = :id",
    ///                 &named_params! { "id" => 2 }).await?;
    ///             Ok::<_, SqlMapperError>(())
    ///         })
    ///     })
    ///     .await
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns `SqlMapperError::ExecutionError` when called inside another transaction, any error
    /// from `BEGIN`/`COMMIT`, or the scope's own error.
    pub async fn transaction<R, F>(&mut self, scope: F) -> Result<R, SqlMapperError>
    where
        F: for<'t> FnOnce(&'t mut SqlMapper) -> BoxFuture<'t, Result<R, SqlMapperError>>,
    {
        if self.in_transaction {
            return Err(SqlMapperError::ExecutionError(
                "nested transactions are not supported".into(),
            ));
        }
        let guard = ScopeGuard::new(Arc::clone(&self.tx_abandoned));
        if let Err(err) = self.begin().await {
            guard.disarm();
            return Err(err);
        }

        let outcome = scope(self).await;
        let result = match outcome {
            Ok(value) => match self.commit().await {
                Ok(()) => Ok(value),
                Err(commit_err) => {
                    self.rollback_after("commit", &commit_err).await;
                    Err(commit_err)
                }
            },
            Err(err) => {
                self.rollback_after("scope", &err).await;
                Err(err)
            }
        };
        guard.disarm();
        result
    }

    /// Start a transaction by hand; finish it with [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback).
    ///
    /// # Errors
    /// Returns `SqlMapperError::ExecutionError` if a transaction is already open, or the error of
    /// `BEGIN`.
    pub async fn begin(&mut self) -> Result<(), SqlMapperError> {
        self.recover_abandoned().await;
        if self.in_transaction {
            return Err(SqlMapperError::ExecutionError(
                "nested transactions are not supported".into(),
            ));
        }
        self.session_mut()?.begin().await?;
        self.in_transaction = true;
        tracing::debug!("transaction started");
        Ok(())
    }

    /// A failed `COMMIT` keeps the transaction open; call [`rollback`](Self::rollback) next.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ExecutionError` if no transaction is open, or the error of `COMMIT`.
    pub async fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.finish(true).await
    }

    /// # Errors
    /// Returns `SqlMapperError::ExecutionError` if no transaction is open, or the error of
    /// `ROLLBACK`.
    pub async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.finish(false).await
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// A failed `COMMIT` leaves the transaction open so it can still be rolled back; after a
    /// `ROLLBACK` attempt the transaction counts as finished whatever the outcome.
    async fn finish(&mut self, commit: bool) -> Result<(), SqlMapperError> {
        if !self.in_transaction {
            return Err(SqlMapperError::ExecutionError(
                "no transaction in progress".into(),
            ));
        }
        let session = self.session_mut()?;
        let result = if commit {
            session.commit().await
        } else {
            session.rollback().await
        };
        if result.is_ok() || !commit {
            self.in_transaction = false;
        }
        tracing::debug!(commit, ok = result.is_ok(), "transaction finished");
        result
    }

    async fn rollback_after(&mut self, stage: &'static str, cause: &SqlMapperError) {
        if let Err(rollback_err) = self.rollback().await {
            tracing::warn!(
                stage,
                cause = %cause,
                error = %rollback_err,
                "rollback after failed transaction failed"
            );
        }
    }

    /// Roll back a transaction whose scope was dropped before it could finish.
    ///
    /// The dropped scope may have been cut off after its `COMMIT` or `ROLLBACK` already ran, so a
    /// rollback failure here is logged rather than returned.
    pub(super) async fn recover_abandoned(&mut self) {
        if !self.tx_abandoned.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::warn!("rolling back transaction left open by a dropped scope");
        self.in_transaction = false;
        if let Some(session) = self.session.as_mut()
            && let Err(e) = session.rollback().await
        {
            tracing::debug!(error = %e, "rollback of dropped scope failed");
        }
    }
}
