//! Row-Level Security (RLS) context management.
//!
//! Every project-owned table carries a policy comparing `project_id` with the
//! `app.current_project_id` setting. All repository work therefore runs inside
//! a transaction that sets this context first.
//!
//! # Usage
//!
//! ```ignore
//! use labelvault_db::rls::RlsConnection;
//!
//! let rls = RlsConnection::new(&db, project_id).await?;
//! let rows = annotations::Entity::find().all(rls.transaction()).await?;
//! rls.commit().await?;
//! ```

use labelvault_shared::types::ProjectId;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, IsolationLevel,
    TransactionTrait,
};

/// A transaction scoped to one project through the RLS context.
pub struct RlsConnection {
    txn: DatabaseTransaction,
}

impl RlsConnection {
    /// Begins a transaction with the default isolation level and sets the
    /// project context using `SET LOCAL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the RLS
    /// context cannot be set.
    pub async fn new(db: &DatabaseConnection, project_id: ProjectId) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        set_rls_context(&txn, project_id).await?;
        Ok(Self { txn })
    }

    /// Begins a `REPEATABLE READ` transaction with the project context.
    ///
    /// Every read inside sees one snapshot of the annotation set, so a
    /// validity recompute is consistent with some committed state.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the RLS
    /// context cannot be set.
    pub async fn snapshot(db: &DatabaseConnection, project_id: ProjectId) -> Result<Self, DbErr> {
        let txn = db
            .begin_with_config(Some(IsolationLevel::RepeatableRead), None)
            .await?;
        set_rls_context(&txn, project_id).await?;
        Ok(Self { txn })
    }

    /// Returns a reference to the underlying transaction for executing queries.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commits the transaction, persisting all changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction, discarding all changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Statement setting the project context for the current transaction.
#[must_use]
pub fn rls_context_sql(project_id: ProjectId) -> String {
    // ProjectId renders as a hyphenated UUID, never user text
    format!("SET LOCAL app.current_project_id = '{project_id}'")
}

/// Sets the RLS context on an existing transaction.
///
/// # Errors
///
/// Returns an error if the RLS context cannot be set.
pub async fn set_rls_context(txn: &DatabaseTransaction, project_id: ProjectId) -> Result<(), DbErr> {
    txn.execute_unprepared(&rls_context_sql(project_id)).await?;
    Ok(())
}

/// Whether a store error is a `REPEATABLE READ` serialization failure (or a
/// deadlock) that can be resolved by retrying on a fresh snapshot.
#[must_use]
pub fn is_serialization_failure(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("could not serialize access")
        || message.contains("deadlock detected")
        || message.contains("40001")
        || message.contains("40P01")
}
