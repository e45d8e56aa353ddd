//! Unit of Work
//!
//! A transactional envelope around the load -> decide -> append -> project
//! -> dispatch sequence a command handler runs. Holding a single
//! `sqlx::Transaction` for the whole sequence means a domain error, a
//! concurrency conflict, or a failed synchronous projection all roll back
//! everything the command did, not just the step that failed.
//!
//! Nesting is rejected at the type level: `begin` takes `&PgPool`, never
//! another transaction, so a handler can't accidentally start a unit of
//! work inside one it's already running.

use sqlx::{PgPool, Postgres, Transaction};

/// An open transaction a command handler commits on success. Dropping it
/// without calling `commit` rolls back, mirroring `sqlx::Transaction`'s own
/// drop behavior.
pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    pub async fn begin(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let tx = pool.begin().await?;
        Ok(Self { tx })
    }

    /// Borrow the underlying transaction for repository calls.
    pub fn transaction(&mut self) -> &mut Transaction<'static, Postgres> {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}
