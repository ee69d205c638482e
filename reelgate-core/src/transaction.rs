//! Transactional scope for writes that span several repositories

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::Result;

/// An open transaction that rolls back unless [`UnitOfWork::commit`] is called.
///
/// Repositories take a `PgExecutor`, so pass [`UnitOfWork::conn`] to run a
/// repository call inside the transaction.
pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        Ok(Self {
            tx: pool.begin().await?,
        })
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork").finish()
    }
}
