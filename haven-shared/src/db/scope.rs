/// Tenant-scoped transactions
///
/// [`TenantDb`] is the only way repositories reach tenant data. Every unit of
/// work runs inside a transaction whose first statement binds the tenant
/// marker (`app.current_tenant_id`) as a transaction-local setting. The
/// row-level security policies installed by the migrations compare each row's
/// `tenant_id` against that marker, so a query can never observe or write
/// another tenant's rows, and the marker disappears with the transaction
/// instead of leaking to the next borrower of the pooled connection.
///
/// # Example
///
/// ```no_run
/// use haven_shared::db::scope::TenantDb;
/// use haven_shared::tenant::TenantId;
///
/// # async fn example(db: TenantDb, tenant_id: TenantId) -> Result<(), haven_shared::db::StoreError> {
/// let open: i64 = db
///     .run_scoped(tenant_id, |tx| {
///         Box::pin(async move {
///             let count = sqlx::query_scalar("SELECT COUNT(*) FROM todos WHERE NOT completed")
///                 .fetch_one(tx.conn())
///                 .await?;
///             Ok(count)
///         })
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

use crate::db::error::StoreError;
use crate::db::pool::{self, PoolStats};
use crate::tenant::TenantId;
use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Name of the transaction-local setting read by the isolation policies
pub const TENANT_SETTING: &str = "app.current_tenant_id";

const SLOW_OPERATION_THRESHOLD: Duration = Duration::from_millis(100);

/// Tenant-scoping handle around the connection pool
#[derive(Debug, Clone)]
pub struct TenantDb {
    pool: PgPool,
    default_deadline: Option<Duration>,
}

/// An open transaction bound to exactly one tenant
///
/// Only [`TenantDb`] constructs these, after the marker has been set.
pub struct ScopedTx {
    tx: Transaction<'static, Postgres>,
    tenant_id: TenantId,
}

impl ScopedTx {
    /// The tenant this transaction is bound to
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Connection to run statements on; every statement sees only this tenant's rows
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    /// Reads the marker back from the database session
    pub async fn current_tenant(&mut self) -> Result<Option<TenantId>, StoreError> {
        current_scope(&mut self.tx).await
    }

    async fn bind(&mut self, statement_timeout: Option<Duration>) -> Result<(), sqlx::Error> {
        // set_config with is_local = true is the parameterized form of SET LOCAL
        sqlx::query("SELECT set_config($1, $2, true)")
            .bind(TENANT_SETTING)
            .bind(self.tenant_id.to_string())
            .execute(&mut *self.tx)
            .await?;

        if let Some(timeout) = statement_timeout {
            sqlx::query("SELECT set_config('statement_timeout', $1, true)")
                .bind(format!("{}ms", timeout.as_millis()))
                .execute(&mut *self.tx)
                .await?;
        }

        Ok(())
    }
}

/// Tenant currently bound on a connection, `None` when unscoped
pub async fn current_scope(conn: &mut PgConnection) -> Result<Option<TenantId>, StoreError> {
    let marker: Option<String> = sqlx::query_scalar("SELECT NULLIF(current_setting($1, true), '')")
        .bind(TENANT_SETTING)
        .fetch_one(conn)
        .await?;

    marker
        .map(|value| {
            Uuid::parse_str(&value)
                .map(TenantId::new)
                .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
        })
        .transpose()
}

impl TenantDb {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            default_deadline: None,
        }
    }

    /// Deadline applied by [`TenantDb::run_scoped`]; `None` disables it
    pub fn with_default_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.default_deadline = deadline;
        self
    }

    pub fn default_deadline(&self) -> Option<Duration> {
        self.default_deadline
    }

    /// Raw pool access for tables outside the tenant policies
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        pool::health_check(&self.pool).await
    }

    pub fn stats(&self) -> PoolStats {
        pool::get_pool_stats(&self.pool)
    }

    pub async fn close(&self) {
        pool::close_pool(self.pool.clone()).await;
    }

    /// Runs `work` inside a transaction scoped to `tenant_id`
    ///
    /// Commits when `work` returns `Ok`, rolls back otherwise. The default
    /// deadline, if configured, applies.
    ///
    /// # Errors
    ///
    /// - [`StoreError::TenantScope`] if the transaction or marker could not be
    ///   established; `work` did not run
    /// - [`StoreError::Timeout`] if the deadline elapsed; nothing was committed
    /// - whatever `work` returned, after rollback
    pub async fn run_scoped<F, T>(&self, tenant_id: TenantId, work: F) -> Result<T, StoreError>
    where
        F: for<'c> FnOnce(&'c mut ScopedTx) -> BoxFuture<'c, Result<T, StoreError>> + Send,
        T: Send,
    {
        match self.default_deadline {
            Some(deadline) => self.run_scoped_within(tenant_id, deadline, work).await,
            None => self.execute(tenant_id, None, work).await,
        }
    }

    /// Like [`TenantDb::run_scoped`] with an explicit deadline
    ///
    /// The deadline is enforced client-side and also installed as the
    /// transaction's `statement_timeout`, so the server stops working too.
    pub async fn run_scoped_within<F, T>(
        &self,
        tenant_id: TenantId,
        deadline: Duration,
        work: F,
    ) -> Result<T, StoreError>
    where
        F: for<'c> FnOnce(&'c mut ScopedTx) -> BoxFuture<'c, Result<T, StoreError>> + Send,
        T: Send,
    {
        match tokio::time::timeout(deadline, self.execute(tenant_id, Some(deadline), work)).await {
            Ok(Err(err)) if err.is_statement_timeout() => {
                warn!(tenant_id = %tenant_id, deadline_ms = deadline.as_millis(), "Statement timeout in scoped transaction");
                Err(StoreError::Timeout(deadline))
            }
            Ok(result) => result,
            Err(_) => {
                // Dropping the in-flight transaction rolls it back
                warn!(tenant_id = %tenant_id, deadline_ms = deadline.as_millis(), "Scoped transaction exceeded deadline");
                Err(StoreError::Timeout(deadline))
            }
        }
    }

    #[instrument(
        skip(self, statement_timeout, work),
        fields(db.system = "postgresql", tenant_id = %tenant_id)
    )]
    async fn execute<F, T>(
        &self,
        tenant_id: TenantId,
        statement_timeout: Option<Duration>,
        work: F,
    ) -> Result<T, StoreError>
    where
        F: for<'c> FnOnce(&'c mut ScopedTx) -> BoxFuture<'c, Result<T, StoreError>> + Send,
        T: Send,
    {
        let start = Instant::now();

        let tx = self.pool.begin().await.map_err(StoreError::TenantScope)?;
        let mut scoped = ScopedTx { tx, tenant_id };
        scoped
            .bind(statement_timeout)
            .await
            .map_err(StoreError::TenantScope)?;

        let result = match work(&mut scoped).await {
            Ok(value) => match scoped.tx.commit().await {
                Ok(()) => Ok(value),
                Err(err) => Err(StoreError::from(err)),
            },
            Err(err) => {
                if let Err(rollback_err) = scoped.tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback of scoped transaction failed");
                }
                Err(err)
            }
        };

        let elapsed = start.elapsed();
        if elapsed > SLOW_OPERATION_THRESHOLD {
            warn!(
                tenant_id = %tenant_id,
                duration_ms = elapsed.as_millis(),
                "Slow database operation detected"
            );
        } else {
            debug!(duration_ms = elapsed.as_millis(), "Scoped transaction finished");
        }

        result
    }
}
