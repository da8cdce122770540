//! Relational storage backend
//!
//! Gauges and counters live in two tables keyed by name:
//!
//! ```sql
//! gauges(name TEXT PRIMARY KEY, value DOUBLE PRECISION)
//! counters(name TEXT PRIMARY KEY, value BIGINT)
//! ```
//!
//! ## Features
//!
//! - **Any driver**: the connection string picks PostgreSQL or SQLite
//! - **Migrations**: the schema is created on startup with sqlx
//! - **Server-side merge**: counters are summed inside the upsert, so
//!   concurrent writers never race on a read-modify-write
//! - **Retries**: connection exceptions are retried with backoff, logical
//!   errors (constraint violations, bad SQL) are returned immediately
//! - **Atomic batches**: `bulk_update` runs in a single transaction

use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::{Any, AnyArguments, AnyPoolOptions};
use sqlx::query::Query;
use sqlx::{AnyConnection, AnyPool, Connection, Executor, Statement, Transaction};
use tracing::{debug, info, instrument, warn};

use super::backend::{BulkUpdate, Ping, Storage, check_update};
use super::error::{StorageError, StorageResult};
use crate::metrics::{MetricKind, MetricValue, NamedMetric};
use crate::retry::RetryPolicy;

const GAUGE_UPSERT: &str = "INSERT INTO gauges (name, value) VALUES ($1, $2) \
     ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value";

const COUNTER_UPSERT: &str = "INSERT INTO counters (name, value) VALUES ($1, $2) \
     ON CONFLICT (name) DO UPDATE SET value = counters.value + EXCLUDED.value";

const SELECT_GAUGE: &str = "SELECT value FROM gauges WHERE name = $1";

const SELECT_COUNTER: &str = "SELECT value FROM counters WHERE name = $1";

const LIST_GAUGES: &str = "SELECT name, value FROM gauges ORDER BY name";

const LIST_COUNTERS: &str = "SELECT name, value FROM counters ORDER BY name";

const MAX_CONNECTIONS: u32 = 5;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Is this a transient, connection-level error worth retrying?
///
/// SQLSTATE class `08` (connection exception), I/O errors and pool acquire
/// timeouts qualify. Constraint violations, syntax errors and decode errors
/// never do.
pub fn is_connection_exception(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.starts_with("08")),
        _ => false,
    }
}

fn bind_metric<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    name: &'q str,
    value: MetricValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    let query = query.bind(name);
    match value {
        MetricValue::Gauge(v) => query.bind(v),
        MetricValue::Counter(delta) => query.bind(delta),
    }
}

fn upsert_for(value: &MetricValue) -> &'static str {
    match value {
        MetricValue::Gauge(_) => GAUGE_UPSERT,
        MetricValue::Counter(_) => COUNTER_UPSERT,
    }
}

/// Relational storage backend
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    pool: AnyPool,
    retry: RetryPolicy,
}

impl DatabaseStore {
    /// Connect with the default retry policy
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use metric_store::storage::database::DatabaseStore;
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = DatabaseStore::connect("postgres://metrics@localhost/metrics").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(dsn: &str) -> StorageResult<Self> {
        Self::connect_with(dsn, RetryPolicy::default()).await
    }

    /// Open the connection pool and apply pending migrations
    #[instrument(skip_all)]
    pub async fn connect_with(dsn: &str, retry: RetryPolicy) -> StorageResult<Self> {
        sqlx::any::install_default_drivers();

        // never log the full DSN, it may carry credentials
        let scheme = dsn.split(':').next().unwrap_or_default();
        info!("connecting to {} database", scheme);

        let pool = AnyPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(dsn)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self { pool, retry })
    }

    async fn fetch_gauge(&self, name: &str) -> Result<Option<f64>, sqlx::Error> {
        let pool = &self.pool;
        self.retry
            .run(
                move || {
                    sqlx::query_scalar::<_, f64>(SELECT_GAUGE)
                        .bind(name)
                        .fetch_optional(pool)
                },
                is_connection_exception,
            )
            .await
    }

    async fn fetch_counter(&self, name: &str) -> Result<Option<i64>, sqlx::Error> {
        let pool = &self.pool;
        self.retry
            .run(
                move || {
                    sqlx::query_scalar::<_, i64>(SELECT_COUNTER)
                        .bind(name)
                        .fetch_optional(pool)
                },
                is_connection_exception,
            )
            .await
    }

    /// Execute every upsert of the batch inside `tx`
    async fn apply_batch(tx: &mut AnyConnection, metrics: &[NamedMetric]) -> StorageResult<()> {
        let gauge_upsert = (&mut *tx)
            .prepare(GAUGE_UPSERT)
            .await
            .map_err(StorageError::database("prepare gauge upsert"))?;
        let counter_upsert = (&mut *tx)
            .prepare(COUNTER_UPSERT)
            .await
            .map_err(StorageError::database("prepare counter upsert"))?;

        for metric in metrics {
            check_update(&metric.name, &metric.value)?;

            let statement = match metric.value {
                MetricValue::Gauge(_) => &gauge_upsert,
                MetricValue::Counter(_) => &counter_upsert,
            };

            bind_metric(statement.query(), &metric.name, metric.value)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::database("bulk upsert"))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for DatabaseStore {
    fn backend_name(&self) -> &'static str {
        "database"
    }

    #[instrument(skip(self))]
    async fn get(&self, kind: MetricKind, name: &str) -> StorageResult<MetricValue> {
        let value = match kind {
            MetricKind::Gauge => self.fetch_gauge(name).await.map(|v| v.map(MetricValue::Gauge)),
            MetricKind::Counter => self
                .fetch_counter(name)
                .await
                .map(|v| v.map(MetricValue::Counter)),
        }
        .map_err(StorageError::database("select"))?;

        value.ok_or_else(|| StorageError::NotFound {
            kind,
            name: name.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn update(&self, name: &str, value: MetricValue) -> StorageResult<()> {
        check_update(name, &value)?;

        let pool = &self.pool;
        self.retry
            .run(
                move || bind_metric(sqlx::query(upsert_for(&value)), name, value).execute(pool),
                is_connection_exception,
            )
            .await
            .map_err(StorageError::database("upsert"))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self) -> StorageResult<Vec<NamedMetric>> {
        let pool = &self.pool;

        let gauges = self
            .retry
            .run(
                move || sqlx::query_as::<_, (String, f64)>(LIST_GAUGES).fetch_all(pool),
                is_connection_exception,
            )
            .await
            .map_err(StorageError::database("list gauges"))?;

        let counters = self
            .retry
            .run(
                move || sqlx::query_as::<_, (String, i64)>(LIST_COUNTERS).fetch_all(pool),
                is_connection_exception,
            )
            .await
            .map_err(StorageError::database("list counters"))?;

        let metrics: Vec<NamedMetric> = gauges
            .into_iter()
            .map(|(name, value)| NamedMetric::gauge(name, value))
            .chain(
                counters
                    .into_iter()
                    .map(|(name, delta)| NamedMetric::counter(name, delta)),
            )
            .collect();

        debug!("listed {} metrics", metrics.len());
        Ok(metrics)
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing database backend");
        self.pool.close().await;
        Ok(())
    }

    fn as_bulk_update(&self) -> Option<&dyn BulkUpdate> {
        Some(self)
    }

    fn as_ping(&self) -> Option<&dyn Ping> {
        Some(self)
    }
}

#[async_trait]
impl BulkUpdate for DatabaseStore {
    #[instrument(skip(self, metrics), fields(count = metrics.len()))]
    async fn bulk_update(&self, metrics: &[NamedMetric]) -> StorageResult<()> {
        if metrics.is_empty() {
            return Ok(());
        }

        let pool = &self.pool;
        let mut tx: Transaction<'static, Any> = self
            .retry
            .run(move || pool.begin(), is_connection_exception)
            .await
            .map_err(StorageError::database("begin transaction"))?;

        // an uncommitted transaction is also rolled back when dropped
        if let Err(e) = Self::apply_batch(&mut *tx, metrics).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("rollback failed: {}", rollback_err);
            }
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(StorageError::database("commit"))?;

        debug!("bulk update committed");
        Ok(())
    }
}

#[async_trait]
impl Ping for DatabaseStore {
    async fn ping(&self) -> StorageResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(StorageError::database("acquire connection"))?;

        conn.ping().await.map_err(StorageError::database("ping"))
    }
}
