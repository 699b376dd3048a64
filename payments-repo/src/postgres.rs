//! PostgreSQL repository adapter.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use payments_types::{
    PaymentIntent, PaymentRepository, ReceiptInsertOutcome, ReceiptRecord, ReceiptRepository,
    RepoError, TokenFingerprint, UsedToken,
};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository. Replay protection relies on the unique constraint
/// on `used_payment_tokens.token_fingerprint`, never on a prior read.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_payment_tables_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_reconciliation_receipts_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment store
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for PostgresRepo {
    async fn is_token_used(&self, fingerprint: &TokenFingerprint) -> Result<bool, RepoError> {
        let row: (bool,) = sqlx::query_as(
            r#"SELECT EXISTS(SELECT 1 FROM used_payment_tokens WHERE token_fingerprint = $1)"#,
        )
        .bind(fingerprint.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(row.0)
    }

    async fn record_payment(
        &self,
        intent: &PaymentIntent,
        used_token: &UsedToken,
    ) -> Result<(), RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let claimed = sqlx::query(
            r#"INSERT INTO used_payment_tokens (id, token_fingerprint, order_id, created_at)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (token_fingerprint) DO NOTHING"#,
        )
        .bind(used_token.id)
        .bind(used_token.fingerprint.as_str())
        .bind(used_token.order_id.as_uuid())
        .bind(used_token.created_at)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if claimed.rows_affected() == 0 {
            tracing::warn!(
                fingerprint = used_token.fingerprint.short(),
                order_id = %used_token.order_id,
                "payment token fingerprint already recorded, rolling back"
            );
            db_tx
                .rollback()
                .await
                .map_err(|e| RepoError::Transaction(e.to_string()))?;
            return Err(RepoError::Conflict("payment token already used".into()));
        }

        sqlx::query(
            r#"INSERT INTO payment_intents
               (id, order_id, amount, currency, status, signed_receipt, receipt_payload, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(intent.id.as_uuid())
        .bind(intent.order_id.as_uuid())
        .bind(intent.amount)
        .bind(intent.currency.as_str())
        .bind(intent.status.as_str())
        .bind(&intent.signed_receipt)
        .bind(&intent.receipt_payload)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&mut *db_tx)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settlement store
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ReceiptRepository for PostgresRepo {
    async fn store_receipt(
        &self,
        record: &ReceiptRecord,
    ) -> Result<ReceiptInsertOutcome, RepoError> {
        let result = sqlx::query(
            r#"INSERT INTO reconciliation_receipts
               (id, order_id, psp_reference, signature, payload, status, created_at, processed_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT (signature) DO NOTHING"#,
        )
        .bind(record.id)
        .bind(&record.order_id)
        .bind(&record.psp_reference)
        .bind(&record.signature)
        .bind(&record.payload)
        .bind(&record.status)
        .bind(record.created_at)
        .bind(record.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(ReceiptInsertOutcome::Duplicate);
        }
        Ok(ReceiptInsertOutcome::Stored)
    }
}
