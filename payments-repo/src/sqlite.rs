//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use payments_types::{
    PaymentIntent, PaymentRepository, ReceiptInsertOutcome, ReceiptRecord, ReceiptRepository,
    RepoError, TokenFingerprint, UsedToken,
};

const MIGRATIONS: [(&str, &str); 2] = [
    (
        "0001",
        include_str!("../migrations/0001_create_payment_tables.sql"),
    ),
    (
        "0002",
        include_str!("../migrations/0002_create_reconciliation_receipts.sql"),
    ),
];

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure on-disk SQLite target directory exists.
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if !in_memory {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to :memory: is its own database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.create_schema().await?;
        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema.
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        for (name, sql) in MIGRATIONS {
            for statement in sql.split(';') {
                let stmt = statement.trim();
                if stmt.is_empty() {
                    continue;
                }
                sqlx::query(stmt)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| RepoError::Database(format!("migration {}: {}", name, e)))?;
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment store
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for SqliteRepo {
    async fn is_token_used(&self, fingerprint: &TokenFingerprint) -> Result<bool, RepoError> {
        let row: Option<(i64,)> =
            sqlx::query_as(r#"SELECT 1 FROM used_payment_tokens WHERE token_fingerprint = ?"#)
                .bind(fingerprint.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(row.is_some())
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

        // The unique fingerprint decides which concurrent payment wins.
        let claimed = sqlx::query(
            r#"INSERT INTO used_payment_tokens (id, token_fingerprint, order_id, created_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (token_fingerprint) DO NOTHING"#,
        )
        .bind(used_token.id.to_string())
        .bind(used_token.fingerprint.as_str())
        .bind(used_token.order_id.to_string())
        .bind(used_token.created_at.to_rfc3339())
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
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(intent.id.to_string())
        .bind(intent.order_id.to_string())
        .bind(intent.amount)
        .bind(intent.currency.as_str())
        .bind(intent.status.as_str())
        .bind(&intent.signed_receipt)
        .bind(intent.receipt_payload.to_string())
        .bind(intent.created_at.to_rfc3339())
        .bind(intent.updated_at.to_rfc3339())
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
impl ReceiptRepository for SqliteRepo {
    async fn store_receipt(
        &self,
        record: &ReceiptRecord,
    ) -> Result<ReceiptInsertOutcome, RepoError> {
        let result = sqlx::query(
            r#"INSERT INTO reconciliation_receipts
               (id, order_id, psp_reference, signature, payload, status, created_at, processed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (signature) DO NOTHING"#,
        )
        .bind(record.id.to_string())
        .bind(&record.order_id)
        .bind(&record.psp_reference)
        .bind(&record.signature)
        .bind(record.payload.to_string())
        .bind(&record.status)
        .bind(record.created_at.to_rfc3339())
        .bind(record.processed_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(ReceiptInsertOutcome::Duplicate);
        }
        Ok(ReceiptInsertOutcome::Stored)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Read-back helpers for tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod read_back {
    use payments_types::{OrderId, PaymentIntent, PaymentIntentId, ReceiptRecord, RepoError};

    use super::SqliteRepo;
    use crate::types::{DbPaymentIntent, DbReceiptRecord};

    const INTENT_COLUMNS: &str = "id, order_id, amount, currency, status, signed_receipt, \
         receipt_payload, created_at, updated_at";

    const RECEIPT_COLUMNS: &str =
        "id, order_id, psp_reference, signature, payload, status, created_at, processed_at";

    impl SqliteRepo {
        pub(crate) async fn get_payment_intent(
            &self,
            id: PaymentIntentId,
        ) -> Result<Option<PaymentIntent>, RepoError> {
            let row: Option<DbPaymentIntent> = sqlx::query_as(&format!(
                "SELECT {} FROM payment_intents WHERE id = ?",
                INTENT_COLUMNS
            ))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

            row.map(DbPaymentIntent::into_domain).transpose()
        }

        pub(crate) async fn list_payment_intents_for_order(
            &self,
            order_id: OrderId,
        ) -> Result<Vec<PaymentIntent>, RepoError> {
            let rows: Vec<DbPaymentIntent> = sqlx::query_as(&format!(
                "SELECT {} FROM payment_intents WHERE order_id = ? ORDER BY created_at ASC",
                INTENT_COLUMNS
            ))
            .bind(order_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

            rows.into_iter().map(DbPaymentIntent::into_domain).collect()
        }

        pub(crate) async fn find_receipt_by_signature(
            &self,
            signature: &str,
        ) -> Result<Option<ReceiptRecord>, RepoError> {
            let row: Option<DbReceiptRecord> = sqlx::query_as(&format!(
                "SELECT {} FROM reconciliation_receipts WHERE signature = ?",
                RECEIPT_COLUMNS
            ))
            .bind(signature)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

            row.map(DbReceiptRecord::into_domain).transpose()
        }

        pub(crate) async fn list_receipts_for_order(
            &self,
            order_id: &str,
        ) -> Result<Vec<ReceiptRecord>, RepoError> {
            let rows: Vec<DbReceiptRecord> = sqlx::query_as(&format!(
                "SELECT {} FROM reconciliation_receipts WHERE order_id = ? ORDER BY created_at ASC",
                RECEIPT_COLUMNS
            ))
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

            rows.into_iter().map(DbReceiptRecord::into_domain).collect()
        }
    }
}
