use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::StoreError;
use crate::schema::{
    NewTransaction, NewWallet, Transaction, TransactionRow, TransactionStatus, Wallet,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Relational store for wallets and the append-only transaction log.
/// Every method is a single statement; nothing spans a provider call.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}
impl Database {
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // An in-memory database lives only as long as its connection.
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!().run(&pool).await?;
        log::debug!("Database ready at {}", database_url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- WALLETS ---

    /// Fails with `StoreError::DuplicateKey` when the student or the provider
    /// wallet is already mapped.
    pub async fn add_wallet(&self, wallet: &NewWallet) -> StoreResult<Wallet> {
        let saved = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (student_id, student_name, wallet_id, phone, email)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *;
            "#,
        )
        .bind(&wallet.student_id)
        .bind(&wallet.student_name)
        .bind(&wallet.wallet_id)
        .bind(&wallet.phone)
        .bind(&wallet.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateKey(format!(
                    "student_id={} or wallet_id={} already exists",
                    wallet.student_id, wallet.wallet_id
                ))
            }
            other => StoreError::Database(other),
        })?;
        log::debug!("Saved wallet to database: {:?}", saved);
        Ok(saved)
    }

    pub async fn get_wallet_by_student_id(&self, student_id: &str) -> StoreResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE student_id = ?")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(wallet)
    }

    pub async fn get_wallet_by_wallet_id(&self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE wallet_id = ?")
            .bind(wallet_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(wallet)
    }

    /// Writes the cached balance. Returns whether a wallet row was touched.
    pub async fn update_wallet_balance(&self, student_id: &str, balance: f64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = ?, updated_at = CURRENT_TIMESTAMP
            WHERE student_id = ?
            "#,
        )
        .bind(balance)
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Newest wallets first.
    pub async fn list_wallets(&self) -> StoreResult<Vec<Wallet>> {
        let wallets =
            sqlx::query_as::<_, Wallet>("SELECT * FROM wallets ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(wallets)
    }

    // --- TRANSACTIONS ---

    /// Appends a transaction and returns its row id.
    pub async fn add_transaction(&self, transaction: &NewTransaction) -> StoreResult<i64> {
        let metadata = transaction
            .metadata
            .as_ref()
            .map(|value| value.to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                transaction_id, type, student_id, from_student, to_student,
                amount, status, description, metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.transaction_id)
        .bind(transaction.kind)
        .bind(&transaction.student_id)
        .bind(&transaction.from_student)
        .bind(&transaction.to_student)
        .bind(transaction.amount)
        .bind(transaction.status)
        .bind(&transaction.description)
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        log::debug!("Saved {:?} transaction {} to database", transaction.kind, id);
        Ok(id)
    }

    /// Status-only patch keyed by the provider tracking id.
    pub async fn update_transaction_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE transactions SET status = ? WHERE transaction_id = ?")
            .bind(status)
            .bind(transaction_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_transaction(&self, id: i64) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Transaction::from))
    }

    /// Most recent `limit` transactions, newest first.
    pub async fn list_transactions(&self, limit: i64) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    /// Transactions where the student is the subject, the sender or the receiver.
    pub async fn list_transactions_for_student(
        &self,
        student_id: &str,
        limit: i64,
    ) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM transactions
            WHERE student_id = ? OR from_student = ? OR to_student = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(student_id)
        .bind(student_id)
        .bind(student_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }
}
