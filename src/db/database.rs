use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::CONFIG;
use crate::db::models::{TransactionRow, UserInsert, UserRow};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn init(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (\
                id INTEGER PRIMARY KEY,\
                username TEXT,\
                full_name TEXT,\
                balance INTEGER NOT NULL DEFAULT 0,\
                is_premium INTEGER NOT NULL DEFAULT 0,\
                created_at TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transactions (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                user_id INTEGER NOT NULL,\
                amount INTEGER NOT NULL,\
                description TEXT NOT NULL,\
                created_at TEXT NOT NULL,\
                FOREIGN KEY(user_id) REFERENCES users(id)\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON transactions(user_id);",
        )
        .execute(&pool)
        .await?;

        info!("Database tables created successfully");

        Ok(Database { pool })
    }

    pub async fn ensure_user(&self, insert: UserInsert) -> Result<()> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO users (id, username, full_name, balance, is_premium, created_at) \
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(insert.id)
        .bind(&insert.username)
        .bind(&insert.full_name)
        .bind(CONFIG.trial_credits)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!(
                "Registered user {} with {} trial credit(s)",
                insert.id, CONFIG.trial_credits
            );
            sqlx::query(
                "INSERT INTO transactions (user_id, amount, description, created_at) \
                 VALUES (?, ?, 'Trial credits', ?)",
            )
            .bind(insert.id)
            .bind(CONFIG.trial_credits)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("UPDATE users SET username = ?, full_name = ? WHERE id = ?")
                .bind(&insert.username)
                .bind(&insert.full_name)
                .bind(insert.id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, full_name, balance, is_premium, created_at \
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_balance(&self, user_id: i64) -> Result<Option<i64>> {
        let balance = sqlx::query_scalar::<_, i64>("SELECT balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance)
    }

    pub async fn recent_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<TransactionRow>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, amount, description, created_at \
             FROM transactions WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // Deducts atomically; the conditional UPDATE is the balance check.
    pub async fn try_charge(&self, user_id: i64, amount: i64, description: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let charged = sqlx::query("UPDATE users SET balance = balance - ? WHERE id = ? AND balance >= ?")
            .bind(amount)
            .bind(user_id)
            .bind(amount)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !charged {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO transactions (user_id, amount, description, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(-amount)
        .bind(description)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
