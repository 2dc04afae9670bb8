use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub balance: i64,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserInsert {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
