use chrono::{DateTime, NaiveDate, Utc};
use expensa_core::{Amount, CurrencyCode, Expense, ExpenseStatus, NewExpense};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("corrupt expense row {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("amount {0} does not fit in cents")]
    AmountOutOfRange(String),
}

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT,
            merchant TEXT NOT NULL,
            receipt_url TEXT,
            status TEXT NOT NULL DEFAULT 'draft'
                CHECK (status IN ('draft', 'submitted', 'approved', 'rejected')),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_expenses_status ON expenses(status)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn insert_expense(pool: &DbPool, new: &NewExpense) -> Result<Expense, StorageError> {
    let cents = new
        .amount
        .to_cents()
        .ok_or_else(|| StorageError::AmountOutOfRange(new.amount.to_string()))?;
    let expense = Expense::from_new(Uuid::new_v4().to_string(), new.clone(), Utc::now());

    sqlx::query(
        "INSERT INTO expenses (id, amount_cents, currency, date, description, category, merchant, receipt_url, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&expense.id)
    .bind(cents)
    .bind(expense.currency.as_str())
    .bind(expense.date.to_string())
    .bind(&expense.description)
    .bind(&expense.category)
    .bind(&expense.merchant)
    .bind(&expense.receipt_url)
    .bind(expense.status.to_string())
    .bind(expense.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    debug!(id = %expense.id, amount = %expense.amount, "expense inserted");
    Ok(expense)
}

type ExpenseRow = (
    String,
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
);

const SELECT_EXPENSE: &str = "SELECT id, amount_cents, currency, date, description, category, merchant, receipt_url, status, created_at FROM expenses";

pub async fn get_expense(pool: &DbPool, id: &str) -> Result<Option<Expense>, StorageError> {
    let row = sqlx::query_as::<_, ExpenseRow>(&format!("{SELECT_EXPENSE} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_expense).transpose()
}

/// All expenses in insertion order, optionally restricted to one status.
pub async fn list_expenses(
    pool: &DbPool,
    status: Option<ExpenseStatus>,
) -> Result<Vec<Expense>, StorageError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, ExpenseRow>(&format!(
                "{SELECT_EXPENSE} WHERE status = ? ORDER BY created_at, rowid"
            ))
            .bind(status.to_string())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, ExpenseRow>(&format!("{SELECT_EXPENSE} ORDER BY created_at, rowid"))
                .fetch_all(pool)
                .await?
        }
    };

    rows.into_iter().map(row_to_expense).collect()
}

/// Returns `false` when no expense has the given id.
pub async fn update_expense_status(
    pool: &DbPool,
    id: &str,
    status: ExpenseStatus,
) -> Result<bool, StorageError> {
    let result = sqlx::query("UPDATE expenses SET status = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn row_to_expense(r: ExpenseRow) -> Result<Expense, StorageError> {
    let id = r.0;
    let corrupt = |reason: String| StorageError::Corrupt { id: id.clone(), reason };

    let currency = CurrencyCode::new(&r.2).map_err(|e| corrupt(e.to_string()))?;
    let date = NaiveDate::parse_from_str(&r.3, "%Y-%m-%d").map_err(|e| corrupt(e.to_string()))?;
    let status = r.8.parse::<ExpenseStatus>().map_err(corrupt)?;
    let created_at = DateTime::parse_from_rfc3339(&r.9)
        .map_err(|e| corrupt(e.to_string()))?
        .with_timezone(&Utc);

    Ok(Expense {
        amount: Amount::from_cents(r.1),
        currency,
        date,
        description: r.4,
        category: r.5,
        merchant: r.6,
        receipt_url: r.7,
        status,
        created_at,
        id,
    })
}
