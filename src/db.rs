use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::domain::{Month, Purchase};
use crate::error::{Error, Result};

const TABLE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS purchases (
        id       TEXT PRIMARY KEY,
        date     DATE NOT NULL,
        amount   INTEGER NOT NULL,
        account  TEXT NOT NULL,
        category TEXT NOT NULL,
        location TEXT NOT NULL,
        vendor   TEXT NOT NULL
    )
";

/// Opens the database and applies the schema. The initial connection is
/// retried a few times with increasing backoff so the service survives the
/// database volume coming up after the process does.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let mut pool = SqlitePool::connect_with(options.clone()).await;
    for attempt in 2u64..=4 {
        if pool.is_ok() {
            break;
        }
        let backoff = attempt * attempt;
        tracing::info!("sleeping {} seconds and retrying connection to db", backoff);
        tokio::time::sleep(Duration::from_secs(backoff)).await;
        pool = SqlitePool::connect_with(options.clone()).await;
    }
    let pool = pool?;

    sqlx::query(TABLE_SCHEMA).execute(&pool).await?;
    Ok(pool)
}

/// Saves a batch of purchases in one parameterized statement. Rows whose
/// `id` already exists are left untouched, so retrying a batch with
/// overlapping IDs is safe and produces no duplicates.
pub async fn add_purchases(pool: &SqlitePool, purchases: &[Purchase]) -> Result<()> {
    if purchases.is_empty() {
        return Err(Error::InvalidArgument("no purchases provided".to_string()));
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "INSERT INTO purchases (id, date, amount, account, category, location, vendor) ",
    );
    query.push_values(purchases, |mut row, purchase| {
        row.push_bind(&purchase.id)
            .push_bind(purchase.date)
            .push_bind(purchase.amount)
            .push_bind(&purchase.account)
            .push_bind(&purchase.category)
            .push_bind(&purchase.location)
            .push_bind(&purchase.vendor);
    });
    query.push(" ON CONFLICT (id) DO NOTHING");

    query.build().execute(pool).await.inspect_err(|err| {
        tracing::error!(
            "Failed to insert batch of {} purchases: {}",
            purchases.len(),
            err
        );
    })?;
    Ok(())
}

/// Retrieves all purchases dated within the given month, i.e. in
/// `[first day of month, first day of next month)`. No order is
/// guaranteed; callers sort if they need to.
pub async fn query_purchases(pool: &SqlitePool, month: Month) -> Result<Vec<Purchase>> {
    let purchases = sqlx::query_as::<_, Purchase>(
        "
            SELECT id, date, amount, account, category, location, vendor
            FROM purchases
            WHERE date >= $1 AND date < $2
        ",
    )
    .bind(month.first_day())
    .bind(month.next().first_day())
    .fetch_all(pool)
    .await?;
    Ok(purchases)
}

pub async fn query_purchase(pool: &SqlitePool, id: &str) -> Result<Purchase> {
    sqlx::query_as::<_, Purchase>(
        "
            SELECT id, date, amount, account, category, location, vendor
            FROM purchases
            WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::NotFound)
}

/// Deletes one purchase. Reports `NotFound` when no row matched, distinct
/// from connectivity failures, so callers can answer 404.
pub async fn delete_purchase(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM purchases WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() < 1 {
        return Err(Error::NotFound);
    }
    Ok(())
}
