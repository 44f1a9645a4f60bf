//! PostgreSQL LedgerStore implementation.
//!
//! Holds two pools: `primary` for the create unit of work and `replica` for
//! reads. Without a configured replica both handles point at the same pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_query::{Expr, Order, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::config::PostgresConfig;
use crate::model::{NewTransaction, Transaction, TransactionWindow, UserBalance, UserId};
use crate::storage::schema::{Transactions, Users};
use crate::storage::{LedgerStore, Result, StorageError};

/// PostgreSQL implementation of LedgerStore.
pub struct PostgresLedgerStore {
    primary: PgPool,
    replica: PgPool,
}

impl PostgresLedgerStore {
    /// Create a store over separate primary and replica pools.
    pub fn new(primary: PgPool, replica: PgPool) -> Self {
        Self { primary, replica }
    }

    /// Create a store where reads and writes share one pool.
    pub fn single(pool: PgPool) -> Self {
        Self::new(pool.clone(), pool)
    }

    /// Connect pools as described by configuration.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let primary = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.primary_uri)
            .await?;
        info!("Connected to PostgreSQL primary");

        let replica = match config.replica_uri.as_deref() {
            Some(uri) if !uri.is_empty() => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(uri)
                    .await?;
                info!("Connected to PostgreSQL replica");
                pool
            }
            _ => {
                info!("No replica configured, reads use the primary");
                primary.clone()
            }
        };

        Ok(Self::new(primary, replica))
    }

    /// Apply embedded migrations against the primary.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("migrations/postgres")
            .run(&self.primary)
            .await?;
        Ok(())
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool> {
        let (sql, values) = Query::select()
            .column(Users::Id)
            .from(Users::Table)
            .and_where(Expr::col(Users::Id).eq(user_id))
            .build_sqlx(PostgresQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.replica)
            .await?;

        Ok(row.is_some())
    }
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction> {
    let datetime: DateTime<Utc> = row.try_get("datetime")?;
    let amount: Decimal = row.try_get("amount")?;

    Ok(Transaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        datetime,
        amount,
    })
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn create_transaction(&self, new: &NewTransaction) -> Result<Transaction> {
        if !self.user_exists(new.user_id).await? {
            return Err(StorageError::UserNotFound {
                user_id: new.user_id,
            });
        }

        // An uncommitted sqlx transaction rolls back on drop, which covers
        // every early return below as well as a cancelled request future.
        let mut tx = self.primary.begin().await?;

        let (sql, values) = Query::insert()
            .into_table(Transactions::Table)
            .columns([
                Transactions::UserId,
                Transactions::Datetime,
                Transactions::Amount,
            ])
            .values_panic([
                new.user_id.into(),
                new.datetime.into(),
                new.amount.into(),
            ])
            .returning(Query::returning().columns([
                Transactions::Id,
                Transactions::UserId,
                Transactions::Datetime,
                Transactions::Amount,
            ]))
            .build_sqlx(PostgresQueryBuilder);

        let row = sqlx::query_with(&sql, values).fetch_one(&mut *tx).await?;
        let created = row_to_transaction(&row)?;

        // Single-statement increment: the row lock serializes concurrent
        // deposits for the same user.
        let (sql, values) = Query::update()
            .table(Users::Table)
            .value(Users::Balance, Expr::col(Users::Balance).add(new.amount))
            .and_where(Expr::col(Users::Id).eq(new.user_id))
            .build_sqlx(PostgresQueryBuilder);

        let updated = sqlx::query_with(&sql, values).execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            return Err(StorageError::UserNotFound {
                user_id: new.user_id,
            });
        }

        tx.commit().await?;

        debug!(
            user_id = new.user_id,
            transaction_id = created.id,
            "Recorded transaction"
        );
        Ok(created)
    }

    async fn list_transactions(&self, window: &TransactionWindow) -> Result<Vec<Transaction>> {
        let (sql, values) = Query::select()
            .columns([
                Transactions::Id,
                Transactions::UserId,
                Transactions::Datetime,
                Transactions::Amount,
            ])
            .from(Transactions::Table)
            .and_where(Expr::col(Transactions::UserId).eq(window.user_id))
            .and_where(Expr::col(Transactions::Datetime).gte(window.start))
            .and_where(Expr::col(Transactions::Datetime).lte(window.end))
            .order_by(Transactions::Datetime, Order::Asc)
            .order_by(Transactions::Id, Order::Asc)
            .build_sqlx(PostgresQueryBuilder);

        let rows = sqlx::query_with(&sql, values)
            .fetch_all(&self.replica)
            .await?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            transactions.push(row_to_transaction(&row)?);
        }

        Ok(transactions)
    }

    async fn get_balance(&self, user_id: UserId) -> Result<UserBalance> {
        let (sql, values) = Query::select()
            .column(Users::Balance)
            .from(Users::Table)
            .and_where(Expr::col(Users::Id).eq(user_id))
            .build_sqlx(PostgresQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.replica)
            .await?;

        match row {
            Some(row) => Ok(UserBalance {
                user_id,
                balance: row.try_get("balance")?,
            }),
            None => Err(StorageError::UserNotFound { user_id }),
        }
    }
}
