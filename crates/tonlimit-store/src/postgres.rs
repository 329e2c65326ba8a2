//! PostgreSQL order store.
//!
//! Conditional updates are single `UPDATE ... WHERE id = $1 AND status = $2`
//! statements; one affected row means the write won.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use tonlimit_core::{
    AssetRef, EncryptedSecret, Order, OrderId, OrderPatch, OrderStatus, Price, StatusUpdate,
    TxRef, UserRef, Volume, WalletId, WalletRecord,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{check_update, BoxFuture, OrderStore, StatusCount};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

const ORDER_COLUMNS: &str = "id, wallet_id, side, price, volume, asset, status, tx_ref, \
     unresolved_polls, last_error, created_at, updated_at";

const WALLET_COLUMNS: &str =
    "id, user_ref, address, encrypted_secret_key, encrypted_mnemonic, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    wallet_id: Uuid,
    side: String,
    price: Decimal,
    volume: Decimal,
    asset: String,
    status: String,
    tx_ref: Option<String>,
    unresolved_polls: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = move |e: tonlimit_core::CoreError| StoreError::Corrupt(format!("order {id}: {e}"));
        Ok(Order {
            id: OrderId(id),
            wallet_id: WalletId(row.wallet_id),
            side: row.side.parse().map_err(corrupt)?,
            price: Price::new(row.price),
            volume: Volume::new(row.volume),
            asset: AssetRef::new(row.asset).map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            tx_ref: row.tx_ref.map(TxRef::new),
            unresolved_polls: u32::try_from(row.unresolved_polls).unwrap_or(0),
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WalletRow {
    id: Uuid,
    user_ref: i64,
    address: String,
    encrypted_secret_key: String,
    encrypted_mnemonic: String,
    created_at: DateTime<Utc>,
}

impl From<WalletRow> for WalletRecord {
    fn from(row: WalletRow) -> Self {
        WalletRecord {
            id: WalletId(row.id),
            user: UserRef(row.user_ref),
            address: row.address,
            encrypted_secret_key: EncryptedSecret::new(row.encrypted_secret_key),
            encrypted_mnemonic: EncryptedSecret::new(row.encrypted_mnemonic),
            created_at: row.created_at,
        }
    }
}

fn into_orders(rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        info!(max_connections, "Connected to Postgres");
        Ok(Self { pool })
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        debug!("Schema applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn missing_or_not_editable(&self, id: OrderId) -> StoreError {
        let status: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await;
        match status {
            Ok(Some(status)) => match status.parse::<OrderStatus>() {
                Ok(status) => StoreError::NotEditable { id, status },
                Err(e) => StoreError::Corrupt(format!("order {id}: {e}")),
            },
            Ok(None) => StoreError::NotFound(id),
            Err(e) => StoreError::Database(e),
        }
    }
}

impl OrderStore for PgOrderStore {
    fn list_by_status(&self, status: OrderStatus) -> BoxFuture<'_, StoreResult<Vec<Order>>> {
        Box::pin(async move {
            let sql =
                format!("SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at");
            let rows: Vec<OrderRow> = sqlx::query_as(&sql)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?;
            into_orders(rows)
        })
    }

    fn conditional_update(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: StatusUpdate,
    ) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            check_update(expected, &update)?;
            let result = sqlx::query(
                r#"
                UPDATE orders
                SET status = $3,
                    tx_ref = COALESCE($4, tx_ref),
                    last_error = COALESCE($5, last_error),
                    updated_at = NOW()
                WHERE id = $1
                  AND status = $2
                "#,
            )
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(update.status.as_str())
            .bind(update.tx_ref.as_ref().map(TxRef::as_str))
            .bind(update.last_error.as_deref())
            .execute(&self.pool)
            .await?;

            let applied = result.rows_affected() == 1;
            debug!(order_id = %id, %expected, to = %update.status, applied, "Conditional update");
            Ok(applied)
        })
    }

    fn record_error(
        &self,
        id: OrderId,
        expected: OrderStatus,
        message: String,
    ) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE orders SET last_error = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
            )
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(&message)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() == 1)
        })
    }

    fn record_unresolved_poll(&self, id: OrderId) -> BoxFuture<'_, StoreResult<Option<u32>>> {
        Box::pin(async move {
            let count: Option<i32> = sqlx::query_scalar(
                r#"
                UPDATE orders
                SET unresolved_polls = unresolved_polls + 1,
                    updated_at = NOW()
                WHERE id = $1
                  AND status = 'PENDING'
                RETURNING unresolved_polls
                "#,
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
            Ok(count.map(|n| u32::try_from(n).unwrap_or(0)))
        })
    }

    fn count_by_status(&self) -> BoxFuture<'_, StoreResult<Vec<StatusCount>>> {
        Box::pin(async move {
            let rows: Vec<(String, i64)> =
                sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
                    .fetch_all(&self.pool)
                    .await?;
            let mut counts: Vec<StatusCount> =
                OrderStatus::ALL.iter().map(|s| (*s, 0)).collect();
            for (status, n) in rows {
                let status: OrderStatus = status
                    .parse()
                    .map_err(|e| StoreError::Corrupt(format!("status count: {e}")))?;
                if let Some(slot) = counts.iter_mut().find(|(s, _)| *s == status) {
                    slot.1 = u64::try_from(n).unwrap_or(0);
                }
            }
            Ok(counts)
        })
    }

    fn insert_order(&self, order: Order) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO orders
                    (id, wallet_id, side, price, volume, asset, status, tx_ref,
                     unresolved_polls, last_error, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(order.wallet_id.0)
            .bind(order.side.as_str())
            .bind(order.price.inner())
            .bind(order.volume.inner())
            .bind(order.asset.as_str())
            .bind(order.status.as_str())
            .bind(order.tx_ref.as_ref().map(TxRef::as_str))
            .bind(i32::try_from(order.unresolved_polls).unwrap_or(i32::MAX))
            .bind(order.last_error.as_deref())
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn get_order(&self, id: OrderId) -> BoxFuture<'_, StoreResult<Option<Order>>> {
        Box::pin(async move {
            let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
            let row: Option<OrderRow> = sqlx::query_as(&sql)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
            row.map(Order::try_from).transpose()
        })
    }

    fn list_for_wallet(&self, wallet_id: WalletId) -> BoxFuture<'_, StoreResult<Vec<Order>>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE wallet_id = $1 ORDER BY created_at"
            );
            let rows: Vec<OrderRow> = sqlx::query_as(&sql)
                .bind(wallet_id.0)
                .fetch_all(&self.pool)
                .await?;
            into_orders(rows)
        })
    }

    fn update_order(&self, id: OrderId, patch: OrderPatch) -> BoxFuture<'_, StoreResult<Order>> {
        Box::pin(async move {
            patch.validate()?;
            let sql = format!(
                r#"
                UPDATE orders
                SET price = COALESCE($2, price),
                    volume = COALESCE($3, volume),
                    asset = COALESCE($4, asset),
                    updated_at = NOW()
                WHERE id = $1
                  AND status = 'CREATED'
                RETURNING {ORDER_COLUMNS}
                "#
            );
            let row: Option<OrderRow> = sqlx::query_as(&sql)
                .bind(id.as_uuid())
                .bind(patch.price.map(|p| p.inner()))
                .bind(patch.volume.map(|v| v.inner()))
                .bind(patch.asset.as_ref().map(AssetRef::as_str))
                .fetch_optional(&self.pool)
                .await?;
            match row {
                Some(row) => Order::try_from(row),
                None => Err(self.missing_or_not_editable(id).await),
            }
        })
    }

    fn delete_order(&self, id: OrderId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND status = 'CREATED'")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 1 {
                Ok(())
            } else {
                Err(self.missing_or_not_editable(id).await)
            }
        })
    }

    fn insert_wallet(&self, wallet: WalletRecord) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO wallets
                    (id, user_ref, address, encrypted_secret_key, encrypted_mnemonic, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (user_ref) DO NOTHING
                "#,
            )
            .bind(wallet.id.0)
            .bind(wallet.user.0)
            .bind(&wallet.address)
            .bind(wallet.encrypted_secret_key.as_str())
            .bind(wallet.encrypted_mnemonic.as_str())
            .bind(wallet.created_at)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::DuplicateWallet(wallet.user));
            }
            Ok(())
        })
    }

    fn get_wallet(&self, id: WalletId) -> BoxFuture<'_, StoreResult<Option<WalletRecord>>> {
        Box::pin(async move {
            let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1");
            let row: Option<WalletRow> = sqlx::query_as(&sql)
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(WalletRecord::from))
        })
    }

    fn wallet_for_user(&self, user: UserRef) -> BoxFuture<'_, StoreResult<Option<WalletRecord>>> {
        Box::pin(async move {
            let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_ref = $1");
            let row: Option<WalletRow> = sqlx::query_as(&sql)
                .bind(user.0)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(WalletRecord::from))
        })
    }
}
