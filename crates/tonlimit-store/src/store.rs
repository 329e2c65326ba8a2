//! Store contract shared by the engine and the order API.

use std::pin::Pin;
use std::sync::Arc;

use tonlimit_core::{
    Order, OrderId, OrderPatch, OrderStatus, StatusUpdate, UserRef, WalletId, WalletRecord,
};

use crate::error::{StoreError, StoreResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Number of orders currently in one status.
pub type StatusCount = (OrderStatus, u64);

/// Durable order and wallet records.
///
/// Status writes go through [`OrderStore::conditional_update`] only. A write
/// whose expected status no longer matches affects nothing and returns
/// `false`; that is a normal outcome, not an error.
pub trait OrderStore: Send + Sync {
    // ========================================================================
    // Engine operations
    // ========================================================================

    /// All orders currently in `status`.
    fn list_by_status(&self, status: OrderStatus) -> BoxFuture<'_, StoreResult<Vec<Order>>>;

    /// Apply `update` only if the order is still in `expected`.
    ///
    /// Returns `Ok(false)` when the order is gone or has moved on.
    /// Returns `IllegalTransition` without touching storage when
    /// `expected -> update.status` is not an edge of the order state graph.
    fn conditional_update(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: StatusUpdate,
    ) -> BoxFuture<'_, StoreResult<bool>>;

    /// Record `message` as the order's last error, status unchanged.
    fn record_error(
        &self,
        id: OrderId,
        expected: OrderStatus,
        message: String,
    ) -> BoxFuture<'_, StoreResult<bool>>;

    /// Increment the unresolved poll counter of a PENDING order.
    ///
    /// Returns the new count, or `None` if the order is no longer PENDING.
    fn record_unresolved_poll(&self, id: OrderId) -> BoxFuture<'_, StoreResult<Option<u32>>>;

    /// Order count per status, for gauges.
    fn count_by_status(&self) -> BoxFuture<'_, StoreResult<Vec<StatusCount>>>;

    // ========================================================================
    // Management operations
    // ========================================================================

    fn insert_order(&self, order: Order) -> BoxFuture<'_, StoreResult<()>>;

    fn get_order(&self, id: OrderId) -> BoxFuture<'_, StoreResult<Option<Order>>>;

    fn list_for_wallet(&self, wallet_id: WalletId) -> BoxFuture<'_, StoreResult<Vec<Order>>>;

    /// Patch price, volume or asset. Fails with `NotEditable` unless CREATED.
    fn update_order(&self, id: OrderId, patch: OrderPatch) -> BoxFuture<'_, StoreResult<Order>>;

    /// Delete an order. Fails with `NotEditable` unless CREATED.
    fn delete_order(&self, id: OrderId) -> BoxFuture<'_, StoreResult<()>>;

    fn insert_wallet(&self, wallet: WalletRecord) -> BoxFuture<'_, StoreResult<()>>;

    fn get_wallet(&self, id: WalletId) -> BoxFuture<'_, StoreResult<Option<WalletRecord>>>;

    fn wallet_for_user(&self, user: UserRef) -> BoxFuture<'_, StoreResult<Option<WalletRecord>>>;
}

pub type DynOrderStore = Arc<dyn OrderStore>;

/// Validate a status update against the state graph before it is applied.
///
/// A claim (CREATED -> PENDING) must carry the transaction reference, and
/// no other edge may set one.
pub fn check_update(expected: OrderStatus, update: &StatusUpdate) -> StoreResult<()> {
    let illegal = StoreError::IllegalTransition {
        from: expected,
        to: update.status,
    };
    if !expected.can_transition_to(update.status) {
        return Err(illegal);
    }
    let is_claim = expected == OrderStatus::Created && update.status == OrderStatus::Pending;
    if is_claim != update.tx_ref.is_some() {
        return Err(illegal);
    }
    Ok(())
}
