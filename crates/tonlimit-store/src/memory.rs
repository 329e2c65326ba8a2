//! In-memory order store.
//!
//! Same conditional semantics as the SQL store. The per-entry write lock
//! taken by `DashMap::get_mut` makes each check-and-set atomic.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

use tonlimit_core::{
    Order, OrderId, OrderPatch, OrderStatus, StatusUpdate, UserRef, WalletId, WalletRecord,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{check_update, BoxFuture, OrderStore, StatusCount};

/// DashMap-backed order store.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: DashMap<OrderId, Order>,
    wallets: DashMap<WalletId, WalletRecord>,
    wallets_by_user: DashMap<UserRef, WalletId>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn apply_conditional(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> StoreResult<bool> {
        check_update(expected, update)?;
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.status != expected {
            return Ok(false);
        }
        order.apply_update(update, Utc::now())?;
        Ok(true)
    }

    fn missing_or_not_editable(&self, id: OrderId) -> StoreError {
        match self.orders.get(&id) {
            Some(order) => StoreError::NotEditable {
                id,
                status: order.status,
            },
            None => StoreError::NotFound(id),
        }
    }
}

impl OrderStore for MemoryOrderStore {
    fn list_by_status(&self, status: OrderStatus) -> BoxFuture<'_, StoreResult<Vec<Order>>> {
        Box::pin(async move {
            let mut orders: Vec<Order> = self
                .orders
                .iter()
                .filter(|entry| entry.status == status)
                .map(|entry| entry.value().clone())
                .collect();
            orders.sort_by_key(|o| o.created_at);
            Ok(orders)
        })
    }

    fn conditional_update(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: StatusUpdate,
    ) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let applied = self.apply_conditional(id, expected, &update)?;
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
            let Some(mut order) = self.orders.get_mut(&id) else {
                return Ok(false);
            };
            if order.status != expected {
                return Ok(false);
            }
            order.last_error = Some(message);
            order.updated_at = Utc::now();
            Ok(true)
        })
    }

    fn record_unresolved_poll(&self, id: OrderId) -> BoxFuture<'_, StoreResult<Option<u32>>> {
        Box::pin(async move {
            let Some(mut order) = self.orders.get_mut(&id) else {
                return Ok(None);
            };
            if order.status != OrderStatus::Pending {
                return Ok(None);
            }
            order.unresolved_polls = order.unresolved_polls.saturating_add(1);
            order.updated_at = Utc::now();
            Ok(Some(order.unresolved_polls))
        })
    }

    fn count_by_status(&self) -> BoxFuture<'_, StoreResult<Vec<StatusCount>>> {
        Box::pin(async move {
            let mut counts: HashMap<OrderStatus, u64> = HashMap::new();
            for entry in self.orders.iter() {
                *counts.entry(entry.status).or_default() += 1;
            }
            Ok(OrderStatus::ALL
                .iter()
                .map(|s| (*s, counts.get(s).copied().unwrap_or(0)))
                .collect())
        })
    }

    fn insert_order(&self, order: Order) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.orders.insert(order.id, order);
            Ok(())
        })
    }

    fn get_order(&self, id: OrderId) -> BoxFuture<'_, StoreResult<Option<Order>>> {
        Box::pin(async move { Ok(self.orders.get(&id).map(|o| o.value().clone())) })
    }

    fn list_for_wallet(&self, wallet_id: WalletId) -> BoxFuture<'_, StoreResult<Vec<Order>>> {
        Box::pin(async move {
            let mut orders: Vec<Order> = self
                .orders
                .iter()
                .filter(|entry| entry.wallet_id == wallet_id)
                .map(|entry| entry.value().clone())
                .collect();
            orders.sort_by_key(|o| o.created_at);
            Ok(orders)
        })
    }

    fn update_order(&self, id: OrderId, patch: OrderPatch) -> BoxFuture<'_, StoreResult<Order>> {
        Box::pin(async move {
            patch.validate()?;
            let Some(mut order) = self.orders.get_mut(&id) else {
                return Err(StoreError::NotFound(id));
            };
            if !order.is_editable() {
                return Err(StoreError::NotEditable {
                    id,
                    status: order.status,
                });
            }
            patch.apply(&mut order, Utc::now());
            Ok(order.clone())
        })
    }

    fn delete_order(&self, id: OrderId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            match self.orders.remove_if(&id, |_, order| order.is_editable()) {
                Some(_) => Ok(()),
                None => Err(self.missing_or_not_editable(id)),
            }
        })
    }

    fn insert_wallet(&self, wallet: WalletRecord) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            match self.wallets_by_user.entry(wallet.user) {
                Entry::Occupied(_) => Err(StoreError::DuplicateWallet(wallet.user)),
                Entry::Vacant(slot) => {
                    self.wallets.insert(wallet.id, wallet.clone());
                    slot.insert(wallet.id);
                    Ok(())
                }
            }
        })
    }

    fn get_wallet(&self, id: WalletId) -> BoxFuture<'_, StoreResult<Option<WalletRecord>>> {
        Box::pin(async move { Ok(self.wallets.get(&id).map(|w| w.value().clone())) })
    }

    fn wallet_for_user(&self, user: UserRef) -> BoxFuture<'_, StoreResult<Option<WalletRecord>>> {
        Box::pin(async move {
            let Some(id) = self.wallets_by_user.get(&user).map(|id| *id) else {
                return Ok(None);
            };
            Ok(self.wallets.get(&id).map(|w| w.value().clone()))
        })
    }
}
