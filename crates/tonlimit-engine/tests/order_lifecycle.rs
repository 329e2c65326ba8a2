//! End-to-end order lifecycle against the in-memory store and mock adapters.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use tonlimit_core::{
    AssetRef, EncryptedSecret, NewOrder, Order, OrderId, OrderPatch, OrderSide, OrderStatus,
    Price, StatusUpdate, TxRef, TxStatus, UserRef, Volume, WalletId, WalletRecord,
};
use tonlimit_engine::{
    DispatchOutcome, Dispatcher, EngineAdapters, EngineConfig, OperatingMode, Scheduler,
};
use tonlimit_store::{DynOrderStore, MemoryOrderStore, OrderStore};
use tonlimit_wallet::{
    AdapterError, CustodyError, MockCustody, MockPriceOracle, MockSettlement, MockSwapAdapter,
    SubmissionError,
};

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    store: Arc<MemoryOrderStore>,
    oracle: Arc<MockPriceOracle>,
    custody: Arc<MockCustody>,
    swap: Arc<MockSwapAdapter>,
    settlement: Arc<MockSettlement>,
    scheduler: Scheduler,
}

fn test_config(mode: OperatingMode) -> EngineConfig {
    EngineConfig {
        mode,
        evaluate_interval_ms: 10,
        monitor_interval_ms: 10,
        tick_timeout_ms: 2_000,
        call_timeout_ms: 200,
        max_concurrency: 4,
        max_unresolved_polls: None,
    }
}

fn harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(MemoryOrderStore::new());
    let oracle = Arc::new(MockPriceOracle::new());
    let custody = Arc::new(MockCustody::new());
    let swap = Arc::new(MockSwapAdapter::new());
    let settlement = Arc::new(MockSettlement::new());

    let dyn_store: DynOrderStore = store.clone();
    let adapters = EngineAdapters {
        oracle: oracle.clone(),
        custody: custody.clone(),
        swap: swap.clone(),
        settlement: settlement.clone(),
    };
    let scheduler = Scheduler::build(config, dyn_store, adapters).unwrap();

    Harness {
        store,
        oracle,
        custody,
        swap,
        settlement,
        scheduler,
    }
}

fn harness() -> Harness {
    harness_with(test_config(OperatingMode::Trading))
}

fn asset(name: &str) -> AssetRef {
    AssetRef::new(name).unwrap()
}

impl Harness {
    async fn wallet(&self) -> WalletRecord {
        let wallet = WalletRecord::new(
            UserRef(7),
            "EQuser-wallet",
            EncryptedSecret::new("key-token"),
            EncryptedSecret::new("mnemonic-token"),
        );
        self.store.insert_wallet(wallet.clone()).await.unwrap();
        wallet
    }

    async fn order(
        &self,
        wallet_id: WalletId,
        side: OrderSide,
        price: Decimal,
        volume: Decimal,
        asset: &AssetRef,
    ) -> Order {
        let order = Order::from_new(
            NewOrder {
                wallet_id,
                side,
                price: Price::new(price),
                volume: Volume::new(volume),
                asset: asset.clone(),
            },
            Utc::now(),
        )
        .unwrap();
        self.store.insert_order(order.clone()).await.unwrap();
        order
    }

    async fn reload(&self, id: OrderId) -> Order {
        self.store.get_order(id).await.unwrap().unwrap()
    }

    /// Evaluate, then claim the order at a rate that triggers it.
    async fn pending_order(&self) -> Order {
        let wallet = self.wallet().await;
        let jetton = asset("EQjetton");
        self.oracle.set_rate(&jetton, dec!(1));
        let order = self
            .order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton)
            .await;
        self.scheduler.evaluator().run_tick().await.unwrap();
        let order = self.reload(order.id).await;
        assert_eq!(order.status, OrderStatus::Pending);
        order
    }
}

// ============================================================================
// Evaluation and dispatch
// ============================================================================

#[tokio::test]
async fn test_buy_order_claims_on_second_tick() {
    let h = harness();
    let wallet = h.wallet().await;
    let x = asset("EQx");
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2.0), dec!(5), &x).await;
    h.oracle.push_results(&x, [Ok(dec!(2.5)), Ok(dec!(1.8))]);

    let first = assert_ok!(h.scheduler.evaluator().run_tick().await);
    assert_eq!(first.evaluated, 1);
    assert_eq!(first.triggered, 0);
    let after_first = h.reload(order.id).await;
    assert_eq!(after_first.status, OrderStatus::Created);
    assert!(after_first.tx_ref.is_none());

    let second = assert_ok!(h.scheduler.evaluator().run_tick().await);
    assert_eq!(second.claimed, 1);
    let after_second = h.reload(order.id).await;
    assert_eq!(after_second.status, OrderStatus::Pending);
    assert_eq!(after_second.tx_ref, Some(TxRef::new("tx-1")));

    let submissions = h.swap.get_submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].idempotency_key, order.id);
    assert_eq!(submissions[0].side, OrderSide::Buy);
    assert_eq!(submissions[0].asset, x);
    assert_eq!(submissions[0].amount, Volume::new(dec!(5)));
}

#[tokio::test]
async fn test_buy_target_ten_triggers_at_nine_not_eleven() {
    let h = harness();
    let wallet = h.wallet().await;
    let cheap = asset("EQcheap");
    let dear = asset("EQdear");
    h.oracle.set_rate(&cheap, dec!(9));
    h.oracle.set_rate(&dear, dec!(11));
    let below = h.order(wallet.id, OrderSide::Buy, dec!(10), dec!(1), &cheap).await;
    let above = h.order(wallet.id, OrderSide::Buy, dec!(10), dec!(1), &dear).await;

    let summary = h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(summary.evaluated, 2);
    assert_eq!(summary.claimed, 1);
    assert_eq!(h.reload(below.id).await.status, OrderStatus::Pending);
    assert_eq!(h.reload(above.id).await.status, OrderStatus::Created);
}

#[tokio::test]
async fn test_sell_order_triggers_at_or_above_price() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.push_results(&jetton, [Ok(dec!(2.9)), Ok(dec!(3))]);
    let order = h.order(wallet.id, OrderSide::Sell, dec!(3), dec!(4), &jetton).await;

    h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Created);
    h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_unreached_condition_stays_created() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, dec!(3));
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    for _ in 0..5 {
        h.scheduler.evaluator().run_tick().await.unwrap();
    }
    let order = h.reload(order.id).await;
    assert_eq!(order.status, OrderStatus::Created);
    assert!(order.tx_ref.is_none());
    assert!(h.swap.get_submissions().is_empty());
    assert_eq!(h.oracle.get_calls().len(), 5);
}

#[tokio::test]
async fn test_edit_applies_on_next_tick() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, dec!(2.5));
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Created);

    let patch = OrderPatch {
        price: Some(Price::new(dec!(3))),
        volume: Some(Volume::new(dec!(7))),
        asset: None,
    };
    h.store.update_order(order.id, patch).await.unwrap();

    h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Pending);
    assert_eq!(h.swap.get_submissions()[0].amount, Volume::new(dec!(7)));
}

#[tokio::test]
async fn test_quote_failure_leaves_order_untouched() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle
        .push_results(&jetton, [Err(AdapterError::Unavailable("503".into()))]);
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    let summary = h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(summary.quote_failures, 1);
    let order = h.reload(order.id).await;
    assert_eq!(order.status, OrderStatus::Created);
    assert!(order.last_error.is_none());
}

#[tokio::test]
async fn test_non_positive_rate_never_triggers() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, Decimal::ZERO);
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    let summary = h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(summary.quote_failures, 1);
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Created);
}

#[tokio::test]
async fn test_slow_quote_times_out() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, dec!(1));
    h.oracle.set_delay(Some(Duration::from_millis(500)));
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    let summary = h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(summary.quote_failures, 1);
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Created);
    assert!(h.swap.get_submissions().is_empty());
}

fn slow_quote_config() -> EngineConfig {
    EngineConfig {
        tick_timeout_ms: 500,
        call_timeout_ms: 300,
        max_concurrency: 1,
        ..test_config(OperatingMode::Trading)
    }
}

/// Three dormant BUY orders ahead of one that triggers, every quote slow.
async fn dormant_ahead_of_trigger(h: &Harness) -> Order {
    let wallet = h.wallet().await;
    let dormant = asset("EQdormant");
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&dormant, dec!(100));
    h.oracle.set_rate(&jetton, dec!(1));
    h.oracle.set_delay(Some(Duration::from_millis(200)));
    for _ in 0..3 {
        h.order(wallet.id, OrderSide::Buy, dec!(1), dec!(5), &dormant).await;
    }
    h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await
}

#[tokio::test]
async fn test_budget_exhausted_tick_resumes_with_unquoted_orders() {
    let h = harness_with(slow_quote_config());
    let target = dormant_ahead_of_trigger(&h).await;

    let first = assert_ok!(h.scheduler.evaluator().run_tick().await);
    assert_eq!(first.evaluated, 3);
    assert_eq!(first.carried_over, 1);
    assert_eq!(first.quote_failures, 0);
    assert_eq!(h.reload(target.id).await.status, OrderStatus::Created);

    let second = assert_ok!(h.scheduler.evaluator().run_tick().await);
    assert_eq!(second.claimed, 1);
    let stored = h.reload(target.id).await;
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(h.swap.get_submissions()[0].idempotency_key, target.id);
}

#[tokio::test]
async fn test_scheduler_reaches_order_behind_slow_dormant_orders() {
    let h = harness_with(slow_quote_config());
    let target = dormant_ahead_of_trigger(&h).await;

    let Harness {
        store, scheduler, ..
    } = h;
    let shutdown = CancellationToken::new();
    let handle = Arc::new(scheduler).spawn(shutdown.clone());

    assert!(wait_for_status(&store, target.id, OrderStatus::Pending).await);

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_observation_mode_never_submits() {
    let h = harness_with(test_config(OperatingMode::Observation));
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, dec!(1));
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    let summary = h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(summary.triggered, 1);
    assert_eq!(summary.observed, 1);
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Created);
    assert_eq!(h.custody.restore_count(), 0);
    assert!(h.swap.get_submissions().is_empty());
}

// ============================================================================
// Dispatch failures
// ============================================================================

#[tokio::test]
async fn test_transient_custody_failure_keeps_order_created() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, dec!(1));
    h.custody
        .set_failure(Some(CustodyError::Decrypt("invalid token".into())));
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    let summary = h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(summary.deferred, 1);
    let stored = h.reload(order.id).await;
    assert_eq!(stored.status, OrderStatus::Created);
    assert!(stored.tx_ref.is_none());
    assert!(stored.last_error.as_deref().unwrap().contains("invalid token"));
    assert!(h.swap.get_submissions().is_empty());

    h.custody.set_failure(None);
    h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_malformed_secret_escalates_to_error() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, dec!(1));
    h.custody
        .set_failure(Some(CustodyError::MalformedSecret("7 words".into())));
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    let summary = h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(summary.escalated, 1);
    let stored = h.reload(order.id).await;
    assert_eq!(stored.status, OrderStatus::Error);
    assert!(stored.last_error.is_some());
    assert!(h.swap.get_submissions().is_empty());

    // ERROR is terminal, so the order is not evaluated again
    let again = h.scheduler.evaluator().run_tick().await.unwrap();
    assert_eq!(again.evaluated, 0);
}

#[tokio::test]
async fn test_missing_wallet_escalates_to_error() {
    let h = harness();
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, dec!(1));
    let order = h.order(WalletId::new(), OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    h.scheduler.evaluator().run_tick().await.unwrap();
    let stored = h.reload(order.id).await;
    assert_eq!(stored.status, OrderStatus::Error);
    assert!(stored.last_error.as_deref().unwrap().contains("not found"));
    assert_eq!(h.custody.restore_count(), 0);
}

#[tokio::test]
async fn test_rejected_submission_is_retried() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, dec!(1));
    h.swap
        .push_result(Err(SubmissionError::Rejected("insufficient balance".into())));
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;

    h.scheduler.evaluator().run_tick().await.unwrap();
    let stored = h.reload(order.id).await;
    assert_eq!(stored.status, OrderStatus::Created);
    assert!(stored
        .last_error
        .as_deref()
        .unwrap()
        .contains("insufficient balance"));

    h.scheduler.evaluator().run_tick().await.unwrap();
    let stored = h.reload(order.id).await;
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.tx_ref, Some(TxRef::new("tx-2")));
    // Both attempts carried the same idempotency key
    let keys: Vec<_> = h
        .swap
        .get_submissions()
        .iter()
        .map(|r| r.idempotency_key)
        .collect();
    assert_eq!(keys, vec![order.id, order.id]);
}

#[tokio::test]
async fn test_dispatch_skips_already_claimed_order() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    let snapshot = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;
    h.store
        .conditional_update(
            snapshot.id,
            OrderStatus::Created,
            StatusUpdate::claim(TxRef::new("tx-elsewhere")),
        )
        .await
        .unwrap();

    let dispatcher = Dispatcher::new(
        h.store.clone(),
        h.custody.clone(),
        h.swap.clone(),
        Duration::from_millis(200),
    );
    let outcome = dispatcher.dispatch(&snapshot, dec!(1)).await;
    assert!(matches!(outcome, DispatchOutcome::Skipped));
    assert!(h.swap.get_submissions().is_empty());
    assert_eq!(h.custody.restore_count(), 0);
}

#[tokio::test]
async fn test_claim_lost_during_submission() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    let snapshot = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;
    h.swap.set_delay(Some(Duration::from_millis(80)));

    let dispatcher = Arc::new(Dispatcher::new(
        h.store.clone(),
        h.custody.clone(),
        h.swap.clone(),
        Duration::from_millis(500),
    ));
    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        let snapshot = snapshot.clone();
        tokio::spawn(async move { dispatcher.dispatch(&snapshot, dec!(1)).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    let won = h
        .store
        .conditional_update(
            snapshot.id,
            OrderStatus::Created,
            StatusUpdate::claim(TxRef::new("tx-other")),
        )
        .await
        .unwrap();
    assert!(won);

    let outcome = task.await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::LostClaim(_)));
    assert_eq!(
        h.reload(snapshot.id).await.tx_ref,
        Some(TxRef::new("tx-other"))
    );
}

// ============================================================================
// Settlement
// ============================================================================

#[tokio::test]
async fn test_confirmed_settles_executed() {
    let h = harness();
    let order = h.pending_order().await;
    let tx_ref = order.tx_ref.clone().unwrap();
    h.settlement.set_status(tx_ref, Ok(TxStatus::Confirmed));

    let summary = h.scheduler.monitor().run_tick().await.unwrap();
    assert_eq!(summary.executed, 1);
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Executed);

    let patch = OrderPatch {
        price: Some(Price::new(dec!(9))),
        ..Default::default()
    };
    assert_err!(h.store.update_order(order.id, patch).await);
}

#[tokio::test]
async fn test_aborted_settles_failed_and_stops_polling() {
    let h = harness();
    let order = h.pending_order().await;
    let tx_ref = order.tx_ref.clone().unwrap();
    h.settlement.set_status(tx_ref.clone(), Ok(TxStatus::Aborted));

    let summary = h.scheduler.monitor().run_tick().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Failed);

    let later = h.scheduler.monitor().run_tick().await.unwrap();
    assert_eq!(later.polled, 0);
    assert_eq!(h.settlement.get_polls(), vec![tx_ref]);
}

#[tokio::test]
async fn test_pending_settlement_is_polled_again() {
    let h = harness();
    let order = h.pending_order().await;

    for _ in 0..3 {
        let summary = h.scheduler.monitor().run_tick().await.unwrap();
        assert_eq!(summary.unresolved, 1);
    }
    let stored = h.reload(order.id).await;
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.unresolved_polls, 3);
    assert_eq!(h.settlement.get_polls().len(), 3);
}

#[tokio::test]
async fn test_stale_settlement_escalates_after_threshold() {
    let mut config = test_config(OperatingMode::Trading);
    config.max_unresolved_polls = Some(3);
    let h = harness_with(config);
    let order = h.pending_order().await;
    let tx_ref = order.tx_ref.clone().unwrap();
    h.settlement
        .set_status(tx_ref, Err(AdapterError::Unavailable("timeout".into())));

    h.scheduler.monitor().run_tick().await.unwrap();
    h.scheduler.monitor().run_tick().await.unwrap();
    assert_eq!(h.reload(order.id).await.status, OrderStatus::Pending);

    let summary = h.scheduler.monitor().run_tick().await.unwrap();
    assert_eq!(summary.escalated, 1);
    let stored = h.reload(order.id).await;
    assert_eq!(stored.status, OrderStatus::Error);
    assert!(stored
        .last_error
        .as_deref()
        .unwrap()
        .contains("manual reconciliation"));
}

// ============================================================================
// Scheduler
// ============================================================================

async fn wait_for_status(store: &MemoryOrderStore, id: OrderId, status: OrderStatus) -> bool {
    for _ in 0..200 {
        if let Ok(Some(order)) = store.get_order(id).await {
            if order.status == status {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_scheduler_drives_order_to_executed_and_stops() {
    let h = harness();
    let wallet = h.wallet().await;
    let jetton = asset("EQjetton");
    h.oracle.set_rate(&jetton, dec!(1));
    let order = h.order(wallet.id, OrderSide::Buy, dec!(2), dec!(5), &jetton).await;
    h.settlement
        .set_status(TxRef::new("tx-1"), Ok(TxStatus::Confirmed));

    let Harness {
        store, scheduler, ..
    } = h;
    let shutdown = CancellationToken::new();
    let handle = Arc::new(scheduler).spawn(shutdown.clone());

    assert!(wait_for_status(&store, order.id, OrderStatus::Executed).await);

    shutdown.cancel();
    let report = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert!(report.evaluate_ticks >= 1);
    assert!(report.monitor_ticks >= 1);
}
