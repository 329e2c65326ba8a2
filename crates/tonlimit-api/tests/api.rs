//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use tonlimit_api::{create_router, AppState, OrderResponse, WalletResponse};
use tonlimit_core::{
    EncryptedSecret, OrderId, OrderSide, OrderStatus, Price, StatusUpdate, TxRef, UserRef,
    Volume, WalletRecord,
};
use tonlimit_store::{MemoryOrderStore, OrderStore};
use tonlimit_wallet::{
    AdapterError, CustodyAdapter, FernetCipher, MnemonicCustody, MockWalletProvisioner,
    SecretCipher,
};

const USER: i64 = 1001;
const OTHER_USER: i64 = 2002;

struct Wallets {
    provisioner: Arc<MockWalletProvisioner>,
    cipher: Arc<dyn SecretCipher>,
}

async fn setup() -> (Router, Arc<MemoryOrderStore>) {
    let (router, store, _) = setup_with_wallets().await;
    (router, store)
}

async fn setup_with_wallets() -> (Router, Arc<MemoryOrderStore>, Wallets) {
    let store = Arc::new(MemoryOrderStore::new());
    for user in [USER, OTHER_USER] {
        let wallet = WalletRecord::new(
            UserRef(user),
            format!("EQwallet-{user}"),
            EncryptedSecret::new("key-token"),
            EncryptedSecret::new("mnemonic-token"),
        );
        store.insert_wallet(wallet).await.unwrap();
    }
    let wallets = Wallets {
        provisioner: Arc::new(MockWalletProvisioner::new()),
        cipher: Arc::new(FernetCipher::new(&FernetCipher::generate_key()).unwrap()),
    };
    let state = AppState::new(
        store.clone(),
        wallets.provisioner.clone(),
        Arc::clone(&wallets.cipher),
    );
    (create_router(state), store, wallets)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create(router: &Router) -> OrderResponse {
    let (status, body) = send(
        router,
        "POST",
        &format!("/api/orders/{USER}"),
        Some(json!({ "side": "BUY", "price": "2.0", "volume": "5", "asset": "EQjetton" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    serde_json::from_value(body).unwrap()
}

#[tokio::test]
async fn test_create_and_fetch_order() {
    let (router, _store) = setup().await;
    let order = create(&router).await;
    assert_eq!(order.status, OrderStatus::Created);
    assert_eq!(order.side, OrderSide::Buy);
    assert_eq!(order.price, Price::new(dec!(2.0)));
    assert_eq!(order.volume, Volume::new(dec!(5)));
    assert!(order.tx_ref.is_none());

    let (status, body) = send(&router, "GET", &format!("/api/orders/{USER}/{}", order.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: OrderResponse = serde_json::from_value(body).unwrap();
    assert_eq!(fetched, order);

    let (status, body) = send(&router, "GET", &format!("/api/orders/{USER}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_without_wallet_is_not_found() {
    let (router, _store) = setup().await;
    let (status, body) = send(
        &router,
        "POST",
        "/api/orders/999",
        Some(json!({ "side": "SELL", "price": "1", "volume": "1", "asset": "EQjetton" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("No wallet"));
}

#[tokio::test]
async fn test_invalid_fields_are_rejected() {
    let (router, store) = setup().await;
    for body in [
        json!({ "side": "BUY", "price": "0", "volume": "5", "asset": "EQjetton" }),
        json!({ "side": "BUY", "price": "2", "volume": "-1", "asset": "EQjetton" }),
        json!({ "side": "BUY", "price": "2", "volume": "5", "asset": "   " }),
        json!({ "side": "HOLD", "price": "2", "volume": "5", "asset": "EQjetton" }),
    ] {
        let (status, _) = send(&router, "POST", &format!("/api/orders/{USER}"), Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_other_users_order_is_hidden() {
    let (router, _store) = setup().await;
    let order = create(&router).await;
    let uri = format!("/api/orders/{OTHER_USER}/{}", order.id);

    let (status, _) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, "GET", &format!("/api/orders/{USER}/{}", OrderId::new()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_created_order() {
    let (router, _store) = setup().await;
    let order = create(&router).await;

    let (status, body) = send(
        &router,
        "PUT",
        &format!("/api/orders/{USER}/{}", order.id),
        Some(json!({ "price": "2.5", "asset": "EQother" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: OrderResponse = serde_json::from_value(body).unwrap();
    assert_eq!(updated.price, Price::new(dec!(2.5)));
    assert_eq!(updated.volume, order.volume);
    assert_eq!(updated.asset, "EQother");
}

#[tokio::test]
async fn test_empty_patch_is_rejected() {
    let (router, _store) = setup().await;
    let order = create(&router).await;
    let (status, _) = send(
        &router,
        "PUT",
        &format!("/api/orders/{USER}/{}", order.id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_pending_order_cannot_be_edited_or_deleted() {
    let (router, store) = setup().await;
    let order = create(&router).await;
    store
        .conditional_update(
            order.id,
            OrderStatus::Created,
            StatusUpdate::claim(TxRef::new("tx-1")),
        )
        .await
        .unwrap();
    let uri = format!("/api/orders/{USER}/{}", order.id);

    let (status, _) = send(&router, "PUT", &uri, Some(json!({ "price": "3" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.price, order.price);
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_delete_created_order() {
    let (router, store) = setup().await;
    let order = create(&router).await;
    let uri = format!("/api/orders/{USER}/{}", order.id);

    let (status, _) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(store.get_order(order.id).await.unwrap().is_none());

    let (status, _) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (router, _store) = setup().await;
    let (status, body) = send(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Wallets
// ============================================================================

const NEW_USER: i64 = 3003;

#[tokio::test]
async fn test_create_wallet_then_reuse_it() {
    let (router, store, wallets) = setup_with_wallets().await;
    let uri = format!("/api/wallets/{NEW_USER}");

    let (status, _) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&router, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: WalletResponse = serde_json::from_value(body).unwrap();
    assert_eq!(created.user_id, NEW_USER);
    assert_eq!(created.address, "EQgenerated-1");

    let (status, body) = send(&router, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_value::<WalletResponse>(body).unwrap(), created);
    let (status, body) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_value::<WalletResponse>(body).unwrap(), created);
    assert_eq!(wallets.provisioner.created_count(), 1);

    let record = store.wallet_for_user(UserRef(NEW_USER)).await.unwrap().unwrap();
    assert_eq!(
        wallets.cipher.decrypt(&record.encrypted_secret_key).unwrap().as_str(),
        "secret-1"
    );
    let signer = MnemonicCustody::new(Arc::clone(&wallets.cipher))
        .restore_signer(&record)
        .await
        .unwrap();
    assert_eq!(signer.address(), "EQgenerated-1");
    assert_eq!(signer.expose_mnemonic().len(), 12);
}

#[tokio::test]
async fn test_wallet_response_has_no_secrets() {
    let (router, _store) = setup().await;
    let (status, body) = send(&router, "POST", &format!("/api/wallets/{NEW_USER}"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let text = body.to_string();
    assert!(!text.contains("secret"));
    assert!(!text.contains("mnemonic"));
    assert!(!text.contains("abandon"));
}

#[tokio::test]
async fn test_new_wallet_can_hold_orders() {
    let (router, _store) = setup().await;
    let (status, _) = send(&router, "POST", &format!("/api/wallets/{NEW_USER}"), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/orders/{NEW_USER}"),
        Some(json!({ "side": "SELL", "price": "3", "volume": "1", "asset": "EQjetton" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order: OrderResponse = serde_json::from_value(body).unwrap();
    assert_eq!(order.status, OrderStatus::Created);
}

#[tokio::test]
async fn test_wallet_generation_failure_is_bad_gateway() {
    let (router, store, wallets) = setup_with_wallets().await;
    wallets
        .provisioner
        .set_failure(Some(AdapterError::Unavailable("wallet service down".into())));

    let (status, body) = send(&router, "POST", &format!("/api/wallets/{NEW_USER}"), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("wallet service down"));
    assert!(store.wallet_for_user(UserRef(NEW_USER)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_existing_wallet_is_returned_without_generation() {
    let (router, _store, wallets) = setup_with_wallets().await;
    let (status, body) = send(&router, "POST", &format!("/api/wallets/{USER}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"], format!("EQwallet-{USER}"));
    assert_eq!(wallets.provisioner.created_count(), 0);
}
