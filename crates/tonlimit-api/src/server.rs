//! HTTP server implementation using axum.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use tonlimit_core::{Order, OrderId, UserRef, WalletRecord};
use tonlimit_store::{DynOrderStore, StoreError};
use tonlimit_telemetry::render_metrics;
use tonlimit_wallet::{DynWalletProvisioner, SecretCipher};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::types::{CreateOrderRequest, OrderResponse, UpdateOrderRequest, WalletResponse};

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    store: DynOrderStore,
    provisioner: DynWalletProvisioner,
    cipher: Arc<dyn SecretCipher>,
}

impl AppState {
    /// `cipher` seals new wallets; it must be the key custody decrypts with.
    pub fn new(
        store: DynOrderStore,
        provisioner: DynWalletProvisioner,
        cipher: Arc<dyn SecretCipher>,
    ) -> Self {
        Self {
            store,
            provisioner,
            cipher,
        }
    }

    async fn wallet(&self, user: UserRef) -> ApiResult<WalletRecord> {
        self.store
            .wallet_for_user(user)
            .await?
            .ok_or(ApiError::NoWallet(user))
    }

    /// The order, if it belongs to the user's wallet.
    async fn owned_order(&self, user: UserRef, id: OrderId) -> ApiResult<Order> {
        let wallet = self.wallet(user).await?;
        match self.store.get_order(id).await? {
            Some(order) if order.wallet_id == wallet.id => Ok(order),
            _ => Err(ApiError::OrderNotFound(id)),
        }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/wallets/{user_id}", get(get_wallet).post(create_wallet))
        .route("/api/orders/{user_id}", get(list_orders).post(create_order))
        .route(
            "/api/orders/{user_id}/{order_id}",
            get(get_order).put(update_order).delete(delete_order),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics() -> ApiResult<Response> {
    let body = render_metrics().map_err(|e| ApiError::Metrics(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<WalletResponse>> {
    let wallet = state.wallet(UserRef(user_id)).await?;
    Ok(Json(wallet.into()))
}

/// Return the user's wallet, generating and sealing one if there is none.
async fn create_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<WalletResponse>)> {
    let user = UserRef(user_id);
    if let Some(existing) = state.store.wallet_for_user(user).await? {
        return Ok((StatusCode::OK, Json(existing.into())));
    }

    let record = {
        let generated = state.provisioner.create_wallet().await?;
        generated.seal(user, state.cipher.as_ref())?
    };

    match state.store.insert_wallet(record.clone()).await {
        Ok(()) => {
            info!(user = user_id, wallet_id = %record.id, address = %record.address, "Wallet created");
            Ok((StatusCode::CREATED, Json(record.into())))
        }
        Err(StoreError::DuplicateWallet(_)) => {
            warn!(
                user = user_id,
                discarded = %record.address,
                "Wallet created concurrently, keeping the stored one"
            );
            let existing = state.wallet(user).await?;
            Ok((StatusCode::OK, Json(existing.into())))
        }
        Err(e) => Err(e.into()),
    }
}

async fn list_orders(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<OrderResponse>>> {
    let wallet = state.wallet(UserRef(user_id)).await?;
    let orders = state.store.list_for_wallet(wallet.id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

async fn create_order(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    let wallet = state.wallet(UserRef(user_id)).await?;
    let order = Order::from_new(request.into_new_order(wallet.id)?, Utc::now())?;
    state.store.insert_order(order.clone()).await?;

    info!(
        order_id = %order.id,
        user = user_id,
        side = %order.side,
        price = %order.price,
        volume = %order.volume,
        asset = %order.asset,
        "Order created"
    );
    Ok((StatusCode::CREATED, Json(order.into())))
}

async fn get_order(
    State(state): State<AppState>,
    Path((user_id, order_id)): Path<(i64, OrderId)>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state.owned_order(UserRef(user_id), order_id).await?;
    Ok(Json(order.into()))
}

async fn update_order(
    State(state): State<AppState>,
    Path((user_id, order_id)): Path<(i64, OrderId)>,
    Json(request): Json<UpdateOrderRequest>,
) -> ApiResult<Json<OrderResponse>> {
    let patch = request.into_patch()?;
    state.owned_order(UserRef(user_id), order_id).await?;
    let order = state.store.update_order(order_id, patch).await?;
    debug!(%order_id, price = %order.price, volume = %order.volume, "Order updated");
    Ok(Json(order.into()))
}

async fn delete_order(
    State(state): State<AppState>,
    Path((user_id, order_id)): Path<(i64, OrderId)>,
) -> ApiResult<StatusCode> {
    state.owned_order(UserRef(user_id), order_id).await?;
    state.store.delete_order(order_id).await?;
    info!(%order_id, user = user_id, "Order deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Serve on an already bound listener until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> ApiResult<()> {
    info!(addr = %listener.local_addr()?, "Starting order API server");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("Order API server stopped");
    Ok(())
}

/// Bind per `config` and serve until `shutdown` is cancelled.
pub async fn run_server(
    state: AppState,
    config: &ApiConfig,
    shutdown: CancellationToken,
) -> ApiResult<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    serve(listener, state, shutdown).await
}
