//! tonlimit-api - HTTP façade over the order store.
//!
//! Orders are addressed through the owning user's wallet:
//!
//! - `POST   /api/wallets/{user_id}`: return the user's wallet, creating it if missing
//! - `GET    /api/wallets/{user_id}`: the user's wallet
//! - `POST   /api/orders/{user_id}`: create a CREATED order
//! - `GET    /api/orders/{user_id}`: list the user's orders
//! - `GET    /api/orders/{user_id}/{order_id}`: one order
//! - `PUT    /api/orders/{user_id}/{order_id}`: edit price, volume or asset (CREATED only)
//! - `DELETE /api/orders/{user_id}/{order_id}`: delete (CREATED only)
//! - `GET    /health`, `GET /metrics`

mod config;
mod error;
mod server;
mod types;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::{create_router, run_server, serve, AppState};
pub use types::{CreateOrderRequest, OrderResponse, UpdateOrderRequest, WalletResponse};
