//! Order and wallet store for tonlimit.
//!
//! Every status write is a conditional update on the previously observed
//! status, so exclusivity per order holds across tasks and processes.
//!
//! - `OrderStore`: dyn-compatible store contract
//! - `MemoryOrderStore`: DashMap-backed store for tests and observation runs
//! - `PgOrderStore`: PostgreSQL store (sqlx)

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;
pub use store::{check_update, BoxFuture, DynOrderStore, OrderStore, StatusCount};
