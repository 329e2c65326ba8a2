//! Adapters between the tonlimit engine and the outside world.
//!
//! Contracts (dyn-compatible, injected at startup):
//! - `PriceOracle`: fresh exchange rates
//! - `CustodyAdapter`: signer restoration from encrypted wallet secrets
//! - `SwapAdapter`: swap submission
//! - `SettlementAdapter`: transaction status
//! - `WalletProvisioner`: new wallet generation
//!
//! Implementations:
//! - `TonApiClient`: TON API rates and transaction status
//! - `WalletServiceClient`: private wallet service for swaps and new wallets
//! - `MnemonicCustody` + `FernetCipher`: custody over Fernet tokens
//! - `mock`: scriptable adapters for tests

pub mod adapter;
pub mod custody;
pub mod error;
pub mod mock;
pub mod tonapi;
pub mod wallet_service;

pub use adapter::{
    BoxFuture, CustodyAdapter, DynCustodyAdapter, DynPriceOracle, DynSettlementAdapter,
    DynSwapAdapter, DynWalletProvisioner, PriceOracle, SettlementAdapter, SwapAdapter,
    SwapRequest, WalletProvisioner,
};
pub use custody::{
    parse_mnemonic, FernetCipher, GeneratedWallet, KeySource, MnemonicCustody, SecretCipher,
    Signer,
};
pub use error::{AdapterError, CustodyError, KeyError, SubmissionError, WalletError, WalletResult};
pub use mock::{
    MockCustody, MockPriceOracle, MockSettlement, MockSwapAdapter, MockWalletProvisioner,
};
pub use tonapi::{TonApiClient, DEFAULT_TONAPI_URL};
pub use wallet_service::WalletServiceClient;
