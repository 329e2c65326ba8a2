//! Application wiring and lifecycle.
//!
//! Builds the store and adapters from configuration, then runs the
//! scheduler and the order API until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tonlimit_api::{run_server, AppState};
use tonlimit_engine::{EngineAdapters, Scheduler, SchedulerReport};
use tonlimit_store::{DynOrderStore, MemoryOrderStore, PgOrderStore};
use tonlimit_wallet::{
    DynWalletProvisioner, FernetCipher, MnemonicCustody, SecretCipher, TonApiClient,
    WalletServiceClient,
};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// What the order API needs to onboard new users.
///
/// `cipher` must be the key custody decrypts with.
#[derive(Clone)]
pub struct WalletOnboarding {
    pub provisioner: DynWalletProvisioner,
    pub cipher: Arc<dyn SecretCipher>,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    store: DynOrderStore,
    onboarding: WalletOnboarding,
    scheduler: Arc<Scheduler>,
}

impl Application {
    /// Build the store and the concrete adapters from `config`.
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let store = connect_store(&config).await?;
        let (adapters, onboarding) = build_adapters(&config)?;
        Self::from_parts(config, store, adapters, onboarding)
    }

    /// Assemble from an existing store and adapters.
    pub fn from_parts(
        config: AppConfig,
        store: DynOrderStore,
        adapters: EngineAdapters,
        onboarding: WalletOnboarding,
    ) -> AppResult<Self> {
        let scheduler = Scheduler::build(config.engine.clone(), Arc::clone(&store), adapters)?;
        Ok(Self {
            config,
            store,
            onboarding,
            scheduler: Arc::new(scheduler),
        })
    }

    pub fn store(&self) -> &DynOrderStore {
        &self.store
    }

    /// Run until Ctrl+C.
    pub async fn run(self) -> AppResult<SchedulerReport> {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => info!("Received shutdown signal"),
                    Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
                },
                _ = signal.cancelled() => {}
            }
            signal.cancel();
        });
        self.run_until(shutdown).await
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// A server failure (e.g. the port is taken) cancels `shutdown` so the
    /// scheduler stops too.
    pub async fn run_until(self, shutdown: CancellationToken) -> AppResult<SchedulerReport> {
        if self.config.is_observation_mode() {
            info!("Observation mode: triggers are logged, no swaps are submitted");
        }

        let scheduler = Arc::clone(&self.scheduler).spawn(shutdown.clone());

        let server_result = if self.config.server.enabled {
            let state = AppState::new(
                Arc::clone(&self.store),
                self.onboarding.provisioner.clone(),
                Arc::clone(&self.onboarding.cipher),
            );
            let api_config = self.config.server.clone();
            let token = shutdown.clone();
            let server =
                tokio::spawn(async move { run_server(state, &api_config, token).await });
            match server.await {
                Ok(result) => result.map_err(AppError::from),
                Err(e) => Err(AppError::Task(format!("API server task: {e}"))),
            }
        } else {
            shutdown.cancelled().await;
            Ok(())
        };
        if let Err(e) = &server_result {
            error!(error = %e, "Order API stopped with an error, shutting down");
            shutdown.cancel();
        }

        let report = scheduler
            .await
            .map_err(|e| AppError::Task(format!("scheduler task: {e}")))?;
        server_result?;
        info!(
            evaluate_ticks = report.evaluate_ticks,
            monitor_ticks = report.monitor_ticks,
            "Application stopped"
        );
        Ok(report)
    }
}

async fn connect_store(config: &AppConfig) -> AppResult<DynOrderStore> {
    let Some(source) = &config.database.url else {
        warn!("No database configured, using the in-memory store (orders are lost on restart)");
        return Ok(Arc::new(MemoryOrderStore::new()));
    };

    let url = source.load()?;
    let store = PgOrderStore::connect(
        &url,
        config.database.max_connections,
        config.database.acquire_timeout(),
    )
    .await?;
    if config.database.migrate {
        store.migrate().await?;
    }
    Ok(Arc::new(store))
}

fn build_adapters(config: &AppConfig) -> AppResult<(EngineAdapters, WalletOnboarding)> {
    let api_key = config.tonapi.api_key.as_ref().map(|s| s.load()).transpose()?;
    let tonapi = Arc::new(TonApiClient::with_timeout(
        config.tonapi.base_url.clone(),
        api_key,
        Duration::from_millis(config.tonapi.timeout_ms),
    )?);

    let cipher: Arc<dyn SecretCipher> =
        Arc::new(FernetCipher::from_source(&config.custody.encryption_key)?);
    let custody = Arc::new(MnemonicCustody::new(Arc::clone(&cipher)));

    let wallet_service = Arc::new(WalletServiceClient::with_timeout(
        &config.wallet_service.url,
        Duration::from_millis(config.wallet_service.timeout_ms),
    )?);

    info!(
        tonapi = %config.tonapi.base_url,
        tonapi_auth = config.tonapi.api_key.is_some(),
        wallet_service = %config.wallet_service.url,
        "Adapters ready"
    );
    let adapters = EngineAdapters {
        oracle: tonapi.clone(),
        custody,
        swap: wallet_service.clone(),
        settlement: tonapi,
    };
    let onboarding = WalletOnboarding {
        provisioner: wallet_service,
        cipher,
    };
    Ok((adapters, onboarding))
}
