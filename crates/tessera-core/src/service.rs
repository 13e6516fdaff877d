//! # Diamond Service
//!
//! Async boundary around the synchronous dispatcher. The host environment
//! guarantees strictly serialized invocations; here that guarantee is a
//! `tokio::sync::Mutex` - one invocation (nested forwards included)
//! completes before the next begins.
//!
//! The service also keeps the operational statistics the dispatcher core
//! deliberately does not.

use crate::dispatch::Dispatcher;
use crate::errors::DiamondError;
use crate::events::DiamondEvent;
use crate::loupe::FacetInfo;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tessera_types::module::FacetCut;
use tessera_types::values::{Address, Bytes, Selector, U256};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Diamond service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// External identity of the dispatcher.
    pub dispatcher_address: Address,
    /// Deployer identity (administrative capability).
    pub deployer: Address,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dispatcher_address: Address::new([0xd1; 20]),
            deployer: Address::new([0xde; 20]),
        }
    }
}

/// Statistics for the diamond service.
#[derive(Debug, Default, Clone)]
pub struct ServiceStats {
    /// Total calls dispatched.
    pub calls_dispatched: u64,
    /// Calls that committed.
    pub successful_calls: u64,
    /// Calls that rolled back.
    pub failed_calls: u64,
    /// Cut batches applied (direct and via installation).
    pub cuts_applied: u64,
    /// Modules installed through the self-description protocol.
    pub modules_installed: u64,
    /// Average invocation time in microseconds.
    pub avg_execution_time_us: u64,
}

/// Driving port: the administrative and dispatch surface of the platform.
#[async_trait]
pub trait DiamondApi: Send + Sync {
    /// Dispatches one call through the fallback router.
    async fn dispatch_call(
        &self,
        caller: Address,
        value: U256,
        selector: Selector,
        input: Vec<u8>,
    ) -> Result<Vec<u8>, DiamondError>;

    /// Applies a cut batch (admin, guarded).
    async fn diamond_cut(
        &self,
        caller: Address,
        cuts: Vec<FacetCut>,
        init_target: Option<Address>,
        init_data: Bytes,
    ) -> Result<(), DiamondError>;

    /// Installs a module through its self-description (admin, guarded).
    async fn install_module(&self, caller: Address, module: Address)
        -> Result<usize, DiamondError>;

    /// Sets the unmatched-selector routing target (admin).
    async fn set_fallback_address(
        &self,
        caller: Address,
        fallback: Address,
    ) -> Result<(), DiamondError>;

    /// Current fallback routing target.
    async fn fallback_address(&self) -> Address;

    /// Enumerates modules with their selector sets.
    async fn facets(&self) -> Result<Vec<FacetInfo>, DiamondError>;

    /// Enumerates selectors bound to one module.
    async fn facet_function_selectors(
        &self,
        module: Address,
    ) -> Result<Vec<Selector>, DiamondError>;

    /// Enumerates distinct module addresses.
    async fn facet_addresses(&self) -> Vec<Address>;

    /// Resolves one selector to its module (zero when unbound).
    async fn facet_address(&self, selector: Selector) -> Address;

    /// Sweeps a stray token balance to the deployer (admin).
    async fn rescue_tokens(&self, caller: Address, token: Address) -> Result<U256, DiamondError>;

    /// Sweeps the native balance to the deployer (admin).
    async fn withdraw_native(&self, caller: Address) -> Result<U256, DiamondError>;
}

/// The diamond service: serialized dispatcher access plus statistics.
pub struct DiamondService {
    config: ServiceConfig,
    inner: Arc<Mutex<Dispatcher>>,
    stats: Arc<RwLock<ServiceStats>>,
}

impl DiamondService {
    /// Creates a service around a freshly constructed dispatcher.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        let dispatcher = Dispatcher::new(config.dispatcher_address, config.deployer);
        info!(
            dispatcher = ?config.dispatcher_address,
            deployer = ?config.deployer,
            "diamond service started"
        );
        Self {
            config,
            inner: Arc::new(Mutex::new(dispatcher)),
            stats: Arc::new(RwLock::new(ServiceStats::default())),
        }
    }

    /// The service configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Current service statistics.
    pub async fn stats(&self) -> ServiceStats {
        self.stats.read().await.clone()
    }

    /// Snapshot of the event log (audit trail).
    pub async fn events(&self) -> Vec<DiamondEvent> {
        self.inner.lock().await.storage().events.clone()
    }

    /// Exclusive access to the dispatcher, for deployment and test setup.
    pub async fn with_dispatcher<T>(&self, f: impl FnOnce(&mut Dispatcher) -> T + Send) -> T {
        let mut dispatcher = self.inner.lock().await;
        f(&mut dispatcher)
    }

    async fn record(&self, started: Instant, ok: bool) {
        let elapsed_us = started.elapsed().as_micros() as u64;
        let mut stats = self.stats.write().await;
        stats.calls_dispatched += 1;
        if ok {
            stats.successful_calls += 1;
        } else {
            stats.failed_calls += 1;
        }
        let total = stats.calls_dispatched;
        stats.avg_execution_time_us =
            (stats.avg_execution_time_us * (total - 1) + elapsed_us) / total;
    }
}

#[async_trait]
impl DiamondApi for DiamondService {
    #[instrument(skip(self, input), fields(correlation_id = %Uuid::new_v4()))]
    async fn dispatch_call(
        &self,
        caller: Address,
        value: U256,
        selector: Selector,
        input: Vec<u8>,
    ) -> Result<Vec<u8>, DiamondError> {
        let started = Instant::now();
        let result = {
            let mut dispatcher = self.inner.lock().await;
            dispatcher.call(caller, value, selector, &input)
        };
        self.record(started, result.is_ok()).await;
        match &result {
            Ok(output) => debug!(bytes = output.len(), "call committed"),
            Err(err) => warn!(error = %err, "call rolled back"),
        }
        result
    }

    #[instrument(skip(self, cuts, init_data), fields(correlation_id = %Uuid::new_v4()))]
    async fn diamond_cut(
        &self,
        caller: Address,
        cuts: Vec<FacetCut>,
        init_target: Option<Address>,
        init_data: Bytes,
    ) -> Result<(), DiamondError> {
        let started = Instant::now();
        let result = {
            let mut dispatcher = self.inner.lock().await;
            dispatcher.diamond_cut(caller, cuts, init_target, init_data)
        };
        self.record(started, result.is_ok()).await;
        if result.is_ok() {
            self.stats.write().await.cuts_applied += 1;
        }
        result
    }

    #[instrument(skip(self), fields(correlation_id = %Uuid::new_v4()))]
    async fn install_module(
        &self,
        caller: Address,
        module: Address,
    ) -> Result<usize, DiamondError> {
        let started = Instant::now();
        let result = {
            let mut dispatcher = self.inner.lock().await;
            dispatcher.install_module(caller, module)
        };
        self.record(started, result.is_ok()).await;
        if result.is_ok() {
            let mut stats = self.stats.write().await;
            stats.cuts_applied += 1;
            stats.modules_installed += 1;
        }
        result
    }

    async fn set_fallback_address(
        &self,
        caller: Address,
        fallback: Address,
    ) -> Result<(), DiamondError> {
        let started = Instant::now();
        let result = {
            let mut dispatcher = self.inner.lock().await;
            dispatcher.set_fallback_address(caller, fallback)
        };
        self.record(started, result.is_ok()).await;
        result
    }

    async fn fallback_address(&self) -> Address {
        self.inner.lock().await.fallback_address()
    }

    async fn facets(&self) -> Result<Vec<FacetInfo>, DiamondError> {
        self.inner.lock().await.facets()
    }

    async fn facet_function_selectors(
        &self,
        module: Address,
    ) -> Result<Vec<Selector>, DiamondError> {
        self.inner.lock().await.facet_function_selectors(module)
    }

    async fn facet_addresses(&self) -> Vec<Address> {
        self.inner.lock().await.facet_addresses()
    }

    async fn facet_address(&self, selector: Selector) -> Address {
        self.inner.lock().await.facet_address(selector)
    }

    async fn rescue_tokens(&self, caller: Address, token: Address) -> Result<U256, DiamondError> {
        let started = Instant::now();
        let result = {
            let mut dispatcher = self.inner.lock().await;
            dispatcher.rescue_tokens(caller, token)
        };
        self.record(started, result.is_ok()).await;
        result
    }

    async fn withdraw_native(&self, caller: Address) -> Result<U256, DiamondError> {
        let started = Instant::now();
        let result = {
            let mut dispatcher = self.inner.lock().await;
            dispatcher.withdraw_native(caller)
        };
        self.record(started, result.is_ok()).await;
        result
    }
}

/// Creates a service with the default test identities.
#[must_use]
pub fn create_test_service() -> DiamondService {
    DiamondService::new(ServiceConfig::default())
}

// =============================================================================
// TESTS
// =============================================================================
