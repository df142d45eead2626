//! Formatter instance registry
//!
//! A loaded plugin is expensive to create and keeps request state (staging
//! buffer, file path, configuration) on the guest side, so requests against
//! one instance must not interleave. [`FormatterInstance`] owns the guest
//! behind a mutex and runs every request start to finish under it.
//!
//! The process-wide instance is created once with [`initialize`] and lives
//! until the process exits.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use tracing::{error, info, info_span};

use crate::config::{ConfigOverrides, GlobalConfigOverride, PluginConfigOverride};
use crate::format::{FormatOutput, FormatRequest, format_with};
use crate::guest::GuestExports;
use crate::metrics::FormatMetrics;
use crate::runtime::{ContractPolicy, ModuleInfo, RuntimeConfig, WasmGuest};
use crate::settings::BridgeSettings;
use crate::types::{BridgeError, BridgeResult};

/// Exclusive access to an instance's guest for the lifetime of the guard
pub struct InstanceGuard<'a, G> {
    guest: MutexGuard<'a, G>,
}

impl<G> Deref for InstanceGuard<'_, G> {
    type Target = G;

    fn deref(&self) -> &G {
        &self.guest
    }
}

impl<G> DerefMut for InstanceGuard<'_, G> {
    fn deref_mut(&mut self) -> &mut G {
        &mut self.guest
    }
}

/// One loaded plugin shared by every request
pub struct FormatterInstance<G = WasmGuest> {
    id: String,
    guest: Mutex<G>,
    defaults: ConfigOverrides,
    contract_policy: ContractPolicy,
    metrics: Mutex<FormatMetrics>,
}

impl<G: GuestExports> FormatterInstance<G> {
    pub fn new(guest: G, contract_policy: ContractPolicy) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            guest: Mutex::new(guest),
            defaults: ConfigOverrides::default(),
            contract_policy,
            metrics: Mutex::new(FormatMetrics::default()),
        }
    }

    /// Overrides layered beneath every request's own overrides
    pub fn with_defaults(mut self, defaults: ConfigOverrides) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn defaults(&self) -> &ConfigOverrides {
        &self.defaults
    }

    pub fn contract_policy(&self) -> ContractPolicy {
        self.contract_policy
    }

    /// Borrow the guest for one request. Released when the guard drops.
    pub fn acquire(&self) -> InstanceGuard<'_, G> {
        InstanceGuard {
            guest: self.guest.lock(),
        }
    }

    /// Format one request.
    pub fn format(&self, request: &FormatRequest) -> BridgeResult<FormatOutput> {
        let span = info_span!("format", instance = %self.id, file = %request.file_path);
        let _enter = span.enter();

        let request = FormatRequest {
            overrides: request.overrides.layered_over(&self.defaults),
            ..request.clone()
        };

        let start = Instant::now();
        let result = {
            let mut guard = self.acquire();
            format_with(&mut *guard, &request)
        };
        self.metrics
            .lock()
            .record(start.elapsed().as_nanos() as u64, &result);

        match result {
            Err(err) if err.is_contract_violation() => Err(self.on_contract_violation(err)),
            other => other,
        }
    }

    /// Format `text` as the file `file_path` and return the resulting text.
    pub fn format_text(
        &self,
        file_path: &str,
        text: &str,
        global: GlobalConfigOverride,
        plugin: PluginConfigOverride,
    ) -> BridgeResult<String> {
        let request = FormatRequest::new(file_path, text)
            .with_overrides(ConfigOverrides::new(global, plugin));
        self.format(&request).map(|output| output.text)
    }

    pub fn metrics(&self) -> FormatMetrics {
        self.metrics.lock().clone()
    }

    fn on_contract_violation(&self, err: BridgeError) -> BridgeError {
        match self.contract_policy {
            ContractPolicy::Terminate => terminate(&self.id, &err),
            ContractPolicy::Propagate => {
                error!(instance = %self.id, error = %err, "plugin broke the export contract");
                err
            }
        }
    }
}

impl<G: GuestExports + Send + 'static> FormatterInstance<G> {
    /// Format on tokio's blocking pool.
    ///
    /// The plugin call itself cannot be cancelled; dropping the future leaves
    /// the request running to completion.
    pub async fn format_async(self: Arc<Self>, request: FormatRequest) -> BridgeResult<FormatOutput> {
        tokio::task::spawn_blocking(move || self.format(&request))
            .await
            .map_err(|e| BridgeError::Internal(format!("format task failed: {e}")))?
    }
}

impl FormatterInstance<WasmGuest> {
    /// Compile and instantiate `bytes` as a new instance.
    pub fn from_bytes(bytes: &[u8], runtime: &RuntimeConfig) -> BridgeResult<Self> {
        let guest = WasmGuest::from_bytes(bytes, runtime)?;
        Ok(Self::new(guest, runtime.contract_policy))
    }

    pub fn module_info(&self) -> ModuleInfo {
        self.acquire().info().clone()
    }
}

fn terminate(instance: &str, err: &BridgeError) -> ! {
    error!(instance, error = %err, "plugin broke the export contract, terminating");
    std::process::exit(1)
}

static INSTANCE: OnceLock<FormatterInstance> = OnceLock::new();

/// Held while the process-wide instance is being built, so the module is
/// compiled at most once.
static INIT_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Create the process-wide instance from module bytes.
///
/// Fails with [`BridgeError::AlreadyInitialized`] on any call after the first
/// successful one. A plugin missing required exports is a contract violation
/// and handled per `runtime.contract_policy`.
pub fn initialize(bytes: &[u8], runtime: &RuntimeConfig) -> BridgeResult<&'static FormatterInstance> {
    install(bytes, runtime, ConfigOverrides::default())
}

/// Create the process-wide instance from loaded settings.
pub fn initialize_from_settings(settings: &BridgeSettings) -> BridgeResult<&'static FormatterInstance> {
    let path = settings
        .plugin_path
        .as_deref()
        .ok_or_else(|| BridgeError::Settings("plugin_path is not set".to_string()))?;
    let bytes = std::fs::read(path)?;
    install(&bytes, &settings.runtime, settings.defaults.clone())
}

fn install(
    bytes: &[u8],
    runtime: &RuntimeConfig,
    defaults: ConfigOverrides,
) -> BridgeResult<&'static FormatterInstance> {
    let _init = INIT_LOCK.lock();
    if INSTANCE.get().is_some() {
        return Err(BridgeError::AlreadyInitialized);
    }

    let instance = match FormatterInstance::from_bytes(bytes, runtime) {
        Ok(instance) => instance.with_defaults(defaults),
        Err(err)
            if err.is_contract_violation()
                && runtime.contract_policy == ContractPolicy::Terminate =>
        {
            terminate("-", &err)
        }
        Err(err) => return Err(err),
    };
    let id = instance.id().to_string();

    INSTANCE
        .set(instance)
        .map_err(|_| BridgeError::AlreadyInitialized)?;
    info!(instance = %id, "formatter instance initialized");
    instance_ref()
}

fn instance_ref() -> BridgeResult<&'static FormatterInstance> {
    INSTANCE.get().ok_or(BridgeError::NotInitialized)
}

/// The process-wide instance.
pub fn instance() -> BridgeResult<&'static FormatterInstance> {
    instance_ref()
}

/// Format with the process-wide instance.
pub fn format_text(
    file_path: &str,
    text: &str,
    global: GlobalConfigOverride,
    plugin: PluginConfigOverride,
) -> BridgeResult<String> {
    instance()?.format_text(file_path, text, global, plugin)
}
