//! Wasmtime-backed plugin host
//!
//! Compiles and instantiates the plugin module and exposes it through
//! [`GuestExports`]. All calls are synchronous; the plugin is never suspended.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use wasmtime::{
    Config, Engine, ExternType, Func, Instance, Linker, Memory, Module, OptLevel, ResourceLimiter,
    Store, Val, ValType,
};

use crate::guest::{Export, GuestExports, MEMORY_EXPORT};
use crate::memory::{GuestPtr, checked_range};
use crate::types::{BridgeError, BridgeResult};

const WASM_PAGE_SIZE: u64 = 65536;

/// Optimization level for compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

/// What to do when the plugin breaks the export protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractPolicy {
    /// Log and exit the process
    #[default]
    Terminate,
    /// Return the error to the caller
    Propagate,
}

/// Plugin runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Cranelift optimization level
    pub optimization_level: OptimizationLevel,
    /// Emit DWARF debug info for the compiled plugin
    pub debug_info: bool,
    /// Compile functions in parallel
    pub parallel_compilation: bool,
    /// Maximum linear memory in 64KB pages
    pub max_memory_pages: u32,
    /// Satisfy imports the host does not provide with trapping stubs
    pub trap_unknown_imports: bool,
    pub contract_policy: ContractPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::Speed,
            debug_info: false,
            parallel_compilation: true,
            max_memory_pages: 4096, // 256MB
            trap_unknown_imports: true,
            contract_policy: ContractPolicy::Terminate,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_optimization(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn with_contract_policy(mut self, policy: ContractPolicy) -> Self {
        self.contract_policy = policy;
        self
    }

    pub fn with_max_memory_pages(mut self, pages: u32) -> Self {
        self.max_memory_pages = pages;
        self
    }

    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_pages as u64 * WASM_PAGE_SIZE
    }

    /// Convert to wasmtime Config
    fn to_wasmtime_config(&self) -> Config {
        let mut config = Config::new();

        config.debug_info(self.debug_info);
        config.parallel_compilation(self.parallel_compilation);

        match self.optimization_level {
            OptimizationLevel::None => {
                config.cranelift_opt_level(OptLevel::None);
            }
            OptimizationLevel::Speed => {
                config.cranelift_opt_level(OptLevel::Speed);
            }
            OptimizationLevel::SpeedAndSize => {
                config.cranelift_opt_level(OptLevel::SpeedAndSize);
            }
        }

        config
    }
}

/// Facts about the loaded module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Hex SHA-256 of the module bytes
    pub digest: String,
    pub size_bytes: usize,
    /// Names of every exported function and memory
    pub exports: Vec<String>,
    pub compile_time_ms: u64,
}

impl ModuleInfo {
    fn new(module: &Module, bytes: &[u8], compile_time_ms: u64) -> Self {
        let exports = module
            .exports()
            .filter(|e| matches!(e.ty(), ExternType::Func(_) | ExternType::Memory(_)))
            .map(|e| e.name().to_string())
            .collect();

        Self {
            digest: hex::encode(Sha256::digest(bytes)),
            size_bytes: bytes.len(),
            exports,
            compile_time_ms,
        }
    }
}

/// Store data: resource limits only
pub struct GuestState {
    limits: StoreLimits,
}

/// Store limits for resource control
pub struct StoreLimits {
    pub max_memory_bytes: u64,
}

impl ResourceLimiter for StoreLimits {
    fn memory_growing(
        &mut self,
        _current: usize,
        desired: usize,
        maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        let max = maximum.unwrap_or(self.max_memory_bytes as usize);
        Ok(desired <= max && desired as u64 <= self.max_memory_bytes)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        Ok(maximum.is_none_or(|max| desired <= max))
    }
}

/// A compiled and instantiated plugin
pub struct WasmGuest {
    store: Store<GuestState>,
    instance: Instance,
    memory: Memory,
    exports: HashMap<Export, Func>,
    info: ModuleInfo,
}

impl WasmGuest {
    /// Compile `bytes` (binary or WAT text) and instantiate it.
    ///
    /// Every export in [`Export::ALL`] and the `memory` export are resolved
    /// up front; a plugin lacking any of them is rejected here.
    pub fn from_bytes(bytes: &[u8], config: &RuntimeConfig) -> BridgeResult<Self> {
        let engine = Engine::new(&config.to_wasmtime_config())
            .map_err(|e| BridgeError::Internal(format!("Failed to create engine: {e}")))?;

        let start = Instant::now();
        let module =
            Module::new(&engine, bytes).map_err(|e| BridgeError::Compilation(e.to_string()))?;
        let compile_time_ms = start.elapsed().as_millis() as u64;
        let info = ModuleInfo::new(&module, bytes, compile_time_ms);

        let mut store = Store::new(
            &engine,
            GuestState {
                limits: StoreLimits {
                    max_memory_bytes: config.max_memory_bytes(),
                },
            },
        );
        store.limiter(|state| &mut state.limits);

        let mut linker = Linker::new(&engine);
        if config.trap_unknown_imports {
            linker
                .define_unknown_imports_as_traps(&module)
                .map_err(|e| BridgeError::Instantiation(e.to_string()))?;
        }
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| BridgeError::Instantiation(e.to_string()))?;

        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| BridgeError::MissingExport {
                name: MEMORY_EXPORT.to_string(),
            })?;

        let mut guest = Self {
            store,
            instance,
            memory,
            exports: HashMap::new(),
            info,
        };
        for export in Export::ALL {
            let func = guest.resolve(export)?;
            guest.exports.insert(export, func);
        }

        info!(
            digest = %guest.info.digest,
            size = guest.info.size_bytes,
            exports = guest.info.exports.len(),
            compile_ms = compile_time_ms,
            "plugin instantiated"
        );
        Ok(guest)
    }

    /// Read the module from `path` and instantiate it.
    pub fn from_file(path: &Path, config: &RuntimeConfig) -> BridgeResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, config)
    }

    /// Look up `export` and check it has the shape the protocol expects.
    pub fn resolve(&mut self, export: Export) -> BridgeResult<Func> {
        let func = self
            .instance
            .get_func(&mut self.store, export.name())
            .ok_or_else(|| BridgeError::MissingExport {
                name: export.name().to_string(),
            })?;

        let ty = func.ty(&self.store);
        let params_ok = ty.params().len() == export.param_count()
            && ty.params().all(|p| matches!(p, ValType::I32));
        let results_ok = if export.returns_i32() {
            ty.results().len() == 1 && ty.results().all(|r| matches!(r, ValType::I32))
        } else {
            ty.results().len() == 0
        };

        if !(params_ok && results_ok) {
            return Err(BridgeError::SignatureMismatch {
                name: export.name().to_string(),
                expected: export.signature(),
            });
        }
        Ok(func)
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Current size of linear memory in bytes
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }
}

impl GuestExports for WasmGuest {
    fn call(&mut self, export: Export, args: &[i32]) -> BridgeResult<Option<i32>> {
        let func = *self
            .exports
            .get(&export)
            .ok_or_else(|| BridgeError::MissingExport {
                name: export.name().to_string(),
            })?;

        let params: Vec<Val> = args.iter().map(|a| Val::I32(*a)).collect();
        let mut results = if export.returns_i32() {
            vec![Val::I32(0)]
        } else {
            Vec::new()
        };

        func.call(&mut self.store, &params, &mut results)
            .map_err(|e| BridgeError::Execution {
                export: export.name().to_string(),
                message: e.to_string(),
            })?;

        let value = results.first().and_then(|v| v.i32());
        debug!(export = export.name(), ?args, result = ?value, "called export");
        Ok(value)
    }

    fn read_memory(&mut self, offset: u32, len: u32) -> BridgeResult<Vec<u8>> {
        let data = self.memory.data(&self.store);
        let range = checked_range(data.len(), GuestPtr(offset), len)?;
        Ok(data[range].to_vec())
    }

    fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> BridgeResult<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| BridgeError::MemoryOutOfBounds {
            offset,
            size: u32::MAX,
        })?;
        let data = self.memory.data_mut(&mut self.store);
        let range = checked_range(data.len(), GuestPtr(offset), len)?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }
}
