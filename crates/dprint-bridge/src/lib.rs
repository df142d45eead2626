//! dprint plugin bridge
//!
//! Drives a dprint formatting plugin compiled to WebAssembly from the host:
//! - Pushes global and plugin configuration into the sandbox
//! - Moves source text in and formatted text out through the plugin's small
//!   staging buffer, chunk by chunk
//! - Maps the plugin's status code onto a typed result
//! - Serializes requests against the single loaded instance
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Host                                │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  FormatterInstance (registry)       Mutex<guest>       │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  │  │
//! │  │  │  Invocation  │─▶│   Applier    │─▶│  Transport   │  │  │
//! │  │  │   (format)   │  │   (config)   │  │ (send/recv)  │  │  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────┘  │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                               │ GuestExports                 │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  WasmGuest (wasmtime)                                  │  │
//! │  │   exports: format, set_*_config, *_shared_bytes, ...   │  │
//! │  │   memory:  [ .. staging buffer .. ]                    │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use dprint_bridge::{FormatterInstance, FormatRequest, PluginConfigOverride, RuntimeConfig, SemiColons};
//!
//! let bytes = std::fs::read("typescript-0.84.4.wasm")?;
//! let formatter = FormatterInstance::from_bytes(&bytes, &RuntimeConfig::default())?;
//!
//! let request = FormatRequest::new("file.ts", "var a=1")
//!     .with_plugin(PluginConfigOverride::new().with_semi_colons(SemiColons::Prefer));
//! assert_eq!(formatter.format(&request)?.text, "var a = 1;\n");
//! ```

pub mod config;
pub mod format;
pub mod guest;
pub mod memory;
pub mod metrics;
pub mod registry;
pub mod runtime;
pub mod settings;
pub mod transport;
mod types;

pub use config::{
    ConfigOverrides, ConfigScope, ConfigurationApplier, GlobalConfigOverride, GlobalConfiguration,
    NewLineKind, PluginConfig, PluginConfigOverride, QuoteStyle, SemiColons,
};
pub use format::{
    FormatOutput, FormatRequest, FormatStatus, Invocation, InvocationState, StatusCode, format_with,
};
pub use guest::{Export, GuestExports, MEMORY_EXPORT};
pub use memory::{GuestPtr, StagingBuffer};
pub use metrics::FormatMetrics;
pub use registry::{FormatterInstance, InstanceGuard, format_text, initialize, initialize_from_settings, instance};
pub use runtime::{ContractPolicy, ModuleInfo, OptimizationLevel, RuntimeConfig, WasmGuest};
pub use settings::BridgeSettings;
pub use transport::Transport;
pub use types::{BridgeError, BridgeResult};
