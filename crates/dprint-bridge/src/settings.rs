//! Bridge settings
//!
//! Settings are read from a TOML, YAML or JSON file (detected by extension),
//! with `${VAR}` / `$VAR` references substituted from the environment, then
//! overlaid with `DPRINT_BRIDGE__*` environment variables.
//!
//! ```toml
//! plugin_path = "${PLUGIN_DIR}/typescript-0.84.4.wasm"
//!
//! [runtime]
//! optimization_level = "speed"
//! contract_policy = "propagate"
//!
//! [defaults.global]
//! lineWidth = 100
//!
//! [defaults.plugin]
//! quoteStyle = "alwaysDouble"
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ::config::{Config as Cfg, Environment, File};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

pub use ::config::FileFormat;

use crate::config::ConfigOverrides;
use crate::runtime::RuntimeConfig;
use crate::types::{BridgeError, BridgeResult};

/// Prefix of environment variables overlaid on file settings
pub const ENV_PREFIX: &str = "DPRINT_BRIDGE";

static BRACED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid braced variable pattern")
});

static BARE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("valid bare variable pattern")
});

/// Everything needed to stand up the process-wide formatter
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Plugin binary to load
    pub plugin_path: Option<PathBuf>,
    pub runtime: RuntimeConfig,
    /// Overrides applied beneath every request's own overrides
    pub defaults: ConfigOverrides,
}

/// Detect configuration format from file extension
pub fn detect_format(path: &Path) -> BridgeResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| BridgeError::Settings("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(BridgeError::Settings(format!("Unsupported format: {ext}"))),
    }
}

/// Substitute environment variables in a string
///
/// Unset variables are left as written.
pub fn substitute_env_vars(content: &str) -> String {
    let lookup = |caps: &Captures| std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string());

    let braced = BRACED_VAR.replace_all(content, lookup);
    BARE_VAR.replace_all(&braced, lookup).into_owned()
}

impl BridgeSettings {
    /// Load settings from `path`, then overlay the environment.
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content, format)
    }

    /// Parse settings from `content`, then overlay the environment.
    pub fn from_str(content: &str, format: FileFormat) -> BridgeResult<Self> {
        let substituted = substitute_env_vars(content);

        Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|cfg| cfg.try_deserialize::<Self>())
            .map_err(|e| BridgeError::Settings(e.to_string()))
    }
}
