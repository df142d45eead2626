//! Format invocation and result resolution
//!
//! One request walks the plugin through a fixed sequence:
//!
//! ```text
//!  Idle ──reset_config + apply config──▶ ConfigApplied
//!       ──send path, set_file_path, send text, format──▶ Invoked
//!       ──resolve status──▶ Resolved(Unchanged | Formatted | Errored)
//! ```
//!
//! Every request starts from `Idle`; `reset_config` clears whatever the
//! previous request left in the plugin.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ConfigOverrides, ConfigurationApplier, GlobalConfigOverride, PluginConfigOverride};
use crate::guest::{Export, GuestExports};
use crate::transport::Transport;
use crate::types::{BridgeError, BridgeResult};

/// A single formatting request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormatRequest {
    /// Path-like identifier used by the plugin to pick a dialect; never read
    pub file_path: String,
    pub text: String,
    #[serde(default)]
    pub overrides: ConfigOverrides,
}

impl FormatRequest {
    pub fn new(file_path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            text: text.into(),
            overrides: ConfigOverrides::default(),
        }
    }

    pub fn with_global(mut self, global: GlobalConfigOverride) -> Self {
        self.overrides.global = global;
        self
    }

    pub fn with_plugin(mut self, plugin: PluginConfigOverride) -> Self {
        self.overrides.plugin = plugin;
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Raw status codes returned by the `format` export
pub mod status {
    pub const UNCHANGED: i32 = 0;
    pub const FORMATTED: i32 = 1;
    pub const ERRORED: i32 = 2;
}

/// Outcome of the `format` export, resolved right after the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Unchanged,
    /// Formatted text of this many bytes is staged for retrieval
    Formatted(u32),
    /// An error message of this many bytes is staged for retrieval
    Errored(u32),
    Unknown(i32),
}

impl StatusCode {
    /// Classify `raw` and ask the plugin for the length of whatever it staged.
    pub fn resolve<G: GuestExports + ?Sized>(raw: i32, guest: &mut G) -> BridgeResult<Self> {
        Ok(match raw {
            status::UNCHANGED => StatusCode::Unchanged,
            status::FORMATTED => StatusCode::Formatted(staged_len(guest, Export::GetFormattedText)?),
            status::ERRORED => StatusCode::Errored(staged_len(guest, Export::GetErrorText)?),
            other => StatusCode::Unknown(other),
        })
    }
}

fn staged_len<G: GuestExports + ?Sized>(guest: &mut G, export: Export) -> BridgeResult<u32> {
    let len = guest.call_i32(export, &[])?;
    u32::try_from(len).map_err(|_| BridgeError::Execution {
        export: export.name().to_string(),
        message: format!("reported negative length {len}"),
    })
}

/// A trap inside `format` is a failure on this input, not a broken plugin.
fn recoverable_trap(err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Execution { export, message } => {
            warn!(export = %export, error = %message, "plugin trapped while formatting");
            BridgeError::Trap { export, message }
        }
        other => other,
    }
}

/// Successful result kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatStatus {
    Unchanged,
    Formatted,
}

impl fmt::Display for FormatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatStatus::Unchanged => write!(f, "unchanged"),
            FormatStatus::Formatted => write!(f, "formatted"),
        }
    }
}

/// Text produced by a successful request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOutput {
    pub text: String,
    pub status: FormatStatus,
}

impl FormatOutput {
    pub fn is_changed(&self) -> bool {
        self.status == FormatStatus::Formatted
    }
}

/// Where an [`Invocation`] currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Idle,
    ConfigApplied,
    Invoked(StatusCode),
    Resolved,
}

/// Drives one request through the plugin
pub struct Invocation<G> {
    transport: Transport<G>,
    state: InvocationState,
}

impl<G: GuestExports> Invocation<G> {
    pub fn new(guest: G) -> Self {
        Self {
            transport: Transport::new(guest),
            state: InvocationState::Idle,
        }
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Run `request` to completion.
    pub fn run(mut self, request: &FormatRequest) -> BridgeResult<FormatOutput> {
        self.apply_config(&request.overrides)?;
        self.invoke(&request.file_path, &request.text)?;
        self.resolve(&request.text)
    }

    /// `Idle → ConfigApplied`
    pub fn apply_config(&mut self, overrides: &ConfigOverrides) -> BridgeResult<()> {
        self.expect_state(InvocationState::Idle)?;

        self.transport
            .guest_mut()
            .call_void(Export::ResetConfig, &[])?;
        ConfigurationApplier::new(overrides).apply(&mut self.transport)?;

        self.state = InvocationState::ConfigApplied;
        Ok(())
    }

    /// `ConfigApplied → Invoked`
    pub fn invoke(&mut self, file_path: &str, text: &str) -> BridgeResult<StatusCode> {
        self.expect_state(InvocationState::ConfigApplied)?;

        self.transport.send(file_path)?;
        self.transport
            .guest_mut()
            .call_void(Export::SetFilePath, &[])?;
        self.transport.send(text)?;

        let raw = self
            .transport
            .guest_mut()
            .call_i32(Export::Format, &[])
            .map_err(recoverable_trap)?;
        let code = StatusCode::resolve(raw, self.transport.guest_mut())?;
        debug!(file_path, raw, status = ?code, "format returned");

        self.state = InvocationState::Invoked(code);
        Ok(code)
    }

    /// `Invoked → Resolved`
    pub fn resolve(&mut self, original: &str) -> BridgeResult<FormatOutput> {
        let InvocationState::Invoked(code) = self.state else {
            return Err(BridgeError::Internal(format!(
                "cannot resolve a result in state {:?}",
                self.state
            )));
        };
        self.state = InvocationState::Resolved;

        match code {
            StatusCode::Unchanged => Ok(FormatOutput {
                text: original.to_string(),
                status: FormatStatus::Unchanged,
            }),
            StatusCode::Formatted(len) => Ok(FormatOutput {
                text: self.transport.receive(len)?,
                status: FormatStatus::Formatted,
            }),
            StatusCode::Errored(len) => {
                let message = self.transport.receive(len)?;
                Err(BridgeError::Format(message))
            }
            StatusCode::Unknown(raw) => {
                warn!(raw, "plugin returned an unknown status code");
                Err(BridgeError::UnexpectedStatus(raw))
            }
        }
    }

    fn expect_state(&self, expected: InvocationState) -> BridgeResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BridgeError::Internal(format!(
                "invocation in state {:?}, expected {:?}",
                self.state, expected
            )))
        }
    }
}

/// Run one request against `guest`.
pub fn format_with<G: GuestExports>(guest: G, request: &FormatRequest) -> BridgeResult<FormatOutput> {
    Invocation::new(guest).run(request)
}
