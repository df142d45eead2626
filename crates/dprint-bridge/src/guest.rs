//! Guest export surface
//!
//! The plugin is only ever reached through [`GuestExports`]: named exported
//! functions taking and returning `i32`, plus direct access to its linear
//! memory. The wasmtime-backed implementation lives in [`crate::runtime`].

use std::fmt;

use crate::types::BridgeResult;

/// Name of the exported linear memory
pub const MEMORY_EXPORT: &str = "memory";

/// Exported functions the plugin must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Export {
    SetGlobalConfig,
    SetPluginConfig,
    ResetConfig,
    SetFilePath,
    Format,
    GetFormattedText,
    GetErrorText,
    GetWasmMemoryBuffer,
    GetWasmMemoryBufferSize,
    ClearSharedBytes,
    AddToSharedBytesFromBuffer,
    SetBufferWithSharedBytes,
}

impl Export {
    /// Every export the protocol relies on
    pub const ALL: [Export; 12] = [
        Export::SetGlobalConfig,
        Export::SetPluginConfig,
        Export::ResetConfig,
        Export::SetFilePath,
        Export::Format,
        Export::GetFormattedText,
        Export::GetErrorText,
        Export::GetWasmMemoryBuffer,
        Export::GetWasmMemoryBufferSize,
        Export::ClearSharedBytes,
        Export::AddToSharedBytesFromBuffer,
        Export::SetBufferWithSharedBytes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Export::SetGlobalConfig => "set_global_config",
            Export::SetPluginConfig => "set_plugin_config",
            Export::ResetConfig => "reset_config",
            Export::SetFilePath => "set_file_path",
            Export::Format => "format",
            Export::GetFormattedText => "get_formatted_text",
            Export::GetErrorText => "get_error_text",
            Export::GetWasmMemoryBuffer => "get_wasm_memory_buffer",
            Export::GetWasmMemoryBufferSize => "get_wasm_memory_buffer_size",
            Export::ClearSharedBytes => "clear_shared_bytes",
            Export::AddToSharedBytesFromBuffer => "add_to_shared_bytes_from_buffer",
            Export::SetBufferWithSharedBytes => "set_buffer_with_shared_bytes",
        }
    }

    /// Number of `i32` parameters
    pub fn param_count(&self) -> usize {
        match self {
            Export::ClearSharedBytes | Export::AddToSharedBytesFromBuffer => 1,
            Export::SetBufferWithSharedBytes => 2,
            _ => 0,
        }
    }

    /// Whether the export returns a single `i32`
    pub fn returns_i32(&self) -> bool {
        matches!(
            self,
            Export::Format
                | Export::GetFormattedText
                | Export::GetErrorText
                | Export::GetWasmMemoryBuffer
                | Export::GetWasmMemoryBufferSize
        )
    }

    /// Human readable signature, e.g. `(i32, i32) -> ()`
    pub fn signature(&self) -> String {
        let params = vec!["i32"; self.param_count()].join(", ");
        let result = if self.returns_i32() { "i32" } else { "()" };
        format!("({params}) -> {result}")
    }
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Access to a loaded plugin's exports and linear memory
///
/// Implementations must not cache anything the guest may change between
/// calls; every call goes to the guest.
pub trait GuestExports {
    /// Invoke an export. Returns the `i32` result for exports that produce one.
    fn call(&mut self, export: Export, args: &[i32]) -> BridgeResult<Option<i32>>;

    /// Copy `len` bytes out of linear memory starting at `offset`.
    fn read_memory(&mut self, offset: u32, len: u32) -> BridgeResult<Vec<u8>>;

    /// Copy `bytes` into linear memory starting at `offset`.
    fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> BridgeResult<()>;

    fn call_void(&mut self, export: Export, args: &[i32]) -> BridgeResult<()> {
        self.call(export, args).map(|_| ())
    }

    fn call_i32(&mut self, export: Export, args: &[i32]) -> BridgeResult<i32> {
        self.call(export, args)?
            .ok_or_else(|| crate::types::BridgeError::SignatureMismatch {
                name: export.name().to_string(),
                expected: export.signature(),
            })
    }
}

impl<G: GuestExports + ?Sized> GuestExports for &mut G {
    fn call(&mut self, export: Export, args: &[i32]) -> BridgeResult<Option<i32>> {
        (**self).call(export, args)
    }

    fn read_memory(&mut self, offset: u32, len: u32) -> BridgeResult<Vec<u8>> {
        (**self).read_memory(offset, len)
    }

    fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> BridgeResult<()> {
        (**self).write_memory(offset, bytes)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_names_are_unique() {
        let mut names: Vec<_> = Export::ALL.iter().map(|e| e.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Export::ALL.len());
    }

    #[test]
    fn test_export_signatures() {
        assert_eq!(Export::Format.signature(), "() -> i32");
        assert_eq!(Export::ClearSharedBytes.signature(), "(i32) -> ()");
        assert_eq!(
            Export::SetBufferWithSharedBytes.signature(),
            "(i32, i32) -> ()"
        );
        assert_eq!(Export::ResetConfig.signature(), "() -> ()");
        assert_eq!(Export::GetWasmMemoryBufferSize.to_string(), "get_wasm_memory_buffer_size");
    }
}
