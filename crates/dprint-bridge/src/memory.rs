//! Guest memory addressing
//!
//! Offsets into the plugin's linear memory, the staging buffer view, and the
//! bounds checks applied before any host-side copy.

use std::ops::Range;

use crate::guest::{Export, GuestExports};
use crate::types::{BridgeError, BridgeResult};

/// Guest pointer type (32-bit address in WASM linear memory)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuestPtr(pub u32);

impl GuestPtr {
    pub fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub fn offset(&self, bytes: u32) -> Self {
        Self(self.0.saturating_add(bytes))
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for GuestPtr {
    fn from(addr: u32) -> Self {
        Self(addr)
    }
}

impl From<GuestPtr> for u32 {
    fn from(ptr: GuestPtr) -> Self {
        ptr.0
    }
}

/// Where the staging buffer lives right now
///
/// Only valid until the next call into the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingBuffer {
    pub ptr: GuestPtr,
    pub capacity: u32,
}

impl StagingBuffer {
    /// Ask the guest for the current offset and capacity.
    pub fn query<G: GuestExports + ?Sized>(guest: &mut G) -> BridgeResult<Self> {
        let capacity = guest.call_i32(Export::GetWasmMemoryBufferSize, &[])?;
        let offset = guest.call_i32(Export::GetWasmMemoryBuffer, &[])?;
        Self::from_raw(offset, capacity)
    }

    pub fn from_raw(offset: i32, capacity: i32) -> BridgeResult<Self> {
        match (u32::try_from(offset), u32::try_from(capacity)) {
            (Ok(ptr), Ok(cap)) if cap > 0 => Ok(Self {
                ptr: GuestPtr(ptr),
                capacity: cap,
            }),
            _ => Err(BridgeError::InvalidBuffer { offset, capacity }),
        }
    }
}

/// Byte range `[ptr, ptr + len)` inside a memory of `memory_len` bytes.
pub fn checked_range(memory_len: usize, ptr: GuestPtr, len: u32) -> BridgeResult<Range<usize>> {
    let start = ptr.as_usize();
    let end = start
        .checked_add(len as usize)
        .ok_or(BridgeError::MemoryOutOfBounds {
            offset: ptr.0,
            size: len,
        })?;

    if end > memory_len {
        return Err(BridgeError::MemoryOutOfBounds {
            offset: ptr.0,
            size: len,
        });
    }

    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_ptr() {
        let ptr = GuestPtr::new(100);
        assert_eq!(ptr.0, 100);
        assert_eq!(ptr.offset(50).0, 150);
        assert_eq!(GuestPtr::new(u32::MAX).offset(1).0, u32::MAX);
    }

    #[test]
    fn test_checked_range() {
        assert_eq!(checked_range(65536, GuestPtr(1024), 16).unwrap(), 1024..1040);
        assert_eq!(checked_range(65536, GuestPtr(65536), 0).unwrap(), 65536..65536);
        assert!(checked_range(65536, GuestPtr(65530), 16).is_err());
        assert!(checked_range(65536, GuestPtr(u32::MAX), u32::MAX).is_err());
    }

    #[test]
    fn test_staging_buffer_rejects_negative_and_empty() {
        assert!(StagingBuffer::from_raw(1024, 64).is_ok());
        assert!(matches!(
            StagingBuffer::from_raw(-8, 64),
            Err(BridgeError::InvalidBuffer { offset: -8, .. })
        ));
        assert!(matches!(
            StagingBuffer::from_raw(1024, 0),
            Err(BridgeError::InvalidBuffer { capacity: 0, .. })
        ));
    }
}
