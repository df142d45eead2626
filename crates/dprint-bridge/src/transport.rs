//! Shared-buffer transport
//!
//! Moves byte payloads of any length between host and guest through the
//! guest's staging buffer, which is usually far smaller than the payload.
//!
//! ```text
//!  send:    clear_shared_bytes(total)
//!           repeat { query buffer -> write chunk -> add_to_shared_bytes_from_buffer(n) }
//!
//!  receive: repeat { query buffer -> set_buffer_with_shared_bytes(read, n)
//!                    -> query buffer -> read chunk }
//! ```
//!
//! The staging buffer's offset and capacity are re-queried for every chunk.
//! The guest may move or resize it on any call.

use tracing::{debug, trace};

use crate::guest::{Export, GuestExports};
use crate::memory::StagingBuffer;
use crate::types::{BridgeError, BridgeResult};

/// Chunked byte transfer over a guest's staging buffer
pub struct Transport<G> {
    guest: G,
}

impl<G: GuestExports> Transport<G> {
    pub fn new(guest: G) -> Self {
        Self { guest }
    }

    /// Send a UTF-8 string into the guest's shared bytes.
    pub fn send(&mut self, text: &str) -> BridgeResult<()> {
        self.send_bytes(text.as_bytes())
    }

    /// Send raw bytes into the guest's shared bytes.
    ///
    /// An empty payload is still a transfer: the accumulation is cleared and a
    /// single zero-length chunk is appended.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> BridgeResult<()> {
        let total = i32::try_from(bytes.len()).map_err(|_| {
            BridgeError::Internal(format!(
                "payload of {} bytes exceeds the guest's addressable length",
                bytes.len()
            ))
        })?;

        self.guest.call_void(Export::ClearSharedBytes, &[total])?;

        let mut written = 0usize;
        let mut chunks = 0usize;
        loop {
            let buffer = StagingBuffer::query(&mut self.guest)?;
            let len = (bytes.len() - written).min(buffer.capacity as usize);
            let chunk = &bytes[written..written + len];

            self.guest.write_memory(buffer.ptr.into(), chunk)?;
            // len <= capacity, which came from an i32
            self.guest
                .call_void(Export::AddToSharedBytesFromBuffer, &[len as i32])?;

            written += len;
            chunks += 1;
            trace!(
                chunk = chunks,
                offset = buffer.ptr.0,
                capacity = buffer.capacity,
                len,
                "wrote chunk"
            );

            if written >= bytes.len() {
                break;
            }
        }

        debug!(len = bytes.len(), chunks, "sent shared bytes");
        Ok(())
    }

    /// Receive `length` bytes the guest has staged in its shared bytes.
    pub fn receive_bytes(&mut self, length: u32) -> BridgeResult<Vec<u8>> {
        let total = length as usize;
        let mut received = Vec::with_capacity(total);
        let mut chunks = 0usize;

        while received.len() < total {
            let capacity = StagingBuffer::query(&mut self.guest)?.capacity as usize;
            let len = (total - received.len()).min(capacity);
            // Both values fit in i32: total came from a u32 the guest reported
            // as i32, len is bounded by an i32 capacity.
            let read_offset = received.len() as i32;

            self.guest
                .call_void(Export::SetBufferWithSharedBytes, &[read_offset, len as i32])?;

            // The copy above may have moved the buffer.
            let buffer = StagingBuffer::query(&mut self.guest)?;
            let chunk = self.guest.read_memory(buffer.ptr.into(), len as u32)?;
            received.extend_from_slice(&chunk);

            chunks += 1;
            trace!(
                chunk = chunks,
                offset = buffer.ptr.0,
                capacity = buffer.capacity,
                len,
                "read chunk"
            );
        }

        debug!(len = total, chunks, "received shared bytes");
        Ok(received)
    }

    /// Receive `length` bytes and decode them as UTF-8.
    pub fn receive(&mut self, length: u32) -> BridgeResult<String> {
        let bytes = self.receive_bytes(length)?;
        String::from_utf8(bytes).map_err(|e| BridgeError::InvalidUtf8(e.to_string()))
    }

    pub fn guest_mut(&mut self) -> &mut G {
        &mut self.guest
    }

    pub fn into_inner(self) -> G {
        self.guest
    }
}
