use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{Result, SnapError};

/// Buffer header flags.
pub mod flags {
    /// The buffer completes one logical frame.
    pub const FRAME_END: u32 = 1 << 2;
}

struct Slot {
    data: Vec<u8>,
    length: usize,
    offset: usize,
    flags: u32,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            data: Vec::new(),
            length: 0,
            offset: 0,
            flags: 0,
        }
    }

    fn reset(&mut self) {
        self.length = 0;
        self.offset = 0;
        self.flags = 0;
    }
}

struct PoolInner {
    name: String,
    buffer_size: usize,
    count: usize,
    free: Mutex<Vec<Slot>>,
}

/// A fixed set of equally sized buffers bound to one port.
///
/// Buffers are handed out with [`BufferPool::acquire`] and come back when the
/// [`PortBuffer`] is dropped, wherever that happens: in the application, inside
/// the driver, or in a port callback. Dropping the pool while buffers are out
/// is allowed; those buffers are simply freed when released.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    pub fn new(name: impl Into<String>, count: usize, buffer_size: usize) -> Result<Self> {
        let name = name.into();
        if count == 0 {
            return Err(SnapError::InvalidInput(format!(
                "Buffer pool {} needs at least one buffer",
                name
            )));
        }

        let mut free = Vec::with_capacity(count);
        for _ in 0..count {
            let mut data = Vec::new();
            data.try_reserve_exact(buffer_size).map_err(|_| {
                SnapError::ResourceExhausted(format!("Failed to create {} pool", name))
            })?;
            data.resize(buffer_size, 0);
            free.push(Slot {
                data,
                length: 0,
                offset: 0,
                flags: 0,
            });
        }

        log::debug!(
            "Created pool {} with {} buffer(s) of {} bytes",
            name,
            count,
            buffer_size
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                name,
                buffer_size,
                count,
                free: Mutex::new(free),
            }),
        })
    }

    /// Takes a free buffer without blocking; `None` when the pool is exhausted.
    pub fn acquire(&self) -> Option<PortBuffer> {
        let slot = self.inner.free.lock().pop()?;
        Some(PortBuffer {
            slot,
            pool: Arc::downgrade(&self.inner),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    pub fn count(&self) -> usize {
        self.inner.count
    }

    /// Buffers currently sitting in the pool.
    pub fn available(&self) -> usize {
        self.inner.free.lock().len()
    }

    /// Buffers currently held by the application or the driver.
    pub fn in_flight(&self) -> usize {
        self.inner.count - self.available()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("name", &self.inner.name)
            .field("buffer_size", &self.inner.buffer_size)
            .field("count", &self.inner.count)
            .field("available", &self.available())
            .finish()
    }
}

/// A buffer drawn from a [`BufferPool`].
///
/// Ownership moves with the value: submitting it to a port hands it to the
/// driver, a port callback hands it back. Dropping it returns it to its pool.
pub struct PortBuffer {
    slot: Slot,
    pool: Weak<PoolInner>,
}

impl PortBuffer {
    fn slot(&self) -> &Slot {
        &self.slot
    }

    fn slot_mut(&mut self) -> &mut Slot {
        &mut self.slot
    }

    pub fn capacity(&self) -> usize {
        self.slot().data.len()
    }

    pub fn length(&self) -> usize {
        self.slot().length
    }

    pub fn offset(&self) -> usize {
        self.slot().offset
    }

    pub fn flags(&self) -> u32 {
        self.slot().flags
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags() & flag != 0
    }

    pub fn set_flags(&mut self, flags: u32) {
        self.slot_mut().flags = flags;
    }

    /// Sets the valid payload window inside the buffer.
    pub fn set_payload(&mut self, offset: usize, length: usize) -> Result<()> {
        let capacity = self.capacity();
        if offset.checked_add(length).map_or(true, |end| end > capacity) {
            return Err(SnapError::InvalidInput(format!(
                "Payload {}+{} exceeds buffer capacity {}",
                offset, length, capacity
            )));
        }
        let slot = self.slot_mut();
        slot.offset = offset;
        slot.length = length;
        Ok(())
    }

    /// The valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        let slot = self.slot();
        &slot.data[slot.offset..slot.offset + slot.length]
    }

    /// The whole backing storage, regardless of the payload window.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.slot_mut().data
    }

    /// Copies `bytes` to the start of the buffer and makes them the payload.
    pub fn fill(&mut self, bytes: &[u8]) -> Result<()> {
        let capacity = self.capacity();
        if bytes.len() > capacity {
            return Err(SnapError::InvalidInput(format!(
                "{} bytes exceed buffer capacity {}",
                bytes.len(),
                capacity
            )));
        }
        let slot = self.slot_mut();
        slot.data[..bytes.len()].copy_from_slice(bytes);
        slot.offset = 0;
        slot.length = bytes.len();
        Ok(())
    }

    /// Returns the buffer to its pool. Never fails.
    pub fn release(self) {}
}

impl Drop for PortBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            let mut slot = std::mem::replace(&mut self.slot, Slot::empty());
            slot.reset();
            pool.free.lock().push(slot);
        }
    }
}

impl fmt::Debug for PortBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortBuffer")
            .field("capacity", &self.capacity())
            .field("offset", &self.offset())
            .field("length", &self.length())
            .field("flags", &self.flags())
            .finish()
    }
}
