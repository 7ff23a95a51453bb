//! Byte-addressable linear memory.

use crate::types::word::{Word, WORD_BYTES};
use crate::virtual_machine::errors::VMError;

/// Default growth ceiling: 1 MiB. Runaway programs fault against it instead
/// of exhausting the host.
pub const DEFAULT_MEMORY_LIMIT: usize = 1 << 20;

/// Zero-initialized memory that grows lazily on first touch.
///
/// The observable size only ever increases and stays a multiple of 32 bytes:
/// any access rounds the high-water mark up to the next word boundary.
/// Zero-length accesses are no-ops and never grow memory, whatever their
/// offset.
#[derive(Debug)]
pub struct Memory {
    store: Vec<u8>,
    limit: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MEMORY_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { store: Vec::new(), limit }
    }

    /// Current size in bytes, always a multiple of 32.
    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Ensures `offset..offset + len` is backed, zero-filling new space.
    /// Fails without growing when the aligned size would pass the limit, so
    /// callers can reserve a range before committing other allocations.
    pub fn grow(&mut self, offset: usize, len: usize) -> Result<(), VMError> {
        if len == 0 {
            return Ok(());
        }
        let end = offset
            .checked_add(len)
            .ok_or(VMError::MemoryLimitExceeded { requested: usize::MAX, limit: self.limit })?;
        let target = end
            .div_ceil(WORD_BYTES)
            .checked_mul(WORD_BYTES)
            .ok_or(VMError::MemoryLimitExceeded { requested: usize::MAX, limit: self.limit })?;
        if target > self.limit {
            return Err(VMError::MemoryLimitExceeded { requested: target, limit: self.limit });
        }
        if target > self.store.len() {
            self.store.resize(target, 0);
        }
        Ok(())
    }

    /// Reads the 32-byte big-endian word at `offset`.
    pub fn load_word(&mut self, offset: usize) -> Result<Word, VMError> {
        self.grow(offset, WORD_BYTES)?;
        Ok(Word::from_be_slice(&self.store[offset..offset + WORD_BYTES]))
    }

    /// Writes `value` as 32 big-endian bytes at `offset`.
    pub fn store_word(&mut self, offset: usize, value: Word) -> Result<(), VMError> {
        self.grow(offset, WORD_BYTES)?;
        self.store[offset..offset + WORD_BYTES].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn store_byte(&mut self, offset: usize, byte: u8) -> Result<(), VMError> {
        self.grow(offset, 1)?;
        self.store[offset] = byte;
        Ok(())
    }

    /// Copies out `len` bytes starting at `offset`, growing as needed.
    pub fn read_range(&mut self, offset: usize, len: usize) -> Result<Vec<u8>, VMError> {
        self.grow(offset, len)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        Ok(self.store[offset..offset + len].to_vec())
    }

    pub fn write_range(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        self.grow(offset, data.len())?;
        if !data.is_empty() {
            self.store[offset..offset + data.len()].copy_from_slice(data);
        }
        Ok(())
    }
}
