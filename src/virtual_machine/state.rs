//! Collaborators the surrounding system plugs into the machine.
//!
//! The interpreter core owns nothing but the stack, memory and program
//! counter. Metering, hashing and persistent storage are traits implemented
//! by the host, so the same core serves an unmetered debugger run and a
//! fully charged production execution.

use crate::types::word::Word;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use sha3::Digest;
use std::collections::BTreeMap;

/// Charges resources for each instruction before it executes.
///
/// Returning an error aborts the run with a fault; the instruction whose
/// charge failed never executes.
pub trait Meter {
    fn charge(&mut self, op: Opcode, cost: u64) -> Result<(), VMError>;
}

/// Meter that never refuses. Execution of a looping program will not
/// terminate under it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unmetered;

impl Meter for Unmetered {
    fn charge(&mut self, _op: Opcode, _cost: u64) -> Result<(), VMError> {
        Ok(())
    }
}

/// Budget meter charging each instruction's base cost.
#[derive(Debug, Clone)]
pub struct GasMeter {
    remaining: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { remaining: limit }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Meter for GasMeter {
    fn charge(&mut self, _op: Opcode, cost: u64) -> Result<(), VMError> {
        if cost > self.remaining {
            return Err(VMError::OutOfGas { needed: cost, remaining: self.remaining });
        }
        self.remaining -= cost;
        Ok(())
    }
}

/// Meter that bounds the number of executed instructions, ignoring cost.
/// Guarantees termination even for free instructions in a loop.
#[derive(Debug, Clone)]
pub struct StepLimit {
    remaining: u64,
}

impl StepLimit {
    pub fn new(steps: u64) -> Self {
        Self { remaining: steps }
    }
}

impl Meter for StepLimit {
    fn charge(&mut self, _op: Opcode, _cost: u64) -> Result<(), VMError> {
        if self.remaining == 0 {
            return Err(VMError::OutOfGas { needed: 1, remaining: 0 });
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// 256-bit digest provider backing the KECCAK256 instruction.
pub trait Hasher {
    fn hash(&self, data: &[u8]) -> Word;
}

/// Keccak-256 over the `sha3` crate, the default hash of the machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256;

impl Hasher for Keccak256 {
    fn hash(&self, data: &[u8]) -> Word {
        Word::from_be_slice(&sha3::Keccak256::digest(data))
    }
}

/// Word-addressed persistent storage. Absent keys read as zero.
pub trait State {
    fn get(&self, key: Word) -> Word;
    fn put(&mut self, key: Word, value: Word);
}

/// In-memory state, used standalone in tests and as the base of an overlay.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    entries: BTreeMap<Word, Word>,
}

impl State for MemoryState {
    fn get(&self, key: Word) -> Word {
        self.entries.get(&key).copied().unwrap_or(Word::ZERO)
    }

    fn put(&mut self, key: Word, value: Word) {
        if value.is_zero() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }
}

/// Write buffer over a base state.
///
/// Reads fall through to the base until shadowed; writes accumulate locally.
/// On a normal halt the host commits the buffer with [`Self::into_writes`];
/// on a revert it simply drops the overlay and the base is untouched.
#[derive(Debug)]
pub struct OverlayState<'a, S: State> {
    base: &'a S,
    writes: BTreeMap<Word, Word>,
}

impl<'a, S: State> OverlayState<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self { base, writes: BTreeMap::new() }
    }

    /// Consumes the overlay, yielding the buffered writes for commit.
    pub fn into_writes(self) -> BTreeMap<Word, Word> {
        self.writes
    }
}

impl<S: State> State for OverlayState<'_, S> {
    fn get(&self, key: Word) -> Word {
        match self.writes.get(&key) {
            Some(value) => *value,
            None => self.base.get(key),
        }
    }

    fn put(&mut self, key: Word, value: Word) {
        self.writes.insert(key, value);
    }
}
