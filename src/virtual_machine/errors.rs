//! Execution error types.

use crate::types::word::Word;
use thiserror::Error;

/// Fatal conditions that abort the current execution.
///
/// None of these are recoverable mid-run: the execution loop surfaces the
/// first one raised as a `Faulted` outcome and performs no further steps.
/// REVERT is deliberately not represented here; it is a halting outcome, not
/// an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    /// Push attempted with the stack already at its depth limit.
    #[error("stack overflow: depth limit {limit} exceeded")]
    StackOverflow { limit: usize },
    /// An operation required more stack items than are present.
    #[error("stack underflow: needed {needed} items, have {depth}")]
    StackUnderflow { needed: usize, depth: usize },
    /// Memory growth would exceed the configured safety ceiling.
    #[error("memory limit exceeded: requested {requested} bytes, ceiling is {limit}")]
    MemoryLimitExceeded { requested: usize, limit: usize },
    /// An offset or length operand too large to address memory at all.
    #[error("memory operand {value} exceeds the addressable range")]
    OperandOutOfRange { value: Word },
    /// Opcode byte with no instruction table entry.
    #[error("invalid opcode {opcode:#04x} at offset {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },
    /// JUMP/JUMPI target outside the code or not a valid JUMPDEST.
    #[error("invalid jump destination {dest}")]
    InvalidJumpDestination { dest: Word },
    /// The metering collaborator refused to fund the next instruction.
    #[error("out of gas: needed {needed}, remaining {remaining}")]
    OutOfGas { needed: u64, remaining: u64 },
}
