//! Stack-based virtual machine over 256-bit words.
//!
//! The machine executes linear bytecode with an explicit instruction table
//! ([`isa`]), a bounded evaluation stack ([`stack`]), lazily growing
//! word-aligned memory ([`memory`]) and statically analyzed jump targets
//! ([`program`]). The host plugs in metering, hashing and storage through
//! the traits in [`state`]. [`vm::execute`] is the one-call entry point.

pub mod errors;
pub mod isa;
pub mod memory;
pub mod program;
pub mod stack;
pub mod state;
pub mod vm;
