//! Deterministic bytecode interpreter for 256-bit stack programs.
//!
//! ```
//! use evm_core::types::word::Word;
//! use evm_core::virtual_machine::vm::execute;
//!
//! // PUSH1 0x80, PUSH1 0x40, ADD
//! let result = execute(vec![0x60, 0x80, 0x60, 0x40, 0x01], Vec::new(), Word::ZERO);
//! assert!(result.is_success());
//! ```

pub mod types;
pub mod utils;
pub mod virtual_machine;
