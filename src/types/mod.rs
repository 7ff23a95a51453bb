//! Value types shared across the machine.

pub mod bytes;
pub mod word;
