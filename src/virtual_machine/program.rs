//! Immutable program representation and jump-destination analysis.

use crate::types::bytes::Bytes;
use crate::virtual_machine::isa::Opcode;
use std::sync::Arc;

/// Bytecode paired with its jump-destination table.
///
/// Analysis runs once at construction; `Program` is cheap to clone and can be
/// shared across executions of the same code.
#[derive(Debug, Clone)]
pub struct Program {
    code: Bytes,
    jumpdests: JumpTable,
}

impl Program {
    pub fn new(code: impl Into<Bytes>) -> Self {
        let code = code.into();
        let jumpdests = JumpTable::analyze(&code);
        Self { code, jumpdests }
    }

    pub fn code(&self) -> &Bytes {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Whether `offset` is a valid JUMP/JUMPI target.
    pub fn is_jumpdest(&self, offset: usize) -> bool {
        self.jumpdests.is_valid(offset)
    }
}

/// One bit per code offset, set where a JUMPDEST instruction starts.
#[derive(Debug, Clone)]
struct JumpTable(Arc<Vec<u64>>);

impl JumpTable {
    /// Single forward scan over the code. PUSH immediates are skipped, so a
    /// 0x5B byte inside an immediate is never marked.
    fn analyze(code: &[u8]) -> Self {
        let mut bits = vec![0u64; code.len().div_ceil(64)];
        let mut offset = 0;
        while offset < code.len() {
            match Opcode::from_byte(code[offset]) {
                Some(Opcode::JumpDest) => {
                    bits[offset / 64] |= 1 << (offset % 64);
                    offset += 1;
                }
                Some(op) => offset += 1 + op.immediate_len(),
                // Unassigned bytes only fault when executed; for analysis
                // they occupy one position like any immediate-free opcode.
                None => offset += 1,
            }
        }
        Self(Arc::new(bits))
    }

    fn is_valid(&self, offset: usize) -> bool {
        self.0
            .get(offset / 64)
            .is_some_and(|limb| limb >> (offset % 64) & 1 == 1)
    }
}
