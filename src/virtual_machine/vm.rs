//! The execution core: fetch, decode, dispatch, halt.

use crate::debug;
use crate::types::bytes::Bytes;
use crate::types::word::{Word, WORD_BYTES};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::memory::Memory;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::stack::Stack;
use crate::virtual_machine::state::{Hasher, Keccak256, Meter, Unmetered};

/// Terminal outcome of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The program halted normally: STOP, RETURN, or running off the end of
    /// the code.
    Stopped,
    /// The program halted with REVERT. The host must discard any external
    /// state effects of the run; the output data is still delivered.
    Reverted,
    /// A fatal condition aborted execution.
    Faulted(VMError),
}

/// Everything a completed run hands back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub outcome: Outcome,
    /// Output carried by RETURN or REVERT. `None` for STOP and faults.
    pub output: Option<Bytes>,
}

impl ExecutionResult {
    fn stopped() -> Self {
        Self { outcome: Outcome::Stopped, output: None }
    }

    fn returned(data: Vec<u8>) -> Self {
        Self { outcome: Outcome::Stopped, output: Some(data.into()) }
    }

    fn reverted(data: Vec<u8>) -> Self {
        Self { outcome: Outcome::Reverted, output: Some(data.into()) }
    }

    fn faulted(err: VMError) -> Self {
        Self { outcome: Outcome::Faulted(err), output: None }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Stopped)
    }

    pub fn fault(&self) -> Option<&VMError> {
        match &self.outcome {
            Outcome::Faulted(err) => Some(err),
            _ => None,
        }
    }
}

/// What an instruction body asks the loop to do next.
///
/// Bodies never touch the program counter themselves; only the loop advances
/// it, and only `Jump` carries a (pre-validated) target.
enum Flow {
    /// Move past this instruction and its immediates.
    Advance,
    /// Set the program counter to a validated jump destination.
    Jump(usize),
    Stop,
    Return(Vec<u8>),
    Revert(Vec<u8>),
}

/// Stack machine over 256-bit words.
///
/// A `VM` executes one program once. The [`Program`] it runs is cheap to
/// clone, so hosts re-executing the same code build one program and many
/// machines. The hash function is pluggable through [`Hasher`]; everything
/// else the machine owns.
pub struct VM<H: Hasher = Keccak256> {
    program: Program,
    /// Caller-supplied input, read-only for the whole run.
    input: Bytes,
    /// Value transferred with the call.
    value: Word,
    /// Owned by the execution loop, never by instruction bodies.
    pc: usize,
    stack: Stack,
    memory: Memory,
    hasher: H,
}

/// Runs `code` against `call_data` and `call_value` with the default
/// collaborators: Keccak-256 hashing and no metering.
pub fn execute(
    code: impl Into<Bytes>,
    call_data: impl Into<Bytes>,
    call_value: Word,
) -> ExecutionResult {
    let mut vm = VM::new(Program::new(code), call_data, call_value);
    vm.run(&mut Unmetered)
}

impl VM<Keccak256> {
    pub fn new(program: Program, call_data: impl Into<Bytes>, call_value: Word) -> Self {
        Self::with_hasher(program, call_data, call_value, Keccak256)
    }
}

impl<H: Hasher> VM<H> {
    pub fn with_hasher(
        program: Program,
        call_data: impl Into<Bytes>,
        call_value: Word,
        hasher: H,
    ) -> Self {
        Self {
            program,
            input: call_data.into(),
            value: call_value,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            hasher,
        }
    }

    /// Replaces the default memory ceiling. Must be called before `run`.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory = Memory::with_limit(limit);
        self
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Drives the machine to a halt and reports how it ended. Every run
    /// produces exactly one result; faults are reported, never panicked.
    /// The machine keeps its final stack and memory for inspection.
    pub fn run<M: Meter>(&mut self, meter: &mut M) -> ExecutionResult {
        loop {
            match self.step(meter) {
                Ok(Flow::Advance) => {}
                Ok(Flow::Jump(dest)) => self.pc = dest,
                Ok(Flow::Stop) => return ExecutionResult::stopped(),
                Ok(Flow::Return(data)) => return ExecutionResult::returned(data),
                Ok(Flow::Revert(data)) => return ExecutionResult::reverted(data),
                Err(err) => return ExecutionResult::faulted(err),
            }
        }
    }

    fn step<M: Meter>(&mut self, meter: &mut M) -> Result<Flow, VMError> {
        // The program counter moving past the end of the code is an implicit
        // STOP, not an error.
        let Some(&byte) = self.program.code().get(self.pc) else {
            return Ok(Flow::Stop);
        };
        let op = Opcode::from_byte(byte)
            .ok_or(VMError::InvalidOpcode { opcode: byte, offset: self.pc })?;
        meter.charge(op, op.base_gas())?;
        debug!("pc={:<5} op={}", self.pc, op.mnemonic());
        let flow = self.exec(op)?;
        if let Flow::Advance = flow {
            self.pc += 1 + op.immediate_len();
        }
        Ok(flow)
    }

    fn exec(&mut self, op: Opcode) -> Result<Flow, VMError> {
        if let Some(width) = op.push_width() {
            return self.op_push(width);
        }
        if let Some(depth) = op.dup_depth() {
            self.stack.duplicate(depth - 1)?;
            return Ok(Flow::Advance);
        }
        if let Some(depth) = op.swap_depth() {
            self.stack.swap(depth)?;
            return Ok(Flow::Advance);
        }
        match op {
            Opcode::Stop => Ok(Flow::Stop),
            Opcode::Add => self.binary(Word::wrapping_add),
            Opcode::Mul => self.binary(Word::wrapping_mul),
            Opcode::Sub => self.binary(Word::wrapping_sub),
            Opcode::Div => self.binary(Word::div),
            Opcode::Sdiv => self.binary(Word::sdiv),
            Opcode::Mod => self.binary(Word::rem),
            Opcode::Smod => self.binary(Word::srem),
            Opcode::AddMod => self.ternary(Word::add_mod),
            Opcode::MulMod => self.ternary(Word::mul_mod),
            Opcode::Exp => self.binary(Word::pow),
            Opcode::SignExtend => self.binary(|index, x| x.sign_extend(index)),
            Opcode::Lt => self.binary(|a, b| Word::from_bool(a < b)),
            Opcode::Gt => self.binary(|a, b| Word::from_bool(a > b)),
            Opcode::Slt => self.binary(|a, b| Word::from_bool(a.slt(b))),
            Opcode::Sgt => self.binary(|a, b| Word::from_bool(a.sgt(b))),
            Opcode::Eq => self.binary(|a, b| Word::from_bool(a == b)),
            Opcode::IsZero => self.unary(|a| Word::from_bool(a.is_zero())),
            Opcode::And => self.binary(|a, b| a & b),
            Opcode::Or => self.binary(|a, b| a | b),
            Opcode::Xor => self.binary(|a, b| a ^ b),
            Opcode::Not => self.unary(|a| !a),
            Opcode::Byte => self.binary(|index, x| x.byte(index)),
            Opcode::Shl => self.binary(|shift, x| x.shl(shift)),
            Opcode::Shr => self.binary(|shift, x| x.shr(shift)),
            Opcode::Sar => self.binary(|shift, x| x.sar(shift)),
            Opcode::Keccak256 => self.op_keccak256(),
            Opcode::CallValue => self.push_const(self.value),
            Opcode::CalldataLoad => self.op_calldataload(),
            Opcode::CalldataSize => self.push_const(Word::from_u64(self.input.len() as u64)),
            Opcode::CalldataCopy => {
                let src = self.input.clone();
                self.op_copy(src)
            }
            Opcode::CodeSize => self.push_const(Word::from_u64(self.program.len() as u64)),
            Opcode::CodeCopy => {
                let src = self.program.code().clone();
                self.op_copy(src)
            }
            Opcode::Pop => {
                self.stack.pop()?;
                Ok(Flow::Advance)
            }
            Opcode::Mload => self.op_mload(),
            Opcode::Mstore => self.op_mstore(),
            Opcode::Mstore8 => self.op_mstore8(),
            Opcode::Jump => self.op_jump(),
            Opcode::Jumpi => self.op_jumpi(),
            Opcode::Pc => self.push_const(Word::from_u64(self.pc as u64)),
            Opcode::Msize => self.push_const(Word::from_u64(self.memory.size() as u64)),
            Opcode::JumpDest => Ok(Flow::Advance),
            Opcode::Return => {
                let data = self.pop_output()?;
                Ok(Flow::Return(data))
            }
            Opcode::Revert => {
                let data = self.pop_output()?;
                Ok(Flow::Revert(data))
            }
            // The PUSH/DUP/SWAP families were dispatched above.
            _ => unreachable!("{op} handled by family dispatch"),
        }
    }

    /// Pops two operands and pushes `f(first, second)`. The first popped
    /// value is the topmost, which every two-operand instruction treats as
    /// its left operand.
    fn binary(&mut self, f: impl FnOnce(Word, Word) -> Word) -> Result<Flow, VMError> {
        let x = self.stack.pop()?;
        let y = self.stack.pop()?;
        self.stack.push(f(x, y))?;
        Ok(Flow::Advance)
    }

    fn ternary(&mut self, f: impl FnOnce(Word, Word, Word) -> Word) -> Result<Flow, VMError> {
        let x = self.stack.pop()?;
        let y = self.stack.pop()?;
        let z = self.stack.pop()?;
        self.stack.push(f(x, y, z))?;
        Ok(Flow::Advance)
    }

    fn unary(&mut self, f: impl FnOnce(Word) -> Word) -> Result<Flow, VMError> {
        let x = self.stack.pop()?;
        self.stack.push(f(x))?;
        Ok(Flow::Advance)
    }

    fn push_const(&mut self, value: Word) -> Result<Flow, VMError> {
        self.stack.push(value)?;
        Ok(Flow::Advance)
    }

    /// Converts a stack word into a memory offset or length. Anything that
    /// does not fit a `usize` cannot be backed and faults, carrying the
    /// operand that overflowed.
    fn mem_index(&self, word: Word) -> Result<usize, VMError> {
        word.to_usize().ok_or(VMError::OperandOutOfRange { value: word })
    }

    fn op_push(&mut self, width: usize) -> Result<Flow, VMError> {
        // An immediate truncated by the end of the code reads as if the code
        // were zero-padded.
        let immediate = self.program.code().read_padded(self.pc + 1, width);
        self.stack.push(Word::from_be_slice(&immediate))?;
        Ok(Flow::Advance)
    }

    fn op_keccak256(&mut self) -> Result<Flow, VMError> {
        let offset = self.stack.pop()?;
        let len = self.stack.pop()?;
        let len = self.mem_index(len)?;
        let data = if len == 0 {
            Vec::new()
        } else {
            let offset = self.mem_index(offset)?;
            self.memory.read_range(offset, len)?
        };
        self.stack.push(self.hasher.hash(&data))?;
        Ok(Flow::Advance)
    }

    fn op_calldataload(&mut self) -> Result<Flow, VMError> {
        let offset = self.stack.pop()?;
        // Offsets past the data, including ones too big for usize, read as
        // zeros.
        let word = match offset.to_usize() {
            Some(offset) => Word::from_be_slice(&self.input.read_padded(offset, WORD_BYTES)),
            None => Word::ZERO,
        };
        self.push_const(word)
    }

    /// Shared body of CALLDATACOPY and CODECOPY: copy `len` bytes of `src`
    /// starting at `offset` into memory at `dest`, zero-filling reads past
    /// the end of the source.
    fn op_copy(&mut self, src: Bytes) -> Result<Flow, VMError> {
        let dest = self.stack.pop()?;
        let offset = self.stack.pop()?;
        let len = self.stack.pop()?;
        let len = self.mem_index(len)?;
        if len == 0 {
            return Ok(Flow::Advance);
        }
        let dest = self.mem_index(dest)?;
        // Reserve the destination first: an over-limit length must fault
        // before the source buffer of that length is ever allocated.
        self.memory.grow(dest, len)?;
        let data = match offset.to_usize() {
            Some(offset) => src.read_padded(offset, len),
            None => vec![0; len],
        };
        self.memory.write_range(dest, &data)?;
        Ok(Flow::Advance)
    }

    fn op_mload(&mut self) -> Result<Flow, VMError> {
        let offset = self.stack.pop()?;
        let offset = self.mem_index(offset)?;
        let word = self.memory.load_word(offset)?;
        self.push_const(word)
    }

    fn op_mstore(&mut self) -> Result<Flow, VMError> {
        let offset = self.stack.pop()?;
        let value = self.stack.pop()?;
        let offset = self.mem_index(offset)?;
        self.memory.store_word(offset, value)?;
        Ok(Flow::Advance)
    }

    fn op_mstore8(&mut self) -> Result<Flow, VMError> {
        let offset = self.stack.pop()?;
        let value = self.stack.pop()?;
        let offset = self.mem_index(offset)?;
        self.memory.store_byte(offset, value.low_u64() as u8)?;
        Ok(Flow::Advance)
    }

    fn op_jump(&mut self) -> Result<Flow, VMError> {
        let dest = self.stack.pop()?;
        self.validated_dest(dest).map(Flow::Jump)
    }

    fn op_jumpi(&mut self) -> Result<Flow, VMError> {
        // Destination above the condition, so both pop even when not taken.
        let dest = self.stack.pop()?;
        let condition = self.stack.pop()?;
        if condition.is_zero() {
            Ok(Flow::Advance)
        } else {
            self.validated_dest(dest).map(Flow::Jump)
        }
    }

    /// A jump target is valid only if the analysis marked it. Out-of-range
    /// and mid-immediate targets fault; nothing is ever clamped.
    fn validated_dest(&self, dest: Word) -> Result<usize, VMError> {
        match dest.to_usize() {
            Some(offset) if self.program.is_jumpdest(offset) => Ok(offset),
            _ => Err(VMError::InvalidJumpDestination { dest }),
        }
    }

    fn pop_output(&mut self) -> Result<Vec<u8>, VMError> {
        let offset = self.stack.pop()?;
        let len = self.stack.pop()?;
        let len = self.mem_index(len)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let offset = self.mem_index(offset)?;
        self.memory.read_range(offset, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::state::{GasMeter, StepLimit};

    fn assemble(text: &str) -> Vec<u8> {
        hex::decode(text.replace(' ', "")).expect("bad test bytecode")
    }

    /// Runs bytecode with empty call data and hands back the final stack and
    /// memory alongside the result.
    fn run_code(code: &[u8]) -> (ExecutionResult, Stack, Memory) {
        let mut vm = VM::new(Program::new(code.to_vec()), Vec::new(), Word::ZERO);
        let result = vm.run(&mut Unmetered);
        (result, vm.stack, vm.memory)
    }

    fn run_hex(text: &str) -> (ExecutionResult, Stack, Memory) {
        run_code(&assemble(text))
    }

    fn top(stack: &Stack) -> Word {
        stack.peek(0).unwrap()
    }

    #[test]
    fn push_decodes_a_two_byte_immediate() {
        let (result, stack, _) = run_hex("61 1111 00");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(0x1111));
    }

    #[test]
    fn push_widths_stack_in_order() {
        let (result, stack, _) = run_hex("63 11111111 6B 010101011001100110010110 00");
        assert!(result.is_success());
        assert_eq!(
            top(&stack),
            Word::from_be_slice(&assemble("010101011001100110010110"))
        );
        assert_eq!(stack.peek(1).unwrap(), Word::from_u64(0x1111_1111));
    }

    #[test]
    fn truncated_push_immediate_reads_as_zero_padded() {
        // PUSH2 with a single immediate byte left in the code.
        let (result, stack, _) = run_hex("61 11");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(0x1100));
    }

    #[test]
    fn add_wraps_modulo_word_size() {
        let (result, stack, _) = run_hex("60 80 60 40 01");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(192));

        // MAX + 1 wraps to zero.
        let mut code = vec![0x7F];
        code.extend_from_slice(&[0xFF; 32]);
        code.extend_from_slice(&assemble("60 01 01"));
        let (result, stack, _) = run_code(&code);
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::ZERO);
    }

    #[test]
    fn sub_takes_the_top_as_minuend() {
        // 1 + 1 = 2, then 2 - 2 = 0.
        let (result, stack, _) = run_hex("60 01 60 01 01 60 02 03");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::ZERO);
    }

    #[test]
    fn mul_then_div() {
        // 4 * 5 = 20, then 20 / 5 = 4.
        let (result, stack, _) = run_hex("60 05 60 04 60 05 02 04 00");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(4));
    }

    #[test]
    fn division_by_zero_yields_zero() {
        let (result, stack, _) = run_hex("60 00 60 05 04");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::ZERO);
    }

    #[test]
    fn modular_and_exponent_chain() {
        // ADDMOD(2,3,2)=1, EXP 1^6=1, MULMOD(1,4,3)=1, DIV 1/2=0.
        let (result, stack, _) = run_hex("60 02 60 03 60 04 60 06 60 02 60 03 60 02 08 0A 09 04 00");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::ZERO);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn exp_computes_powers() {
        // 2^10 = 1024.
        let (result, stack, _) = run_hex("60 0A 60 02 0A");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(1024));
    }

    #[test]
    fn iszero_produces_boolean_words() {
        let (_, stack, _) = run_hex("60 00 15");
        assert_eq!(top(&stack), Word::ONE);
        let (_, stack, _) = run_hex("60 05 15");
        assert_eq!(top(&stack), Word::ZERO);
    }

    #[test]
    fn shift_amounts_of_256_or_more_saturate() {
        // 1 << 256 = 0.
        let (_, stack, _) = run_hex("60 01 61 0100 1B");
        assert_eq!(top(&stack), Word::ZERO);
        // MAX >> 300 = 0.
        let mut code = vec![0x7F];
        code.extend_from_slice(&[0xFF; 32]);
        code.extend_from_slice(&assemble("61 012C 1C"));
        let (_, stack, _) = run_code(&code);
        assert_eq!(top(&stack), Word::ZERO);
    }

    #[test]
    fn sar_preserves_the_sign() {
        // -1 >> 5 (arithmetic) stays -1.
        let mut code = vec![0x7F];
        code.extend_from_slice(&[0xFF; 32]);
        code.extend_from_slice(&assemble("60 05 1D"));
        let (_, stack, _) = run_code(&code);
        assert_eq!(top(&stack), Word::MAX);
    }

    #[test]
    fn jump_lands_on_the_marked_destination() {
        // Jumps over an ADD; 4 * 3 = 12 proves the skipped opcode never ran.
        let (result, stack, _) = run_hex("60 03 60 04 60 08 56 01 5B 02 00");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(12));
    }

    #[test]
    fn jump_forward_then_backward() {
        let (result, stack, _) =
            run_hex("60 0C 56 60 04 60 08 5B 60 04 01 00 5B 60 02 60 07 56");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(6));
    }

    #[test]
    fn jumpi_taken_and_not_taken() {
        // EQ(4,4) steers past the PUSH 9 branch.
        let (result, stack, _) = run_hex("60 04 60 04 14 60 0B 57 60 09 00 5B 60 08 00");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(8));

        // EQ(4,3) falls through to the PUSH 9 branch.
        let (result, stack, _) = run_hex("60 04 60 03 14 60 0B 57 60 09 00 5B 60 08 00");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(9));
    }

    #[test]
    fn jumpi_pops_both_operands_when_not_taken() {
        // Condition 0: both dest and condition leave the stack.
        let (result, stack, _) = run_hex("60 00 60 05 57 00 5B 00");
        assert!(result.is_success());
        assert!(stack.is_empty());
    }

    #[test]
    fn jump_into_a_push_immediate_faults() {
        // Offset 1 holds a 0x5B byte, but inside PUSH1's immediate.
        let (result, _, _) = run_hex("60 5B 60 01 56");
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::InvalidJumpDestination { dest: Word::ONE })
        );
        assert!(result.output.is_none());
    }

    #[test]
    fn jump_out_of_bounds_faults() {
        let (result, _, _) = run_hex("60 0B 56");
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::InvalidJumpDestination { dest: Word::from_u64(11) })
        );
    }

    #[test]
    fn jump_to_an_ordinary_opcode_faults() {
        let (result, _, _) = run_hex("60 00 56");
        assert!(matches!(
            result.outcome,
            Outcome::Faulted(VMError::InvalidJumpDestination { .. })
        ));
    }

    #[test]
    fn dup_copies_from_depth() {
        let (result, stack, _) = run_hex("60 01 60 02 81");
        assert!(result.is_success());
        assert_eq!(stack.len(), 3);
        assert_eq!(top(&stack), Word::from_u64(1));
        assert_eq!(stack.peek(1).unwrap(), Word::from_u64(2));
    }

    #[test]
    fn swap_exchanges_with_depth() {
        let (result, stack, _) = run_hex("60 01 60 02 60 03 91");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(1));
        assert_eq!(stack.peek(2).unwrap(), Word::from_u64(3));
    }

    #[test]
    fn pushing_past_the_depth_limit_faults() {
        let code: Vec<u8> = std::iter::repeat([0x60, 0x01])
            .take(1025)
            .flatten()
            .collect();
        let (result, stack, _) = run_code(&code);
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::StackOverflow { limit: 1024 })
        );
        assert_eq!(stack.len(), 1024);
    }

    #[test]
    fn popping_an_empty_stack_faults() {
        let (result, _, _) = run_hex("01");
        assert!(matches!(
            result.outcome,
            Outcome::Faulted(VMError::StackUnderflow { .. })
        ));
    }

    #[test]
    fn unassigned_opcode_faults_with_its_offset() {
        let (result, _, _) = run_hex("60 01 EF");
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::InvalidOpcode { opcode: 0xEF, offset: 2 })
        );
    }

    #[test]
    fn mstore_mload_roundtrip() {
        let (result, stack, memory) = run_hex("60 2A 60 00 52 60 00 51");
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(0x2A));
        assert_eq!(memory.size(), 32);
    }

    #[test]
    fn msize_tracks_aligned_growth() {
        // MSTORE8 at offset 31 keeps size at 32.
        let (_, stack, _) = run_hex("60 01 60 1F 53 59");
        assert_eq!(top(&stack), Word::from_u64(32));
        // MSTORE8 at offset 32 grows to 64.
        let (_, stack, _) = run_hex("60 01 60 20 53 59");
        assert_eq!(top(&stack), Word::from_u64(64));
    }

    #[test]
    fn mstore8_writes_the_low_byte_only() {
        // Store 0x1234 as a single byte, then load the surrounding word.
        let (_, stack, _) = run_hex("61 1234 60 00 53 60 00 51");
        let mut expected = [0u8; 32];
        expected[0] = 0x34;
        assert_eq!(top(&stack), Word::from_be_bytes(expected));
    }

    #[test]
    fn memory_growth_respects_the_configured_limit() {
        let mut vm = VM::new(Program::new(assemble("60 40 51")), Vec::new(), Word::ZERO)
            .with_memory_limit(64);
        let result = vm.run(&mut Unmetered);
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::MemoryLimitExceeded { requested: 96, limit: 64 })
        );
    }

    #[test]
    fn calldatacopy_with_a_huge_length_faults() {
        // The length fits a usize but can never be backed; the machine must
        // fault before allocating a source buffer of that size.
        let (result, _, memory) = run_hex("67 FFFFFFFFFFFFFFFF 60 00 60 00 37");
        assert!(matches!(
            result.outcome,
            Outcome::Faulted(VMError::MemoryLimitExceeded { .. })
        ));
        assert_eq!(memory.size(), 0);
    }

    #[test]
    fn codecopy_with_a_huge_length_faults() {
        let (result, _, _) = run_hex("67 FFFFFFFFFFFFFFFF 60 00 60 00 39");
        assert!(matches!(
            result.outcome,
            Outcome::Faulted(VMError::MemoryLimitExceeded { .. })
        ));
    }

    #[test]
    fn copy_length_respects_the_configured_limit() {
        // Copy 96 bytes of call data into a machine capped at 64.
        let mut vm = VM::new(
            Program::new(assemble("60 60 60 00 60 00 37")),
            vec![0xAA, 0xBB],
            Word::ZERO,
        )
        .with_memory_limit(64);
        let result = vm.run(&mut Unmetered);
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::MemoryLimitExceeded { requested: 96, limit: 64 })
        );
        assert_eq!(vm.memory.size(), 0);
    }

    #[test]
    fn return_length_respects_the_configured_limit() {
        let mut vm = VM::new(Program::new(assemble("60 60 60 00 F3")), Vec::new(), Word::ZERO)
            .with_memory_limit(64);
        let result = vm.run(&mut Unmetered);
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::MemoryLimitExceeded { requested: 96, limit: 64 })
        );
    }

    #[test]
    fn mload_offset_beyond_the_addressable_range_faults() {
        let mut code = vec![0x7F];
        code.extend_from_slice(&[0xFF; 32]);
        code.push(0x51);
        let (result, _, _) = run_code(&code);
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::OperandOutOfRange { value: Word::MAX })
        );
    }

    #[test]
    fn pc_pushes_the_current_offset() {
        let (_, stack, _) = run_hex("58 00");
        assert_eq!(top(&stack), Word::ZERO);
        let (_, stack, _) = run_hex("60 01 58");
        assert_eq!(top(&stack), Word::from_u64(2));
    }

    #[test]
    fn callvalue_pushes_the_transferred_value() {
        let mut vm = VM::new(Program::new(assemble("34 34 01")), Vec::new(), Word::from_u64(7));
        assert!(vm.run(&mut Unmetered).is_success());
        assert_eq!(top(&vm.stack), Word::from_u64(14));
    }

    #[test]
    fn calldata_reads_and_size() {
        let input: Vec<u8> = (0u8..32).collect();
        let mut vm = VM::new(
            Program::new(assemble("36 60 00 35 60 1F 35")),
            input.clone(),
            Word::ZERO,
        );
        assert!(vm.run(&mut Unmetered).is_success());
        // CALLDATALOAD at 31 reads the last byte then zero padding.
        let mut tail = [0u8; 32];
        tail[0] = 31;
        assert_eq!(top(&vm.stack), Word::from_be_bytes(tail));

        let mut full = [0u8; 32];
        full.copy_from_slice(&input);
        assert_eq!(vm.stack.peek(1).unwrap(), Word::from_be_bytes(full));
        assert_eq!(vm.stack.peek(2).unwrap(), Word::from_u64(32));
    }

    #[test]
    fn calldatacopy_zero_fills_past_the_input() {
        let result = VM::new(
            // Copy 4 bytes from input offset 0 to memory 0, return memory.
            Program::new(assemble("60 04 60 00 60 00 37 60 20 60 00 F3")),
            vec![0xAA, 0xBB],
            Word::ZERO,
        )
        .run(&mut Unmetered);
        assert!(result.is_success());
        let output = result.output.unwrap();
        assert_eq!(&output[..4], &[0xAA, 0xBB, 0x00, 0x00]);
        assert_eq!(output.len(), 32);
    }

    #[test]
    fn codecopy_reads_the_running_program() {
        // Copy the first 3 code bytes into memory, then load them.
        let (result, stack, _) = run_hex("60 03 60 00 60 00 39 60 00 51");
        assert!(result.is_success());
        let mut expected = [0u8; 32];
        expected[..3].copy_from_slice(&[0x60, 0x03, 0x60]);
        assert_eq!(top(&stack), Word::from_be_bytes(expected));
    }

    #[test]
    fn codesize_counts_immediates() {
        let (_, stack, _) = run_hex("38 00");
        assert_eq!(top(&stack), Word::from_u64(2));
    }

    #[test]
    fn keccak256_of_empty_memory_range() {
        let (result, stack, _) = run_hex("60 00 60 00 20");
        assert!(result.is_success());
        assert_eq!(
            top(&stack),
            Word::from_be_slice(
                &hex::decode("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
                    .unwrap()
            )
        );
    }

    #[test]
    fn keccak256_hashes_a_memory_range() {
        // Hash the 32-byte word containing 0x2A.
        let (result, stack, _) = run_hex("60 2A 60 00 52 60 20 60 00 20");
        assert!(result.is_success());
        let mut preimage = [0u8; 32];
        preimage[31] = 0x2A;
        let expected = Keccak256.hash(&preimage);
        assert_eq!(top(&stack), expected);
    }

    #[test]
    fn hasher_is_pluggable() {
        struct LengthHasher;
        impl Hasher for LengthHasher {
            fn hash(&self, data: &[u8]) -> Word {
                Word::from_u64(data.len() as u64)
            }
        }
        let result = VM::with_hasher(
            Program::new(assemble("60 20 60 00 20 60 00 52 60 20 60 00 F3")),
            Vec::new(),
            Word::ZERO,
            LengthHasher,
        )
        .run(&mut Unmetered);
        let output = result.output.unwrap();
        assert_eq!(output[31], 32);
    }

    #[test]
    fn return_carries_the_memory_range() {
        let result = execute(assemble("60 2A 60 00 52 60 20 60 00 F3"), Vec::new(), Word::ZERO);
        assert_eq!(result.outcome, Outcome::Stopped);
        let output = result.output.unwrap();
        assert_eq!(output.len(), 32);
        assert_eq!(output[31], 0x2A);
    }

    #[test]
    fn revert_halts_with_output_but_not_success() {
        let result = execute(assemble("60 2A 60 00 52 60 20 60 00 FD"), Vec::new(), Word::ZERO);
        assert_eq!(result.outcome, Outcome::Reverted);
        assert!(!result.is_success());
        assert_eq!(result.output.unwrap()[31], 0x2A);
    }

    #[test]
    fn revert_with_an_empty_range_still_yields_output() {
        let result = execute(assemble("60 00 60 00 FD"), Vec::new(), Word::ZERO);
        assert_eq!(result.outcome, Outcome::Reverted);
        assert!(result.output.unwrap().is_empty());
    }

    #[test]
    fn stop_and_running_off_the_end_yield_no_output() {
        let result = execute(assemble("60 01 00"), Vec::new(), Word::ZERO);
        assert_eq!(result.outcome, Outcome::Stopped);
        assert!(result.output.is_none());

        let result = execute(assemble("60 01"), Vec::new(), Word::ZERO);
        assert_eq!(result.outcome, Outcome::Stopped);
        assert!(result.output.is_none());
    }

    #[test]
    fn empty_program_stops_immediately() {
        let result = execute(Vec::new(), Vec::new(), Word::ZERO);
        assert_eq!(result.outcome, Outcome::Stopped);
        assert!(result.output.is_none());
    }

    #[test]
    fn gas_meter_faults_the_run_when_exhausted() {
        let program = Program::new(assemble("60 01 60 01 01"));
        // Two pushes cost 6; the budget covers only the first.
        let result = VM::new(program.clone(), Vec::new(), Word::ZERO).run(&mut GasMeter::new(5));
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::OutOfGas { needed: 3, remaining: 2 })
        );

        let mut meter = GasMeter::new(100);
        let result = VM::new(program, Vec::new(), Word::ZERO).run(&mut meter);
        assert!(result.is_success());
        // PUSH + PUSH + ADD = 9.
        assert_eq!(meter.remaining(), 91);
    }

    #[test]
    fn step_limit_terminates_an_infinite_loop() {
        // JUMPDEST, PUSH1 0, JUMP: spins forever when unmetered.
        let result = VM::new(Program::new(assemble("5B 60 00 56")), Vec::new(), Word::ZERO)
            .run(&mut StepLimit::new(1_000));
        assert_eq!(
            result.outcome,
            Outcome::Faulted(VMError::OutOfGas { needed: 1, remaining: 0 })
        );
    }

    #[test]
    fn signed_division_through_bytecode() {
        // SDIV(-4, 2) = -2.
        let mut code = vec![0x60, 0x02, 0x7F];
        code.extend_from_slice(&Word::from_u64(4).wrapping_neg().to_be_bytes());
        code.push(0x05);
        let (result, stack, _) = run_code(&code);
        assert!(result.is_success());
        assert_eq!(top(&stack), Word::from_u64(2).wrapping_neg());
    }

    #[test]
    fn byte_extracts_big_endian_positions() {
        // BYTE(31, 0xFF) = 0xFF, BYTE(0, 0xFF) = 0.
        let (_, stack, _) = run_hex("60 FF 60 1F 1A");
        assert_eq!(top(&stack), Word::from_u64(0xFF));
        let (_, stack, _) = run_hex("60 FF 60 00 1A");
        assert_eq!(top(&stack), Word::ZERO);
    }
}
