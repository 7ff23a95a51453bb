//! Instruction set architecture.
//!
//! The whole instruction table lives in one canonical macro invocation,
//! [`for_each_opcode!`]. Each row carries the opcode byte, the mnemonic, the
//! number of immediate operand bytes embedded in the code stream, and the
//! base metering cost. Everything else (the [`Opcode`] enum, byte decoding,
//! accessors) is generated from that single list, so a new instruction is one
//! new row.

/// Invokes `$callback` once with the full instruction table.
///
/// Row format: `Variant = byte, "MNEMONIC", immediates, gas;`
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            Stop = 0x00, "STOP", 0, 0;
            Add = 0x01, "ADD", 0, 3;
            Mul = 0x02, "MUL", 0, 5;
            Sub = 0x03, "SUB", 0, 3;
            Div = 0x04, "DIV", 0, 5;
            Sdiv = 0x05, "SDIV", 0, 5;
            Mod = 0x06, "MOD", 0, 5;
            Smod = 0x07, "SMOD", 0, 5;
            AddMod = 0x08, "ADDMOD", 0, 8;
            MulMod = 0x09, "MULMOD", 0, 8;
            Exp = 0x0A, "EXP", 0, 10;
            SignExtend = 0x0B, "SIGNEXTEND", 0, 5;
            Lt = 0x10, "LT", 0, 3;
            Gt = 0x11, "GT", 0, 3;
            Slt = 0x12, "SLT", 0, 3;
            Sgt = 0x13, "SGT", 0, 3;
            Eq = 0x14, "EQ", 0, 3;
            IsZero = 0x15, "ISZERO", 0, 3;
            And = 0x16, "AND", 0, 3;
            Or = 0x17, "OR", 0, 3;
            Xor = 0x18, "XOR", 0, 3;
            Not = 0x19, "NOT", 0, 3;
            Byte = 0x1A, "BYTE", 0, 3;
            Shl = 0x1B, "SHL", 0, 3;
            Shr = 0x1C, "SHR", 0, 3;
            Sar = 0x1D, "SAR", 0, 3;
            Keccak256 = 0x20, "KECCAK256", 0, 30;
            CallValue = 0x34, "CALLVALUE", 0, 2;
            CalldataLoad = 0x35, "CALLDATALOAD", 0, 3;
            CalldataSize = 0x36, "CALLDATASIZE", 0, 2;
            CalldataCopy = 0x37, "CALLDATACOPY", 0, 3;
            CodeSize = 0x38, "CODESIZE", 0, 2;
            CodeCopy = 0x39, "CODECOPY", 0, 3;
            Pop = 0x50, "POP", 0, 2;
            Mload = 0x51, "MLOAD", 0, 3;
            Mstore = 0x52, "MSTORE", 0, 3;
            Mstore8 = 0x53, "MSTORE8", 0, 3;
            Jump = 0x56, "JUMP", 0, 8;
            Jumpi = 0x57, "JUMPI", 0, 10;
            Pc = 0x58, "PC", 0, 2;
            Msize = 0x59, "MSIZE", 0, 2;
            JumpDest = 0x5B, "JUMPDEST", 0, 1;
            Push1 = 0x60, "PUSH1", 1, 3;
            Push2 = 0x61, "PUSH2", 2, 3;
            Push3 = 0x62, "PUSH3", 3, 3;
            Push4 = 0x63, "PUSH4", 4, 3;
            Push5 = 0x64, "PUSH5", 5, 3;
            Push6 = 0x65, "PUSH6", 6, 3;
            Push7 = 0x66, "PUSH7", 7, 3;
            Push8 = 0x67, "PUSH8", 8, 3;
            Push9 = 0x68, "PUSH9", 9, 3;
            Push10 = 0x69, "PUSH10", 10, 3;
            Push11 = 0x6A, "PUSH11", 11, 3;
            Push12 = 0x6B, "PUSH12", 12, 3;
            Push13 = 0x6C, "PUSH13", 13, 3;
            Push14 = 0x6D, "PUSH14", 14, 3;
            Push15 = 0x6E, "PUSH15", 15, 3;
            Push16 = 0x6F, "PUSH16", 16, 3;
            Push17 = 0x70, "PUSH17", 17, 3;
            Push18 = 0x71, "PUSH18", 18, 3;
            Push19 = 0x72, "PUSH19", 19, 3;
            Push20 = 0x73, "PUSH20", 20, 3;
            Push21 = 0x74, "PUSH21", 21, 3;
            Push22 = 0x75, "PUSH22", 22, 3;
            Push23 = 0x76, "PUSH23", 23, 3;
            Push24 = 0x77, "PUSH24", 24, 3;
            Push25 = 0x78, "PUSH25", 25, 3;
            Push26 = 0x79, "PUSH26", 26, 3;
            Push27 = 0x7A, "PUSH27", 27, 3;
            Push28 = 0x7B, "PUSH28", 28, 3;
            Push29 = 0x7C, "PUSH29", 29, 3;
            Push30 = 0x7D, "PUSH30", 30, 3;
            Push31 = 0x7E, "PUSH31", 31, 3;
            Push32 = 0x7F, "PUSH32", 32, 3;
            Dup1 = 0x80, "DUP1", 0, 3;
            Dup2 = 0x81, "DUP2", 0, 3;
            Dup3 = 0x82, "DUP3", 0, 3;
            Dup4 = 0x83, "DUP4", 0, 3;
            Dup5 = 0x84, "DUP5", 0, 3;
            Dup6 = 0x85, "DUP6", 0, 3;
            Dup7 = 0x86, "DUP7", 0, 3;
            Dup8 = 0x87, "DUP8", 0, 3;
            Dup9 = 0x88, "DUP9", 0, 3;
            Dup10 = 0x89, "DUP10", 0, 3;
            Dup11 = 0x8A, "DUP11", 0, 3;
            Dup12 = 0x8B, "DUP12", 0, 3;
            Dup13 = 0x8C, "DUP13", 0, 3;
            Dup14 = 0x8D, "DUP14", 0, 3;
            Dup15 = 0x8E, "DUP15", 0, 3;
            Dup16 = 0x8F, "DUP16", 0, 3;
            Swap1 = 0x90, "SWAP1", 0, 3;
            Swap2 = 0x91, "SWAP2", 0, 3;
            Swap3 = 0x92, "SWAP3", 0, 3;
            Swap4 = 0x93, "SWAP4", 0, 3;
            Swap5 = 0x94, "SWAP5", 0, 3;
            Swap6 = 0x95, "SWAP6", 0, 3;
            Swap7 = 0x96, "SWAP7", 0, 3;
            Swap8 = 0x97, "SWAP8", 0, 3;
            Swap9 = 0x98, "SWAP9", 0, 3;
            Swap10 = 0x99, "SWAP10", 0, 3;
            Swap11 = 0x9A, "SWAP11", 0, 3;
            Swap12 = 0x9B, "SWAP12", 0, 3;
            Swap13 = 0x9C, "SWAP13", 0, 3;
            Swap14 = 0x9D, "SWAP14", 0, 3;
            Swap15 = 0x9E, "SWAP15", 0, 3;
            Swap16 = 0x9F, "SWAP16", 0, 3;
            Return = 0xF3, "RETURN", 0, 0;
            Revert = 0xFD, "REVERT", 0, 0;
        }
    };
}

macro_rules! define_opcodes {
    ($($variant:ident = $byte:literal, $mnemonic:literal, $immediates:literal, $gas:literal;)+) => {
        /// One executable instruction of the machine.
        ///
        /// The discriminant of each variant is its encoding byte, so
        /// `op as u8` recovers the wire form.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($variant = $byte,)+
        }

        impl Opcode {
            /// Every instruction in the table, in encoding order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)+];

            /// Decodes a raw code byte. Returns `None` for unassigned bytes,
            /// which fault the machine when executed.
            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Opcode::$variant),)+
                    _ => None,
                }
            }

            /// Assembly mnemonic, as it appears in traces.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $mnemonic,)+
                }
            }

            /// Number of immediate operand bytes following the opcode in the
            /// code stream. Non-zero only for the PUSH family.
            pub const fn immediate_len(self) -> usize {
                match self {
                    $(Opcode::$variant => $immediates,)+
                }
            }

            /// Base metering cost charged before the instruction executes.
            pub const fn base_gas(self) -> u64 {
                match self {
                    $(Opcode::$variant => $gas,)+
                }
            }
        }
    };
}

for_each_opcode!(define_opcodes);

impl Opcode {
    /// Immediate width for PUSH1 through PUSH32, `None` otherwise.
    pub const fn push_width(self) -> Option<usize> {
        let byte = self as u8;
        if byte >= Opcode::Push1 as u8 && byte <= Opcode::Push32 as u8 {
            Some((byte - Opcode::Push1 as u8) as usize + 1)
        } else {
            None
        }
    }

    /// Duplication depth for DUP1 through DUP16 (1 duplicates the top),
    /// `None` otherwise.
    pub const fn dup_depth(self) -> Option<usize> {
        let byte = self as u8;
        if byte >= Opcode::Dup1 as u8 && byte <= Opcode::Dup16 as u8 {
            Some((byte - Opcode::Dup1 as u8) as usize + 1)
        } else {
            None
        }
    }

    /// Swap depth for SWAP1 through SWAP16 (1 swaps the top two),
    /// `None` otherwise.
    pub const fn swap_depth(self) -> Option<usize> {
        let byte = self as u8;
        if byte >= Opcode::Swap1 as u8 && byte <= Opcode::Swap16 as u8 {
            Some((byte - Opcode::Swap1 as u8) as usize + 1)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
