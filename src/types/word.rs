//! 256-bit machine word with wraparound arithmetic.
//!
//! [`Word`] is the value type of the virtual machine: an unsigned integer in
//! `[0, 2^256 - 1]` stored as four little-endian `u64` limbs. Every producing
//! operation reduces modulo 2^256 before storage, so a `Word` can never hold
//! an out-of-range value. Signed operations (`sdiv`, `srem`, `slt`, `sar`,
//! `sign_extend`) reinterpret the same 256 bits as two's complement; there is
//! no separate signed representation.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// Width of a [`Word`] in bytes.
pub const WORD_BYTES: usize = 32;

/// Number of `u64` limbs backing a [`Word`].
const LIMBS: usize = 4;

/// Fixed-width 256-bit unsigned integer.
///
/// Limb 0 is the least significant. `Copy` because a word is four registers
/// wide and lives on the stack everywhere in the interpreter hot path.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Word([u64; LIMBS]);

impl Word {
    /// The additive identity.
    pub const ZERO: Word = Word([0; LIMBS]);
    /// The multiplicative identity.
    pub const ONE: Word = Word([1, 0, 0, 0]);
    /// `2^256 - 1`, which is also `-1` under the signed interpretation.
    pub const MAX: Word = Word([u64::MAX; LIMBS]);
    /// `2^255`, the most negative value under the signed interpretation.
    pub const SIGN_MIN: Word = Word([0, 0, 0, 1 << 63]);

    /// Creates a word from a `u64`, zero-extending.
    pub const fn from_u64(v: u64) -> Self {
        Word([v, 0, 0, 0])
    }

    /// Creates a word from 32 big-endian bytes.
    pub fn from_be_bytes(bytes: [u8; WORD_BYTES]) -> Self {
        let mut limbs = [0u64; LIMBS];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let start = (LIMBS - 1 - i) * 8;
            *limb = u64::from_be_bytes(bytes[start..start + 8].try_into().unwrap());
        }
        Word(limbs)
    }

    /// Creates a word from up to 32 big-endian bytes, zero-extending on the
    /// left. Bytes past the first 32 are ignored.
    pub fn from_be_slice(bytes: &[u8]) -> Self {
        let take = bytes.len().min(WORD_BYTES);
        let mut buf = [0u8; WORD_BYTES];
        buf[WORD_BYTES - take..].copy_from_slice(&bytes[..take]);
        Self::from_be_bytes(buf)
    }

    /// Returns the 32-byte big-endian representation.
    pub fn to_be_bytes(self) -> [u8; WORD_BYTES] {
        let mut out = [0u8; WORD_BYTES];
        for (i, limb) in self.0.iter().enumerate() {
            let start = (LIMBS - 1 - i) * 8;
            out[start..start + 8].copy_from_slice(&limb.to_be_bytes());
        }
        out
    }

    /// Converts to `usize` if the value fits, `None` otherwise.
    pub fn to_usize(self) -> Option<usize> {
        if self.0[1] | self.0[2] | self.0[3] != 0 {
            return None;
        }
        usize::try_from(self.0[0]).ok()
    }

    /// Returns the low 64 bits, discarding the rest.
    pub fn low_u64(self) -> u64 {
        self.0[0]
    }

    /// Returns true if the word is zero.
    pub fn is_zero(self) -> bool {
        self.0 == [0; LIMBS]
    }

    /// Returns true if bit 255 is set, i.e. the value is negative under the
    /// two's-complement interpretation.
    pub fn is_negative(self) -> bool {
        self.0[3] >> 63 == 1
    }

    /// Returns bit `i` (0 = least significant). `i` must be below 256.
    fn bit(self, i: usize) -> bool {
        (self.0[i / 64] >> (i % 64)) & 1 == 1
    }

    fn leading_zeros(self) -> usize {
        for i in (0..LIMBS).rev() {
            if self.0[i] != 0 {
                return (LIMBS - 1 - i) * 64 + self.0[i].leading_zeros() as usize;
            }
        }
        256
    }

    /// Addition modulo 2^256 with the carry-out flag.
    pub fn overflowing_add(self, rhs: Self) -> (Self, bool) {
        let mut out = [0u64; LIMBS];
        let mut carry = false;
        for i in 0..LIMBS {
            let (a, c1) = self.0[i].overflowing_add(rhs.0[i]);
            let (b, c2) = a.overflowing_add(carry as u64);
            out[i] = b;
            carry = c1 | c2;
        }
        (Word(out), carry)
    }

    /// Addition modulo 2^256.
    pub fn wrapping_add(self, rhs: Self) -> Self {
        self.overflowing_add(rhs).0
    }

    /// Subtraction modulo 2^256.
    pub fn wrapping_sub(self, rhs: Self) -> Self {
        let mut out = [0u64; LIMBS];
        let mut borrow = false;
        for i in 0..LIMBS {
            let (a, b1) = self.0[i].overflowing_sub(rhs.0[i]);
            let (b, b2) = a.overflowing_sub(borrow as u64);
            out[i] = b;
            borrow = b1 | b2;
        }
        Word(out)
    }

    /// Two's-complement negation: `0 - self` modulo 2^256.
    pub fn wrapping_neg(self) -> Self {
        (!self).wrapping_add(Self::ONE)
    }

    /// Multiplication modulo 2^256.
    pub fn wrapping_mul(self, rhs: Self) -> Self {
        self.widening_mul(rhs).0
    }

    /// Full 512-bit product as `(low, high)` words.
    fn widening_mul(self, rhs: Self) -> (Self, Self) {
        let mut w = [0u64; 2 * LIMBS];
        for i in 0..LIMBS {
            let mut carry = 0u64;
            for j in 0..LIMBS {
                let t = w[i + j] as u128 + self.0[i] as u128 * rhs.0[j] as u128 + carry as u128;
                w[i + j] = t as u64;
                carry = (t >> 64) as u64;
            }
            w[i + LIMBS] = carry;
        }
        (
            Word(w[..LIMBS].try_into().unwrap()),
            Word(w[LIMBS..].try_into().unwrap()),
        )
    }

    /// Unsigned division. Division by zero yields zero.
    pub fn div(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return Self::ZERO;
        }
        self.div_rem(rhs).0
    }

    /// Unsigned remainder. Modulo by zero yields zero.
    pub fn rem(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return Self::ZERO;
        }
        self.div_rem(rhs).1
    }

    /// Binary long division. `rhs` must be nonzero.
    fn div_rem(self, rhs: Self) -> (Self, Self) {
        debug_assert!(!rhs.is_zero());
        if self < rhs {
            return (Self::ZERO, self);
        }
        let mut quotient = Self::ZERO;
        let mut rem = Self::ZERO;
        for i in (0..256 - self.leading_zeros()).rev() {
            // rem < rhs on entry, so 2*rem + bit fits after at most one
            // subtraction; a carry out of the shift means the true value
            // already exceeds rhs.
            let (mut shifted, overflow) = rem.overflowing_add(rem);
            if self.bit(i) {
                shifted.0[0] |= 1;
            }
            if overflow || shifted >= rhs {
                shifted = shifted.wrapping_sub(rhs);
                quotient.0[i / 64] |= 1 << (i % 64);
            }
            rem = shifted;
        }
        (quotient, rem)
    }

    /// Reduces the 512-bit value `hi * 2^256 + lo` modulo `m`. `m` nonzero.
    fn reduce_wide(hi: Self, lo: Self, m: Self) -> Self {
        debug_assert!(!m.is_zero());
        let mut rem = Self::ZERO;
        for i in (0..512).rev() {
            let (mut shifted, overflow) = rem.overflowing_add(rem);
            let bit = if i >= 256 { hi.bit(i - 256) } else { lo.bit(i) };
            if bit {
                shifted.0[0] |= 1;
            }
            if overflow || shifted >= m {
                shifted = shifted.wrapping_sub(m);
            }
            rem = shifted;
        }
        rem
    }

    /// `(self + rhs) mod m` over the unbounded sum. A modulus of zero yields
    /// zero.
    pub fn add_mod(self, rhs: Self, m: Self) -> Self {
        if m.is_zero() {
            return Self::ZERO;
        }
        let (sum, carry) = self.overflowing_add(rhs);
        Self::reduce_wide(Self::from_u64(carry as u64), sum, m)
    }

    /// `(self * rhs) mod m` over the unbounded product. A modulus of zero
    /// yields zero.
    pub fn mul_mod(self, rhs: Self, m: Self) -> Self {
        if m.is_zero() {
            return Self::ZERO;
        }
        let (lo, hi) = self.widening_mul(rhs);
        Self::reduce_wide(hi, lo, m)
    }

    /// Exponentiation modulo 2^256. A zero exponent yields one, including
    /// `0^0 == 1`.
    pub fn pow(self, exp: Self) -> Self {
        let mut result = Self::ONE;
        let mut base = self;
        for i in 0..256 - exp.leading_zeros() {
            if exp.bit(i) {
                result = result.wrapping_mul(base);
            }
            base = base.wrapping_mul(base);
        }
        result
    }

    /// Signed division. Division by zero yields zero; the most negative value
    /// divided by `-1` yields itself (the true quotient is unrepresentable).
    pub fn sdiv(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return Self::ZERO;
        }
        if self == Self::SIGN_MIN && rhs == Self::MAX {
            return Self::SIGN_MIN;
        }
        let negative = self.is_negative() ^ rhs.is_negative();
        let q = self.unsigned_abs().div_rem(rhs.unsigned_abs()).0;
        if negative { q.wrapping_neg() } else { q }
    }

    /// Signed remainder; the result takes the sign of the dividend. Modulo by
    /// zero yields zero.
    pub fn srem(self, rhs: Self) -> Self {
        if rhs.is_zero() {
            return Self::ZERO;
        }
        let r = self.unsigned_abs().div_rem(rhs.unsigned_abs()).1;
        if self.is_negative() { r.wrapping_neg() } else { r }
    }

    /// Absolute value of the signed interpretation, as an unsigned magnitude.
    /// The most negative value maps to `2^255`, which is exact.
    fn unsigned_abs(self) -> Self {
        if self.is_negative() {
            self.wrapping_neg()
        } else {
            self
        }
    }

    /// Signed less-than over the two's-complement interpretation.
    pub fn slt(self, rhs: Self) -> bool {
        match (self.is_negative(), rhs.is_negative()) {
            (true, false) => true,
            (false, true) => false,
            // Same sign: two's-complement order matches unsigned order.
            _ => self < rhs,
        }
    }

    /// Signed greater-than over the two's-complement interpretation.
    pub fn sgt(self, rhs: Self) -> bool {
        rhs.slt(self)
    }

    /// Extracts byte `index` (0 = most significant) zero-extended to a word.
    /// An index of 32 or more yields zero.
    pub fn byte(self, index: Self) -> Self {
        match index.to_usize() {
            Some(i) if i < WORD_BYTES => Self::from_u64(self.to_be_bytes()[i] as u64),
            _ => Self::ZERO,
        }
    }

    /// Sign-extends from the byte at `index` (0 = least significant). An
    /// index of 31 or more leaves the value unchanged.
    pub fn sign_extend(self, index: Self) -> Self {
        match index.to_usize() {
            Some(b) if b < WORD_BYTES - 1 => {
                let sign_bit = 8 * b + 7;
                let upper = Self::MAX.shl_bits(sign_bit + 1);
                if self.bit(sign_bit) {
                    self | upper
                } else {
                    self & !upper
                }
            }
            _ => self,
        }
    }

    /// Logical shift left. A shift of 256 or more yields zero.
    pub fn shl(self, shift: Self) -> Self {
        match shift.to_shift_amount() {
            Some(s) => self.shl_bits(s),
            None => Self::ZERO,
        }
    }

    /// Logical shift right. A shift of 256 or more yields zero.
    pub fn shr(self, shift: Self) -> Self {
        match shift.to_shift_amount() {
            Some(s) => self.shr_bits(s),
            None => Self::ZERO,
        }
    }

    /// Arithmetic (sign-extending) shift right. A shift of 256 or more yields
    /// all-ones for negative values and zero otherwise.
    pub fn sar(self, shift: Self) -> Self {
        let negative = self.is_negative();
        match shift.to_shift_amount() {
            Some(0) => self,
            Some(s) => {
                let shifted = self.shr_bits(s);
                if negative {
                    shifted | Self::MAX.shl_bits(256 - s)
                } else {
                    shifted
                }
            }
            None => {
                if negative {
                    Self::MAX
                } else {
                    Self::ZERO
                }
            }
        }
    }

    fn to_shift_amount(self) -> Option<usize> {
        match self.to_usize() {
            Some(s) if s < 256 => Some(s),
            _ => None,
        }
    }

    fn shl_bits(self, s: usize) -> Self {
        debug_assert!(s < 256);
        let (limb_off, bit_off) = (s / 64, s % 64);
        let mut out = [0u64; LIMBS];
        for i in limb_off..LIMBS {
            out[i] = self.0[i - limb_off] << bit_off;
            if bit_off != 0 && i > limb_off {
                out[i] |= self.0[i - limb_off - 1] >> (64 - bit_off);
            }
        }
        Word(out)
    }

    fn shr_bits(self, s: usize) -> Self {
        debug_assert!(s < 256);
        let (limb_off, bit_off) = (s / 64, s % 64);
        let mut out = [0u64; LIMBS];
        for i in 0..LIMBS - limb_off {
            out[i] = self.0[i + limb_off] >> bit_off;
            if bit_off != 0 && i + limb_off + 1 < LIMBS {
                out[i] |= self.0[i + limb_off + 1] << (64 - bit_off);
            }
        }
        Word(out)
    }

    /// Converts a comparison result to the machine's truth encoding: one for
    /// true, zero for false.
    pub fn from_bool(b: bool) -> Self {
        if b { Self::ONE } else { Self::ZERO }
    }
}

impl From<u64> for Word {
    fn from(v: u64) -> Self {
        Self::from_u64(v)
    }
}

impl From<u128> for Word {
    fn from(v: u128) -> Self {
        Word([v as u64, (v >> 64) as u64, 0, 0])
    }
}

impl Ord for Word {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..LIMBS).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Word {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Not for Word {
    type Output = Word;
    fn not(self) -> Word {
        Word([!self.0[0], !self.0[1], !self.0[2], !self.0[3]])
    }
}

impl BitAnd for Word {
    type Output = Word;
    fn bitand(self, rhs: Word) -> Word {
        Word([
            self.0[0] & rhs.0[0],
            self.0[1] & rhs.0[1],
            self.0[2] & rhs.0[2],
            self.0[3] & rhs.0[3],
        ])
    }
}

impl BitOr for Word {
    type Output = Word;
    fn bitor(self, rhs: Word) -> Word {
        Word([
            self.0[0] | rhs.0[0],
            self.0[1] | rhs.0[1],
            self.0[2] | rhs.0[2],
            self.0[3] | rhs.0[3],
        ])
    }
}

impl BitXor for Word {
    type Output = Word;
    fn bitxor(self, rhs: Word) -> Word {
        Word([
            self.0[0] ^ rhs.0[0],
            self.0[1] ^ rhs.0[1],
            self.0[2] ^ rhs.0[2],
            self.0[3] ^ rhs.0[3],
        ])
    }
}

impl fmt::LowerHex for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let mut started = false;
        for i in (0..LIMBS).rev() {
            if started {
                write!(f, "{:016x}", self.0[i])?;
            } else if self.0[i] != 0 {
                write!(f, "{:x}", self.0[i])?;
                started = true;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word(0x{:x})", self)
    }
}
