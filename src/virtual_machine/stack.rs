//! Bounded evaluation stack.

use crate::types::word::Word;
use crate::virtual_machine::errors::VMError;

/// Maximum stack depth. A push at this depth faults the machine.
pub const STACK_LIMIT: usize = 1024;

/// LIFO word stack backing the execution loop.
///
/// All accessors report depth violations as errors rather than panicking;
/// the machine turns them into a fault.
#[derive(Debug, Default)]
pub struct Stack {
    items: Vec<Word>,
}

impl Stack {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, word: Word) -> Result<(), VMError> {
        if self.items.len() == STACK_LIMIT {
            return Err(VMError::StackOverflow { limit: STACK_LIMIT });
        }
        self.items.push(word);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Word, VMError> {
        self.items.pop().ok_or(VMError::StackUnderflow { needed: 1, depth: 0 })
    }

    /// Reads the item `depth` positions below the top without removing it.
    /// `peek(0)` is the top of the stack.
    pub fn peek(&self, depth: usize) -> Result<Word, VMError> {
        let len = self.items.len();
        if depth >= len {
            return Err(VMError::StackUnderflow { needed: depth + 1, depth: len });
        }
        Ok(self.items[len - 1 - depth])
    }

    /// Pushes a copy of the item `depth` positions below the top.
    /// `duplicate(0)` implements DUP1.
    pub fn duplicate(&mut self, depth: usize) -> Result<(), VMError> {
        let word = self.peek(depth)?;
        self.push(word)
    }

    /// Exchanges the top item with the one `depth` positions below it.
    /// `swap(1)` implements SWAP1.
    pub fn swap(&mut self, depth: usize) -> Result<(), VMError> {
        let len = self.items.len();
        if depth >= len {
            return Err(VMError::StackUnderflow { needed: depth + 1, depth: len });
        }
        self.items.swap(len - 1, len - 1 - depth);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        let mut stack = Stack::new();
        stack.push(Word::from_u64(1)).unwrap();
        stack.push(Word::from_u64(2)).unwrap();
        assert_eq!(stack.pop().unwrap(), Word::from_u64(2));
        assert_eq!(stack.pop().unwrap(), Word::from_u64(1));
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_on_empty_underflows() {
        let mut stack = Stack::new();
        assert_eq!(
            stack.pop().unwrap_err(),
            VMError::StackUnderflow { needed: 1, depth: 0 }
        );
    }

    #[test]
    fn push_at_limit_overflows() {
        let mut stack = Stack::new();
        for i in 0..STACK_LIMIT {
            stack.push(Word::from_u64(i as u64)).unwrap();
        }
        assert_eq!(
            stack.push(Word::ZERO).unwrap_err(),
            VMError::StackOverflow { limit: STACK_LIMIT }
        );
        // The failed push leaves the stack untouched.
        assert_eq!(stack.len(), STACK_LIMIT);
        assert_eq!(stack.peek(0).unwrap(), Word::from_u64(STACK_LIMIT as u64 - 1));
    }

    #[test]
    fn peek_reads_without_removing() {
        let mut stack = Stack::new();
        stack.push(Word::from_u64(10)).unwrap();
        stack.push(Word::from_u64(20)).unwrap();
        assert_eq!(stack.peek(0).unwrap(), Word::from_u64(20));
        assert_eq!(stack.peek(1).unwrap(), Word::from_u64(10));
        assert_eq!(stack.len(), 2);
        assert_eq!(
            stack.peek(2).unwrap_err(),
            VMError::StackUnderflow { needed: 3, depth: 2 }
        );
    }

    #[test]
    fn duplicate_copies_the_addressed_item() {
        let mut stack = Stack::new();
        stack.push(Word::from_u64(1)).unwrap();
        stack.push(Word::from_u64(2)).unwrap();
        stack.duplicate(1).unwrap();
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.peek(0).unwrap(), Word::from_u64(1));
        assert_eq!(stack.peek(1).unwrap(), Word::from_u64(2));
    }

    #[test]
    fn swap_exchanges_with_the_top() {
        let mut stack = Stack::new();
        for i in 1..=4u64 {
            stack.push(Word::from_u64(i)).unwrap();
        }
        stack.swap(2).unwrap();
        assert_eq!(stack.peek(0).unwrap(), Word::from_u64(2));
        assert_eq!(stack.peek(2).unwrap(), Word::from_u64(4));
        assert_eq!(stack.len(), 4);
    }

    #[test]
    fn swap_past_the_bottom_underflows() {
        let mut stack = Stack::new();
        stack.push(Word::from_u64(1)).unwrap();
        assert_eq!(
            stack.swap(1).unwrap_err(),
            VMError::StackUnderflow { needed: 2, depth: 1 }
        );
    }
}
