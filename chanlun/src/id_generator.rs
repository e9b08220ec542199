//! Per-layer id sequences.
//!
//! Ids only depend on arrival order, so replaying the same bars always
//! yields the same ids.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGenerator {
    next: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn get_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}
