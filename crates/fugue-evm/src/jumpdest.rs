//! Jump destination analysis

use crate::opcode::Opcode;
use fugue_primitives::{H256, U256};
use std::collections::{HashMap, HashSet};

/// Scan a code blob for valid jump targets: positions holding JUMPDEST
/// that are not inside the immediate data of a PUSH1..PUSH32.
pub fn analyze(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut i = 0;
    while i < code.len() {
        let op = code[i];
        if op == Opcode::JUMPDEST as u8 {
            dests.insert(i);
        }
        if (0x60..=0x7F).contains(&op) {
            i += (op - 0x5F) as usize;
        }
        i += 1;
    }
    dests
}

/// Analysis results keyed by code hash, shared by every frame running the
/// same code within one VM.
#[derive(Debug, Default)]
pub struct JumpdestCache {
    cache: HashMap<H256, HashSet<usize>>,
}

impl JumpdestCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `dest` is a valid jump target in `code`. Code with a zero
    /// hash (not yet committed to state) is analyzed without caching.
    pub fn has(&mut self, code_hash: &H256, code: &[u8], dest: &U256) -> bool {
        if dest.bits() > 63 || dest.low_u64() as usize >= code.len() {
            return false;
        }
        let udest = dest.low_u64() as usize;
        if code_hash.is_zero() {
            return analyze(code).contains(&udest);
        }
        self.cache
            .entry(*code_hash)
            .or_insert_with(|| analyze(code))
            .contains(&udest)
    }
}
