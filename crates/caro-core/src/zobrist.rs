//! Zobrist hashing keys for position deduplication.
//!
//! Board side is a runtime construction parameter rather than a compile-time
//! constant, so the `B*B*2` keys are generated lazily the first time a given
//! size is requested and cached for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::player::Player;

const SEED: u64 = 0x5a4f_4252_4953_5421; // "ZOBRIST!"

/// Xorshift64 PRNG step. Returns (value, next_state).
fn xorshift64(mut state: u64) -> (u64, u64) {
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    (state, state)
}

/// Per-(cell, player) Zobrist keys for one board size.
#[derive(Debug)]
pub struct ZobristTable {
    /// `keys[cell][player_index]`.
    keys: Vec<[u64; 2]>,
}

impl ZobristTable {
    fn build(cells: usize) -> Self {
        let mut keys = Vec::with_capacity(cells);
        let mut state = SEED;
        for _ in 0..cells {
            let (red_key, next) = xorshift64(state);
            state = next;
            let (blue_key, next) = xorshift64(state);
            state = next;
            keys.push([red_key, blue_key]);
        }
        Self { keys }
    }

    /// The key to XOR in when `player` occupies `cell_index`.
    #[inline]
    pub fn key(&self, cell_index: usize, player: Player) -> u64 {
        self.keys[cell_index][player.index()]
    }
}

type TableCache = Mutex<HashMap<u8, Arc<ZobristTable>>>;

static CACHE: OnceLock<TableCache> = OnceLock::new();

/// Fetch (building and caching on first use) the Zobrist table for a board
/// of side `size`.
pub fn table_for_size(size: u8) -> Arc<ZobristTable> {
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock().expect("zobrist cache mutex poisoned");
    guard
        .entry(size)
        .or_insert_with(|| Arc::new(ZobristTable::build(size as usize * size as usize)))
        .clone()
}
