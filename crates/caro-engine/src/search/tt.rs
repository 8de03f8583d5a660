//! Lockless transposition table: 3-entry clusters with atomic XOR-based
//! torn-write detection.
//!
//! Each cluster shares one bucket, addressed by the low bits of the hash.
//! The remaining hash bits are stored per-entry as a key fragment so three
//! unrelated positions can coexist in one bucket before anything is evicted.
//!
//! ## Bit layout (per entry, two `AtomicU64` words)
//!
//! ```text
//! word0 (AtomicU64):
//!   bits 63-32: key fragment  (upper 32 bits of the Zobrist hash)
//!   bits 31-27: age           (5 bits, wraps at 32, bumped once per root search)
//!   bits 26-26: is_pv         (1 bit)
//!   bits 25-24: bound         (2 bits)
//!   bits 23-16: depth         (8 bits)
//!   bits 15-0:  move          (16 bits)
//!
//! word1 (AtomicU64):
//!   bits 63-32: check         = key_fragment XOR (word0 & 0xFFFF_FFFF)
//!   bits 31-16: score         (i16 as u16)
//!   bits 15-0:  eval          (i16 as u16)
//! ```
//!
//! ## Torn-write detection
//!
//! On probe: `check_expected = (w0 >> 32) ^ (w0 & 0xFFFF_FFFF)`.
//! If `check_expected != (w1 >> 32)` the entry was written by another thread
//! mid-write and we treat it as a miss rather than use garbage data.
//!
//! All atomic accesses use `Relaxed` ordering — the standard Stockfish technique.
//! Search correctness never depends on TT integrity, only on its efficiency.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use caro_core::Move;

// ── Compile-time assertion: TT must be Send + Sync for Lazy SMP ─────────────
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<TranspositionTable>();
    }
    let _ = check;
};

/// Number of entries sharing one cache-line bucket.
const CLUSTER_SIZE: usize = 3;

/// Bound type stored in a TT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// No bound information (empty entry).
    None = 0,
    /// The stored score is exact (PV node).
    Exact = 1,
    /// The stored score is a lower bound (failed high / beta cutoff).
    LowerBound = 2,
    /// The stored score is an upper bound (failed low / all-node).
    UpperBound = 3,
}

impl Bound {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => Bound::Exact,
            2 => Bound::LowerBound,
            3 => Bound::UpperBound,
            _ => Bound::None,
        }
    }
}

/// Scores above this threshold indicate a forced win at a known distance.
const MATE_THRESHOLD: i32 = 28_000;

/// Result of a successful TT probe.
#[derive(Debug, Clone)]
pub struct TtProbeResult {
    /// Best move from a previous search of this position.
    pub best_move: Move,
    /// Search depth of the stored entry.
    pub depth: u8,
    /// Bound type (exact, lower, or upper).
    pub bound: Bound,
    /// Score (already adjusted from TT-relative back to root-relative).
    pub score: i32,
    /// Static evaluation.
    pub eval: i32,
    /// Whether this entry was written from a PV node.
    pub is_pv: bool,
}

/// Convert a search score to TT-storable form.
///
/// Win-distance scores are path-dependent: `WIN_SCORE - ply` changes based on
/// the search path. We store them as distance-from-node instead of
/// distance-from-root so they're path-independent.
pub fn score_to_tt(score: i32, ply: u8) -> i16 {
    let adjusted = if score > MATE_THRESHOLD {
        score + ply as i32
    } else if score < -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    };
    adjusted as i16
}

/// Convert a TT-stored score back to search-usable form.
///
/// Reverses the distance adjustment applied by [`score_to_tt`].
pub fn score_from_tt(score: i16, ply: u8) -> i32 {
    let score = score as i32;
    if score > MATE_THRESHOLD {
        score - ply as i32
    } else if score < -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

// ── Internal entry type ──────────────────────────────────────────────────────

/// Two 64-bit atomic words — one logical TT slot.
struct AtomicEntry {
    word0: AtomicU64,
    word1: AtomicU64,
}

impl AtomicEntry {
    const fn new() -> Self {
        Self {
            word0: AtomicU64::new(0),
            word1: AtomicU64::new(0),
        }
    }

    /// Pack fields into word0.
    ///
    /// Layout:
    ///   [63:32] key fragment | [31:27] age | [26] is_pv | [25:24] bound | [23:16] depth | [15:0] mv
    fn pack_word0(key_fragment: u32, age: u8, is_pv: bool, bound: Bound, depth: u8, mv: Move) -> u64 {
        let key_bits = (key_fragment as u64) << 32;
        let age_bits = ((age & 0x1F) as u64) << 27;
        let pv_bit = (is_pv as u64) << 26;
        let bound_bits = ((bound as u8) as u64) << 24;
        let depth_bits = (depth as u64) << 16;
        let mv_bits = mv.raw() as u64;
        key_bits | age_bits | pv_bit | bound_bits | depth_bits | mv_bits
    }

    /// Pack fields into word1.
    ///
    /// Layout:
    ///   [63:32] check (key fragment XOR lower32 of word0) | [31:16] score | [15:0] eval
    fn pack_word1(w0: u64, score: i16, eval: i16) -> u64 {
        let key_fragment = (w0 >> 32) as u32;
        let data_lower = (w0 & 0xFFFF_FFFF) as u32;
        let check = (key_fragment ^ data_lower) as u64;
        let check_bits = check << 32;
        let score_bits = ((score as u16) as u64) << 16;
        let eval_bits = (eval as u16) as u64;
        check_bits | score_bits | eval_bits
    }

    /// Decode `word0` into its fields.
    fn decode_w0(w0: u64) -> (u32, u8, bool, Bound, u8, Move) {
        let key_fragment = (w0 >> 32) as u32;
        let age = ((w0 >> 27) & 0x1F) as u8;
        let is_pv = ((w0 >> 26) & 0x01) != 0;
        let bound = Bound::from_bits(((w0 >> 24) & 0x03) as u8);
        let depth = ((w0 >> 16) & 0xFF) as u8;
        let mv = Move::from_raw((w0 & 0xFFFF) as u16);
        (key_fragment, age, is_pv, bound, depth, mv)
    }

    /// Load and verify the entry against a key fragment.
    ///
    /// Returns `None` if the fragment does not match or the XOR check detects
    /// a torn write.
    fn load(&self, key_fragment: u32) -> Option<(u8, bool, Bound, u8, Move, u64, u64)> {
        let w0 = self.word0.load(Ordering::Relaxed);
        let w1 = self.word1.load(Ordering::Relaxed);

        let fragment_w0 = (w0 >> 32) as u32;
        let data_lower = (w0 & 0xFFFF_FFFF) as u32;
        let check_expected = fragment_w0 ^ data_lower;
        let check_stored = (w1 >> 32) as u32;
        if check_expected != check_stored {
            return None;
        }

        if fragment_w0 != key_fragment {
            return None;
        }

        let (_, age, is_pv, bound, depth, mv) = Self::decode_w0(w0);
        Some((age, is_pv, bound, depth, mv, w0, w1))
    }

    /// Store an entry atomically (word0 first, then word1).
    fn store(&self, w0: u64, w1: u64) {
        self.word0.store(w0, Ordering::Relaxed);
        self.word1.store(w1, Ordering::Relaxed);
    }

    /// Load word0 for replacement-policy inspection (no fragment check).
    fn peek_w0(&self) -> u64 {
        self.word0.load(Ordering::Relaxed)
    }
}

/// Three entries sharing one bucket address.
struct Cluster {
    slots: [AtomicEntry; CLUSTER_SIZE],
}

impl Cluster {
    fn new() -> Self {
        Self {
            slots: [AtomicEntry::new(), AtomicEntry::new(), AtomicEntry::new()],
        }
    }

    fn clear(&self) {
        for slot in &self.slots {
            slot.word0.store(0, Ordering::Relaxed);
            slot.word1.store(0, Ordering::Relaxed);
        }
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Lockless transposition table: a fixed-size array of cache-line-aligned
/// 3-entry clusters with atomic XOR integrity checking.
///
/// All method receivers are `&self` — the table is safe to share across threads.
pub struct TranspositionTable {
    clusters: Box<[Cluster]>,
    /// Index mask — `num_clusters - 1` (power-of-two allocation).
    mask: u64,
    /// Current search age (wraps every 32 root searches).
    age: AtomicU8,
    /// Successful probes, for `stats.tt_hits`.
    hits: AtomicU64,
    /// Completed stores, for `stats.tt_stores`.
    stores: AtomicU64,
}

impl TranspositionTable {
    /// Create a new transposition table with the given size in megabytes.
    ///
    /// The actual number of clusters is rounded down to the nearest power of two.
    pub fn new(mb: usize) -> Self {
        let bytes = mb * 1024 * 1024;
        let cluster_size = std::mem::size_of::<AtomicEntry>() * CLUSTER_SIZE;
        let num_clusters = (bytes / cluster_size).next_power_of_two() >> 1;
        let num_clusters = num_clusters.max(1);

        let clusters: Box<[Cluster]> = (0..num_clusters).map(|_| Cluster::new()).collect();

        Self {
            clusters,
            mask: (num_clusters - 1) as u64,
            age: AtomicU8::new(0),
            hits: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        }
    }

    /// Clear all entries and reset the age counter and hit/store statistics.
    pub fn clear(&self) {
        for cluster in self.clusters.iter() {
            cluster.clear();
        }
        self.age.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.stores.store(0, Ordering::Relaxed);
    }

    /// Total successful probes since construction or the last [`Self::clear`].
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total completed stores since construction or the last [`Self::clear`].
    pub fn stores(&self) -> u64 {
        self.stores.load(Ordering::Relaxed)
    }

    /// Advance the age counter. Call once per root search.
    pub fn new_generation(&self) {
        let current = self.age.load(Ordering::Relaxed);
        self.age.store(current.wrapping_add(1) & 0x1F, Ordering::Relaxed);
    }

    fn bucket(&self, hash: u64) -> (&Cluster, u32) {
        let index = (hash & self.mask) as usize;
        let key_fragment = (hash >> 32) as u32;
        (&self.clusters[index], key_fragment)
    }

    /// Probe the table for a position.
    ///
    /// Scans the cluster for a slot whose key fragment matches. Returns
    /// `Some(TtProbeResult)` if a matching, intact entry is found, `None` on
    /// a miss, fragment mismatch in every slot, or torn-write detection.
    pub fn probe(&self, hash: u64, ply: u8) -> Option<TtProbeResult> {
        let (cluster, key_fragment) = self.bucket(hash);

        for slot in &cluster.slots {
            let Some((_, is_pv, bound, depth, mv, _w0, w1)) = slot.load(key_fragment) else {
                continue;
            };
            if bound == Bound::None {
                continue;
            }

            let score_raw = ((w1 >> 16) & 0xFFFF) as u16 as i16;
            let eval_raw = (w1 & 0xFFFF) as u16 as i16;

            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(TtProbeResult {
                best_move: mv,
                depth,
                bound,
                score: score_from_tt(score_raw, ply),
                eval: eval_raw as i32,
                is_pv,
            });
        }
        None
    }

    /// Store a position in the table.
    ///
    /// If a slot in the cluster already holds this key fragment, it is
    /// overwritten when `depth_new + 2 >= depth_old`, or when the ages match
    /// and the new bound is `Exact`. Otherwise the slot with the lowest
    /// `depth - 8 * (current_age - entry_age)` is evicted — preferring deep,
    /// fresh entries to survive.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        hash: u64,
        depth: u8,
        score: i32,
        eval: i32,
        best_move: Move,
        bound: Bound,
        ply: u8,
        is_pv: bool,
    ) {
        let (cluster, key_fragment) = self.bucket(hash);
        let current_age = self.age.load(Ordering::Relaxed);

        let mut matching: Option<(usize, u8, Bound, u8)> = None;
        let mut worst: Option<(usize, i64)> = None;

        for (i, slot) in cluster.slots.iter().enumerate() {
            let w0 = slot.peek_w0();
            let (fragment, existing_age, _is_pv, existing_bound, existing_depth, _mv) =
                AtomicEntry::decode_w0(w0);

            if existing_bound != Bound::None && fragment == key_fragment {
                matching = Some((i, existing_age, existing_bound, existing_depth));
                break;
            }

            let replacement_score = if existing_bound == Bound::None {
                i64::MIN
            } else {
                let age_diff = current_age.wrapping_sub(existing_age) & 0x1F;
                existing_depth as i64 - 8 * age_diff as i64
            };
            if worst.is_none_or(|(_, w)| replacement_score < w) {
                worst = Some((i, replacement_score));
            }
        }

        let target = if let Some((i, existing_age, existing_bound, existing_depth)) = matching {
            let dominated =
                depth + 2 >= existing_depth || (existing_age == current_age && bound == Bound::Exact);
            let _ = existing_bound;
            if !dominated {
                return;
            }
            i
        } else {
            worst.map(|(i, _)| i).unwrap_or(0)
        };

        let w0 = AtomicEntry::pack_word0(key_fragment, current_age, is_pv, bound, depth, best_move);
        let w1 = AtomicEntry::pack_word1(w0, score_to_tt(score, ply), eval as i16);
        cluster.slots[target].store(w0, w1);
        self.stores.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("clusters", &self.clusters.len())
            .field("age", &self.age.load(Ordering::Relaxed))
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use caro_core::Move;

    #[test]
    fn atomic_entry_is_16_bytes() {
        assert_eq!(std::mem::size_of::<AtomicEntry>(), 16);
    }

    #[test]
    fn store_and_probe_roundtrip() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0xDEAD_BEEF_1234_5678;
        let mv = Move::new(4, 4);

        tt.store(hash, 5, 100, 50, mv, Bound::Exact, 0, false);

        let result = tt.probe(hash, 0).expect("should find stored entry");
        assert_eq!(result.best_move, mv);
        assert_eq!(result.depth, 5);
        assert_eq!(result.bound, Bound::Exact);
        assert_eq!(result.score, 100);
        assert_eq!(result.eval, 50);
    }

    #[test]
    fn probe_miss_returns_none() {
        let tt = TranspositionTable::new(1);
        assert!(tt.probe(0x1234_5678_9ABC_DEF0, 0).is_none());
    }

    #[test]
    fn distant_win_score_adjustment_roundtrip() {
        let win_score = 29_000 - 3;
        let ply: u8 = 5;

        let tt_score = score_to_tt(win_score, ply);
        let restored = score_from_tt(tt_score, ply);
        assert_eq!(restored, win_score);
    }

    #[test]
    fn negative_win_score_adjustment_roundtrip() {
        let losing_score = -(29_000 - 3);
        let ply: u8 = 7;

        let tt_score = score_to_tt(losing_score, ply);
        let restored = score_from_tt(tt_score, ply);
        assert_eq!(restored, losing_score);
    }

    #[test]
    fn normal_score_not_adjusted() {
        let score = 150;
        let ply: u8 = 10;

        let tt_score = score_to_tt(score, ply);
        let restored = score_from_tt(tt_score, ply);
        assert_eq!(restored, score);
    }

    #[test]
    fn three_distinct_keys_coexist_in_one_cluster() {
        // Force a table with exactly one cluster so all three hashes share it.
        let tt = TranspositionTable::new(1);
        assert_eq!(tt.mask, 0, "sanity check: smallest table has one cluster");

        let mv = Move::new(4, 4);
        let h1 = 0x0001_0000_0000_0000u64;
        let h2 = 0x0002_0000_0000_0000u64;
        let h3 = 0x0003_0000_0000_0000u64;

        tt.store(h1, 5, 10, 0, mv, Bound::Exact, 0, false);
        tt.store(h2, 5, 20, 0, mv, Bound::Exact, 0, false);
        tt.store(h3, 5, 30, 0, mv, Bound::Exact, 0, false);

        assert_eq!(tt.probe(h1, 0).unwrap().score, 10);
        assert_eq!(tt.probe(h2, 0).unwrap().score, 20);
        assert_eq!(tt.probe(h3, 0).unwrap().score, 30);
    }

    #[test]
    fn fourth_key_evicts_the_weakest_entry() {
        let tt = TranspositionTable::new(1);
        let mv = Move::new(4, 4);

        let h1 = 0x0001_0000_0000_0000u64;
        let h2 = 0x0002_0000_0000_0000u64;
        let h3 = 0x0003_0000_0000_0000u64;
        let h4 = 0x0004_0000_0000_0000u64;

        tt.store(h1, 1, 10, 0, mv, Bound::Exact, 0, false);
        tt.store(h2, 9, 20, 0, mv, Bound::Exact, 0, false);
        tt.store(h3, 9, 30, 0, mv, Bound::Exact, 0, false);

        // h1 had the shallowest depth and no age advantage — it should be evicted.
        tt.store(h4, 5, 40, 0, mv, Bound::Exact, 0, false);

        assert!(tt.probe(h1, 0).is_none());
        assert!(tt.probe(h2, 0).is_some());
        assert!(tt.probe(h3, 0).is_some());
        assert!(tt.probe(h4, 0).is_some());
    }

    #[test]
    fn matching_key_overwritten_when_deeper() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0x1111_2222_3333_4444;
        let mv1 = Move::new(4, 4);
        let mv2 = Move::new(3, 3);

        tt.store(hash, 5, 100, 50, mv1, Bound::LowerBound, 0, false);
        tt.store(hash, 9, 200, 60, mv2, Bound::LowerBound, 0, false);

        let result = tt.probe(hash, 0).unwrap();
        assert_eq!(result.best_move, mv2);
        assert_eq!(result.score, 200);
    }

    #[test]
    fn matching_key_kept_when_shallower_and_not_exact() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0x1111_2222_3333_4444;
        let mv1 = Move::new(4, 4);
        let mv2 = Move::new(3, 3);

        tt.store(hash, 9, 100, 50, mv1, Bound::LowerBound, 0, false);
        // depth + 2 = 3 < 9, same age, not Exact — should not replace.
        tt.store(hash, 1, 200, 60, mv2, Bound::LowerBound, 0, false);

        let result = tt.probe(hash, 0).unwrap();
        assert_eq!(result.best_move, mv1);
    }

    #[test]
    fn matching_key_overwritten_by_exact_same_age() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0x1111_2222_3333_4444;
        let mv1 = Move::new(4, 4);
        let mv2 = Move::new(3, 3);

        tt.store(hash, 9, 100, 50, mv1, Bound::LowerBound, 0, false);
        tt.store(hash, 1, 200, 60, mv2, Bound::Exact, 0, false);

        let result = tt.probe(hash, 0).unwrap();
        assert_eq!(result.best_move, mv2);
    }

    #[test]
    fn aging_favors_eviction_of_stale_entries() {
        let tt = TranspositionTable::new(1);
        let mv = Move::new(4, 4);

        let h1 = 0x0001_0000_0000_0000u64;
        let h2 = 0x0002_0000_0000_0000u64;
        let h3 = 0x0003_0000_0000_0000u64;
        let h4 = 0x0004_0000_0000_0000u64;

        // h1 stored deep but in an old search generation.
        tt.store(h1, 9, 10, 0, mv, Bound::Exact, 0, false);
        tt.new_generation();
        tt.store(h2, 3, 20, 0, mv, Bound::Exact, 0, false);
        tt.store(h3, 3, 30, 0, mv, Bound::Exact, 0, false);

        // h1's staleness penalty (8 * 1 = 8) drops its score below h2/h3's.
        tt.store(h4, 3, 40, 0, mv, Bound::Exact, 0, false);

        assert!(tt.probe(h1, 0).is_none());
        assert!(tt.probe(h2, 0).is_some());
        assert!(tt.probe(h3, 0).is_some());
        assert!(tt.probe(h4, 0).is_some());
    }

    #[test]
    fn clear_removes_all_entries() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0xAAAA_BBBB_CCCC_DDDD;
        let mv = Move::new(4, 4);

        tt.store(hash, 5, 100, 50, mv, Bound::Exact, 0, false);
        assert!(tt.probe(hash, 0).is_some());

        tt.clear();
        assert!(tt.probe(hash, 0).is_none());
    }

    #[test]
    fn xor_integrity_detects_torn_write() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0xDEAD_BEEF_1234_5678;
        let mv = Move::new(4, 4);

        tt.store(hash, 5, 100, 50, mv, Bound::Exact, 0, false);
        assert!(tt.probe(hash, 0).is_some(), "entry should be found before corruption");

        let index = (hash & tt.mask) as usize;
        let cluster = &tt.clusters[index];
        let slot = &cluster.slots[0];
        let w1 = slot.word1.load(Ordering::Relaxed);
        let corrupted_w1 = w1 ^ 0xFFFF_FFFF_0000_0000;
        slot.word1.store(corrupted_w1, Ordering::Relaxed);

        assert!(
            tt.probe(hash, 0).is_none(),
            "probe should return None after XOR corruption"
        );
    }

    #[test]
    fn concurrent_stress_no_panics() {
        use std::thread;

        let tt = std::sync::Arc::new(TranspositionTable::new(4));

        thread::scope(|s| {
            for t in 0..8u64 {
                let tt = std::sync::Arc::clone(&tt);
                s.spawn(move || {
                    let mv = Move::new(4, 4);
                    for i in 0u64..10_000 {
                        let hash = (t.wrapping_mul(6364136223846793005))
                            .wrapping_add(i.wrapping_mul(2862933555777941757))
                            ^ 0xDEAD_BEEF_CAFE_F00D;
                        tt.store(hash, 5, 100, 50, mv, Bound::Exact, 0, false);
                        let _ = tt.probe(hash, 0);
                    }
                });
            }
        });
    }

    #[test]
    fn hits_and_stores_are_counted() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0x1111_2222_3333_4444;
        let mv = Move::new(3, 3);

        assert_eq!(tt.hits(), 0);
        assert_eq!(tt.stores(), 0);

        tt.store(hash, 4, 10, 5, mv, Bound::Exact, 0, false);
        assert_eq!(tt.stores(), 1);
        assert_eq!(tt.hits(), 0);

        assert!(tt.probe(hash, 0).is_some());
        assert!(tt.probe(hash, 0).is_some());
        assert_eq!(tt.hits(), 2);

        assert!(tt.probe(0x9999_8888_7777_6666, 0).is_none());
        assert_eq!(tt.hits(), 2, "a miss must not count as a hit");
    }

    #[test]
    fn clear_resets_hit_and_store_counters() {
        let tt = TranspositionTable::new(1);
        let hash: u64 = 0xAAAA_BBBB_CCCC_DDDD;
        tt.store(hash, 4, 10, 5, Move::new(2, 2), Bound::Exact, 0, false);
        let _ = tt.probe(hash, 0);

        tt.clear();

        assert_eq!(tt.hits(), 0);
        assert_eq!(tt.stores(), 0);
    }
}
