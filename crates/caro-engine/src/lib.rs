//! Search and evaluation for the Caro engine.

pub mod error;
pub mod eval;
pub mod search;
pub mod time;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use caro_core::{generate_candidates, Board, Move, Player, Position};
use rand::Rng;

pub use error::EngineError;
pub use eval::evaluate;
pub use search::control::SearchControl;
pub use search::difficulty::{AIDifficulty, DifficultyProfile};
pub use search::pool::{StabilityTracker, ThreadPool};
pub use search::{SearchResult, Searcher};
pub use time::{Clock, TimeManager};

/// Node and table statistics returned alongside a move.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub depth_completed: u8,
    pub nodes_searched: u64,
    pub elapsed_ms: u64,
    pub tt_hits: u64,
    pub tt_stores: u64,
}

/// The outcome of a single [`Engine::best_move`] call.
#[derive(Debug, Clone)]
pub struct BestMoveOutcome {
    pub mv: Move,
    pub score: i32,
    pub pv: Vec<Move>,
    pub stats: SearchStats,
}

/// A long-lived engine instance: owns the shared transposition table and the
/// time manager's cross-move pacing state.
pub struct Engine {
    pool: ThreadPool,
    time_manager: TimeManager,
    moves_played: u32,
}

impl Engine {
    /// Build an engine with a `hash_mb`-sized transposition table, retained
    /// across moves.
    pub fn new(hash_mb: usize) -> Result<Self, EngineError> {
        if hash_mb == 0 {
            return Err(EngineError::ZeroHashSize { requested: hash_mb });
        }
        Ok(Self {
            pool: ThreadPool::new(hash_mb),
            time_manager: TimeManager::new(),
            moves_played: 0,
        })
    }

    /// Search `pos` and return a move, its score, the principal variation,
    /// and search statistics.
    ///
    /// `on_iteration_complete`, if given, is invoked once per completed
    /// iterative-deepening iteration. `on_log` mirrors the [`tracing`] events
    /// this call emits as plain `(level, message)` pairs, for callers that
    /// want the coarse-grained progress log without installing a `tracing`
    /// subscriber themselves. Weaker [`AIDifficulty`] tiers may return a
    /// suboptimal root move instead of the true best, per that tier's
    /// `error_rate`.
    pub fn best_move(
        &mut self,
        pos: Position,
        clock: Clock,
        difficulty: AIDifficulty,
        mut on_iteration_complete: impl FnMut(u8, i32, u64, &[Move]),
        mut on_log: impl FnMut(tracing::Level, &str),
    ) -> Result<BestMoveOutcome, EngineError> {
        let board = pos.into_board()?;
        let side = board.side_to_move();
        let profile = difficulty.profile();

        self.pool.set_num_threads(if profile.parallel_enabled { profile.thread_count } else { 1 })?;

        let (soft, hard) = self.time_manager.compute_limits(clock, difficulty, self.moves_played);
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::new_timed(stopped, soft, hard);

        let max_depth = profile.max_depth_cap;
        let start_msg = format!("starting search: difficulty={difficulty:?} depth_cap={max_depth} soft_ms={} hard_ms={}", soft.as_millis(), hard.as_millis());
        tracing::info!(?difficulty, max_depth, soft_ms = soft.as_millis() as u64, hard_ms = hard.as_millis() as u64, "starting search");
        on_log(tracing::Level::INFO, &start_msg);

        let result = self.pool.search(&board, max_depth, &control, &mut self.time_manager, |depth, score, nodes, pv| {
            on_iteration_complete(depth, score, nodes, pv);
        });

        if result.depth == 0 {
            let msg = "hard deadline reached before depth 1 completed";
            on_log(tracing::Level::WARN, msg);
        }

        let elapsed = control.elapsed();
        self.time_manager.record_move_completion(soft, elapsed);
        self.moves_played += 1;

        let mv = maybe_inject_error(&board, side, result.best_move, profile.error_rate);

        let done_msg = format!("search complete: move={mv} depth={} nodes={} tt_hits={}", result.depth, result.nodes, result.tt_hits);
        tracing::info!(%mv, depth = result.depth, nodes = result.nodes, tt_hits = result.tt_hits, "search complete");
        on_log(tracing::Level::INFO, &done_msg);

        Ok(BestMoveOutcome {
            mv,
            score: result.score,
            pv: result.pv.clone(),
            stats: SearchStats {
                depth_completed: result.depth,
                nodes_searched: result.nodes,
                elapsed_ms: elapsed.as_millis() as u64,
                tt_hits: result.tt_hits,
                tt_stores: result.tt_stores,
            },
        })
    }

    /// Clear the transposition table (preserving the allocation).
    pub fn clear_tt(&self) {
        self.pool.clear_tt();
    }

    /// Resize the transposition table to `hash_mb` megabytes.
    pub fn resize_tt(&mut self, hash_mb: usize) -> Result<(), EngineError> {
        if hash_mb == 0 {
            return Err(EngineError::ZeroHashSize { requested: hash_mb });
        }
        self.pool.resize_tt(hash_mb);
        Ok(())
    }
}

/// With probability `error_rate`, substitute the first root candidate from
/// the static move ordering that isn't `best_move` — a cheap proxy for
/// "second-best root move" without retaining a full multi-PV ranking.
fn maybe_inject_error(board: &Board, side: Player, best_move: Move, error_rate: f64) -> Move {
    if error_rate <= 0.0 || best_move.is_null() || best_move.is_draw() {
        return best_move;
    }
    if !rand::rng().random_bool(error_rate) {
        return best_move;
    }

    let candidates = generate_candidates(board, caro_core::DEFAULT_RADIUS);
    let must_block = search::ordering::must_block_cells(board, &candidates, side);
    candidates
        .into_iter()
        .copied()
        .find(|&mv| mv != best_move && !must_block.contains(&mv))
        .unwrap_or(best_move)
}
