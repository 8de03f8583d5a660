//! Search algorithms and move ordering.

pub mod control;
pub mod difficulty;
pub mod heuristics;
pub mod negamax;
pub mod ordering;
pub mod pool;
pub mod tt;

use caro_core::{generate_candidates, Board, Move};

use control::SearchControl;
use negamax::{aspiration_search, SearchContext, INF};
use tt::TranspositionTable;

/// Result of a completed search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best move found at the highest completed depth.
    pub best_move: Move,
    /// Second move in the PV — the expected reply.
    pub ponder_move: Option<Move>,
    /// Full principal variation line.
    pub pv: Vec<Move>,
    /// Evaluation score from the engine's perspective.
    pub score: i32,
    /// Total nodes visited during the search.
    pub nodes: u64,
    /// Depth reached.
    pub depth: u8,
    /// Transposition table probes that returned an intact, matching entry.
    pub tt_hits: u64,
    /// Transposition table stores performed during the search.
    pub tt_stores: u64,
}

/// Iterative-deepening searcher with transposition table.
pub struct Searcher {
    tt: TranspositionTable,
}

impl Searcher {
    /// Create a fresh searcher with a 256 MiB transposition table.
    pub fn new() -> Self {
        Self {
            tt: TranspositionTable::new(256),
        }
    }

    /// Create a searcher with a transposition table of the given size in MiB.
    pub fn with_tt_size(mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(mb),
        }
    }

    /// Clear the transposition table (preserving the allocation).
    pub fn clear_tt(&self) {
        tracing::debug!("clearing transposition table");
        self.tt.clear();
    }

    /// Resize the transposition table to the given size in megabytes.
    pub fn resize_tt(&mut self, mb: usize) {
        tracing::debug!(mb, "resizing transposition table");
        self.tt = TranspositionTable::new(mb);
    }

    /// Run iterative-deepening search up to `max_depth`, single-threaded.
    ///
    /// Calls `on_iter(depth, score, nodes, pv)` after each completed
    /// iteration. If no legal move exists the board is full, and the result
    /// carries [`Move::DRAW`] with score 0.
    pub fn search<F>(&self, board: &Board, max_depth: u8, control: &SearchControl, mut on_iter: F) -> SearchResult
    where
        F: FnMut(u8, i32, u64, &[Move]),
    {
        self.tt.new_generation();

        let candidates = generate_candidates(board, caro_core::DEFAULT_RADIUS);
        if candidates.is_empty() {
            tracing::info!("no legal moves, returning draw");
            return SearchResult {
                best_move: Move::DRAW,
                ponder_move: None,
                pv: vec![Move::DRAW],
                score: 0,
                nodes: 0,
                depth: 0,
                tt_hits: 0,
                tt_stores: 0,
            };
        }

        let cells = board.geometry().cells();
        let mut ctx = SearchContext::new(&self.tt, control, cells);

        let mut completed_move = Move::NULL;
        let mut completed_score = -INF;
        let mut completed_depth: u8 = 0;
        let mut completed_pv: Vec<Move> = Vec::new();
        let mut prev_score: i32 = 0;

        for depth in 1..=max_depth {
            if control.should_stop_iterating() {
                break;
            }

            let score = aspiration_search(board, depth, prev_score, &mut ctx);

            if control.should_stop(ctx.nodes) && depth > 1 {
                break;
            }

            prev_score = score;

            let pv = ctx.pv.root_pv();
            if !pv.is_empty() && !pv[0].is_null() {
                completed_move = pv[0];
            }
            completed_score = score;
            completed_depth = depth;
            completed_pv = pv.iter().copied().filter(|m| !m.is_null()).collect();

            tracing::info!(depth, score, nodes = ctx.nodes, "completed iteration");
            on_iter(depth, score, ctx.nodes, &completed_pv);

            if control.should_stop(ctx.nodes) {
                break;
            }
        }

        if completed_move.is_null() {
            tracing::warn!("hard deadline reached before depth 1 completed");
            completed_move = *candidates.as_slice().first().unwrap();
            completed_pv = vec![completed_move];
            completed_score = 0;
        }

        let ponder_move = if completed_pv.len() > 1 { Some(completed_pv[1]) } else { None };

        tracing::info!(
            best_move = %completed_move,
            depth = completed_depth,
            nodes = ctx.nodes,
            "search complete"
        );

        SearchResult {
            best_move: completed_move,
            ponder_move,
            pv: if completed_pv.is_empty() { vec![completed_move] } else { completed_pv },
            score: completed_score,
            nodes: ctx.nodes,
            depth: completed_depth,
            tt_hits: self.tt.hits(),
            tt_stores: self.tt.stores(),
        }
    }
}

impl std::fmt::Debug for Searcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher").finish_non_exhaustive()
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new()
    }
}
