//! Lazy SMP thread pool for parallel search.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use caro_core::{generate_candidates, Board, Move};

use crate::search::control::SearchControl;
use crate::search::negamax::{SearchContext, INF};
use crate::search::tt::TranspositionTable;
use crate::search::SearchResult;
use crate::time::TimeManager;

/// Tracks whether the root best move keeps changing between iterations, and
/// derives a soft-limit scale from it: a position that has settled on one
/// move needs less extra time than one still flip-flopping.
pub struct StabilityTracker {
    last_move: Move,
    stable_iterations: u32,
}

impl StabilityTracker {
    /// A tracker with no prior iteration recorded.
    pub fn new() -> Self {
        Self { last_move: Move::NULL, stable_iterations: 0 }
    }

    /// Record the just-completed iteration's result, returning the soft-limit
    /// scale (in hundredths, 100 = unchanged) to feed into
    /// [`SearchControl::update_soft_scale`](crate::search::control::SearchControl::update_soft_scale).
    pub fn update(&mut self, completed_move: Move, _score: i32) -> i32 {
        if completed_move == self.last_move {
            self.stable_iterations += 1;
        } else {
            self.last_move = completed_move;
            self.stable_iterations = 0;
        }
        match self.stable_iterations {
            0 => 130,
            1 => 110,
            2 => 100,
            3 => 85,
            _ => 70,
        }
    }
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy SMP thread pool — owns the shared transposition table.
pub struct ThreadPool {
    tt: TranspositionTable,
    num_threads: usize,
}

impl ThreadPool {
    /// Create a new thread pool with `hash_mb` MB transposition table.
    pub fn new(hash_mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(hash_mb),
            num_threads: 1,
        }
    }

    /// Set the number of search threads. Fails fast on `n == 0` rather than
    /// silently clamping, per the engine's fail-fast-on-invariant-breach
    /// principle.
    pub fn set_num_threads(&mut self, n: usize) -> Result<(), crate::error::EngineError> {
        if n == 0 {
            return Err(crate::error::EngineError::ZeroThreads { requested: n });
        }
        self.num_threads = n;
        Ok(())
    }

    /// Resize the transposition table.
    pub fn resize_tt(&mut self, mb: usize) {
        self.tt = TranspositionTable::new(mb);
    }

    /// Clear the transposition table.
    pub fn clear_tt(&self) {
        self.tt.clear();
    }

    /// Run a Lazy SMP search.
    ///
    /// Thread 0 runs full iterative deepening with the `on_iter` callback,
    /// gated by both `control` and `time_manager`'s EBF/NPS continuation
    /// estimate. Threads 1..N-1 run silent iterative deepening, contributing
    /// only to the shared TT and gated by `control` alone — they have no
    /// stake in the reported timing and staggered start depths already
    /// diversify their work, so the coordinator's continuation arithmetic
    /// would just be wasted on them. Uses `std::thread::scope` — no `Arc`
    /// needed on the TT.
    pub fn search<F>(&self, board: &Board, max_depth: u8, control: &SearchControl, time_manager: &mut TimeManager, mut on_iter: F) -> SearchResult
    where
        F: FnMut(u8, i32, u64, &[Move]),
    {
        self.tt.new_generation();

        let cells = board.geometry().cells();
        let candidates = generate_candidates(board, caro_core::DEFAULT_RADIUS);
        if candidates.is_empty() {
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

        if self.num_threads <= 1 {
            return self.search_single(board, max_depth, control, time_manager, cells, on_iter);
        }

        tracing::debug!(threads = self.num_threads, "spawning lazy-smp workers");

        let node_counters: Vec<AtomicU64> = (0..self.num_threads).map(|_| AtomicU64::new(0)).collect();

        let mut result = SearchResult {
            best_move: Move::NULL,
            ponder_move: None,
            pv: vec![Move::NULL],
            score: -INF,
            nodes: 0,
            depth: 0,
            tt_hits: 0,
            tt_stores: 0,
        };

        std::thread::scope(|s| {
            for (thread_id, node_counter) in node_counters.iter().enumerate().skip(1) {
                let tt = &self.tt;
                s.spawn(move || {
                    run_helper(thread_id, tt, board, max_depth, control, node_counter, cells);
                });
            }

            result = self.search_main(board, max_depth, control, time_manager, cells, &mut on_iter, &node_counters[0]);
        });

        tracing::debug!("lazy-smp workers joined");

        let total_nodes: u64 = node_counters.iter().map(|c| c.load(Ordering::Relaxed)).sum();
        result.nodes = total_nodes;
        result.tt_hits = self.tt.hits();
        result.tt_stores = self.tt.stores();

        result
    }

    /// Single-thread fast path — no scope overhead.
    fn search_single<F>(
        &self,
        board: &Board,
        max_depth: u8,
        control: &SearchControl,
        time_manager: &mut TimeManager,
        cells: usize,
        mut on_iter: F,
    ) -> SearchResult
    where
        F: FnMut(u8, i32, u64, &[Move]),
    {
        let mut ctx = SearchContext::new(&self.tt, control, cells);
        run_iterative_deepening(board, max_depth, control, &mut ctx, time_manager, &mut on_iter)
    }

    /// Thread 0 search — same as single, but stores the final node count to
    /// an atomic counter the coordinator reads after the scope joins.
    fn search_main<F>(
        &self,
        board: &Board,
        max_depth: u8,
        control: &SearchControl,
        time_manager: &mut TimeManager,
        cells: usize,
        on_iter: &mut F,
        node_counter: &AtomicU64,
    ) -> SearchResult
    where
        F: FnMut(u8, i32, u64, &[Move]),
    {
        let mut ctx = SearchContext::new(&self.tt, control, cells);
        let result = run_iterative_deepening(board, max_depth, control, &mut ctx, time_manager, on_iter);
        node_counter.store(ctx.nodes, Ordering::Relaxed);
        result
    }
}

/// Shared iterative-deepening loop used by both the single-thread path and
/// the coordinator thread, with soft-limit rescaling from [`StabilityTracker`]
/// and a per-depth continuation check from `time_manager`'s EBF/NPS estimate
/// of the next iteration's cost.
fn run_iterative_deepening<F>(
    board: &Board,
    max_depth: u8,
    control: &SearchControl,
    ctx: &mut SearchContext,
    time_manager: &mut TimeManager,
    on_iter: &mut F,
) -> SearchResult
where
    F: FnMut(u8, i32, u64, &[Move]),
{
    let mut completed_move = Move::NULL;
    let mut completed_score = -INF;
    let mut completed_depth: u8 = 0;
    let mut completed_pv: Vec<Move> = Vec::new();
    let mut prev_score: i32 = 0;
    let mut stability = StabilityTracker::new();
    let mut prev_iteration_nodes: Option<u64> = None;

    for depth in 1..=max_depth {
        if control.should_stop_iterating() {
            break;
        }
        if let (Some(last_nodes), Some(soft)) = (prev_iteration_nodes, control.soft_limit()) {
            if !time_manager.should_continue_iterating(control.elapsed(), last_nodes, soft) {
                break;
            }
        }

        let nodes_before = ctx.nodes;
        let iteration_start = Instant::now();
        let score = crate::search::negamax::aspiration_search(board, depth, prev_score, ctx);
        let iteration_elapsed = iteration_start.elapsed();

        if control.should_stop(ctx.nodes) {
            break;
        }

        let nodes_this_iteration = ctx.nodes - nodes_before;
        time_manager.record_iteration(nodes_this_iteration, iteration_elapsed, prev_iteration_nodes);
        prev_iteration_nodes = Some(nodes_this_iteration);

        prev_score = score;

        let pv = ctx.pv.root_pv();
        if !pv.is_empty() && !pv[0].is_null() {
            completed_move = pv[0];
        }
        completed_score = score;
        completed_depth = depth;
        completed_pv = pv.iter().copied().filter(|m| !m.is_null()).collect();

        on_iter(depth, score, ctx.nodes, &completed_pv);

        let scale = stability.update(completed_move, score);
        control.update_soft_scale(scale);
    }

    let ponder_move = if completed_pv.len() > 1 { Some(completed_pv[1]) } else { None };

    SearchResult {
        best_move: completed_move,
        ponder_move,
        pv: if completed_pv.is_empty() { vec![completed_move] } else { completed_pv },
        score: completed_score,
        nodes: ctx.nodes,
        depth: completed_depth,
        tt_hits: ctx.tt.hits(),
        tt_stores: ctx.tt.stores(),
    }
}

/// Silent helper thread for Lazy SMP — writes to the TT only, no callback.
fn run_helper(
    thread_id: usize,
    tt: &TranspositionTable,
    board: &Board,
    max_depth: u8,
    control: &SearchControl,
    node_counter: &AtomicU64,
    cells: usize,
) {
    let mut ctx = SearchContext::new(tt, control, cells);

    // Helpers start at staggered depths to increase search divergence.
    let start_depth: u8 = 1 + (thread_id % 2) as u8;

    let mut prev_score: i32 = 0;

    for depth in start_depth..=max_depth {
        if control.should_stop_iterating() {
            break;
        }

        let score = crate::search::negamax::aspiration_search(board, depth, prev_score, &mut ctx);

        if control.should_stop(ctx.nodes) {
            break;
        }

        prev_score = score;
    }

    node_counter.store(ctx.nodes, Ordering::Relaxed);
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool").field("num_threads", &self.num_threads).finish_non_exhaustive()
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(256)
    }
}
