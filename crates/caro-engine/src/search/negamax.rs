//! Negamax with PVS, aspiration windows, LMR, NMP, and quiescence search.

use caro_core::{generate_candidates, winner, Board, Move, Player};

use crate::eval::evaluate;
use crate::search::control::SearchControl;
use crate::search::heuristics::{ContinuationHistory, CounterMoveHistory, CounterMoveTable, HistoryTable, KillerTable};
use crate::search::ordering::{must_block_cells, MovePicker};
use crate::search::tt::{Bound, TranspositionTable};

/// Maximum search ply, bounding the killer table and the PV triangle.
pub const MAX_PLY: usize = 128;

/// Score magnitude used for "infinite" window bounds.
pub const INF: i32 = 30_000;

/// A forced win is scored at `WIN_SCORE - ply`, so shorter wins dominate.
pub const WIN_SCORE: i32 = 29_000;

/// Scores above this threshold indicate a forced win at a known distance.
pub const WIN_THRESHOLD: i32 = 28_000;

/// Auxiliary depth limit for quiescence search.
const QS_MAX_DEPTH: u8 = 4;

/// Triangular PV table: `lines[ply]` holds the PV suffix from `ply` onward.
pub struct PvTable {
    lines: [[Move; MAX_PLY]; MAX_PLY],
    lengths: [usize; MAX_PLY],
}

impl PvTable {
    pub fn new() -> Self {
        Self {
            lines: [[Move::NULL; MAX_PLY]; MAX_PLY],
            lengths: [0; MAX_PLY],
        }
    }

    /// Reset the PV line starting at `ply` before filling it in.
    pub fn clear_ply(&mut self, ply: usize) {
        self.lengths[ply] = 0;
    }

    /// Prepend `mv` to the PV inherited from `ply + 1`.
    pub fn update(&mut self, ply: usize, mv: Move) {
        self.lines[ply][0] = mv;
        let child_len = self.lengths[ply + 1];
        for i in 0..child_len {
            self.lines[ply][i + 1] = self.lines[ply + 1][i];
        }
        self.lengths[ply] = child_len + 1;
    }

    /// Record a one-move PV at `ply` (used for terminal/leaf nodes).
    pub fn set_single(&mut self, ply: usize, mv: Move) {
        self.lines[ply][0] = mv;
        self.lengths[ply] = 1;
    }

    /// The full PV from the root.
    pub fn root_pv(&self) -> Vec<Move> {
        self.lines[0][..self.lengths[0]].to_vec()
    }

    /// Length of the root PV.
    pub fn root_len(&self) -> usize {
        self.lengths[0]
    }
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-ply scratch used for the "improving" flag and continuation history.
#[derive(Clone, Copy)]
struct StackEntry {
    static_eval: i32,
    mv: Move,
}

impl StackEntry {
    const EMPTY: StackEntry = StackEntry { static_eval: 0, mv: Move::NULL };
}

/// Search parameters threaded through the recursion.
struct NodeParams {
    depth: u8,
    ply: usize,
    do_null: bool,
    cutnode: bool,
}

/// Mutable search state shared across the whole tree for one search call.
pub struct SearchContext<'a> {
    pub nodes: u64,
    pub tt: &'a TranspositionTable,
    pub pv: PvTable,
    pub control: &'a SearchControl,
    pub killers: KillerTable,
    pub main_history: HistoryTable,
    pub continuation_history: ContinuationHistory,
    pub counter_move_history: CounterMoveHistory,
    pub counter_moves: CounterMoveTable,
    stack: [StackEntry; MAX_PLY],
}

impl<'a> SearchContext<'a> {
    pub fn new(tt: &'a TranspositionTable, control: &'a SearchControl, cells: usize) -> Self {
        Self {
            nodes: 0,
            tt,
            pv: PvTable::new(),
            control,
            killers: KillerTable::new(),
            main_history: HistoryTable::new(cells),
            continuation_history: ContinuationHistory::new(cells),
            counter_move_history: CounterMoveHistory::new(cells),
            counter_moves: CounterMoveTable::new(cells),
            stack: [StackEntry::EMPTY; MAX_PLY],
        }
    }
}

/// Root driver: aspiration window wrapping a full-depth search.
///
/// δ starts at ~50 and doubles on fail-high/fail-low; falls back to a full
/// `[-INF, INF]` window below depth 5 or when the previous score indicates a
/// near-certain win (win-distance scores don't fit a narrow window).
pub fn aspiration_search(board: &Board, depth: u8, prev_score: i32, ctx: &mut SearchContext) -> i32 {
    if depth < 5 || prev_score.abs() >= WIN_THRESHOLD {
        let mut root = board.clone();
        return negamax(&mut root, -INF, INF, NodeParams { depth, ply: 0, do_null: true, cutnode: false }, ctx);
    }

    let mut delta = 50;
    let mut alpha = (prev_score - delta).max(-INF);
    let mut beta = (prev_score + delta).min(INF);

    loop {
        let mut root = board.clone();
        let score = negamax(&mut root, alpha, beta, NodeParams { depth, ply: 0, do_null: true, cutnode: false }, ctx);

        if ctx.control.should_stop(ctx.nodes) {
            return score;
        }

        if alpha <= -INF && beta >= INF {
            return score;
        }

        if score <= alpha {
            alpha = (alpha - delta).max(-INF);
            delta *= 2;
        } else if score >= beta {
            beta = (beta + delta).min(INF);
            delta *= 2;
        } else {
            return score;
        }
    }
}

/// Negamax with alpha-beta, PVS, NMP, and LMR.
fn negamax(board: &mut Board, alpha: i32, beta: i32, params: NodeParams, ctx: &mut SearchContext) -> i32 {
    let NodeParams { depth, ply, do_null, cutnode } = params;
    let is_pv = beta - alpha > 1;

    ctx.pv.clear_ply(ply);
    ctx.nodes += 1;

    if ply >= MAX_PLY - 1 {
        return evaluate(board);
    }

    if board.occupied().popcount() as usize == board.geometry().cells() {
        ctx.pv.set_single(ply, Move::DRAW);
        return 0;
    }

    // Terminal detection: did the side that just moved win?
    if winner(board).is_some() {
        return -(WIN_SCORE - ply as i32);
    }

    // Mate-distance pruning.
    let mut alpha = alpha.max(-(WIN_SCORE - ply as i32));
    let beta = beta.min(WIN_SCORE - ply as i32 - 1);
    if alpha >= beta {
        return alpha;
    }

    if depth == 0 {
        return qsearch(board, alpha, beta, ply, QS_MAX_DEPTH, ctx);
    }

    let side = board.side_to_move();
    let tt_probe = ctx.tt.probe(board.hash(), ply as u8);
    let mut tt_move = Move::NULL;
    if let Some(ref probe) = tt_probe {
        tt_move = probe.best_move;
        if !is_pv && probe.depth >= depth {
            match probe.bound {
                Bound::Exact => return probe.score,
                Bound::LowerBound if probe.score >= beta => return probe.score,
                Bound::UpperBound if probe.score <= alpha => return probe.score,
                _ => {}
            }
        }
    }

    let candidates = generate_candidates(board, caro_core::DEFAULT_RADIUS);
    if candidates.is_empty() {
        ctx.pv.set_single(ply, Move::DRAW);
        return 0;
    }

    let must_block = must_block_cells(board, &candidates, side);
    let has_forced_reply =
        !must_block.is_empty() || candidates.into_iter().any(|&mv| caro_core::would_win_if_played(board, mv, side));

    let static_eval = evaluate(board);
    ctx.stack[ply] = StackEntry { static_eval, mv: Move::NULL };
    let improving = ply >= 2 && static_eval > ctx.stack[ply - 2].static_eval;

    // Null-move pruning.
    if do_null && !is_pv && depth >= 3 && !has_forced_reply && static_eval >= beta {
        let r = 2 + depth / 6;
        board.make_null_move();
        let reduced_depth = depth.saturating_sub(r + 1);
        let score = -negamax(
            board,
            -beta,
            -beta + 1,
            NodeParams { depth: reduced_depth, ply: ply + 1, do_null: false, cutnode: !cutnode },
            ctx,
        );
        board.unmake_null_move();
        if score >= beta {
            return beta;
        }
    }

    let prev_own_mv = if ply >= 2 { Some(ctx.stack[ply - 2].mv) } else { None };
    let prev_own_mv2 = if ply >= 4 { Some(ctx.stack[ply - 4].mv) } else { None };
    let prev_own_cells = [
        prev_own_mv.filter(|m| !m.is_null()).map(|m| board.geometry().index(m.x(), m.y())),
        prev_own_mv2.filter(|m| !m.is_null()).map(|m| board.geometry().index(m.x(), m.y())),
    ];
    let opp_prev_mv = if ply >= 1 { Some(ctx.stack[ply - 1].mv) } else { None };
    let opp_prev_cell = opp_prev_mv.filter(|m| !m.is_null()).map(|m| board.geometry().index(m.x(), m.y()));
    let counter_move = opp_prev_cell.map_or(Move::NULL, |cell| ctx.counter_moves.get(side, cell));

    let mut picker = MovePicker::new(
        board,
        &candidates,
        side,
        tt_move,
        ply,
        &ctx.killers,
        counter_move,
        &ctx.main_history,
        &ctx.continuation_history,
        prev_own_cells,
    );

    let mut best_score = -INF;
    let mut best_move = Move::NULL;
    let mut bound = Bound::UpperBound;
    let mut move_index = 0;
    let mut tried_quiets: Vec<Move> = Vec::new();

    while let Some(mv) = picker.pick_next() {
        let is_winning = caro_core::would_win_if_played(board, mv, side);
        let is_quiet = !must_block.contains(&mv) && !is_winning && mv != tt_move;

        let undo = board.make_move(mv);
        ctx.stack[ply].mv = mv;

        let score = if move_index == 0 {
            -negamax(
                board,
                -beta,
                -alpha,
                NodeParams { depth: depth - 1, ply: ply + 1, do_null: true, cutnode: false },
                ctx,
            )
        } else {
            let mut reduction = 0u8;
            if is_quiet && move_index >= 4 && depth >= 3 {
                let k = move_index as i32;
                let d = depth as i32;
                let mut r = 1 + (d - 3) / 3 + (k - 4) / 4;
                if is_pv {
                    r -= 1;
                }
                if improving {
                    r -= 1;
                }
                let cell = board.geometry().index(mv.x(), mv.y());
                if ctx.main_history.score(side, cell) > 0 {
                    r -= 1;
                }
                if cutnode {
                    r += 1;
                }
                reduction = r.clamp(0, d - 1) as u8;
            }

            let mut score = -negamax(
                board,
                -alpha - 1,
                -alpha,
                NodeParams { depth: depth - 1 - reduction, ply: ply + 1, do_null: true, cutnode: true },
                ctx,
            );

            if score > alpha && reduction > 0 {
                score = -negamax(
                    board,
                    -alpha - 1,
                    -alpha,
                    NodeParams { depth: depth - 1, ply: ply + 1, do_null: true, cutnode: true },
                    ctx,
                );
            }

            if score > alpha && score < beta {
                score = -negamax(
                    board,
                    -beta,
                    -alpha,
                    NodeParams { depth: depth - 1, ply: ply + 1, do_null: true, cutnode: false },
                    ctx,
                );
            }

            score
        };

        board.unmake_move(undo);

        if ctx.control.should_stop(ctx.nodes) {
            return 0;
        }

        if score > best_score {
            best_score = score;
            best_move = mv;
            if score > alpha {
                alpha = score;
                bound = Bound::Exact;
                ctx.pv.update(ply, mv);
            }
        }

        if alpha >= beta {
            bound = Bound::LowerBound;
            if is_quiet {
                let cell = board.geometry().index(mv.x(), mv.y());
                ctx.killers.store(ply, mv);
                ctx.main_history.update_good(side, cell, depth);
                if let Some(prev) = prev_own_cells[0] {
                    ctx.continuation_history.update_good(side, prev, cell, depth);
                }
                if let Some(opp_cell) = opp_prev_cell {
                    ctx.counter_move_history.update_good(side, opp_cell, cell, depth);
                    ctx.counter_moves.store(side, opp_cell, mv);
                }
                for &sibling in &tried_quiets {
                    let sibling_cell = board.geometry().index(sibling.x(), sibling.y());
                    ctx.main_history.update_bad(side, sibling_cell, depth);
                }
            }
            break;
        }

        if is_quiet {
            tried_quiets.push(mv);
        }
        move_index += 1;
    }

    ctx.tt.store(board.hash(), depth, best_score, static_eval, best_move, bound, ply as u8, is_pv);

    best_score
}

/// Quiescence search: extend along forcing moves only (create a four,
/// complete a win, or block a win) up to `qs_depth`.
fn qsearch(board: &mut Board, alpha: i32, beta: i32, ply: usize, qs_depth: u8, ctx: &mut SearchContext) -> i32 {
    ctx.nodes += 1;
    ctx.pv.clear_ply(ply.min(MAX_PLY - 1));

    if winner(board).is_some() {
        return -(WIN_SCORE - ply as i32);
    }

    let mut alpha = alpha;
    let stand_pat = evaluate(board);
    if stand_pat >= beta {
        return beta;
    }
    if stand_pat > alpha {
        alpha = stand_pat;
    }
    if qs_depth == 0 || ply >= MAX_PLY - 1 {
        return alpha;
    }

    let side = board.side_to_move();
    let candidates = generate_candidates(board, caro_core::DEFAULT_RADIUS);
    let must_block = must_block_cells(board, &candidates, side);

    let forcing: Vec<Move> = candidates
        .into_iter()
        .copied()
        .filter(|&mv| {
            must_block.contains(&mv) || caro_core::would_win_if_played(board, mv, side) || creates_four(board, mv, side)
        })
        .collect();

    for mv in forcing {
        let undo = board.make_move(mv);
        let score = -qsearch(board, -beta, -alpha, ply + 1, qs_depth - 1, ctx);
        board.unmake_move(undo);

        if ctx.control.should_stop(ctx.nodes) {
            return alpha;
        }

        if score >= beta {
            return beta;
        }
        if score > alpha {
            alpha = score;
        }
    }

    alpha
}

/// Whether playing `mv` would create a four (straight or broken) for `side`.
fn creates_four(board: &Board, mv: Move, side: Player) -> bool {
    let probe = board.with_hypothetical_stone(mv, side);
    caro_core::enumerate_threats(&probe, side)
        .iter()
        .any(|t| matches!(t.kind, caro_core::ThreatKind::StraightFour | caro_core::ThreatKind::BrokenFour))
}
