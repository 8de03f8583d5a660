//! Staged move ordering: TT move, forced replies, threats, then history.

use caro_core::{enumerate_threats, would_win_if_played, Board, Move, MoveList, Player, ThreatKind};

use crate::search::heuristics::{HistoryTable, KillerTable, PairHistory};

/// Score bands used by the staged picker. Higher is searched first.
const SCORE_TT: i32 = 1_000_000;
const SCORE_MUST_BLOCK: i32 = 900_000;
const SCORE_WINNING: i32 = 800_000;
const SCORE_THREAT_CREATE: i32 = 700_000;
const SCORE_KILLER_BASE: i32 = 600_000;
const SCORE_GOOD_QUIET_BASE: i32 = 0;

/// Whether playing `mv` would create a `StraightFour` or an open
/// `StraightThree` for `side`.
fn creates_threat(board: &Board, mv: Move, side: Player) -> bool {
    let probe = board.with_hypothetical_stone(mv, side);
    enumerate_threats(&probe, side).iter().any(|t| {
        matches!(t.kind, ThreatKind::StraightFour | ThreatKind::StraightThree) && t.stone_positions.contains(&mv.xy())
    })
}

/// Cell index used to key the history tables, consistent across a fixed
/// board size.
fn cell_index(board: &Board, mv: Move) -> usize {
    let (x, y) = mv.xy();
    board.geometry().index(x, y)
}

/// Score every candidate for the staged picker.
///
/// `prev_own_cells` holds the cell indices of our own previous two
/// placements (ply−1, ply−2), used to probe continuation history. Either
/// may be `None` near the start of the game.
#[allow(clippy::too_many_arguments)]
fn score_move(
    board: &Board,
    mv: Move,
    side: Player,
    tt_move: Move,
    must_block: &[Move],
    ply: usize,
    killers: &KillerTable,
    counter_move: Move,
    main_history: &HistoryTable,
    continuation_history: &PairHistory,
    prev_own_cells: [Option<usize>; 2],
) -> i32 {
    if mv == tt_move {
        return SCORE_TT;
    }
    if must_block.contains(&mv) {
        return SCORE_MUST_BLOCK;
    }
    if would_win_if_played(board, mv, side) {
        return SCORE_WINNING;
    }
    if creates_threat(board, mv, side) {
        return SCORE_THREAT_CREATE;
    }
    if killers.is_killer(ply, mv) || mv == counter_move {
        return SCORE_KILLER_BASE;
    }

    let cell = cell_index(board, mv);
    let mut score = 2 * main_history.score(side, cell);
    for prev in prev_own_cells.into_iter().flatten() {
        score += continuation_history.score(side, prev, cell);
    }
    SCORE_GOOD_QUIET_BASE + score
}

/// Cells the opponent could play next turn to win immediately.
pub fn must_block_cells(board: &Board, candidates: &MoveList, side: Player) -> Vec<Move> {
    let opponent = side.flip();
    candidates
        .into_iter()
        .copied()
        .filter(|&mv| would_win_if_played(board, mv, opponent))
        .collect()
}

/// Incremental move picker using selection sort over precomputed stage scores.
pub struct MovePicker {
    moves: Vec<Move>,
    scores: Vec<i32>,
    cursor: usize,
}

impl MovePicker {
    /// Build a picker over `candidates`, staged per the priority ladder:
    /// TT move, must-block, winning move, threat-create, killers/counters,
    /// then quiet moves ranked by history.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        board: &Board,
        candidates: &MoveList,
        side: Player,
        tt_move: Move,
        ply: usize,
        killers: &KillerTable,
        counter_move: Move,
        main_history: &HistoryTable,
        continuation_history: &PairHistory,
        prev_own_cells: [Option<usize>; 2],
    ) -> Self {
        let must_block = must_block_cells(board, candidates, side);
        let moves: Vec<Move> = candidates.into_iter().copied().collect();
        let scores: Vec<i32> = moves
            .iter()
            .map(|&mv| {
                score_move(
                    board,
                    mv,
                    side,
                    tt_move,
                    &must_block,
                    ply,
                    killers,
                    counter_move,
                    main_history,
                    continuation_history,
                    prev_own_cells,
                )
            })
            .collect();
        Self { moves, scores, cursor: 0 }
    }

    /// Yield the next highest-scored move, breaking ties by proximity to the
    /// board's existing stones (the "bad quiet" tail of the ladder naturally
    /// falls out of candidate generation already being radius-limited).
    pub fn pick_next(&mut self) -> Option<Move> {
        if self.cursor >= self.moves.len() {
            return None;
        }

        let mut best_idx = self.cursor;
        let mut best_score = self.scores[self.cursor];
        for i in (self.cursor + 1)..self.moves.len() {
            if self.scores[i] > best_score {
                best_score = self.scores[i];
                best_idx = i;
            }
        }

        self.moves.swap(self.cursor, best_idx);
        self.scores.swap(self.cursor, best_idx);

        let mv = self.moves[self.cursor];
        self.cursor += 1;
        Some(mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caro_core::generate_candidates;

    fn history_tables(size: u8) -> (HistoryTable, PairHistory) {
        let cells = size as usize * size as usize;
        (HistoryTable::new(cells), PairHistory::new(cells))
    }

    #[test]
    fn tt_move_is_scored_highest() {
        let mut board = Board::empty(15).unwrap();
        board.make_move(Move::new(7, 7));
        let candidates = generate_candidates(&board, 2);
        let (history, continuation) = history_tables(15);
        let killers = KillerTable::new();
        let tt_move = Move::new(6, 6);

        let mut picker = MovePicker::new(
            &board,
            &candidates,
            board.side_to_move(),
            tt_move,
            0,
            &killers,
            Move::NULL,
            &history,
            &continuation,
            [None, None],
        );
        assert_eq!(picker.pick_next(), Some(tt_move));
    }

    #[test]
    fn must_block_detected_before_quiet_moves() {
        // Blue to move; Red has an open three that wins by extending either end.
        let mut board = Board::empty(15).unwrap();
        for mv in [(7, 7), (4, 4), (8, 7), (4, 5), (9, 7)] {
            board.make_move(Move::new(mv.0, mv.1));
        }
        // Red: (7,7)(8,7)(9,7) open three; Blue to move must block (6,7) or (10,7).
        let candidates = generate_candidates(&board, 2);
        let side = board.side_to_move();
        let blocks = must_block_cells(&board, &candidates, side);
        assert!(blocks.contains(&Move::new(6, 7)) || blocks.contains(&Move::new(10, 7)));
    }

    #[test]
    fn picker_yields_every_candidate_exactly_once() {
        let mut board = Board::empty(15).unwrap();
        board.make_move(Move::new(7, 7));
        let candidates = generate_candidates(&board, 2);
        let (history, continuation) = history_tables(15);
        let killers = KillerTable::new();

        let mut picker = MovePicker::new(
            &board,
            &candidates,
            board.side_to_move(),
            Move::NULL,
            0,
            &killers,
            Move::NULL,
            &history,
            &continuation,
            [None, None],
        );
        let mut count = 0;
        while picker.pick_next().is_some() {
            count += 1;
        }
        assert_eq!(count, candidates.len());
    }

    #[test]
    fn winning_move_outranks_quiet_moves() {
        let mut board = Board::empty(15).unwrap();
        for mv in [(3, 4), (2, 5), (4, 4), (2, 6), (5, 4), (2, 7), (6, 4), (2, 8)] {
            board.make_move(Move::new(mv.0, mv.1));
        }
        // Red has four in a row at x=3..6,y=4, open at (2,4) and (7,4).
        let candidates = generate_candidates(&board, 2);
        let (history, continuation) = history_tables(15);
        let killers = KillerTable::new();
        let side = board.side_to_move();

        let mut picker = MovePicker::new(
            &board,
            &candidates,
            side,
            Move::NULL,
            0,
            &killers,
            Move::NULL,
            &history,
            &continuation,
            [None, None],
        );
        let first = picker.pick_next().unwrap();
        assert!(would_win_if_played(&board, first, side));
    }
}
