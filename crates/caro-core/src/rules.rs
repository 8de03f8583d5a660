//! Rules beyond raw placement: the Caro Open Rule and win-move queries.

use crate::board::Board;
use crate::moves::Move;
use crate::player::Player;
use crate::threat::is_winning_move;

/// Minimum Chebyshev distance the third stone overall (the first player's
/// second move) must keep from the opening stone.
const OPEN_RULE_MIN_DISTANCE: u8 = 3;

/// Whether the Caro Open Rule restricts move choice at the current position.
/// It applies only to the third stone placed overall (ply 3).
pub fn open_rule_applies(board: &Board) -> bool {
    board.move_number() == 2
}

/// The opening stone the Open Rule measures distance from, if the rule
/// currently applies.
fn opening_stone(board: &Board) -> Option<Move> {
    if !open_rule_applies(board) {
        return None;
    }
    let first_mover = Player::to_move(0);
    let idx = board.stones(first_mover).into_iter().next()?;
    let (x, y) = board.geometry().xy(idx);
    Some(Move::new(x, y))
}

/// Whether `mv` is legal to play right now: unoccupied, in bounds, and — at
/// ply 3 only — outside the Open Rule's neighborhood of the opening stone.
pub fn is_legal(board: &Board, mv: Move) -> bool {
    if mv.is_null() || mv.is_draw() {
        return false;
    }
    let (x, y) = mv.xy();
    if !board.geometry().in_bounds(x as i32, y as i32) {
        return false;
    }
    if board.is_occupied(x, y) {
        return false;
    }
    if let Some(opening) = opening_stone(board) {
        if mv.chebyshev_distance(opening) < OPEN_RULE_MIN_DISTANCE {
            return false;
        }
    }
    true
}

/// Whether playing `mv` for the side to move wins immediately.
pub fn is_winning(board: &Board, mv: Move) -> bool {
    is_winning_move(board, mv, board.side_to_move())
}
