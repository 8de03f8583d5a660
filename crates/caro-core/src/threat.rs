//! Win detection and threat enumeration.
//!
//! A win is an exact five-in-a-row that is neither an overline (six or more
//! contiguous) nor sandwiched (opponent stones on both ends). Threats below
//! a win — straight/broken fours and threes — are detected the same way, by
//! walking each row/column/diagonal once and looking at maximal runs and
//! single-gap windows.

use std::sync::OnceLock;

use crate::board::Board;
use crate::geometry::Direction;
use crate::moves::Move;
use crate::player::Player;

/// The four escalating threat shapes the evaluator and move orderer use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreatKind {
    BrokenThree,
    StraightThree,
    BrokenFour,
    StraightFour,
}

/// A single detected threat: the stones forming it, the squares that
/// escalate it, and the squares a defender must occupy to neutralize it.
/// Threats are not stored on the board; they are recomputed per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Threat {
    pub kind: ThreatKind,
    pub stone_positions: Vec<(u8, u8)>,
    pub gain_squares: Vec<(u8, u8)>,
    pub cost_squares: Vec<(u8, u8)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Empty,
    Own,
    Opp,
    Wall,
}

fn line_coords(board: &Board, direction: Direction, start: (u8, u8)) -> Vec<(u8, u8)> {
    let geometry = board.geometry();
    let (dx, dy) = direction.step();
    let (mut x, mut y) = (start.0 as i32, start.1 as i32);
    let mut coords = Vec::new();
    while geometry.in_bounds(x, y) {
        coords.push((x as u8, y as u8));
        x += dx;
        y += dy;
    }
    coords
}

/// Read an entire line's occupancy in one shot via the geometry's
/// row/column/diagonal bitboard extraction, rather than querying each cell
/// of the line individually.
fn line_cells(board: &Board, direction: Direction, start: (u8, u8), len: usize, side: Player) -> Vec<Cell> {
    let geometry = board.geometry();
    let own_bb = board.stones(side);
    let opp_bb = board.stones(side.flip());
    let (own_word, opp_word) = match direction {
        Direction::Horizontal => (geometry.row(own_bb, start.1), geometry.row(opp_bb, start.1)),
        Direction::Vertical => (geometry.column(own_bb, start.0), geometry.column(opp_bb, start.0)),
        Direction::DiagonalDown => {
            let k = geometry.diag_index(start.0, start.1);
            (geometry.diagonal(own_bb, k), geometry.diagonal(opp_bb, k))
        }
        Direction::DiagonalUp => {
            let k = geometry.anti_diag_index(start.0, start.1);
            (geometry.anti_diagonal(own_bb, k), geometry.anti_diagonal(opp_bb, k))
        }
    };
    (0..len)
        .map(|i| {
            if (own_word >> i) & 1 != 0 {
                Cell::Own
            } else if (opp_word >> i) & 1 != 0 {
                Cell::Opp
            } else {
                Cell::Empty
            }
        })
        .collect()
}

fn at(cells: &[Cell], idx: isize) -> Cell {
    if idx < 0 || idx as usize >= cells.len() {
        Cell::Wall
    } else {
        cells[idx as usize]
    }
}

/// Maximal runs of `Cell::Own` in `cells`, as `(start, len)` pairs.
fn runs(cells: &[Cell]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < cells.len() {
        if cells[i] == Cell::Own {
            let start = i;
            while i < cells.len() && cells[i] == Cell::Own {
                i += 1;
            }
            out.push((start, i - start));
        } else {
            i += 1;
        }
    }
    out
}

/// A run of exactly five is a win unless sandwiched by opponent stones on
/// both ends. Runs of six or more never reach here as length-5 (they are
/// counted as their own maximal run), so the overline check is implicit.
fn is_valid_five(cells: &[Cell], run_start: usize, run_len: usize) -> bool {
    if run_len != 5 {
        return false;
    }
    let before = at(cells, run_start as isize - 1);
    let after = at(cells, (run_start + run_len) as isize);
    !(before == Cell::Opp && after == Cell::Opp)
}

/// Whether `side` has an unblocked five-in-a-row anywhere on `board`.
pub fn check_win(board: &Board, side: Player) -> bool {
    for direction in Direction::ALL {
        for start in board.geometry().lines(direction) {
            let coords = line_coords(board, direction, start);
            let cells = line_cells(board, direction, start, coords.len(), side);
            for (run_start, run_len) in runs(&cells) {
                if run_len >= 5 && is_valid_five(&cells, run_start, run_len) {
                    return true;
                }
            }
        }
    }
    false
}

/// The winner, if either side has an unblocked five-in-a-row.
pub fn winner(board: &Board) -> Option<Player> {
    if check_win(board, Player::Red) {
        Some(Player::Red)
    } else if check_win(board, Player::Blue) {
        Some(Player::Blue)
    } else {
        None
    }
}

/// Whether playing `mv` for `side` on `board` produces a win for `side`.
pub fn is_winning_move(board: &Board, mv: Move, side: Player) -> bool {
    debug_assert_eq!(board.side_to_move(), side);
    let mut probe = board.clone();
    probe.make_move(mv);
    check_win(&probe, side)
}

/// Whether `side` would win by playing `mv`, regardless of whose turn it
/// actually is. Used to check what the opponent threatens next, without
/// needing a board positioned at their turn.
pub fn would_win_if_played(board: &Board, mv: Move, side: Player) -> bool {
    let probe = board.with_hypothetical_stone(mv, side);
    check_win(&probe, side)
}

/// All threats `side` currently holds on `board`.
pub fn enumerate_threats(board: &Board, side: Player) -> Vec<Threat> {
    let mut threats = Vec::new();
    for direction in Direction::ALL {
        for start in board.geometry().lines(direction) {
            let coords = line_coords(board, direction, start);
            let cells = line_cells(board, direction, start, coords.len(), side);
            find_fours(&coords, &cells, &mut threats);
            find_threes(&coords, &cells, &mut threats);
        }
    }
    threats
}

fn find_fours(coords: &[(u8, u8)], cells: &[Cell], out: &mut Vec<Threat>) {
    // Straight four: a run of four with at least one open end that escalates
    // to a valid five.
    for (start, len) in runs(cells) {
        if len != 4 {
            continue;
        }
        let mut gains = Vec::new();
        if at(cells, start as isize - 1) == Cell::Empty && escalates_to_five(cells, start as isize - 1, start, len)
        {
            gains.push(coords[start - 1]);
        }
        if at(cells, (start + len) as isize) == Cell::Empty
            && escalates_to_five(cells, (start + len) as isize, start, len)
        {
            gains.push(coords[start + len]);
        }
        if !gains.is_empty() {
            out.push(Threat {
                kind: ThreatKind::StraightFour,
                stone_positions: coords[start..start + len].to_vec(),
                cost_squares: gains.clone(),
                gain_squares: gains,
            });
        }
    }

    // Broken four: a 5-wide window with exactly one interior gap and four
    // stones, where filling the gap makes a valid five.
    if cells.len() < 5 {
        return;
    }
    for w in 0..=cells.len() - 5 {
        let window = &cells[w..w + 5];
        let gap = match single_interior_gap(window) {
            Some(g) => g,
            None => continue,
        };
        let gap_idx = w + gap;
        if window_fill_is_valid_five(cells, gap_idx) {
            let stones: Vec<_> = (w..w + 5).filter(|&i| i != gap_idx).map(|i| coords[i]).collect();
            out.push(Threat {
                kind: ThreatKind::BrokenFour,
                stone_positions: stones,
                gain_squares: vec![coords[gap_idx]],
                cost_squares: vec![coords[gap_idx]],
            });
        }
    }
}

fn find_threes(coords: &[(u8, u8)], cells: &[Cell], out: &mut Vec<Threat>) {
    // Straight three: a run of three with both adjacent cells empty.
    for (start, len) in runs(cells) {
        if len != 3 {
            continue;
        }
        let before = at(cells, start as isize - 1);
        let after = at(cells, (start + len) as isize);
        if before == Cell::Empty && after == Cell::Empty {
            out.push(Threat {
                kind: ThreatKind::StraightThree,
                stone_positions: coords[start..start + len].to_vec(),
                gain_squares: vec![coords[start - 1], coords[start + len]],
                cost_squares: vec![coords[start - 1], coords[start + len]],
            });
        }
    }

    // Broken three: a 4-wide window with exactly one interior gap and three
    // stones, where filling the gap yields a four with at least one open end.
    if cells.len() < 4 {
        return;
    }
    for w in 0..=cells.len() - 4 {
        let window = &cells[w..w + 4];
        let gap = match single_interior_gap(window) {
            Some(g) => g,
            None => continue,
        };
        let gap_idx = w + gap;
        let before = at(cells, w as isize - 1);
        let after = at(cells, (w + 4) as isize);
        if before == Cell::Empty || after == Cell::Empty {
            let stones: Vec<_> = (w..w + 4).filter(|&i| i != gap_idx).map(|i| coords[i]).collect();
            out.push(Threat {
                kind: ThreatKind::BrokenThree,
                stone_positions: stones,
                gain_squares: vec![coords[gap_idx]],
                cost_squares: vec![coords[gap_idx]],
            });
        }
    }
}

/// The single interior (non-edge) empty index in `window`, if the rest are
/// all `Cell::Own` and exactly one gap exists away from both window ends.
fn single_interior_gap(window: &[Cell]) -> Option<usize> {
    let empties: Vec<usize> = window
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c == Cell::Empty)
        .map(|(i, _)| i)
        .collect();
    if empties.len() != 1 {
        return None;
    }
    let gap = empties[0];
    if gap == 0 || gap == window.len() - 1 {
        return None;
    }
    if window.iter().enumerate().any(|(i, &c)| i != gap && c != Cell::Own) {
        return None;
    }
    Some(gap)
}

/// Whether placing a stone at `idx` extends the run touching `start..start+len`
/// into a valid (non-overline, non-sandwiched) five.
fn escalates_to_five(cells: &[Cell], idx: isize, start: usize, len: usize) -> bool {
    let (new_start, new_len) = if idx < start as isize {
        (idx as usize, len + 1)
    } else {
        (start, len + 1)
    };
    if new_len != 5 {
        return false;
    }
    let before = at(cells, new_start as isize - 1);
    let after = at(cells, (new_start + new_len) as isize);
    !(before == Cell::Opp && after == Cell::Opp)
}

/// Whether filling the empty cell at `gap_idx` (surrounded by four `Own`
/// stones in its window) produces a valid five.
fn window_fill_is_valid_five(cells: &[Cell], gap_idx: usize) -> bool {
    // Walk outward from the gap in both directions over Own cells, treating
    // the gap itself as filled.
    let is_own_or_gap = |i: usize| i == gap_idx || (i < cells.len() && cells[i] == Cell::Own);
    let mut lo = gap_idx;
    while lo > 0 && is_own_or_gap(lo - 1) {
        lo -= 1;
    }
    let mut hi = gap_idx;
    while hi + 1 < cells.len() && is_own_or_gap(hi + 1) {
        hi += 1;
    }
    let run_len = hi - lo + 1;
    if run_len != 5 {
        return false;
    }
    let before = at(cells, lo as isize - 1);
    let after = at(cells, (hi + 1) as isize);
    !(before == Cell::Opp && after == Cell::Opp)
}

/// Compressed classification of a 9-cell window around a candidate move,
/// from the attacking side's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThreatClass {
    None,
    Weak,
    Medium,
    Strong,
    Winning,
    Invalid,
}

const WINDOW_CELLS: usize = 9;
const WINDOW_CENTER: usize = WINDOW_CELLS / 2;
const WINDOW_TABLE_SIZE: usize = 1 << (2 * WINDOW_CELLS);

fn decode_window(key: u32) -> [Cell; WINDOW_CELLS] {
    let mut cells = [Cell::Empty; WINDOW_CELLS];
    for (i, cell) in cells.iter_mut().enumerate() {
        let code = (key >> (2 * i)) & 0b11;
        *cell = match code {
            0b00 => Cell::Empty,
            0b01 => Cell::Own,
            0b10 => Cell::Opp,
            _ => Cell::Wall,
        };
    }
    cells
}

fn classify_window(key: u32) -> ThreatClass {
    let cells = decode_window(key);
    if cells[WINDOW_CENTER] != Cell::Empty {
        return ThreatClass::None;
    }
    let mut filled = cells;
    filled[WINDOW_CENTER] = Cell::Own;

    let mut start = WINDOW_CENTER;
    while start > 0 && filled[start - 1] == Cell::Own {
        start -= 1;
    }
    let mut end = WINDOW_CENTER;
    while end + 1 < WINDOW_CELLS && filled[end + 1] == Cell::Own {
        end += 1;
    }
    let run_len = end - start + 1;
    let before = if start == 0 { Cell::Wall } else { filled[start - 1] };
    let after = if end + 1 >= WINDOW_CELLS { Cell::Wall } else { filled[end + 1] };

    match run_len {
        n if n >= 6 => ThreatClass::Invalid,
        5 => {
            if before == Cell::Opp && after == Cell::Opp {
                ThreatClass::Invalid
            } else {
                ThreatClass::Winning
            }
        }
        4 => {
            let open_ends = [before, after].iter().filter(|&&c| c == Cell::Empty).count();
            if open_ends >= 1 {
                ThreatClass::Strong
            } else {
                ThreatClass::Medium
            }
        }
        3 => {
            let open_ends = [before, after].iter().filter(|&&c| c == Cell::Empty).count();
            if open_ends == 2 {
                ThreatClass::Medium
            } else {
                ThreatClass::Weak
            }
        }
        _ => ThreatClass::None,
    }
}

fn build_window_table() -> Vec<ThreatClass> {
    (0..WINDOW_TABLE_SIZE as u32).map(classify_window).collect()
}

static WINDOW_TABLE: OnceLock<Vec<ThreatClass>> = OnceLock::new();

/// Classify the 9-cell window `key` via the lazily-built, process-wide
/// cached table. `key` packs 9 cells at 2 bits each (`00` empty, `01` own,
/// `10` opponent, `11` wall), center cell (index 4) always empty.
pub fn classify(key: u32) -> ThreatClass {
    let table = WINDOW_TABLE.get_or_init(build_window_table);
    table[key as usize & (WINDOW_TABLE_SIZE - 1)]
}

/// Build the window key for `side`, centered on empty cell `(x, y)` along
/// `direction`, for use with [`classify`].
pub fn window_key(board: &Board, direction: Direction, x: u8, y: u8, side: Player) -> u32 {
    let geometry = board.geometry();
    let (dx, dy) = direction.step();
    let mut key = 0u32;
    for i in -4i32..=4 {
        let cx = x as i32 + dx * i;
        let cy = y as i32 + dy * i;
        let code: u32 = if !geometry.in_bounds(cx, cy) {
            0b11
        } else {
            match board.player_at(cx as u8, cy as u8) {
                None => 0b00,
                Some(p) if p == side => 0b01,
                Some(_) => 0b10,
            }
        };
        key |= code << (2 * (i + 4)) as u32;
    }
    key
}
