//! Board state: stone placement, side to move, and move count.

use std::fmt;
use std::sync::Arc;

use crate::bitboard::Bitboard;
use crate::error::PositionError;
use crate::geometry::Geometry;
use crate::moves::Move;
use crate::player::Player;
use crate::zobrist;

/// Mutable search board: two stone bitboards plus incremental Zobrist hash.
///
/// Unlike the copy-make style used for a chess board, the search tree walks
/// this board in place: [`Board::make_move`] mutates it and returns an
/// [`Undo`] record, and [`Board::unmake_move`] reverses exactly that record.
/// Callers that need an immutable snapshot (the public `best_move` boundary)
/// use [`Position`] instead.
#[derive(Clone)]
pub struct Board {
    geometry: Arc<Geometry>,
    stones: [Bitboard; Player::COUNT],
    side_to_move: Player,
    move_number: u32,
    hash: u64,
}

/// Record of a single placement, sufficient to undo it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Undo {
    mv: Move,
    player: Player,
    prev_hash: u64,
}

impl Board {
    /// An empty board of the given side length.
    pub fn empty(size: u8) -> Result<Self, PositionError> {
        let geometry = Arc::new(Geometry::new(size)?);
        Ok(Self {
            geometry,
            stones: [Bitboard::EMPTY; Player::COUNT],
            side_to_move: Player::Red,
            move_number: 0,
            hash: 0,
        })
    }

    /// Board geometry (size, masks, line enumeration).
    #[inline]
    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    /// Board side length.
    #[inline]
    pub fn size(&self) -> u8 {
        self.geometry.size()
    }

    /// Stones belonging to `player`.
    #[inline]
    pub fn stones(&self, player: Player) -> Bitboard {
        self.stones[player.index()]
    }

    /// Union of both players' stones.
    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.stones[Player::Red.index()] | self.stones[Player::Blue.index()]
    }

    /// True if `(x, y)` holds a stone.
    #[inline]
    pub fn is_occupied(&self, x: u8, y: u8) -> bool {
        self.occupied().get(self.geometry.index(x, y))
    }

    /// The player occupying `(x, y)`, if any.
    pub fn player_at(&self, x: u8, y: u8) -> Option<Player> {
        let idx = self.geometry.index(x, y);
        if self.stones[Player::Red.index()].get(idx) {
            Some(Player::Red)
        } else if self.stones[Player::Blue.index()].get(idx) {
            Some(Player::Blue)
        } else {
            None
        }
    }

    /// The side to move next.
    #[inline]
    pub fn side_to_move(&self) -> Player {
        self.side_to_move
    }

    /// Number of stones placed so far.
    #[inline]
    pub fn move_number(&self) -> u32 {
        self.move_number
    }

    /// Current Zobrist hash.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Place a stone for the side to move at `mv`, returning an undo record.
    ///
    /// # Panics
    ///
    /// Debug builds assert `mv` is in bounds and unoccupied; this is a
    /// contract violation by the caller (move generation bug), not a
    /// reportable position error.
    pub fn make_move(&mut self, mv: Move) -> Undo {
        debug_assert!(!mv.is_null() && !mv.is_draw());
        let (x, y) = mv.xy();
        debug_assert!(self.geometry.in_bounds(x as i32, y as i32));
        debug_assert!(!self.is_occupied(x, y));

        let player = self.side_to_move;
        let idx = self.geometry.index(x, y);
        let undo = Undo {
            mv,
            player,
            prev_hash: self.hash,
        };

        self.stones[player.index()].set(idx);
        let table = zobrist::table_for_size(self.size());
        self.hash ^= table.key(idx, player);
        self.move_number += 1;
        self.side_to_move = player.flip();

        undo
    }

    /// Reverse the placement described by `undo`. Must be the most recent
    /// [`make_move`](Board::make_move) not yet undone.
    pub fn unmake_move(&mut self, undo: Undo) {
        let (x, y) = undo.mv.xy();
        let idx = self.geometry.index(x, y);
        debug_assert!(self.stones[undo.player.index()].get(idx));

        self.stones[undo.player.index()].clear(idx);
        self.move_number -= 1;
        self.side_to_move = undo.player;
        self.hash = undo.prev_hash;
    }

    /// Structural validation against the narrow error taxonomy.
    pub fn validate(&self) -> Result<(), PositionError> {
        let red = self.stones[Player::Red.index()];
        let blue = self.stones[Player::Blue.index()];
        if (red & blue).is_nonempty() {
            return Err(PositionError::OverlappingStones);
        }
        let stone_count = red.popcount() + blue.popcount();
        let expected = Player::to_move(stone_count);
        if expected != self.side_to_move {
            return Err(PositionError::SideToMoveMismatch {
                stone_count,
                side_to_move: match self.side_to_move {
                    Player::Red => "red",
                    Player::Blue => "blue",
                },
            });
        }
        Ok(())
    }

    /// A pretty-printable wrapper for this board.
    pub fn pretty(&self) -> PrettyBoard<'_> {
        PrettyBoard(self)
    }

    /// A scratch copy with one extra stone for `player`, ignoring whose turn
    /// it actually is. Used by move ordering and threat analysis to answer
    /// "what if" questions (e.g. could the opponent win here next) without
    /// the bookkeeping of a real [`make_move`](Board::make_move).
    pub fn with_hypothetical_stone(&self, mv: Move, player: Player) -> Board {
        let mut probe = self.clone();
        let (x, y) = mv.xy();
        let idx = probe.geometry.index(x, y);
        probe.stones[player.index()].set(idx);
        probe
    }

    /// Toggle the side to move without placing a stone, for null-move
    /// pruning. The hash has no side-to-move component, so it is unaffected;
    /// undo is calling this a second time.
    pub fn make_null_move(&mut self) {
        self.side_to_move = self.side_to_move.flip();
    }

    /// Reverse [`make_null_move`](Board::make_null_move).
    pub fn unmake_null_move(&mut self) {
        self.side_to_move = self.side_to_move.flip();
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({}x{}, {} stones)", self.size(), self.size(), self.move_number)
    }
}

/// Wrapper for pretty-printing a board as a grid of `.`/`R`/`B`.
pub struct PrettyBoard<'a>(&'a Board);

impl fmt::Display for PrettyBoard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let board = self.0;
        for y in 0..board.size() {
            for x in 0..board.size() {
                let c = match board.player_at(x, y) {
                    Some(Player::Red) => 'R',
                    Some(Player::Blue) => 'B',
                    None => '.',
                };
                write!(f, "{c}")?;
                if x + 1 < board.size() {
                    write!(f, " ")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Immutable position snapshot exposed at the public `best_move` boundary.
///
/// Unlike [`Board`], which is mutated in place by the search, `Position` is
/// the stable, `Clone`-cheap type callers build and hand to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    size: u8,
    red: Bitboard,
    blue: Bitboard,
    side_to_move: Player,
}

impl Position {
    /// Build a position from explicit stone sets. Does not validate; call
    /// [`Position::into_board`] to check and convert it.
    pub fn new(size: u8, red: Bitboard, blue: Bitboard, side_to_move: Player) -> Self {
        Self { size, red, blue, side_to_move }
    }

    /// An empty position of the given size, red to move.
    pub fn empty(size: u8) -> Self {
        Self::new(size, Bitboard::EMPTY, Bitboard::EMPTY, Player::Red)
    }

    #[inline]
    pub fn size(&self) -> u8 {
        self.size
    }

    #[inline]
    pub fn side_to_move(&self) -> Player {
        self.side_to_move
    }

    #[inline]
    pub fn stones(&self, player: Player) -> Bitboard {
        match player {
            Player::Red => self.red,
            Player::Blue => self.blue,
        }
    }

    /// Validate and convert into a mutable search [`Board`].
    pub fn into_board(self) -> Result<Board, PositionError> {
        let geometry = Arc::new(Geometry::new(self.size)?);
        let stone_count = self.red.popcount() + self.blue.popcount();
        let board = Board {
            geometry,
            stones: [self.red, self.blue],
            side_to_move: self.side_to_move,
            move_number: stone_count,
            hash: hash_from_scratch(self.size, self.red, self.blue),
        };
        board.validate()?;
        Ok(board)
    }
}

impl From<&Board> for Position {
    fn from(board: &Board) -> Self {
        Self {
            size: board.size(),
            red: board.stones(Player::Red),
            blue: board.stones(Player::Blue),
            side_to_move: board.side_to_move(),
        }
    }
}

fn hash_from_scratch(size: u8, red: Bitboard, blue: Bitboard) -> u64 {
    let table = zobrist::table_for_size(size);
    let mut hash = 0u64;
    for idx in red {
        hash ^= table.key(idx, Player::Red);
    }
    for idx in blue {
        hash ^= table.key(idx, Player::Blue);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_validates() {
        let board = Board::empty(16).unwrap();
        board.validate().unwrap();
        assert_eq!(board.side_to_move(), Player::Red);
        assert_eq!(board.move_number(), 0);
    }

    #[test]
    fn make_then_unmake_restores_state() {
        let mut board = Board::empty(15).unwrap();
        let before_hash = board.hash();
        let undo = board.make_move(Move::new(7, 7));
        assert!(board.is_occupied(7, 7));
        assert_eq!(board.side_to_move(), Player::Blue);
        assert_eq!(board.move_number(), 1);
        board.unmake_move(undo);
        assert!(!board.is_occupied(7, 7));
        assert_eq!(board.side_to_move(), Player::Red);
        assert_eq!(board.move_number(), 0);
        assert_eq!(board.hash(), before_hash);
    }

    #[test]
    fn alternating_moves_flip_side() {
        let mut board = Board::empty(15).unwrap();
        board.make_move(Move::new(0, 0));
        assert_eq!(board.player_at(0, 0), Some(Player::Red));
        board.make_move(Move::new(1, 1));
        assert_eq!(board.player_at(1, 1), Some(Player::Blue));
        assert_eq!(board.side_to_move(), Player::Red);
    }

    #[test]
    fn overlapping_stones_rejected() {
        let mut red = Bitboard::EMPTY;
        red.set(0);
        let mut blue = Bitboard::EMPTY;
        blue.set(0);
        let pos = Position::new(15, red, blue, Player::Blue);
        assert!(matches!(
            pos.into_board(),
            Err(PositionError::OverlappingStones)
        ));
    }

    #[test]
    fn side_to_move_mismatch_rejected() {
        let mut red = Bitboard::EMPTY;
        red.set(0);
        let pos = Position::new(15, red, Bitboard::EMPTY, Player::Blue);
        assert!(matches!(
            pos.into_board(),
            Err(PositionError::SideToMoveMismatch { .. })
        ));
    }

    #[test]
    fn position_roundtrips_through_board() {
        let mut board = Board::empty(16).unwrap();
        board.make_move(Move::new(8, 8));
        board.make_move(Move::new(8, 9));
        let pos = Position::from(&board);
        let rebuilt = pos.into_board().unwrap();
        assert_eq!(rebuilt.hash(), board.hash());
        assert_eq!(rebuilt.move_number(), board.move_number());
    }

    #[test]
    fn pretty_print_shows_stones() {
        let mut board = Board::empty(15).unwrap();
        board.make_move(Move::new(0, 0));
        let out = format!("{}", board.pretty());
        assert!(out.starts_with('R'));
    }
}
