//! Error types for board construction and position validation.

/// Errors from structural validation of a [`Board`](crate::board::Board).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// The requested board size is outside the supported `15..=19` range.
    #[error("board size {size} is outside the supported range 15..=19")]
    InvalidBoardSize {
        /// The rejected size.
        size: u8,
    },
    /// A coordinate lies outside `0..size`.
    #[error("coordinate ({x}, {y}) is outside the {size}x{size} board")]
    OutOfBounds {
        /// The offending x coordinate.
        x: u8,
        /// The offending y coordinate.
        y: u8,
        /// The board size.
        size: u8,
    },
}

/// Errors returned by the public `best_move` boundary when the supplied
/// [`Position`](crate::board::Position) does not describe a coherent game
/// state. Per the narrow error taxonomy, these are the only recoverable
/// failures the core reports; everything else that can go wrong inside a
/// search is a programmer bug caught by a debug assertion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    /// The red and blue bitboards share at least one occupied cell.
    #[error("red and blue stones overlap")]
    OverlappingStones,
    /// The stone count's parity disagrees with the claimed side to move.
    #[error("stone count {stone_count} is inconsistent with side to move {side_to_move}")]
    SideToMoveMismatch {
        /// Total stones on the board.
        stone_count: u32,
        /// The side the position claims is to move.
        side_to_move: &'static str,
    },
    /// The position was built for a board size outside `15..=19`.
    #[error(transparent)]
    InvalidBoardSize(#[from] BoardError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_error_display() {
        let err = BoardError::InvalidBoardSize { size: 20 };
        assert_eq!(
            format!("{err}"),
            "board size 20 is outside the supported range 15..=19"
        );
    }

    #[test]
    fn position_error_display() {
        let err = PositionError::OverlappingStones;
        assert_eq!(format!("{err}"), "red and blue stones overlap");
    }

    #[test]
    fn position_error_from_board_error() {
        let board_err = BoardError::OutOfBounds { x: 20, y: 0, size: 16 };
        let pos_err: PositionError = board_err.into();
        assert!(matches!(pos_err, PositionError::InvalidBoardSize(_)));
    }
}
