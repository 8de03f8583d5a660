//! Core Caro types: board representation, rules, and threat detection.

mod bitboard;
mod board;
mod error;
mod geometry;
mod movegen;
mod moves;
mod player;
mod rules;
mod threat;
mod zobrist;

pub use bitboard::Bitboard;
pub use board::{Board, Position, PrettyBoard, Undo};
pub use error::{BoardError, PositionError};
pub use geometry::{Direction, Geometry};
pub use movegen::{generate_candidates, MoveList, DEFAULT_RADIUS};
pub use moves::Move;
pub use player::Player;
pub use rules::{is_legal, is_winning, open_rule_applies};
pub use threat::{
    classify, enumerate_threats, is_winning_move, window_key, winner, would_win_if_played, Threat,
    ThreatClass, ThreatKind,
};
pub use zobrist::{table_for_size, ZobristTable};
