//! Integration tests for the Lazy SMP thread pool.
//!
//! Verifies correctness (legal moves, win detection) and robustness
//! (stop-signal propagation, node counting) under various thread counts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use caro_core::{Board, Move};
use caro_engine::{SearchControl, SearchResult, ThreadPool, TimeManager};

/// Helper: run a search on `board` at `depth` using `threads` helper threads.
fn search_with_threads(board: &Board, depth: u8, threads: usize) -> SearchResult {
    let mut pool = ThreadPool::new(16);
    pool.set_num_threads(threads);
    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(stopped);
    let mut time_manager = TimeManager::new();
    pool.search(board, depth, &control, &mut time_manager, |_, _, _, _| {})
}

fn board_with_moves(size: u8, moves: &[(u8, u8)]) -> Board {
    let mut board = Board::empty(size).unwrap();
    for &(x, y) in moves {
        board.make_move(Move::new(x, y));
    }
    board
}

// ── Basic correctness ───────────────────────────────────────────────────────

#[test]
fn single_thread_returns_legal_move() {
    let board = board_with_moves(15, &[(7, 7)]);
    let result = search_with_threads(&board, 4, 1);
    assert!(!result.best_move.is_null(), "single-thread search should return a legal move");
}

#[test]
fn single_thread_finds_immediate_win() {
    let board = board_with_moves(16, &[(7, 7), (0, 0), (8, 7), (0, 1), (9, 7), (0, 2), (10, 7)]);
    let result = search_with_threads(&board, 3, 1);
    assert!(result.score > caro_engine::search::negamax::WIN_THRESHOLD, "score {} should indicate a forced win", result.score);
}

// ── Multi-thread correctness ────────────────────────────────────────────────

#[test]
fn multi_thread_2_returns_legal_move() {
    let board = board_with_moves(15, &[(7, 7)]);
    let result = search_with_threads(&board, 4, 2);
    assert!(!result.best_move.is_null(), "2-thread search should return a legal move");
}

#[test]
fn multi_thread_4_returns_legal_move() {
    let board = board_with_moves(15, &[(7, 7)]);
    let result = search_with_threads(&board, 4, 4);
    assert!(!result.best_move.is_null(), "4-thread search should return a legal move");
}

#[test]
fn multi_thread_finds_immediate_win() {
    let board = board_with_moves(16, &[(7, 7), (0, 0), (8, 7), (0, 1), (9, 7), (0, 2), (10, 7)]);
    let result = search_with_threads(&board, 3, 4);
    assert!(result.score > caro_engine::search::negamax::WIN_THRESHOLD, "4-thread search should find the forced win");
}

#[test]
fn multi_thread_various_positions() {
    let positions = [
        ("opening", board_with_moves(15, &[(7, 7)])),
        ("midgame cluster", board_with_moves(16, &[(5, 5), (5, 6), (6, 5), (6, 6), (4, 4)])),
        ("near-full corner", board_with_moves(15, &[(0, 0), (0, 1), (1, 0), (1, 1), (2, 0)])),
    ];

    for (name, board) in positions {
        let result = search_with_threads(&board, 3, 4);
        assert!(!result.best_move.is_null(), "4-thread search on {name} returned null move");
    }
}

// ── Stop-signal behaviour ───────────────────────────────────────────────────

#[test]
fn stop_signal_terminates_all_threads() {
    let board = board_with_moves(15, &[(7, 7)]);
    let mut pool = ThreadPool::new(16);
    pool.set_num_threads(4);

    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(Arc::clone(&stopped));

    let stop_clone = Arc::clone(&stopped);
    let mut time_manager = TimeManager::new();
    let result = pool.search(&board, 40, &control, &mut time_manager, |depth, _, _, _| {
        if depth >= 1 {
            stop_clone.store(true, Ordering::Release);
        }
    });

    assert!(result.depth <= 3, "search should stop shortly after flag is set, got depth {}", result.depth);
}

#[test]
fn pre_set_stop_returns_immediately() {
    let board = board_with_moves(15, &[(7, 7)]);
    let mut pool = ThreadPool::new(16);
    pool.set_num_threads(4);

    let stopped = Arc::new(AtomicBool::new(true));
    let control = SearchControl::new_infinite(Arc::clone(&stopped));

    let mut time_manager = TimeManager::new();
    let result = pool.search(&board, 30, &control, &mut time_manager, |_, _, _, _| {});

    assert_eq!(result.depth, 0, "search with pre-set stop flag should complete depth 0");
}

// ── Node counting ────────────────────────────────────────────────────────────

#[test]
fn multi_thread_reports_total_nodes() {
    let board = board_with_moves(15, &[(7, 7)]);

    let single = search_with_threads(&board, 3, 1);
    let quad = search_with_threads(&board, 3, 4);

    assert!(single.nodes > 0, "single-thread search should report > 0 nodes");
    assert!(quad.nodes > 0, "4-thread search should report > 0 nodes");
}

// ── No-legal-move bypass ─────────────────────────────────────────────────────

#[test]
fn full_board_returns_draw_single_thread() {
    let mut board = Board::empty(15).unwrap();
    for y in 0..15u8 {
        for x in 0..15u8 {
            board.make_move(Move::new(x, y));
        }
    }
    let result = search_with_threads(&board, 4, 1);
    assert_eq!(result.best_move, Move::DRAW);
    assert_eq!(result.depth, 0);
    assert_eq!(result.nodes, 0);
}

#[test]
fn full_board_returns_draw_multi_thread() {
    let mut board = Board::empty(15).unwrap();
    for y in 0..15u8 {
        for x in 0..15u8 {
            board.make_move(Move::new(x, y));
        }
    }
    let result = search_with_threads(&board, 4, 4);
    assert_eq!(result.best_move, Move::DRAW);
    assert_eq!(result.depth, 0);
    assert_eq!(result.nodes, 0);
}

// ── Callback behaviour ───────────────────────────────────────────────────────

#[test]
fn on_iter_callback_fires() {
    let board = board_with_moves(15, &[(7, 7)]);
    let mut pool = ThreadPool::new(16);
    pool.set_num_threads(4);

    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(stopped);

    let mut depths_seen: Vec<u8> = Vec::new();
    let mut time_manager = TimeManager::new();
    pool.search(&board, 3, &control, &mut time_manager, |depth, _, _, _| {
        depths_seen.push(depth);
    });

    assert_eq!(depths_seen, vec![1, 2, 3], "on_iter callback should fire exactly once per completed depth");
}
