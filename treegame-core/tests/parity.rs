//! Reference Parity Testing
//!
//! Replays games against a deliberately naive list-based model of the rules
//! (cells in a `Vec`, positions compared as whole lists, the strategy found by
//! linear search) and verifies the packed engine produces identical results
//! for:
//! - Strategy enumeration order
//! - Best moves from every position and pointer
//! - Win detection, including threefold repetition
//! - Triviality checks

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use treegame_core::{CellState, GameConfig, GameMode, GameState, Position, Role, StrategyTable};

use CellState::{Clear as T, OnFire as F};

/// List-based model of one game.
struct Reference {
    cells: Vec<CellState>,
    location: usize,
    repetition_win: bool,
    winner: Option<Role>,
    past: HashMap<Vec<CellState>, u32>,
}

impl Reference {
    fn new(cells: &[CellState], repetition_win: bool) -> Reference {
        let mut reference = Reference {
            cells: cells.to_vec(),
            location: 0,
            repetition_win,
            winner: None,
            past: HashMap::new(),
        };
        reference.past.insert(reference.position(), 1);
        reference
    }

    /// Cells starting at the current location.
    fn position(&self) -> Vec<CellState> {
        let mut pos = self.cells[self.location..].to_vec();
        pos.extend_from_slice(&self.cells[..self.location]);
        pos
    }

    fn take_turn(&mut self, mov: CellState) {
        self.cells[self.location] = mov;
        self.location = (self.location + 1) % self.cells.len();
        if self.winner.is_some() {
            return;
        }
        if self.cells.iter().all(|&c| c == T) {
            self.winner = Some(Role::Suppressor);
        } else if self.repetition_win {
            let count = self.past.entry(self.position()).or_insert(0);
            *count += 1;
            if *count >= 3 {
                self.winner = Some(Role::Igniter);
            }
        }
    }

    fn firefighter_move(&self, strategy: &[Vec<CellState>]) -> CellState {
        let mut rest = self.cells[self.location + 1..].to_vec();
        rest.extend_from_slice(&self.cells[..self.location]);
        let mut with_fire = rest.clone();
        with_fire.push(F);
        let mut with_tree = rest;
        with_tree.push(T);
        for outcome in strategy {
            if *outcome == with_fire {
                return F;
            }
            if *outcome == with_tree {
                return T;
            }
        }
        panic!("position missing from reference strategy");
    }

    fn is_immediate_win(&self) -> bool {
        let pos = self.position();
        match pos.iter().position(|&c| c == T) {
            None => true,
            Some(first) => pos[first + 1..].iter().all(|&c| c == T),
        }
    }

    fn is_trivial(&self) -> bool {
        let fires = self.cells.iter().filter(|&&c| c == F).count();
        fires + 1 >= self.cells.len() || self.is_immediate_win()
    }
}

/// Best-first list of every board, built by searching the list itself.
fn reference_strategy(n: usize) -> Vec<Vec<CellState>> {
    let mut last = vec![T; n];
    let mut strategy = vec![last.clone()];
    while strategy.len() < 1 << n {
        let start = &last[..n - 1];
        let mut with_fire = vec![F];
        with_fire.extend_from_slice(start);
        let next = if strategy.contains(&with_fire) {
            let mut with_tree = vec![T];
            with_tree.extend_from_slice(start);
            with_tree
        } else {
            with_fire
        };
        strategy.push(next.clone());
        last = next;
    }
    strategy
}

fn cells_of(bits: u32, n: usize) -> Vec<CellState> {
    (0..n).map(|j| CellState::from_bit(bits >> j)).collect()
}

fn notation(cells: &[CellState]) -> String {
    cells.iter().map(|c| c.to_char()).collect()
}

fn config(repetition_win: bool) -> GameConfig {
    GameConfig {
        repetition_win,
        mode: GameMode::BothComputer,
        difficulty: 10,
    }
}

#[test]
fn test_strategy_enumeration_parity() {
    for n in 1..=10 {
        let reference = reference_strategy(n);
        let table = StrategyTable::build(n).unwrap();
        let packed: Vec<Vec<CellState>> = table.iter().map(|key| cells_of(key, n)).collect();
        assert_eq!(packed, reference, "strategy order differs for n={}", n);
    }
}

#[test]
fn test_best_move_parity_every_pointer() {
    let mut checked = 0;
    for n in 1..=8 {
        let strategy = reference_strategy(n);
        for bits in 0..(1u32 << n) {
            let cells = cells_of(bits, n);
            let mut game = GameState::new(&cells, config(false)).unwrap();
            let mut reference = Reference::new(&cells, false);
            // Replaying a cell's own state moves the pointer without
            // changing the board.
            for _ in 0..n {
                let expected = reference.firefighter_move(&strategy);
                assert_eq!(
                    game.suppressor_move().unwrap(),
                    expected,
                    "board {} pointer {}",
                    notation(&cells),
                    game.pointer()
                );
                assert_eq!(game.igniter_move().unwrap(), expected.opposite());
                let keep = game.current_state();
                game.take_turn(keep);
                reference.take_turn(keep);
                checked += 1;
            }
        }
    }
    println!("Checked {} (board, pointer) pairs", checked);
}

#[test]
fn test_random_playout_parity() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut decided = [0usize; 2];

    for _ in 0..300 {
        let n = rng.random_range(3..=9);
        let repetition_win = rng.random_bool(0.7);
        let cells: Vec<CellState> = (0..n)
            .map(|_| if rng.random() { F } else { T })
            .collect();
        let mut game = GameState::new(&cells, config(repetition_win)).unwrap();
        let mut reference = Reference::new(&cells, repetition_win);

        for turn in 0..80 {
            let mov = if rng.random() { F } else { T };
            game.take_turn(mov);
            reference.take_turn(mov);

            assert_eq!(game.position().to_string(), notation(&reference.cells));
            assert_eq!(game.pointer(), reference.location);
            assert_eq!(game.snapshot().canonical, notation(&reference.position()));
            assert_eq!(
                game.winner(),
                reference.winner,
                "winner differs after turn {} from {}",
                turn,
                notation(&cells)
            );
        }
        match game.winner() {
            Some(Role::Suppressor) => decided[0] += 1,
            Some(Role::Igniter) => decided[1] += 1,
            None => {}
        }
    }

    println!(
        "Random playouts: {} firefighter wins, {} pyromaniac wins",
        decided[0], decided[1]
    );
    assert!(decided[1] > 0, "repetition rule never triggered");
}

#[test]
fn test_triviality_parity() {
    for n in 1..=10 {
        for bits in 0..(1u32 << n) {
            let cells = cells_of(bits, n);
            let mut game = GameState::new(&cells, config(false)).unwrap();
            let mut reference = Reference::new(&cells, false);
            for _ in 0..n {
                assert_eq!(
                    game.is_immediate_suppressor_win(),
                    reference.is_immediate_win(),
                    "board {} pointer {}",
                    notation(&cells),
                    game.pointer()
                );
                assert_eq!(game.is_trivial(), reference.is_trivial());
                let keep = game.current_state();
                game.take_turn(keep);
                reference.take_turn(keep);
            }
        }
    }
}

/// Perfect play by both sides always burns out: the firefighter wins in
/// exactly as many turns as the starting position's rank, so no position
/// ever repeats. The all-clear board (rank 0) is skipped: it is already won.
#[test]
fn test_perfect_play_reaches_all_clear() {
    for n in 1..=8 {
        for bits in 1..(1u32 << n) {
            let cells = cells_of(bits, n);
            let mut game = GameState::new(&cells, config(true)).unwrap();
            let start = game.perfect_play_distance().unwrap();

            while !game.is_over() {
                let before = game.perfect_play_distance().unwrap();
                let mov = game.best_move().unwrap();
                game.try_take_turn(mov).unwrap();
                assert_eq!(game.perfect_play_distance().unwrap() + 1, before);
            }

            assert_eq!(game.winner(), Some(Role::Suppressor), "board {}", notation(&cells));
            assert_eq!(game.turns(), start as u64, "board {}", notation(&cells));
        }
    }
}

#[test]
fn test_random_initializer_properties() {
    let mut rng = StdRng::seed_from_u64(99);
    for n in 1..=12 {
        for _ in 0..25 {
            let game = GameState::random_non_trivial(n, config(true), &mut rng).unwrap();
            assert_eq!(game.len(), n);
            assert_eq!(game.pointer(), 0);
            assert_eq!(game.winner(), None);
            assert_eq!(game.repetition_count(), 1);
            if n >= 3 {
                let reference = Reference::new(&game.cells(), true);
                assert!(!reference.is_trivial(), "trivial start {}", game.position());
            }
        }
    }
    assert!(GameState::random_non_trivial(0, config(false), &mut rng).is_err());
}

#[test]
fn test_packed_position_matches_list() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..200 {
        let n = rng.random_range(1..=20);
        let cells: Vec<CellState> = (0..n)
            .map(|_| if rng.random() { F } else { T })
            .collect();
        let mut position = Position::new(&cells).unwrap();
        let mut reference = Reference::new(&cells, false);
        for _ in 0..rng.random_range(0..3 * n) {
            let mov = if rng.random() { F } else { T };
            position.apply_and_advance(mov);
            reference.take_turn(mov);
        }
        assert_eq!(position.cells(), reference.cells);
        assert_eq!(position.canonical_cells(), reference.position());
        assert_eq!(position.fire_count(), reference.cells.iter().filter(|&&c| c == F).count());
    }
}
