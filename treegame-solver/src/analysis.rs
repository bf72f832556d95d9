//! Whole-table analysis: how often random boards are foregone conclusions,
//! whether perfect play always burns out, and how the computer fares
//! against itself.

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};
use treegame_core::{
    GameConfig, GameError, GameMode, GameState, Position, Role, StrategyCache, StrategyTable,
};

// ============================================================================
// Census
// ============================================================================

/// Starting boards of one size, classified the way the random initializer
/// sees them (pointer at cell 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Census {
    pub cells: usize,
    pub boards: usize,
    /// Firefighter wins before the pyromaniac moves
    pub immediate: usize,
    /// At most one cell clear
    pub nearly_burnt: usize,
    /// Either of the above
    pub trivial: usize,
}

impl Census {
    pub fn non_trivial(&self) -> usize {
        self.boards - self.trivial
    }

    /// Chance that one random draw has to be thrown away.
    pub fn trivial_fraction(&self) -> f64 {
        self.trivial as f64 / self.boards as f64
    }
}

pub fn census(cells: usize) -> Result<Census, GameError> {
    let mut census = Census {
        cells,
        boards: 0,
        immediate: 0,
        nearly_burnt: 0,
        trivial: 0,
    };
    let boards = 1u32
        .checked_shl(cells as u32)
        .ok_or_else(|| GameError::InvalidArgument(format!("{cells} cells")))?;
    for bits in 0..boards {
        let position = Position::from_bits(bits, cells)?;
        census.boards += 1;
        if position.is_immediate_suppressor_win() {
            census.immediate += 1;
        }
        if position.fire_count() + 1 >= cells {
            census.nearly_burnt += 1;
        }
        if position.is_trivial() {
            census.trivial += 1;
        }
    }
    Ok(census)
}

// ============================================================================
// Perfect Play
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerfectPlayReport {
    pub cells: usize,
    pub positions: usize,
    /// Most turns any position needed
    pub longest: usize,
    /// Boards where perfect play did not burn out in exactly `rank` turns
    pub failures: Vec<u32>,
}

impl PerfectPlayReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Play every board to the end with both sides perfect and the repetition
/// rule on. The firefighter should win every game in exactly as many turns
/// as the board's rank.
pub fn verify_perfect_play(table: Arc<StrategyTable>) -> Result<PerfectPlayReport, GameError> {
    let cells = table.cells();
    let config = GameConfig {
        repetition_win: true,
        mode: GameMode::BothComputer,
        difficulty: 10,
    };
    let mut report = PerfectPlayReport {
        cells,
        positions: 0,
        longest: 0,
        failures: Vec::new(),
    };

    // Skip rank 0: the all-clear board is already won.
    for key in table.iter().skip(1) {
        let position = Position::from_bits(key, cells)?;
        let mut game = GameState::with_strategy(position, config, Arc::clone(&table))?;
        let distance = game.perfect_play_distance()?;

        while !game.is_over() && game.turns() <= distance as u64 {
            let mov = game.best_move()?;
            game.take_turn(mov);
        }

        report.positions += 1;
        report.longest = report.longest.max(game.turns() as usize);
        if game.winner() != Some(Role::Suppressor) || game.turns() != distance as u64 {
            warn!(
                board = %position,
                distance,
                turns = game.turns(),
                winner = ?game.winner(),
                "perfect play did not follow the ranking"
            );
            report.failures.push(key);
        }
    }
    Ok(report)
}

// ============================================================================
// Self-play
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct SelfPlayOptions {
    pub cells: usize,
    pub games: usize,
    pub difficulty: i32,
    pub repetition_win: bool,
    /// Games still running after this many turns count as unfinished
    pub max_turns: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelfPlaySummary {
    pub games: usize,
    pub suppressor_wins: usize,
    pub igniter_wins: usize,
    pub unfinished: usize,
    /// Turns over decided games
    pub total_turns: u64,
    pub longest: u64,
}

impl SelfPlaySummary {
    pub fn average_turns(&self) -> f64 {
        let decided = self.suppressor_wins + self.igniter_wins;
        if decided == 0 {
            0.0
        } else {
            self.total_turns as f64 / decided as f64
        }
    }
}

/// Let the computer move for whichever side is up until someone wins or
/// `max_turns` is reached.
pub fn play_out<R: Rng>(
    game: &mut GameState,
    rng: &mut R,
    max_turns: u64,
) -> Result<Option<Role>, GameError> {
    while !game.is_over() && game.turns() < max_turns {
        let mov = game.computer_move(rng)?;
        game.take_turn(mov);
    }
    Ok(game.winner())
}

/// Computer against computer on random non-trivial boards.
pub fn self_play<R: Rng>(
    options: SelfPlayOptions,
    cache: &StrategyCache,
    rng: &mut R,
) -> Result<SelfPlaySummary, GameError> {
    let config = GameConfig {
        repetition_win: options.repetition_win,
        mode: GameMode::BothComputer,
        difficulty: options.difficulty,
    };
    let table = cache.get(options.cells)?;
    let mut summary = SelfPlaySummary::default();

    for _ in 0..options.games {
        let position = Position::random_non_trivial(options.cells, rng)?;
        let mut game = GameState::with_strategy(position, config, Arc::clone(&table))?;
        let winner = play_out(&mut game, rng, options.max_turns)?;
        debug!(start = %position, winner = ?winner, turns = game.turns(), "self-play game");

        summary.games += 1;
        match winner {
            Some(Role::Suppressor) => summary.suppressor_wins += 1,
            Some(Role::Igniter) => summary.igniter_wins += 1,
            None => {
                summary.unfinished += 1;
                continue;
            }
        }
        summary.total_turns += game.turns();
        summary.longest = summary.longest.max(game.turns());
    }
    Ok(summary)
}

// ============================================================================
// Listing
// ============================================================================

/// One table entry in a human-readable export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedBoard {
    pub rank: usize,
    pub key: u32,
    pub notation: String,
    pub trivial: bool,
}

pub fn listing(table: &StrategyTable) -> Result<Vec<RankedBoard>, GameError> {
    table
        .iter()
        .enumerate()
        .map(|(rank, key)| {
            let position = Position::from_bits(key, table.cells())?;
            Ok(RankedBoard {
                rank,
                key,
                notation: position.to_string(),
                trivial: position.is_trivial(),
            })
        })
        .collect()
}
