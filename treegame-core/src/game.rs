//! The game engine: one position, win detection, and move selection.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::{CellState, GameError, GameMode, Position, Role, StrategyTable, MAX_CELLS};

/// Occurrences of one position that hand the pyromaniac the win.
pub const REPETITION_LIMIT: u32 = 3;

/// Settings fixed for the lifetime of one game.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Whether the pyromaniac wins on the third occurrence of a position.
    pub repetition_win: bool,
    /// Which sides the computer plays.
    pub mode: GameMode,
    /// Computer skill. 10 is perfect play, 0 is uniformly random. Values
    /// outside that range are accepted: negative values play worse than
    /// random and values above 10 behave like 10.
    pub difficulty: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            repetition_win: false,
            mode: GameMode::BothHuman,
            difficulty: 10,
        }
    }
}

impl GameConfig {
    /// Probability that the computer plays the best move.
    #[inline]
    pub fn best_move_probability(&self) -> f64 {
        0.5 + 0.05 * self.difficulty as f64
    }
}

/// Value copy of a game for presentation layers.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub cells: Vec<CellState>,
    pub pointer: usize,
    /// Raw cells as `F`/`T` notation.
    pub notation: String,
    /// Cells read from the pointer, as notation.
    pub canonical: String,
    pub current_state: CellState,
    pub side_to_move: Role,
    pub winner: Option<Role>,
    pub is_computer_turn: bool,
    pub mode: GameMode,
    pub difficulty: i32,
    pub repetition_win: bool,
    pub repetition_count: u32,
    pub turns: u64,
}

/// One game of the Tree Game.
#[derive(Clone, Debug)]
pub struct GameState {
    position: Position,
    config: GameConfig,
    winner: Option<Role>,
    /// canonical key -> occurrences. Only tracked with `repetition_win`.
    position_counts: HashMap<u32, u32>,
    turns: u64,
    strategy: OnceLock<Arc<StrategyTable>>,
}

impl GameState {
    /// Start a game on `cells` with the pointer at cell 0.
    pub fn new(cells: &[CellState], config: GameConfig) -> Result<GameState, GameError> {
        GameState::from_position(Position::new(cells)?, config)
    }

    /// Start a game from an existing position.
    ///
    /// The strategy table is built right away when the computer plays a
    /// side, since its first move may be due immediately.
    pub fn from_position(position: Position, config: GameConfig) -> Result<GameState, GameError> {
        let game = GameState::unsolved(position, config);
        if config.mode != GameMode::BothHuman {
            let table = Arc::new(StrategyTable::build(position.len())?);
            let _ = game.strategy.set(table);
        }
        Ok(game)
    }

    /// Start a game using a table shared with other games of the same size.
    pub fn with_strategy(
        position: Position,
        config: GameConfig,
        table: Arc<StrategyTable>,
    ) -> Result<GameState, GameError> {
        if table.cells() != position.len() {
            return Err(GameError::Strategy {
                msg: "table built for a different board size",
                table_cells: table.cells(),
                board_cells: position.len(),
            });
        }
        let game = GameState::unsolved(position, config);
        let _ = game.strategy.set(table);
        Ok(game)
    }

    fn unsolved(position: Position, config: GameConfig) -> GameState {
        let mut position_counts = HashMap::new();
        if config.repetition_win {
            position_counts.insert(position.canonical(), 1);
        }
        GameState {
            position,
            config,
            winner: None,
            position_counts,
            turns: 0,
            strategy: OnceLock::new(),
        }
    }

    /// Random game of `n` cells that is not a foregone conclusion.
    ///
    /// See [`Position::random_non_trivial`].
    pub fn random_non_trivial<R: Rng>(
        n: usize,
        config: GameConfig,
        rng: &mut R,
    ) -> Result<GameState, GameError> {
        GameState::from_position(Position::random_non_trivial(n, rng)?, config)
    }

    // ========== Accessors ==========

    #[inline]
    pub fn position(&self) -> &Position {
        &self.position
    }

    #[inline]
    pub fn config(&self) -> GameConfig {
        self.config
    }

    #[inline]
    pub fn mode(&self) -> GameMode {
        self.config.mode
    }

    #[inline]
    pub fn difficulty(&self) -> i32 {
        self.config.difficulty
    }

    #[inline]
    pub fn repetition_win(&self) -> bool {
        self.config.repetition_win
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.position.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn cells(&self) -> Vec<CellState> {
        self.position.cells()
    }

    #[inline]
    pub fn pointer(&self) -> usize {
        self.position.pointer()
    }

    #[inline]
    pub fn current_state(&self) -> CellState {
        self.position.current_state()
    }

    #[inline]
    pub fn winner(&self) -> Option<Role> {
        self.winner
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Turns taken so far, including any taken after the game was decided.
    #[inline]
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Whether the strategy table has been built or injected yet.
    #[inline]
    pub fn has_strategy(&self) -> bool {
        self.strategy.get().is_some()
    }

    /// Occurrences of the current position so far (0 when not tracked).
    pub fn repetition_count(&self) -> u32 {
        self.position_counts
            .get(&self.position.canonical())
            .copied()
            .unwrap_or(0)
    }

    /// Whose turn it is: the firefighter on a burning cell, the pyromaniac
    /// otherwise.
    #[inline]
    pub fn side_to_move(&self) -> Role {
        Role::to_move_on(self.current_state())
    }

    // ========== Turns ==========

    /// Take the turn represented by `mov`.
    ///
    /// After the game is decided the board still changes and the pointer
    /// still advances, but the winner stays fixed.
    pub fn take_turn(&mut self, mov: CellState) {
        let side = self.side_to_move();
        self.position.apply_and_advance(mov);
        self.turns += 1;
        trace!(turn = self.turns, %side, %mov, board = %self.position, "turn taken");

        if self.winner.is_some() {
            return;
        }
        if self.position.is_all_clear() {
            self.decide(Role::Suppressor);
        } else if self.config.repetition_win {
            let count = self
                .position_counts
                .entry(self.position.canonical())
                .or_insert(0);
            *count += 1;
            if *count >= REPETITION_LIMIT {
                self.decide(Role::Igniter);
            }
        }
    }

    /// Like [`take_turn`](Self::take_turn), but refuses turns once the game is
    /// decided.
    pub fn try_take_turn(&mut self, mov: CellState) -> Result<(), GameError> {
        if self.winner.is_some() {
            return Err(GameError::GameOver);
        }
        self.take_turn(mov);
        Ok(())
    }

    fn decide(&mut self, winner: Role) {
        debug!(%winner, turns = self.turns, board = %self.position, "game decided");
        self.winner = Some(winner);
    }

    // ========== Position Checks ==========

    /// The current position is a firefighter win: nothing is burning.
    ///
    /// Only checks the current position, not whether someone already won.
    #[inline]
    pub fn is_suppressor_win(&self) -> bool {
        self.position.is_all_clear()
    }

    /// The current position is a pyromaniac win: repetition wins are on and
    /// this is at least the third occurrence.
    ///
    /// Only checks the current position, not whether someone already won.
    #[inline]
    pub fn is_igniter_win(&self) -> bool {
        self.config.repetition_win && self.repetition_count() >= REPETITION_LIMIT
    }

    /// The firefighter can win before the pyromaniac takes another turn.
    #[inline]
    pub fn is_immediate_suppressor_win(&self) -> bool {
        self.position.is_immediate_suppressor_win()
    }

    /// The position is a foregone conclusion.
    #[inline]
    pub fn is_trivial(&self) -> bool {
        self.position.is_trivial()
    }

    // ========== Strategy ==========

    /// The strategy table for this board size, built on first use.
    pub fn strategy(&self) -> Result<&Arc<StrategyTable>, GameError> {
        if let Some(table) = self.strategy.get() {
            return Ok(table);
        }
        let table = Arc::new(StrategyTable::build(self.len())?);
        Ok(self.strategy.get_or_init(|| table))
    }

    /// Best move for the firefighter in the current position.
    pub fn suppressor_move(&self) -> Result<CellState, GameError> {
        let table = self.strategy()?;
        let fire = self.position.canonical_after(CellState::OnFire);
        let clear = self.position.canonical_after(CellState::Clear);

        if table.cells() != self.len() {
            return Err(self.strategy_failure(table, "table built for a different board size"));
        }
        match table.preferred(fire, clear) {
            Some(key) if key == fire => Ok(CellState::OnFire),
            Some(_) => Ok(CellState::Clear),
            None => Err(self.strategy_failure(table, "neither candidate position is ranked")),
        }
    }

    /// Best move for the pyromaniac: whatever is worse for the firefighter.
    pub fn igniter_move(&self) -> Result<CellState, GameError> {
        self.suppressor_move().map(CellState::opposite)
    }

    /// Best move for the side to move.
    pub fn best_move(&self) -> Result<CellState, GameError> {
        match self.side_to_move() {
            Role::Suppressor => self.suppressor_move(),
            Role::Igniter => self.igniter_move(),
        }
    }

    /// Turns left before the firefighter wins if both sides play perfectly.
    ///
    /// This is the rank of the current position: every perfect move by
    /// either side lowers it by exactly one.
    pub fn perfect_play_distance(&self) -> Result<usize, GameError> {
        let table = self.strategy()?;
        table
            .rank_of(self.position.canonical())
            .filter(|_| table.cells() == self.len())
            .ok_or_else(|| self.strategy_failure(table, "current position is not ranked"))
    }

    fn strategy_failure(&self, table: &StrategyTable, msg: &'static str) -> GameError {
        error!(
            table_cells = table.cells(),
            board = %self.position,
            pointer = self.pointer(),
            msg,
            "strategy lookup failed"
        );
        GameError::Strategy {
            msg,
            table_cells: table.cells(),
            board_cells: self.len(),
        }
    }

    // ========== Computer Player ==========

    /// Whether the side to move is computer-controlled and the game is live.
    pub fn is_computer_turn(&self) -> bool {
        self.winner.is_none() && self.config.mode.is_computer(self.side_to_move())
    }

    /// The computer's move at the configured difficulty.
    pub fn computer_move<R: Rng>(&self, rng: &mut R) -> Result<CellState, GameError> {
        self.computer_move_with_roll(rng.random::<f64>())
    }

    /// The computer's move given a uniform roll in `[0, 1)`.
    ///
    /// The best move is played when the roll is at most
    /// [`GameConfig::best_move_probability`], and always when the
    /// firefighter has an immediate win.
    pub fn computer_move_with_roll(&self, roll: f64) -> Result<CellState, GameError> {
        let best = self.best_move()?;
        if self.is_immediate_suppressor_win() || roll <= self.config.best_move_probability() {
            Ok(best)
        } else {
            Ok(best.opposite())
        }
    }

    // ========== Presentation ==========

    pub fn snapshot(&self) -> GameSnapshot {
        let canonical = self
            .position
            .canonical_cells()
            .into_iter()
            .map(CellState::to_char)
            .collect();
        GameSnapshot {
            cells: self.cells(),
            pointer: self.pointer(),
            notation: self.position.to_string(),
            canonical,
            current_state: self.current_state(),
            side_to_move: self.side_to_move(),
            winner: self.winner,
            is_computer_turn: self.is_computer_turn(),
            mode: self.config.mode,
            difficulty: self.config.difficulty,
            repetition_win: self.config.repetition_win,
            repetition_count: self.repetition_count(),
            turns: self.turns,
        }
    }
}

/// `n` independent uniformly random cells.
pub fn random_cells<R: Rng>(n: usize, rng: &mut R) -> Result<Vec<CellState>, GameError> {
    if n == 0 {
        return Err(GameError::invalid("non-positive number of cells"));
    }
    if n > MAX_CELLS {
        return Err(GameError::invalid(format!(
            "{n} cells exceeds the maximum of {MAX_CELLS}"
        )));
    }
    Ok((0..n)
        .map(|_| {
            if rng.random::<bool>() {
                CellState::OnFire
            } else {
                CellState::Clear
            }
        })
        .collect())
}

impl Position {
    /// Random position of `n` cells, pointer at 0, that is not a foregone
    /// conclusion.
    ///
    /// Boards of fewer than 3 cells are always trivial, so the first sample
    /// is returned as is. Otherwise sampling repeats until a non-trivial
    /// board comes up; most boards qualify, so this takes few attempts.
    pub fn random_non_trivial<R: Rng>(n: usize, rng: &mut R) -> Result<Position, GameError> {
        let mut attempts = 1u32;
        loop {
            let position = Position::new(&random_cells(n, rng)?)?;
            if n < 3 || !position.is_trivial() {
                debug!(cells = n, attempts, board = %position, "generated starting position");
                return Ok(position);
            }
            attempts += 1;
        }
    }

    /// The firefighter can win before the pyromaniac moves again: reading
    /// from the pointer, there is no clear cell, or every cell after the
    /// first clear one is clear too.
    pub fn is_immediate_suppressor_win(&self) -> bool {
        let key = self.canonical();
        let clear = !key & Position::mask(self.len());
        if clear == 0 {
            return true;
        }
        let first_clear = clear.trailing_zeros();
        key >> (first_clear + 1) == 0
    }

    /// A foregone conclusion: all but at most one cell burning, or an
    /// immediate firefighter win.
    pub fn is_trivial(&self) -> bool {
        self.fire_count() + 1 >= self.len() || self.is_immediate_suppressor_win()
    }
}
