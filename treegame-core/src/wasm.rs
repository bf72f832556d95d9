//! WASM bindings for treegame-core
//!
//! Provides a JavaScript-friendly API for the game logic. Randomness comes
//! from the caller: a seed for new boards, a roll for computer moves.

use rand::rngs::StdRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;

use crate::{CellState, GameConfig, GameError, GameMode, GameState, Position, Role};

fn js_error(e: GameError) -> JsError {
    JsError::new(&e.to_string())
}

fn config(repetition_win: bool, mode_code: i8, difficulty: i32) -> Result<GameConfig, JsError> {
    Ok(GameConfig {
        repetition_win,
        mode: GameMode::from_code(mode_code).map_err(js_error)?,
        difficulty,
    })
}

/// WASM-friendly wrapper around GameState
#[wasm_bindgen]
pub struct WasmGame {
    inner: GameState,
}

#[wasm_bindgen]
impl WasmGame {
    /// Create a game from `F`/`T` notation, e.g. "FTTF".
    /// Mode codes: 0 demonstration, 1 play as firefighter,
    /// -1 play as pyromaniac, 2 two players.
    #[wasm_bindgen(constructor)]
    pub fn new(
        notation: &str,
        repetition_win: bool,
        mode_code: i8,
        difficulty: i32,
    ) -> Result<WasmGame, JsError> {
        let position: Position = notation.parse().map_err(js_error)?;
        let game_config = config(repetition_win, mode_code, difficulty)?;
        let inner = GameState::from_position(position, game_config).map_err(js_error)?;
        Ok(WasmGame { inner })
    }

    /// Random non-trivial game of `n` cells.
    pub fn random(
        n: usize,
        repetition_win: bool,
        mode_code: i8,
        difficulty: i32,
        seed: u64,
    ) -> Result<WasmGame, JsError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let game_config = config(repetition_win, mode_code, difficulty)?;
        let inner =
            GameState::random_non_trivial(n, game_config, &mut rng).map_err(js_error)?;
        Ok(WasmGame { inner })
    }

    /// Raw cells as notation
    pub fn notation(&self) -> String {
        self.inner.position().to_string()
    }

    /// Cells as array of 1 (fire) / 0 (tree)
    pub fn cells(&self) -> Vec<u8> {
        self.inner
            .cells()
            .into_iter()
            .map(|c| c.to_bit() as u8)
            .collect()
    }

    pub fn pointer(&self) -> usize {
        self.inner.pointer()
    }

    /// "Fire" or "Tree"
    #[wasm_bindgen(js_name = currentState)]
    pub fn current_state(&self) -> String {
        self.inner.current_state().to_string()
    }

    /// Winner: 0 (none), 1 (firefighter), 2 (pyromaniac)
    pub fn winner(&self) -> u8 {
        match self.inner.winner() {
            None => 0,
            Some(Role::Suppressor) => 1,
            Some(Role::Igniter) => 2,
        }
    }

    /// Winner's display name, if any
    #[wasm_bindgen(js_name = winnerName)]
    pub fn winner_name(&self) -> Option<String> {
        self.inner.winner().map(|role| role.to_string())
    }

    #[wasm_bindgen(js_name = isComputerTurn)]
    pub fn is_computer_turn(&self) -> bool {
        self.inner.is_computer_turn()
    }

    /// Best move for the side to move: "Fire" or "Tree"
    #[wasm_bindgen(js_name = bestMove)]
    pub fn best_move(&self) -> Result<String, JsError> {
        Ok(self.inner.best_move().map_err(js_error)?.to_string())
    }

    /// Computer move for a uniform roll in [0, 1), e.g. Math.random()
    #[wasm_bindgen(js_name = computerMove)]
    pub fn computer_move(&self, roll: f64) -> Result<String, JsError> {
        Ok(self
            .inner
            .computer_move_with_roll(roll)
            .map_err(js_error)?
            .to_string())
    }

    /// Take a turn with "Fire" or "Tree"
    #[wasm_bindgen(js_name = takeTurn)]
    pub fn take_turn(&mut self, mov: &str) -> Result<(), JsError> {
        let mov: CellState = mov.parse().map_err(js_error)?;
        self.inner.take_turn(mov);
        Ok(())
    }

    /// Full game state as a plain object
    pub fn snapshot(&self) -> Result<JsValue, JsError> {
        serde_wasm_bindgen::to_value(&self.inner.snapshot())
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Button text for the game's mode
    #[wasm_bindgen(js_name = modeDescription)]
    pub fn mode_description(&self) -> String {
        self.inner.mode().description().to_string()
    }

    /// Clone the game
    #[wasm_bindgen(js_name = clone)]
    pub fn clone_game(&self) -> WasmGame {
        WasmGame {
            inner: self.inner.clone(),
        }
    }
}
