//! Player-facing settings: board size range, repetition rule, difficulty.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{GameConfig, GameError, GameMode, GameState, Position, StrategyCache};

/// Smallest board a player may ask for.
pub const HARD_MIN_CELLS: usize = 3;
/// Largest board a player may ask for. Bigger boards are tedious to play.
pub const HARD_MAX_CELLS: usize = 12;

pub const DEFAULT_MIN_CELLS: usize = 5;
pub const DEFAULT_MAX_CELLS: usize = 6;
pub const MAX_DIFFICULTY: i32 = 10;

/// Settings chosen on the settings screen; each new game draws its board
/// size uniformly from `min_cells..=max_cells`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub min_cells: usize,
    pub max_cells: usize,
    pub repetition_win: bool,
    pub difficulty: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            min_cells: DEFAULT_MIN_CELLS,
            max_cells: DEFAULT_MAX_CELLS,
            repetition_win: false,
            difficulty: MAX_DIFFICULTY,
        }
    }
}

impl Settings {
    /// Check the values against the hard bounds.
    pub fn validate(&self) -> Result<(), GameError> {
        if self.min_cells < HARD_MIN_CELLS {
            return Err(GameError::invalid(format!(
                "minimum board size {} is below {HARD_MIN_CELLS}",
                self.min_cells
            )));
        }
        if self.max_cells > HARD_MAX_CELLS {
            return Err(GameError::invalid(format!(
                "maximum board size {} is above {HARD_MAX_CELLS}",
                self.max_cells
            )));
        }
        if self.min_cells > self.max_cells {
            return Err(GameError::invalid(format!(
                "minimum board size {} exceeds maximum {}",
                self.min_cells, self.max_cells
            )));
        }
        if !(0..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(GameError::invalid(format!(
                "difficulty {} outside 0..={MAX_DIFFICULTY}",
                self.difficulty
            )));
        }
        Ok(())
    }

    /// Parse and validate settings from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Settings, GameError> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| GameError::invalid(format!("settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Pretty-printed JSON that `from_json` reads back.
    pub fn to_json(&self) -> Result<String, GameError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GameError::invalid(format!("settings: {e}")))
    }

    /// Game configuration for a game in `mode`.
    pub fn game_config(&self, mode: GameMode) -> GameConfig {
        GameConfig {
            repetition_win: self.repetition_win,
            mode,
            difficulty: self.difficulty,
        }
    }

    /// Board size for the next game.
    pub fn pick_size<R: Rng>(&self, rng: &mut R) -> usize {
        rng.random_range(self.min_cells..=self.max_cells)
    }

    /// A random non-trivial game, sharing strategy tables through `cache`.
    pub fn new_game<R: Rng>(
        &self,
        mode: GameMode,
        rng: &mut R,
        cache: &StrategyCache,
    ) -> Result<GameState, GameError> {
        self.validate()?;
        let n = self.pick_size(rng);
        let position = Position::random_non_trivial(n, rng)?;
        GameState::with_strategy(position, self.game_config(mode), cache.get(n)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.min_cells, 5);
        assert_eq!(settings.max_cells, 6);
        assert!(!settings.repetition_win);
        assert_eq!(settings.difficulty, 10);
        settings.validate().unwrap();
    }

    #[test]
    fn test_validate_bounds() {
        let bad = [
            Settings {
                min_cells: 2,
                ..Settings::default()
            },
            Settings {
                max_cells: 13,
                ..Settings::default()
            },
            Settings {
                min_cells: 7,
                max_cells: 6,
                ..Settings::default()
            },
            Settings {
                difficulty: -1,
                ..Settings::default()
            },
            Settings {
                difficulty: 11,
                ..Settings::default()
            },
        ];
        for settings in bad {
            assert!(
                matches!(settings.validate(), Err(GameError::InvalidArgument(_))),
                "{:?} should be rejected",
                settings
            );
        }
        let edge = Settings {
            min_cells: HARD_MIN_CELLS,
            max_cells: HARD_MAX_CELLS,
            repetition_win: true,
            difficulty: 0,
        };
        edge.validate().unwrap();
    }

    #[test]
    fn test_from_json() {
        let settings = Settings::from_json(r#"{"max_cells": 9, "repetition_win": true}"#).unwrap();
        assert_eq!(settings.min_cells, DEFAULT_MIN_CELLS);
        assert_eq!(settings.max_cells, 9);
        assert!(settings.repetition_win);
        assert!(Settings::from_json(r#"{"min_cells": 1}"#).is_err());
        assert!(Settings::from_json("not json").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let settings = Settings {
            min_cells: 4,
            max_cells: 8,
            repetition_win: true,
            difficulty: 6,
        };
        let json = settings.to_json().unwrap();
        assert!(json.contains("\"difficulty\": 6"));
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn test_pick_size_in_range() {
        let mut rng = StdRng::seed_from_u64(17);
        let settings = Settings {
            min_cells: 4,
            max_cells: 7,
            ..Settings::default()
        };
        let mut seen = [false; 8];
        for _ in 0..500 {
            let n = settings.pick_size(&mut rng);
            assert!((4..=7).contains(&n));
            seen[n] = true;
        }
        assert!(seen[4..=7].iter().all(|&s| s));
    }

    #[test]
    fn test_new_game_shares_tables() {
        let mut rng = StdRng::seed_from_u64(23);
        let cache = StrategyCache::new();
        let settings = Settings {
            min_cells: 6,
            max_cells: 6,
            difficulty: 4,
            ..Settings::default()
        };
        let a = settings.new_game(GameMode::HumanIsSuppressor, &mut rng, &cache).unwrap();
        let b = settings.new_game(GameMode::BothHuman, &mut rng, &cache).unwrap();
        assert_eq!(a.len(), 6);
        assert!(!a.is_trivial());
        assert_eq!(a.difficulty(), 4);
        assert_eq!(a.mode(), GameMode::HumanIsSuppressor);
        assert!(std::sync::Arc::ptr_eq(a.strategy().unwrap(), b.strategy().unwrap()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_new_game_rejects_invalid_settings() {
        let mut rng = StdRng::seed_from_u64(29);
        let cache = StrategyCache::new();
        let settings = Settings {
            min_cells: 9,
            max_cells: 4,
            ..Settings::default()
        };
        assert!(settings.new_game(GameMode::BothHuman, &mut rng, &cache).is_err());
        assert!(cache.is_empty());
    }
}
