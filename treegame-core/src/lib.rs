//! Tree Game logic with a bit-packed circular board.
//!
//! Two players walk together around a circular path lined with trees, some of
//! which are on fire. On each turn the player whose turn it is decides what
//! the tree under the walkers looks like afterwards: the firefighter moves
//! when the tree is burning, the pyromaniac moves when it is not. The
//! firefighter wins once no tree is burning; the pyromaniac (optionally) wins
//! when the same position comes up for the third time.
//!
//! # Board Encoding (32-bit)
//!
//! ```text
//! Bits 0..n: cell i is on fire iff bit i is set
//! Bits n..32: unused (always zero)
//!
//! n is at most MAX_CELLS (20).
//! ```
//!
//! # Canonical Key
//!
//! The canonical key is the same encoding applied to the cells read starting
//! at the pointer: bit 0 is the cell under the walkers, bit 1 the cell they
//! visit next, and so on around the circle. Two positions with equal keys
//! play identically from here on.
//!
//! ```text
//! cells   = F T T F   (bits 0b1001)
//! pointer = 1
//! rotated = T T F F   (key  0b1100)
//! ```
//!
//! Strategy tables use the same key layout for whole sequences, so the
//! position reached after a move is looked up without any conversion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod error;
mod game;
mod settings;
mod strategy;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::GameError;
pub use game::{random_cells, GameConfig, GameSnapshot, GameState, REPETITION_LIMIT};
pub use settings::{
    Settings, DEFAULT_MAX_CELLS, DEFAULT_MIN_CELLS, HARD_MAX_CELLS, HARD_MIN_CELLS, MAX_DIFFICULTY,
};
pub use strategy::{StrategyCache, StrategyTable};

/// Largest board supported. A strategy table for this size has 2^20 entries.
pub const MAX_CELLS: usize = 20;

/// State of one cell. Doubles as a move: the state a player leaves the
/// current cell in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum CellState {
    #[serde(rename = "Fire")]
    OnFire,
    #[serde(rename = "Tree")]
    Clear,
}

impl CellState {
    /// The other state.
    #[inline]
    pub fn opposite(self) -> CellState {
        match self {
            CellState::OnFire => CellState::Clear,
            CellState::Clear => CellState::OnFire,
        }
    }

    #[inline]
    pub fn is_on_fire(self) -> bool {
        self == CellState::OnFire
    }

    /// Convert from a single bit (1 = on fire).
    #[inline]
    pub fn from_bit(bit: u32) -> CellState {
        if bit & 1 == 1 {
            CellState::OnFire
        } else {
            CellState::Clear
        }
    }

    #[inline]
    pub fn to_bit(self) -> u32 {
        match self {
            CellState::OnFire => 1,
            CellState::Clear => 0,
        }
    }

    /// Single-character notation: `F` or `T`.
    #[inline]
    pub fn to_char(self) -> char {
        match self {
            CellState::OnFire => 'F',
            CellState::Clear => 'T',
        }
    }

    /// Parse a single notation character (case-insensitive).
    pub fn from_char(c: char) -> Option<CellState> {
        match c {
            'F' | 'f' => Some(CellState::OnFire),
            'T' | 't' => Some(CellState::Clear),
            _ => None,
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellState::OnFire => f.write_str("Fire"),
            CellState::Clear => f.write_str("Tree"),
        }
    }
}

impl FromStr for CellState {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Fire" | "fire" | "F" | "f" => Ok(CellState::OnFire),
            "Tree" | "tree" | "T" | "t" => Ok(CellState::Clear),
            other => Err(GameError::invalid(format!("unknown cell state {other:?}"))),
        }
    }
}

/// The two sides of the game.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Wants every cell clear.
    Suppressor,
    /// Wants to keep a fire burning; may win by threefold repetition.
    Igniter,
}

impl Role {
    #[inline]
    pub fn opponent(self) -> Role {
        match self {
            Role::Suppressor => Role::Igniter,
            Role::Igniter => Role::Suppressor,
        }
    }

    /// The side that moves when the current cell is in `state`.
    #[inline]
    pub fn to_move_on(state: CellState) -> Role {
        match state {
            CellState::OnFire => Role::Suppressor,
            CellState::Clear => Role::Igniter,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Suppressor => f.write_str("Firefighter"),
            Role::Igniter => f.write_str("Pyromaniac"),
        }
    }
}

/// Which sides are computer-controlled.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    BothHuman,
    HumanIsSuppressor,
    HumanIsIgniter,
    BothComputer,
}

impl GameMode {
    pub const ALL: [GameMode; 4] = [
        GameMode::BothComputer,
        GameMode::HumanIsSuppressor,
        GameMode::HumanIsIgniter,
        GameMode::BothHuman,
    ];

    #[inline]
    pub fn computer_suppressor(self) -> bool {
        matches!(self, GameMode::BothComputer | GameMode::HumanIsIgniter)
    }

    #[inline]
    pub fn computer_igniter(self) -> bool {
        matches!(self, GameMode::BothComputer | GameMode::HumanIsSuppressor)
    }

    #[inline]
    pub fn is_computer(self, role: Role) -> bool {
        match role {
            Role::Suppressor => self.computer_suppressor(),
            Role::Igniter => self.computer_igniter(),
        }
    }

    /// Description suitable for use on a menu button.
    pub fn description(self) -> &'static str {
        match self {
            GameMode::BothComputer => "Demonstration mode",
            GameMode::HumanIsSuppressor => "Play as firefighter",
            GameMode::HumanIsIgniter => "Play as pyromaniac",
            GameMode::BothHuman => "Play a 2-player game",
        }
    }

    /// Numeric code used by the browser front end (number of human players,
    /// negative when the lone human is the pyromaniac).
    pub fn code(self) -> i8 {
        match self {
            GameMode::BothComputer => 0,
            GameMode::HumanIsSuppressor => 1,
            GameMode::HumanIsIgniter => -1,
            GameMode::BothHuman => 2,
        }
    }

    pub fn from_code(code: i8) -> Result<GameMode, GameError> {
        GameMode::ALL
            .into_iter()
            .find(|mode| mode.code() == code)
            .ok_or_else(|| GameError::invalid(format!("unknown game mode code {code}")))
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl FromStr for GameMode {
    type Err = GameError;

    /// Accepts the variant name, the button description or the numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i8>() {
            return GameMode::from_code(code);
        }
        GameMode::ALL
            .into_iter()
            .find(|mode| {
                s.eq_ignore_ascii_case(mode.description())
                    || s.eq_ignore_ascii_case(&format!("{mode:?}"))
            })
            .ok_or_else(|| GameError::invalid(format!("unknown game mode {s:?}")))
    }
}

// ============================================================================
// POSITION
// ============================================================================

/// The circular board plus the walkers' location.
///
/// See module documentation for the encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Position {
    bits: u32,
    len: u8,
    pointer: u8,
}

impl Position {
    /// Create a position with the pointer at cell 0.
    pub fn new(cells: &[CellState]) -> Result<Position, GameError> {
        Self::check_len(cells.len())?;
        let bits = cells
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, st)| acc | (st.to_bit() << i));
        Ok(Position {
            bits,
            len: cells.len() as u8,
            pointer: 0,
        })
    }

    /// Create a position from raw bits. Bits at or above `len` are ignored.
    pub fn from_bits(bits: u32, len: usize) -> Result<Position, GameError> {
        Self::check_len(len)?;
        Ok(Position {
            bits: bits & Self::mask(len),
            len: len as u8,
            pointer: 0,
        })
    }

    fn check_len(len: usize) -> Result<(), GameError> {
        if len == 0 {
            return Err(GameError::invalid("a board needs at least one cell"));
        }
        if len > MAX_CELLS {
            return Err(GameError::invalid(format!(
                "{len} cells exceeds the maximum of {MAX_CELLS}"
            )));
        }
        Ok(())
    }

    /// Mask with the low `len` bits set.
    #[inline]
    pub(crate) fn mask(len: usize) -> u32 {
        (1u32 << len) - 1
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false; a position has at least one cell.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn pointer(&self) -> usize {
        self.pointer as usize
    }

    /// Raw bits in board order.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// State of cell `i` (taken modulo the board size).
    #[inline]
    pub fn cell(&self, i: usize) -> CellState {
        CellState::from_bit(self.bits >> (i % self.len()))
    }

    /// All cells in board order.
    pub fn cells(&self) -> Vec<CellState> {
        (0..self.len()).map(|i| self.cell(i)).collect()
    }

    /// State of the cell under the pointer.
    #[inline]
    pub fn current_state(&self) -> CellState {
        self.cell(self.pointer())
    }

    /// The cells rotated so that the pointer's cell comes first, packed.
    #[inline]
    pub fn canonical(&self) -> u32 {
        let n = self.len();
        let p = self.pointer();
        if p == 0 {
            return self.bits;
        }
        ((self.bits >> p) | (self.bits << (n - p))) & Self::mask(n)
    }

    /// The canonical form as a list of cells.
    pub fn canonical_cells(&self) -> Vec<CellState> {
        let key = self.canonical();
        (0..self.len()).map(|j| CellState::from_bit(key >> j)).collect()
    }

    /// Every cell except the current one, starting just after the pointer
    /// and wrapping around to just before it (`len - 1` bits).
    #[inline]
    pub fn rest_after_pointer(&self) -> u32 {
        self.canonical() >> 1
    }

    /// Number of burning cells.
    #[inline]
    pub fn fire_count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    #[inline]
    pub fn is_all_clear(&self) -> bool {
        self.bits == 0
    }

    /// Set the current cell to `mov` and advance the pointer by one.
    /// This is the only mutation.
    #[inline]
    pub fn apply_and_advance(&mut self, mov: CellState) {
        let p = self.pointer();
        self.bits = (self.bits & !(1 << p)) | (mov.to_bit() << p);
        self.pointer = ((p + 1) % self.len()) as u8;
    }

    /// Canonical key of the position that `mov` would produce.
    #[inline]
    pub fn canonical_after(&self, mov: CellState) -> u32 {
        self.rest_after_pointer() | (mov.to_bit() << (self.len() - 1))
    }
}

impl fmt::Display for Position {
    /// Raw cells in board order, e.g. `FTTF`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len() {
            write!(f, "{}", self.cell(i).to_char())?;
        }
        Ok(())
    }
}

impl FromStr for Position {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cells = s
            .trim()
            .chars()
            .map(|c| {
                CellState::from_char(c)
                    .ok_or_else(|| GameError::invalid(format!("invalid cell {c:?} in {s:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Position::new(&cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CellState::{Clear as T, OnFire as F};

    fn pos(s: &str) -> Position {
        s.parse().unwrap()
    }

    #[test]
    fn test_cell_state_opposite() {
        assert_eq!(F.opposite(), T);
        assert_eq!(T.opposite(), F);
        assert_eq!(F.opposite().opposite(), F);
    }

    #[test]
    fn test_cell_state_display_and_parse() {
        assert_eq!(F.to_string(), "Fire");
        assert_eq!(T.to_string(), "Tree");
        assert_eq!("Fire".parse::<CellState>().unwrap(), F);
        assert_eq!("t".parse::<CellState>().unwrap(), T);
        assert!("Smoke".parse::<CellState>().is_err());
    }

    #[test]
    fn test_cell_state_serde_names() {
        assert_eq!(serde_json::to_string(&F).unwrap(), "\"Fire\"");
        assert_eq!(serde_json::from_str::<CellState>("\"Tree\"").unwrap(), T);
    }

    #[test]
    fn test_role_to_move() {
        assert_eq!(Role::to_move_on(F), Role::Suppressor);
        assert_eq!(Role::to_move_on(T), Role::Igniter);
        assert_eq!(Role::Suppressor.opponent(), Role::Igniter);
        assert_eq!(Role::Igniter.to_string(), "Pyromaniac");
    }

    #[test]
    fn test_game_mode_computer_sides() {
        assert!(!GameMode::BothHuman.computer_suppressor());
        assert!(!GameMode::BothHuman.computer_igniter());
        assert!(GameMode::HumanIsSuppressor.computer_igniter());
        assert!(!GameMode::HumanIsSuppressor.computer_suppressor());
        assert!(GameMode::HumanIsIgniter.computer_suppressor());
        assert!(!GameMode::HumanIsIgniter.computer_igniter());
        assert!(GameMode::BothComputer.is_computer(Role::Suppressor));
        assert!(GameMode::BothComputer.is_computer(Role::Igniter));
    }

    #[test]
    fn test_game_mode_parse() {
        for mode in GameMode::ALL {
            assert_eq!(mode.description().parse::<GameMode>().unwrap(), mode);
            assert_eq!(mode.code().to_string().parse::<GameMode>().unwrap(), mode);
            assert_eq!(format!("{mode:?}").parse::<GameMode>().unwrap(), mode);
        }
        assert!(matches!(
            "Play as spectator".parse::<GameMode>(),
            Err(GameError::InvalidArgument(_))
        ));
        assert!(GameMode::from_code(5).is_err());
    }

    #[test]
    fn test_position_new() {
        let p = Position::new(&[F, T, T, F]).unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(p.pointer(), 0);
        assert_eq!(p.bits(), 0b1001);
        assert_eq!(p.cells(), vec![F, T, T, F]);
        assert_eq!(p.to_string(), "FTTF");
    }

    #[test]
    fn test_position_rejects_bad_sizes() {
        assert!(Position::new(&[]).is_err());
        assert!(Position::new(&vec![T; MAX_CELLS + 1]).is_err());
        assert!(Position::new(&vec![T; MAX_CELLS]).is_ok());
        assert!("".parse::<Position>().is_err());
        assert!("FTX".parse::<Position>().is_err());
    }

    #[test]
    fn test_from_bits_masks_high_bits() {
        let p = Position::from_bits(0xFFFF_FFFF, 3).unwrap();
        assert_eq!(p.bits(), 0b111);
        assert_eq!(p.fire_count(), 3);
    }

    #[test]
    fn test_current_state_follows_pointer() {
        let mut p = pos("FTF");
        assert_eq!(p.current_state(), F);
        p.apply_and_advance(F);
        assert_eq!(p.current_state(), T);
        p.apply_and_advance(T);
        assert_eq!(p.current_state(), F);
    }

    #[test]
    fn test_apply_and_advance_wraps() {
        let mut p = pos("FFF");
        p.apply_and_advance(T);
        p.apply_and_advance(T);
        assert_eq!(p.pointer(), 2);
        p.apply_and_advance(T);
        assert_eq!(p.pointer(), 0);
        assert!(p.is_all_clear());
    }

    #[test]
    fn test_apply_changes_exactly_one_cell() {
        let mut p = pos("FTTFT");
        let before = p.cells();
        p.apply_and_advance(T);
        let after = p.cells();
        let changed = before.iter().zip(&after).filter(|(a, b)| a != b).count();
        assert_eq!(changed, 1);
        assert_eq!(after[0], T);
        assert_eq!(p.pointer(), 1);
    }

    #[test]
    fn test_canonical_rotates_from_pointer() {
        let mut p = pos("FTTF");
        assert_eq!(p.canonical(), 0b1001);
        p.apply_and_advance(F);
        // rotated = T T F F
        assert_eq!(p.canonical_cells(), vec![T, T, F, F]);
        assert_eq!(p.canonical(), 0b1100);
    }

    #[test]
    fn test_canonical_equal_only_when_rotations_align() {
        // Same circular sequence FTT at different pointers.
        let base = pos("FTT");
        let mut shifted = pos("TFT");
        assert_ne!(base.canonical(), shifted.canonical());
        shifted.apply_and_advance(T);
        // shifted is now TFT with pointer 1: rotated = F T T
        assert_eq!(base.canonical(), shifted.canonical());
        assert_ne!(base.bits(), shifted.bits());
    }

    #[test]
    fn test_rest_after_pointer() {
        let mut p = pos("FTFF");
        p.apply_and_advance(F); // pointer 1, rotated T F F F
        assert_eq!(p.rest_after_pointer(), 0b111);
        assert_eq!(p.canonical_after(T), 0b0111);
        assert_eq!(p.canonical_after(F), 0b1111);
    }

    #[test]
    fn test_canonical_after_matches_apply() {
        use rand::prelude::*;

        let mut rng = rand::rng();

        for _ in 0..200 {
            let n = rng.random_range(1..=8);
            let mut p = Position::from_bits(rng.random(), n).unwrap();
            for _ in 0..rng.random_range(0..5) {
                p.apply_and_advance(CellState::from_bit(rng.random()));
            }
            for mov in [F, T] {
                let mut next = p;
                next.apply_and_advance(mov);
                assert_eq!(p.canonical_after(mov), next.canonical());
            }
        }
    }

    #[test]
    fn test_single_cell_board() {
        let mut p = pos("F");
        assert_eq!(p.rest_after_pointer(), 0);
        assert_eq!(p.canonical_after(T), 0);
        p.apply_and_advance(T);
        assert_eq!(p.pointer(), 0);
        assert!(p.is_all_clear());
    }
}
