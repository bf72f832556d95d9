//! Error types for the game engine.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// A caller passed something the engine cannot represent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The strategy table does not fit the position it was asked about.
    /// Indicates a solver bug or a table injected for the wrong board size.
    #[error(
        "strategy table inconsistency: {msg} (table {table_cells} cells, board {board_cells} cells)"
    )]
    Strategy {
        msg: &'static str,
        table_cells: usize,
        board_cells: usize,
    },

    /// A turn was offered after the game was decided.
    #[error("game is already over")]
    GameOver,
}

impl GameError {
    pub(crate) fn invalid(msg: impl Into<String>) -> GameError {
        GameError::InvalidArgument(msg.into())
    }
}
