//! Precomputed strategy: every board ranked from best to worst for the
//! firefighter.
//!
//! The order is generated, not searched. Starting from the all-clear board,
//! each next entry is the previous entry with its last cell dropped and a
//! new first cell prepended: a burning one if that board is still unranked,
//! a clear one otherwise. This visits every one of the `2^n` boards exactly
//! once, and comparing the ranks of the two boards a move can produce is
//! enough to play perfectly. (Proving that is non-trivial; the tests check
//! the enumeration, not the optimality.)
//!
//! Sequences are packed as in the crate docs: element `j` is bit `j`.
//! Construction is O(2^n) in time and space, which keeps boards of up to
//! [`MAX_CELLS`] cells cheap; the interesting range for play is 3 to 12.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::{CellState, GameError, Position, MAX_CELLS};

/// Marker for keys that have not been ranked yet.
const UNRANKED: u32 = u32::MAX;

/// Total order over all boards of one size.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StrategyTable {
    /// Number of cells per board.
    cells: usize,
    /// rank -> key
    order: Vec<u32>,
    /// key -> rank
    ranks: Vec<u32>,
}

impl StrategyTable {
    /// Build the table for boards of `cells` cells.
    pub fn build(cells: usize) -> Result<StrategyTable, GameError> {
        check_cells(cells)?;

        let size = 1usize << cells;
        let prefix_mask = Position::mask(cells - 1);

        let mut ranks = vec![UNRANKED; size];
        let mut order = Vec::with_capacity(size);

        // Rank 0: the all-clear board, the firefighter's win.
        let mut last = 0u32;
        ranks[0] = 0;
        order.push(last);

        while order.len() < size {
            let prefix = last & prefix_mask;
            let with_fire = (prefix << 1) | CellState::OnFire.to_bit();
            let next = if ranks[with_fire as usize] == UNRANKED {
                with_fire
            } else {
                (prefix << 1) | CellState::Clear.to_bit()
            };
            debug_assert_eq!(
                ranks[next as usize], UNRANKED,
                "strategy enumeration revisited key {next:#b}"
            );
            ranks[next as usize] = order.len() as u32;
            order.push(next);
            last = next;
        }

        debug!(cells, entries = size, "built strategy table");
        Ok(StrategyTable {
            cells,
            order,
            ranks,
        })
    }

    /// Rebuild a table from keys listed best-first.
    ///
    /// Rejects anything that is not a permutation of `0..2^cells` headed by
    /// the all-clear board.
    pub fn from_order(cells: usize, order: Vec<u32>) -> Result<StrategyTable, GameError> {
        check_cells(cells)?;

        let size = 1usize << cells;
        if order.len() != size {
            return Err(GameError::invalid(format!(
                "expected {size} entries for {cells} cells, got {}",
                order.len()
            )));
        }
        if order[0] != 0 {
            return Err(GameError::invalid("order must start with the all-clear board"));
        }

        let mut ranks = vec![UNRANKED; size];
        for (rank, &key) in order.iter().enumerate() {
            let slot = ranks
                .get_mut(key as usize)
                .ok_or_else(|| GameError::invalid(format!("key {key} out of range")))?;
            if *slot != UNRANKED {
                return Err(GameError::invalid(format!("key {key} listed twice")));
            }
            *slot = rank as u32;
        }

        Ok(StrategyTable {
            cells,
            order,
            ranks,
        })
    }

    /// Number of cells per board.
    #[inline]
    pub fn cells(&self) -> usize {
        self.cells
    }

    /// Number of ranked boards (`2^cells`).
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Rank of a packed board; 0 is best for the firefighter.
    #[inline]
    pub fn rank_of(&self, key: u32) -> Option<usize> {
        self.ranks.get(key as usize).map(|&r| r as usize)
    }

    /// Rank of a board given cell by cell. `None` if the length is wrong.
    pub fn rank_of_cells(&self, cells: &[CellState]) -> Option<usize> {
        if cells.len() != self.cells {
            return None;
        }
        let key = cells
            .iter()
            .enumerate()
            .fold(0u32, |acc, (j, st)| acc | (st.to_bit() << j));
        self.rank_of(key)
    }

    /// Packed board at `rank`.
    #[inline]
    pub fn key_at(&self, rank: usize) -> Option<u32> {
        self.order.get(rank).copied()
    }

    /// Packed boards, best first.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.order.iter().copied()
    }

    /// Whichever of two packed boards is better for the firefighter.
    pub fn preferred(&self, a: u32, b: u32) -> Option<u32> {
        let ra = self.rank_of(a)?;
        let rb = self.rank_of(b)?;
        Some(if ra <= rb { a } else { b })
    }
}

fn check_cells(cells: usize) -> Result<(), GameError> {
    if cells == 0 || cells > MAX_CELLS {
        return Err(GameError::invalid(format!(
            "strategy tables need 1..={MAX_CELLS} cells, got {cells}"
        )));
    }
    Ok(())
}

/// Tables keyed by board size, built on first demand and shared afterwards.
#[derive(Debug, Default)]
pub struct StrategyCache {
    tables: Mutex<HashMap<usize, Arc<StrategyTable>>>,
}

impl StrategyCache {
    pub fn new() -> StrategyCache {
        StrategyCache::default()
    }

    /// Table for `cells`-cell boards, building it if needed.
    pub fn get(&self, cells: usize) -> Result<Arc<StrategyTable>, GameError> {
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(table) = tables.get(&cells) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(StrategyTable::build(cells)?);
        tables.insert(cells, Arc::clone(&table));
        Ok(table)
    }

    /// Number of sizes built so far.
    pub fn len(&self) -> usize {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
