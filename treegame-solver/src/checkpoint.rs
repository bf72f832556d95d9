//! Binary checkpoint format for strategy tables.
//!
//! Format:
//! - Header (32 bytes):
//!   - Magic: "TGS1" (4 bytes)
//!   - Version: u32 LE (4 bytes)
//!   - Cells: u32 LE (4 bytes)
//!   - Entry count: u64 LE (8 bytes), always 2^cells
//!   - Checksum: u64 LE xxhash of data section (8 bytes)
//!   - Reserved: 4 bytes (zeros)
//! - Data section (entry_count × 4 bytes):
//!   - Packed board: u32 LE, listed best-first
//!
//! Entry `i` is the board of rank `i`, so the order itself is the table.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use treegame_core::{StrategyTable, MAX_CELLS};
use xxhash_rust::xxh64::xxh64;

const MAGIC: &[u8; 4] = b"TGS1";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 32;
const ENTRY_SIZE: usize = 4;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn u64_at(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub cells: usize,
    pub order: Vec<u32>,
}

impl Checkpoint {
    /// Save a strategy table to a binary checkpoint file.
    pub fn save(path: &Path, table: &StrategyTable) -> io::Result<usize> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let count = Self::write_to(&mut writer, table)?;
        writer.flush()?;
        Ok(count)
    }

    /// Write header and data; returns the number of entries written.
    pub fn write_to<W: Write>(writer: &mut W, table: &StrategyTable) -> io::Result<usize> {
        let count = table.len();

        // Build data section
        let mut data = Vec::with_capacity(count * ENTRY_SIZE);
        for key in table.iter() {
            data.extend_from_slice(&key.to_le_bytes());
        }

        let checksum = xxh64(&data, 0);

        // Header
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(table.cells() as u32).to_le_bytes())?;
        writer.write_all(&(count as u64).to_le_bytes())?;
        writer.write_all(&checksum.to_le_bytes())?;
        writer.write_all(&[0u8; 4])?; // Reserved

        // Data
        writer.write_all(&data)?;
        Ok(count)
    }

    /// Load checkpoint from binary file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::read_from(&mut BufReader::new(file))
    }

    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(invalid("Invalid checkpoint magic"));
        }

        let version = u32_at(&header, 4);
        if version != VERSION {
            return Err(invalid(format!("Unsupported checkpoint version: {}", version)));
        }

        let cells = u32_at(&header, 8) as usize;
        if cells == 0 || cells > MAX_CELLS {
            return Err(invalid(format!("Unsupported board size: {}", cells)));
        }

        let count = u64_at(&header, 12);
        if count != 1u64 << cells {
            return Err(invalid(format!(
                "Entry count {} does not match {} cells",
                count, cells
            )));
        }
        let stored_checksum = u64_at(&header, 20);

        // Read data section
        let mut data = vec![0u8; count as usize * ENTRY_SIZE];
        reader.read_exact(&mut data)?;

        if xxh64(&data, 0) != stored_checksum {
            return Err(invalid("Checkpoint checksum mismatch"));
        }

        let order = data
            .chunks_exact(ENTRY_SIZE)
            .map(|chunk| u32_at(chunk, 0))
            .collect();

        Ok(Checkpoint { cells, order })
    }

    /// Rebuild the strategy table, rejecting orders that are not a valid
    /// ranking of every board.
    pub fn into_table(self) -> io::Result<StrategyTable> {
        StrategyTable::from_order(self.cells, self.order).map_err(|e| invalid(e.to_string()))
    }

    /// File size for a table of the given board size.
    pub fn estimate_size(cells: usize) -> usize {
        HEADER_SIZE + (1usize << cells) * ENTRY_SIZE
    }
}
