//! Build statistics tracking.

use std::time::{Duration, Instant};

use tracing::info;

/// Get current process memory usage in bytes (RSS - Resident Set Size).
/// Returns None if unable to determine.
#[cfg(target_os = "linux")]
pub fn get_memory_usage() -> Option<u64> {
    use std::fs;

    let status = fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

#[cfg(not(target_os = "linux"))]
pub fn get_memory_usage() -> Option<u64> {
    None
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One finished table build.
#[derive(Debug, Clone, Copy)]
pub struct TableBuild {
    pub cells: usize,
    pub entries: usize,
    pub elapsed: Duration,
}

/// Statistics collected while building tables.
#[derive(Debug)]
pub struct BuildStats {
    pub builds: Vec<TableBuild>,
    /// Checkpoint bytes written
    pub bytes_written: u64,
    start_time: Instant,
}

impl Default for BuildStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildStats {
    pub fn new() -> Self {
        Self {
            builds: Vec::new(),
            bytes_written: 0,
            start_time: Instant::now(),
        }
    }

    /// Record a finished build and log progress
    pub fn record(&mut self, cells: usize, entries: usize, elapsed: Duration) {
        self.builds.push(TableBuild {
            cells,
            entries,
            elapsed,
        });
        let mem = get_memory_usage().map(format_bytes).unwrap_or_default();
        info!(
            cells,
            entries,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            mem = %mem,
            "table built"
        );
    }

    pub fn total_entries(&self) -> usize {
        self.builds.iter().map(|b| b.entries).sum()
    }

    /// Entries ranked per second, over all builds
    pub fn entries_per_sec(&self) -> f64 {
        let secs: f64 = self.builds.iter().map(|b| b.elapsed.as_secs_f64()).sum();
        if secs > 0.0 {
            self.total_entries() as f64 / secs
        } else {
            0.0
        }
    }

    /// Print final summary
    pub fn print_summary(&self) {
        println!("{:>6} {:>10} {:>12}", "cells", "entries", "time");
        for build in &self.builds {
            println!(
                "{:>6} {:>10} {:>10.3}ms",
                build.cells,
                build.entries,
                build.elapsed.as_secs_f64() * 1000.0
            );
        }
        println!("Tables built: {}", self.builds.len());
        println!("Entries ranked: {}", self.total_entries());
        if self.bytes_written > 0 {
            println!("Checkpoint bytes: {}", format_bytes(self.bytes_written));
        }
        println!("Average rate: {:.0} entries/sec", self.entries_per_sec());
        println!("Wall time: {:.2}s", self.start_time.elapsed().as_secs_f64());
        if let Some(mem) = get_memory_usage() {
            println!("Memory: {}", format_bytes(mem));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn test_record_totals() {
        let mut stats = BuildStats::new();
        assert_eq!(stats.entries_per_sec(), 0.0);
        stats.record(3, 8, Duration::from_millis(1));
        stats.record(4, 16, Duration::from_millis(3));
        assert_eq!(stats.builds.len(), 2);
        assert_eq!(stats.total_entries(), 24);
        assert!((stats.entries_per_sec() - 6000.0).abs() < 1.0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_memory_usage_available_on_linux() {
        assert!(get_memory_usage().unwrap() > 0);
    }
}
