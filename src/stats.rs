//! Occupancy and probe-length diagnostics.
//!
//! Compiled under `cfg(test)` or with the `stats` feature. Pretty-printing
//! additionally requires `std`.

use alloc::vec::Vec;

/// Debug statistics for hash table analysis.
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of live entries
    pub populated: usize,
    /// Total number of slots across all sub-tables
    pub total_slots: usize,
    /// Number of tombstoned slots (always 0 for cuckoo tables)
    pub tombstones: usize,
    /// Number of sub-tables (1 for open addressing)
    pub ways: usize,
    /// Load factor (populated / total_slots)
    pub load_factor: f64,
    /// Slot utilization ((populated + tombstones) / total_slots)
    pub slot_utilization: f64,
    /// Total memory in bytes used by the slot arrays
    pub total_bytes: usize,
    /// Bytes held by slots without a live entry
    pub wasted_bytes: usize,
}

impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor, {} way{})",
            self.populated,
            self.total_slots,
            self.load_factor * 100.0,
            self.ways,
            if self.ways == 1 { "" } else { "s" }
        );
        println!(
            "Slot Usage: {} live + {} tombstones ({:.2}% utilization)",
            self.populated,
            self.tombstones,
            self.slot_utilization * 100.0
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes wasted ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}

/// Histogram of successful-lookup probe lengths.
///
/// Bin `i` counts the entries a lookup finds on its `i + 1`th probe. For a
/// cuckoo table that is the index of the sub-table holding the entry, so the
/// histogram never has more bins than the table has ways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    bins: Vec<usize>,
}

impl ProbeHistogram {
    pub(crate) fn new(bins: Vec<usize>) -> Self {
        Self { bins }
    }

    /// The histogram bins.
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Longest probe length of any entry, or 0 for an empty table.
    pub fn max_probes(&self) -> usize {
        self.bins.iter().rposition(|&c| c != 0).map_or(0, |i| i + 1)
    }

    /// Mean probe length over all entries.
    pub fn mean_probes(&self) -> f64 {
        let total: usize = self.bins.iter().sum();
        if total == 0 {
            return 0.0;
        }
        let weighted: usize = self.bins.iter().enumerate().map(|(i, &c)| (i + 1) * c).sum();
        weighted as f64 / total as f64
    }

    /// Pretty-prints the histogram horizontally using stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = *self.bins.iter().max().unwrap_or(&0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!(
            "probe histogram ({} entries, mean {:.2}):",
            self.bins.iter().sum::<usize>(),
            self.mean_probes()
        );

        let make_bar = |count: usize| -> String {
            if count == 0 {
                return String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let full = units / 8;
            let rem = units % 8;
            let mut bar = "█".repeat(full);
            if rem > 0 {
                let ch = match rem {
                    1 => '▏',
                    2 => '▎',
                    3 => '▍',
                    4 => '▌',
                    5 => '▋',
                    6 => '▊',
                    7 => '▉',
                    _ => unreachable!(),
                };
                bar.push(ch);
            }
            bar
        };

        for (i, &count) in self.bins.iter().enumerate() {
            println!("{:>3} | {} ({})", i + 1, make_bar(count), count);
        }
    }
}
