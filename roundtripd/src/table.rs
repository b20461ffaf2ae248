//! Tabular output for latency results.

use std::fmt;

use roundtrip_agent::LatencyRow;

/// The table column headings.
const HEADINGS: [&str; 5] = ["sender", "receiver", "min", "max", "mean"];

/// A box-drawn table of latency rows, one line per sender and receiver.
///
/// Latencies are in nanoseconds.
#[derive(Copy, Clone, Debug)]
pub struct LatencyTable<'a> {
    rows: &'a [LatencyRow],
}

impl<'a> LatencyTable<'a> {
    /// Returns a table for `rows`.
    pub fn new(rows: &'a [LatencyRow]) -> Self {
        Self { rows }
    }

    /// Returns the cells of each row, as strings.
    fn cells(&self) -> Vec<[String; 5]> {
        self.rows
            .iter()
            .map(|row| {
                [
                    row.sender.to_string(),
                    row.receiver.to_string(),
                    row.min.to_string(),
                    row.max.to_string(),
                    row.mean.to_string(),
                ]
            })
            .collect()
    }
}

impl fmt::Display for LatencyTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells = self.cells();

        let mut widths = HEADINGS.map(str::len);
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let border = |f: &mut fmt::Formatter<'_>, left: &str, middle: &str, right: &str| {
            let lines: Vec<String> = widths.iter().map(|width| "─".repeat(width + 2)).collect();
            writeln!(f, "{left}{}{right}", lines.join(middle))
        };

        border(f, "┌", "┬", "┐")?;

        write!(f, "│")?;
        for (heading, width) in HEADINGS.iter().zip(widths) {
            write!(f, " {heading:^width$} │")?;
        }
        writeln!(f)?;

        border(f, "├", "┼", "┤")?;

        for row in &cells {
            write!(f, "│")?;
            for (column, (cell, width)) in row.iter().zip(widths).enumerate() {
                // names on the left, numbers on the right
                if column < 2 {
                    write!(f, " {cell:<width$} │")?;
                } else {
                    write!(f, " {cell:>width$} │")?;
                }
            }
            writeln!(f)?;
        }

        border(f, "└", "┴", "┘")
    }
}
