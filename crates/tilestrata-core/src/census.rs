//! Population count per stratum over a tile collection.
//!
//! A census is a derived view: it is rebuilt from scratch whenever the
//! collection changes (once over every cropped tile to plan quotas, once
//! over the selected subset to audit the result).
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::strata::{StratumLabel, STRATUM_COUNT};

/// 3×3 counts; `counts[target_bin - 1][edge_bin - 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrataCensus {
    pub counts: [[u64; 3]; 3],
}

impl StrataCensus {
    pub fn from_labels<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = StratumLabel>,
    {
        let mut census = Self::default();
        for l in labels {
            census.add(l);
        }
        census
    }

    /// Tabulate from labelled file names, failing on the first name without
    /// a stratum tag.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut census = Self::default();
        for name in names {
            census.add(StratumLabel::parse_name(name.as_ref())?);
        }
        Ok(census)
    }

    pub fn add(&mut self, label: StratumLabel) {
        self.counts[label.target_bin as usize - 1][label.edge_bin as usize - 1] += 1;
    }

    pub fn get(&self, label: StratumLabel) -> u64 {
        self.counts[label.target_bin as usize - 1][label.edge_bin as usize - 1]
    }

    /// Counts in canonical stratum order (t1e1 … t3e3).
    pub fn flatten(&self) -> [u64; STRATUM_COUNT] {
        let mut out = [0u64; STRATUM_COUNT];
        for l in StratumLabel::all() {
            out[l.index()] = self.get(l);
        }
        out
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn row_sum(&self, target_bin: usize) -> u64 {
        self.counts[target_bin].iter().sum()
    }

    pub fn col_sum(&self, edge_bin: usize) -> u64 {
        self.counts.iter().map(|row| row[edge_bin]).sum()
    }
}

/// Table with row and column totals:
///
/// ```text
///          e1      e2      e3     sum
/// t1        3       0       1       4
/// ...
/// sum      ..
/// ```
impl fmt::Display for StrataCensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<4} {:>7} {:>7} {:>7} {:>7}", "", "e1", "e2", "e3", "sum")?;
        for t in 0..3 {
            writeln!(
                f,
                "{:<4} {:>7} {:>7} {:>7} {:>7}",
                format!("t{}", t + 1),
                self.counts[t][0],
                self.counts[t][1],
                self.counts[t][2],
                self.row_sum(t)
            )?;
        }
        write!(
            f,
            "{:<4} {:>7} {:>7} {:>7} {:>7}",
            "sum",
            self.col_sum(0),
            self.col_sum(1),
            self.col_sum(2),
            self.total()
        )
    }
}
