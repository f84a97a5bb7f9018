//! Per-stratum sampling quotas with adaptive redistribution.
//!
//! Strata are visited from the least to the most populated. A stratum whose
//! population does not exceed the current fair share is taken whole, and the
//! fair share of the strata still unvisited is recomputed from what is left.
//! The first stratum larger than its fair share ends the walk: it and every
//! remaining stratum get the fair share.
//!
//! Because the fair share is a ceiling, the quotas can add up to slightly
//! more than `desired_total` (at most one extra tile per remaining stratum).
use serde::{Deserialize, Serialize};

use crate::census::StrataCensus;
use crate::error::{Result, StrataError};
use crate::strata::{StratumLabel, STRATUM_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPlan {
    /// Quota per stratum in canonical order.
    pub quotas: [u64; STRATUM_COUNT],
    /// `ceil(total_population · fraction)`.
    pub desired_total: u64,
}

impl QuotaPlan {
    pub fn quota(&self, label: StratumLabel) -> u64 {
        self.quotas[label.index()]
    }

    pub fn total(&self) -> u64 {
        self.quotas.iter().sum()
    }
}

pub fn plan_from_census(census: &StrataCensus, fraction: f64) -> Result<QuotaPlan> {
    plan_quotas(&census.flatten(), fraction)
}

/// Compute quotas for `populations` (canonical order) at sampling `fraction`.
pub fn plan_quotas(populations: &[u64; STRATUM_COUNT], fraction: f64) -> Result<QuotaPlan> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(StrataError::InvalidConfig(format!(
            "sampling fraction must be in (0, 1], got {fraction}"
        )));
    }

    let total: u64 = populations.iter().sum();
    let desired_total = (total as f64 * fraction).ceil() as u64;

    // Stable sort keeps canonical order among equal populations.
    let mut order: Vec<usize> = (0..STRATUM_COUNT).collect();
    order.sort_by_key(|&i| populations[i]);

    let mut quotas = [0u64; STRATUM_COUNT];
    let mut remaining = desired_total;
    let mut remaining_strata = STRATUM_COUNT as u64;
    let mut fair_share = remaining.div_ceil(remaining_strata);

    for (pos, &stratum) in order.iter().enumerate() {
        let pop = populations[stratum];
        if pop <= fair_share {
            quotas[stratum] = pop;
            remaining = remaining.saturating_sub(pop);
            remaining_strata -= 1;
            if remaining_strata > 0 {
                fair_share = remaining.div_ceil(remaining_strata);
            }
        } else {
            for &rest in &order[pos..] {
                quotas[rest] = fair_share;
            }
            break;
        }
    }

    let plan = QuotaPlan {
        quotas,
        desired_total,
    };
    tracing::info!(
        desired = desired_total,
        planned = plan.total(),
        fraction,
        "quota plan"
    );
    Ok(plan)
}
