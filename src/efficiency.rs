// SPDX-License-Identifier: MIT

//! Policy P's efficiency scorer: ranks machines by `performance[P0] /
//! power[P0]` once at init, and never again.

use crate::host::{Host, MachineId};

/// `performance[P0] / power[P0]` as an `f64`. Higher is more efficient.
pub fn score(host: &dyn Host, m: MachineId) -> f64 {
    let info = host.machine_info(m);
    let performance_p0 = *info.performance.first().unwrap_or(&0) as f64;
    let power_p0 = *info.p_states.first().unwrap_or(&0) as f64;
    if power_p0 == 0.0 {
        0.0
    } else {
        performance_p0 / power_p0
    }
}

/// The registry sorted by descending efficiency score, ties broken by
/// ascending machine id for determinism. Computed once at initialization —
/// host machine characteristics are assumed static for the lifetime of the
/// run, so this is never recomputed.
pub fn rank(host: &dyn Host, machines: &[MachineId]) -> Vec<MachineId> {
    let mut scored: Vec<(MachineId, f64)> = machines.iter().map(|&m| (m, score(host, m))).collect();
    scored.sort_by(|(a_id, a_score), (b_id, b_score)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a_id.cmp(b_id))
    });
    scored.into_iter().map(|(m, _)| m).collect()
}
