// SPDX-License-Identifier: MIT

//! Shutdown reporting: SLA compliance per class and cluster energy.
//!
//! Reports go through `tracing::info!` with structured fields rather than
//! a bare `println!`, so the same report is both human-readable on a
//! terminal and machine-parseable under a JSON log formatter.

use tracing::info;

use crate::host::{Host, SlaClass};

/// Emit one line per SLA class 0..2, the cluster energy total, and the
/// wall-clock-equivalent duration computed from `final_time_us`.
pub fn report(host: &dyn Host, final_time_us: u64) {
    for class in [SlaClass::Sla0, SlaClass::Sla1, SlaClass::Sla2] {
        let compliance = host.sla_report(class);
        info!(sla_class = ?class, compliance_pct = compliance, "SLA compliance");
    }

    let energy_kwh = host.machine_cluster_energy();
    let duration_s = final_time_us as f64 / 1_000_000.0;
    info!(energy_kwh, duration_s, "simulation complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::FixtureHost;

    #[test]
    fn report_does_not_panic_on_an_empty_host() {
        let host = FixtureHost::new();
        report(&host, 5_000_000);
    }
}
