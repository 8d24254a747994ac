// SPDX-License-Identifier: MIT

//! Policy A — "bad-eco": tiered scale-up/scale-down with a cooldown.

use tracing::{debug, error, info, warn};

use crate::callbacks::{sweep_idle_vms, SchedulerCallbacks};
use crate::host::{Host, MachineId, SState, TaskId, VmId};
use crate::placement;
use crate::queue::TaskQueue;
use crate::registry::{MachineRegistry, TierLists};

/// Cooldown threshold: scale-down is only considered once
/// `run_shrink_cooldown` reaches this value.
const SHRINK_COOLDOWN_THRESHOLD: i64 = 10;

#[derive(Debug, Default)]
pub struct BadEcoScheduler {
    registry: MachineRegistry,
    tiers: TierLists,
    queue: TaskQueue,
    vms: Vec<VmId>,
    run_shrink_cooldown: i64,
    tasks_done: u64,
    sla_violations: u64,
    migrating: bool,
}

impl BadEcoScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to place the task at the queue head against the running
    /// tier, front to back. If the candidate under consideration is the
    /// last element of `running`, scale-up fires first — before placing —
    /// so headroom exists for whichever task is placed next, rather than
    /// scaling up only after a failed pass.
    fn try_place_once(&mut self, host: &mut dyn Host) -> bool {
        let Some(t) = self.queue.peek() else {
            return false;
        };
        let running = self.tiers.running().to_vec();
        if running.is_empty() {
            self.scale_up(host);
            return false;
        }
        let last_idx = running.len() - 1;
        for (i, &m) in running.iter().enumerate() {
            if i == last_idx {
                self.scale_up(host);
            }
            if placement::is_eligible(host, m, t) {
                let vm = placement::place_on(host, m, t);
                self.vms.push(vm);
                self.queue.pop();
                info!(task = %t, machine = %m, "placed task");
                return true;
            }
        }
        false
    }

    /// Repeatedly drive placement until a full pass makes no progress
    /// (queue size stops strictly decreasing).
    fn drain_queue(&mut self, host: &mut dyn Host) {
        loop {
            let before = self.queue.size();
            if before == 0 {
                break;
            }
            self.try_place_once(host);
            if self.queue.size() == before {
                break;
            }
        }
    }

    /// `scaleupRunning`: drains `intermediate` entirely into `running`,
    /// requesting `S0` on each, and embargoes scale-down for 100 ticks.
    fn scale_up(&mut self, host: &mut dyn Host) {
        let ids = self.tiers.intermediate().to_vec();
        if ids.is_empty() {
            return;
        }
        self.tiers.drain_intermediate_to_running();
        for m in ids {
            self.registry.request_state(host, m, SState::S0);
        }
        self.run_shrink_cooldown = -100;
        debug!(cooldown = self.run_shrink_cooldown, "scaled up, embargoing shrink");
    }

    /// Tiered scale-down. Begins with an unconditional early return,
    /// making the shrink logic below unreachable — documented dead code
    /// rather than invented or removed behavior; see `DESIGN.md`. Never
    /// called from the live callback path.
    #[allow(dead_code, unreachable_code)]
    fn auto_rescale_shrink(&mut self, host: &mut dyn Host) {
        return;

        let running = self.tiers.running().to_vec();
        if running.len() <= 2 {
            return;
        }
        if self.run_shrink_cooldown < SHRINK_COOLDOWN_THRESHOLD {
            return;
        }
        let penultimate = running[running.len() - 2];
        if host.machine_info(penultimate).active_tasks != 0 {
            return;
        }
        // `max(|intermediate|/2, |intermediate|) == |intermediate|` in the
        // source; kept as observed rather than simplified.
        let max_move = running.len() / 10;
        let mut moved = 0usize;
        for &m in running.iter().rev() {
            if moved >= max_move {
                break;
            }
            if host.machine_info(m).active_tasks == 0 {
                self.tiers.demote_to_intermediate(m);
                self.registry.request_state(host, m, SState::S3);
                moved += 1;
            }
        }
        self.run_shrink_cooldown = 0;
    }
}

impl SchedulerCallbacks for BadEcoScheduler {
    fn init(&mut self, host: &mut dyn Host) {
        self.registry.init(host);
        self.tiers.partition_round_robin(self.registry.machines());
        self.queue = TaskQueue::new();
        self.vms.clear();
        self.run_shrink_cooldown = 0;
        self.tasks_done = 0;
        self.sla_violations = 0;
        self.migrating = false;
        info!(
            machines = self.registry.machines().len(),
            running = self.tiers.running().len(),
            intermediate = self.tiers.intermediate().len(),
            off = self.tiers.off().len(),
            "bad-eco scheduler initialized"
        );
    }

    fn new_task(&mut self, host: &mut dyn Host, now: u64, t: TaskId) {
        self.queue.push(host, t);
        debug!(now, task = %t, queue_size = self.queue.size(), "task arrived");
        self.try_place_once(host);
    }

    fn task_complete(&mut self, host: &mut dyn Host, now: u64, t: TaskId) {
        self.tasks_done += 1;
        debug!(now, task = %t, tasks_done = self.tasks_done, "task completed");
        sweep_idle_vms(host, &mut self.vms);
        self.auto_rescale_shrink(host);
    }

    fn periodic_check(&mut self, host: &mut dyn Host, now: u64) {
        self.run_shrink_cooldown += 1;
        self.auto_rescale_shrink(host);
        self.drain_queue(host);
        debug!(
            now,
            queue_size = self.queue.size(),
            intermediate = self.tiers.intermediate().len(),
            "periodic check"
        );
        for &m in self.tiers.intermediate() {
            debug!(machine = %m, tier = "intermediate", "idle machine");
        }
    }

    fn migration_done(&mut self, _host: &mut dyn Host, vm: VmId) {
        self.migrating = false;
        debug!(vm = %vm, "migration gate cleared");
    }

    fn memory_warning(&mut self, host: &mut dyn Host, m: MachineId) {
        warn!(machine = %m, "memory warning");
        host.sim_output(&format!("memory warning on machine {m}"), 0);
    }

    fn sla_warning(&mut self, _host: &mut dyn Host, t: TaskId) {
        self.sla_violations += 1;
        warn!(task = %t, sla_violations = self.sla_violations, "SLA warning");
    }

    fn state_change_complete(&mut self, _host: &mut dyn Host, _m: MachineId) {}

    fn shutdown(&mut self, host: &mut dyn Host, time: u64) {
        for vm in self.vms.drain(..) {
            host.vm_shutdown(vm);
        }
        crate::reporter::report(host, time);
        error!(tasks_done = self.tasks_done, sla_violations = self.sla_violations, "shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::FixtureHost;
    use crate::host::{CpuType, MachineInfo, PState, SlaClass, VmType};

    fn machine() -> MachineInfo {
        MachineInfo {
            cpu: CpuType(0),
            memory_size: 1000,
            memory_used: 0,
            num_cpus: 4,
            active_vms: 0,
            active_tasks: 0,
            s_state: SState::S0,
            p_state: PState::P0,
            p_states: vec![10, 8],
            performance: vec![100, 80],
        }
    }

    #[test]
    fn init_partitions_machines_into_tiers() {
        let mut host = FixtureHost::new();
        for i in 0..3 {
            host.add_machine(i, machine());
        }
        let mut sched = BadEcoScheduler::new();
        sched.init(&mut host);
        assert_eq!(sched.tiers.running().len(), 1);
        assert_eq!(sched.tiers.intermediate().len(), 1);
        assert_eq!(sched.tiers.off().len(), 1);
    }

    #[test]
    fn new_task_places_immediately_when_running_machine_fits() {
        let mut host = FixtureHost::new();
        host.add_machine(0, machine());
        let mut sched = BadEcoScheduler::new();
        sched.init(&mut host);

        let t = host.add_task_full(SlaClass::Sla1, 100, VmType(0), CpuType(0), 10, false);
        sched.new_task(&mut host, 0, t);

        assert_eq!(sched.queue.size(), 0);
        assert_eq!(sched.vms.len(), 1);
    }

    #[test]
    fn task_complete_sweeps_empty_vms() {
        let mut host = FixtureHost::new();
        host.add_machine(0, machine());
        let mut sched = BadEcoScheduler::new();
        sched.init(&mut host);

        let t = host.add_task_full(SlaClass::Sla1, 100, VmType(0), CpuType(0), 10, false);
        sched.new_task(&mut host, 0, t);
        assert_eq!(sched.vms.len(), 1);

        sched.task_complete(&mut host, 1, t);
        assert!(sched.vms.is_empty());
        assert_eq!(sched.tasks_done, 1);
    }

    #[test]
    fn sla_warning_increments_violation_counter() {
        let mut host = FixtureHost::new();
        host.add_machine(0, machine());
        let mut sched = BadEcoScheduler::new();
        sched.init(&mut host);
        let t = host.add_task_full(SlaClass::Sla1, 100, VmType(0), CpuType(0), 10, false);

        sched.sla_warning(&mut host, t);
        sched.sla_warning(&mut host, t);

        assert_eq!(sched.sla_violations, 2);
    }

    #[test]
    fn scale_up_drains_intermediate_and_embargoes_shrink() {
        let mut host = FixtureHost::new();
        for i in 0..3 {
            host.add_machine(i, machine());
        }
        let mut sched = BadEcoScheduler::new();
        sched.init(&mut host);

        sched.scale_up(&mut host);

        assert!(sched.tiers.intermediate().is_empty());
        assert_eq!(sched.run_shrink_cooldown, -100);
    }
}
