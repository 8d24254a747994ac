// SPDX-License-Identifier: MIT

//! Policy P — "p-mapper": efficiency-ordered placement with a reverse
//! sleep-walk power controller. Uses an efficiency-ranked machine order
//! (see [`crate::efficiency`]) in place of Policy A's tier lists.

use tracing::{debug, error, info, warn};

use crate::callbacks::{sweep_idle_vms, SchedulerCallbacks};
use crate::efficiency;
use crate::host::{Host, MachineId, PState, SState, TaskId, VmId};
use crate::placement;
use crate::queue::TaskQueue;
use crate::registry::MachineRegistry;

/// Fraction of completed tasks required before `reverse_limit` is allowed
/// to advance.
const PROGRESS_WATERMARK: f64 = 0.10;
/// Fraction of total tasks' SLA violations past which the reverse walk
/// stops early.
const SLA_WALK_STOP_WATERMARK: f64 = 0.05;
/// Amount `reverse_limit` is penalized by each time a sleeping machine must
/// be reactivated for placement.
const REACTIVATION_PENALTY: i64 = 10;
/// Sentinel `reverse_limit` forced on an invariant violation, aggressively
/// suppressing further power-down.
const INVARIANT_VIOLATION_PENALTY: i64 = -1000;

#[derive(Debug, Default)]
pub struct PMapperScheduler {
    registry: MachineRegistry,
    efficiency_order: Vec<MachineId>,
    queue: TaskQueue,
    vms: Vec<VmId>,
    reverse_limit: i64,
    tasks_done: u64,
    sla_violations: u64,
    migrating: bool,
}

impl PMapperScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to place the queue head, trying machines in descending
    /// efficiency order regardless of S-state. A sleeping-but-otherwise-fit
    /// machine is reactivated instead of used: request `S0`, charge
    /// `reverse_limit`, and return without placing — the same task stays
    /// at the queue head for the next drive.
    fn try_place_once(&mut self, host: &mut dyn Host) -> bool {
        let Some(t) = self.queue.peek() else {
            return false;
        };
        for &m in self.efficiency_order.clone().iter() {
            let info = host.machine_info(m);
            let pending = self.registry.pending(m);
            if info.s_state > SState::S0 || pending > SState::S0 {
                if placement::is_eligible(host, m, t) {
                    self.registry.request_state(host, m, SState::S0);
                    self.reverse_limit -= REACTIVATION_PENALTY;
                    debug!(machine = %m, reverse_limit = self.reverse_limit, "reactivating sleeping machine");
                    return false;
                }
                continue;
            }
            if placement::is_eligible(host, m, t) {
                let vm = placement::place_on(host, m, t);
                self.vms.push(vm);
                self.queue.pop();
                info!(task = %t, machine = %m, "placed task");
                return true;
            }
        }
        self.no_fit_fallback(host);
        false
    }

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

    /// No machine fit the queue head: wake every sleeping machine and drop
    /// every above-P0 core back to P0, on the theory that more headroom
    /// will appear once the host honors the requests.
    fn no_fit_fallback(&mut self, host: &mut dyn Host) {
        for &m in self.efficiency_order.clone().iter() {
            let info = host.machine_info(m);
            let pending = self.registry.pending(m);
            if info.s_state > SState::S0 || pending > SState::S0 {
                self.registry.request_state(host, m, SState::S0);
            }
            if info.p_state > PState::P0 {
                host.machine_set_core_performance(m, 0, PState::P0);
            }
        }
    }

    /// Advance `reverse_limit` once per tick if completion progress has
    /// crossed the watermark. Queries `host.num_tasks()` live rather than a
    /// value cached at `init` — the total can grow over the run, matching
    /// `GetNumTasks()` being re-queried on every tick in the source.
    fn advance_reverse_limit(&mut self, host: &dyn Host) {
        let total_tasks = host.num_tasks();
        if total_tasks == 0 {
            return;
        }
        let progress = self.tasks_done as f64 / total_tasks as f64;
        if (self.reverse_limit + 1) < self.efficiency_order.len() as i64 && progress >= PROGRESS_WATERMARK {
            self.reverse_limit += 1;
        }
    }

    /// For every machine with active tasks that is (or is pending) asleep,
    /// force it back to `S0` and set `reverse_limit` to the invariant-
    /// violation sentinel.
    fn restore_invariants(&mut self, host: &mut dyn Host) {
        for &m in self.efficiency_order.clone().iter() {
            let info = host.machine_info(m);
            let pending = self.registry.pending(m);
            if info.active_tasks > 0 && (info.s_state > SState::S0 || pending > SState::S0) {
                self.registry.request_state(host, m, SState::S0);
                self.reverse_limit = INVARIANT_VIOLATION_PENALTY;
                warn!(machine = %m, "invariant violation: active tasks on a sleeping machine");
            }
        }
    }

    /// If any SLA violation has been recorded, force every machine with a
    /// non-`S0` state or P-state back to the baseline.
    fn sla_panic(&mut self, host: &mut dyn Host) {
        if self.sla_violations == 0 {
            return;
        }
        for &m in self.efficiency_order.clone().iter() {
            let info = host.machine_info(m);
            let pending = self.registry.pending(m);
            if info.s_state > SState::S0 || pending > SState::S0 {
                self.registry.request_state(host, m, SState::S0);
            }
            if info.p_state > PState::P0 {
                host.machine_set_core_performance(m, 0, PState::P0);
            }
        }
        error!(sla_violations = self.sla_violations, "SLA panic triggered");
    }

    /// Walk the efficiency order from the tail (least efficient) backward,
    /// progressively deepening sleep on idle machines, gated by
    /// `reverse_limit` and the SLA watermark.
    fn reverse_walk(&mut self, host: &mut dyn Host) {
        let total_tasks = host.num_tasks();
        if total_tasks == 0 {
            return;
        }
        let sla_stop = self.sla_violations as f64 > SLA_WALK_STOP_WATERMARK * total_tasks as f64;
        let order = self.efficiency_order.clone();
        let mut k: i64 = 1;
        for &m in order.iter().rev() {
            if k >= self.reverse_limit || sla_stop {
                break;
            }
            let info = host.machine_info(m);
            let pending = self.registry.pending(m);
            let next = info.s_state.next_clamped(SState::S5);
            if info.active_tasks == 0 && self.queue.is_empty() && next != pending {
                self.registry.request_state(host, m, next);
                debug!(machine = %m, next = %next, "reverse walk: deepening sleep");
            }
            k += 1;
        }
    }
}

impl SchedulerCallbacks for PMapperScheduler {
    fn init(&mut self, host: &mut dyn Host) {
        self.registry.init(host);
        self.efficiency_order = efficiency::rank(host, self.registry.machines());
        self.queue = TaskQueue::new();
        self.vms.clear();
        self.reverse_limit = 0;
        self.tasks_done = 0;
        self.sla_violations = 0;
        self.migrating = false;
        info!(
            machines = self.efficiency_order.len(),
            total_tasks = host.num_tasks(),
            "p-mapper scheduler initialized"
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
    }

    fn periodic_check(&mut self, host: &mut dyn Host, now: u64) {
        self.advance_reverse_limit(host);
        self.restore_invariants(host);
        self.sla_panic(host);
        self.reverse_walk(host);
        self.drain_queue(host);
        debug!(
            now,
            queue_size = self.queue.size(),
            reverse_limit = self.reverse_limit,
            tasks_done = self.tasks_done,
            "periodic check"
        );
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
    use crate::host::{CpuType, MachineInfo, SlaClass, VmType};

    fn machine_with_p0(performance: u32, power: u32) -> MachineInfo {
        MachineInfo {
            cpu: CpuType(0),
            memory_size: 1000,
            memory_used: 0,
            num_cpus: 4,
            active_vms: 0,
            active_tasks: 0,
            s_state: SState::S0,
            p_state: PState::P0,
            p_states: vec![power],
            performance: vec![performance],
        }
    }

    #[test]
    fn init_ranks_machines_by_descending_efficiency() {
        let mut host = FixtureHost::new();
        let inefficient = host.add_machine(0, machine_with_p0(100, 50));
        let efficient = host.add_machine(1, machine_with_p0(100, 10));

        let mut sched = PMapperScheduler::new();
        sched.init(&mut host);

        assert_eq!(sched.efficiency_order, vec![efficient, inefficient]);
    }

    #[test]
    fn sleeping_eligible_machine_is_reactivated_not_used() {
        let mut host = FixtureHost::new();
        let m = host.add_machine(0, machine_with_p0(100, 10));
        host.machine_info_mut(m).s_state = SState::S3;

        let mut sched = PMapperScheduler::new();
        sched.init(&mut host);
        sched.registry.set_pending(m, SState::S3);

        let t = host.add_task_full(SlaClass::Sla1, 100, VmType(0), CpuType(0), 10, false);
        sched.new_task(&mut host, 0, t);

        assert_eq!(sched.queue.size(), 1, "task should remain queued");
        assert_eq!(sched.registry.pending(m), SState::S0);
        assert_eq!(sched.reverse_limit, -REACTIVATION_PENALTY);
    }

    #[test]
    fn awake_eligible_machine_places_immediately() {
        let mut host = FixtureHost::new();
        host.add_machine(0, machine_with_p0(100, 10));
        let mut sched = PMapperScheduler::new();
        sched.init(&mut host);

        let t = host.add_task_full(SlaClass::Sla1, 100, VmType(0), CpuType(0), 10, false);
        sched.new_task(&mut host, 0, t);

        assert_eq!(sched.queue.size(), 0);
        assert_eq!(sched.vms.len(), 1);
    }

    #[test]
    fn restore_invariants_forces_awake_and_penalizes_limit() {
        let mut host = FixtureHost::new();
        let m = host.add_machine(0, machine_with_p0(100, 10));
        host.machine_info_mut(m).s_state = SState::S2;
        host.machine_info_mut(m).active_tasks = 1;

        let mut sched = PMapperScheduler::new();
        sched.init(&mut host);
        sched.registry.set_pending(m, SState::S2);

        sched.restore_invariants(&mut host);

        assert_eq!(sched.registry.pending(m), SState::S0);
        assert_eq!(sched.reverse_limit, INVARIANT_VIOLATION_PENALTY);
    }

    #[test]
    fn sla_panic_forces_every_sleeping_machine_awake() {
        let mut host = FixtureHost::new();
        let m = host.add_machine(0, machine_with_p0(100, 10));
        host.machine_info_mut(m).s_state = SState::S4;

        let mut sched = PMapperScheduler::new();
        sched.init(&mut host);
        sched.registry.set_pending(m, SState::S4);
        sched.sla_violations = 1;

        sched.sla_panic(&mut host);

        assert_eq!(sched.registry.pending(m), SState::S0);
    }
}
