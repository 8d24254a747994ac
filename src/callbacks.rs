// SPDX-License-Identifier: MIT

//! The shared event-handler surface both policies implement.
//!
//! Two policies share one callback surface, selected once at process start
//! rather than swapped mid-run. `Host` access is always `&mut dyn Host` —
//! callbacks are serialized by the host's event loop, so there is never a
//! second mutable borrow in flight.

use crate::host::{Host, MachineId, TaskId, VmId};

/// The nine host-driven entry points a scheduling policy must implement.
pub trait SchedulerCallbacks {
    fn init(&mut self, host: &mut dyn Host);
    fn new_task(&mut self, host: &mut dyn Host, now: u64, t: TaskId);
    fn task_complete(&mut self, host: &mut dyn Host, now: u64, t: TaskId);
    fn periodic_check(&mut self, host: &mut dyn Host, now: u64);
    fn migration_done(&mut self, host: &mut dyn Host, vm: VmId);
    fn memory_warning(&mut self, host: &mut dyn Host, m: MachineId);
    fn sla_warning(&mut self, host: &mut dyn Host, t: TaskId);
    fn state_change_complete(&mut self, host: &mut dyn Host, m: MachineId);
    fn shutdown(&mut self, host: &mut dyn Host, time: u64);
}

/// Sweep `vms`, shutting down and discarding every VM with zero active
/// tasks. Shared by both policies' `TaskComplete` handling.
pub(crate) fn sweep_idle_vms(host: &mut dyn Host, vms: &mut Vec<VmId>) {
    let mut remaining = Vec::with_capacity(vms.len());
    for vm in vms.drain(..) {
        if host.vm_info(vm).active_tasks.is_empty() {
            host.vm_shutdown(vm);
        } else {
            remaining.push(vm);
        }
    }
    *vms = remaining;
}
