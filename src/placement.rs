// SPDX-License-Identifier: MIT

//! The placement engine: decides whether a task fits on a machine, and
//! performs the VM create/attach/assign sequence when it does.
//!
//! The two policies supply their own iteration order and scale-up/
//! reactivation hooks; this module only knows the shared eligibility test
//! and the placement mechanics.

use crate::host::{priority_for_sla, Host, MachineId, TaskId};

/// Fixed per-VM bookkeeping overhead charged against a machine's free
/// memory before a task is allowed to fit.
pub const VM_OVERHEAD: u64 = 8;

/// Whether machine `m` can host task `t`: matching CPU type, enough memory
/// after accounting for [`VM_OVERHEAD`], and VM density within the
/// machine's CPU count.
pub fn is_eligible(host: &dyn Host, m: MachineId, t: TaskId) -> bool {
    let info = host.machine_info(m);
    let required_cpu = host.required_cpu_type(t);
    if info.cpu != required_cpu {
        return false;
    }

    let task_memory = host.task_memory(t);
    let remaining = info.memory_remaining();
    if remaining < (task_memory + VM_OVERHEAD) as i64 {
        return false;
    }

    // Rejection is "active_vms > num_cpus", i.e. eligibility requires
    // active_vms <= num_cpus.
    if info.active_vms > info.num_cpus {
        return false;
    }

    true
}

/// Create a VM on `m` for task `t`, attach it, and assign the task with the
/// priority derived from its SLA class. Returns the new VM's id.
pub fn place_on(host: &mut dyn Host, m: MachineId, t: TaskId) -> crate::host::VmId {
    let vm_type = host.required_vm_type(t);
    let cpu_type = host.required_cpu_type(t);
    let vm = host.vm_create(vm_type, cpu_type);
    host.vm_attach(vm, m);
    let priority = priority_for_sla(host.required_sla(t));
    host.vm_add_task(vm, t, priority);
    vm
}
