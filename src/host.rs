// SPDX-License-Identifier: MIT

//! The simulator-facing port.
//!
//! [`Host`] is the single seam between the scheduling policies in this crate
//! and whatever cloud simulator is actually driving the clock, the machine
//! fleet, and the VM/task primitives. Every method corresponds 1:1 to one of
//! the external interfaces the policy is allowed to call; the policy code
//! never reaches outside this trait.
//!
//! Machine/VM/task handles are `Copy` newtypes (`MachineId`, `VmId`,
//! `TaskId`) rather than bare integers, so they cannot be confused with
//! each other or with an unrelated `u32` at the call site. The host API
//! itself is a single object-safe `Host` trait, so a mock or a real
//! FFI-backed binding can be swapped in behind `&mut dyn Host`.

use std::fmt;

// ── Opaque handles ────────────────────────────────────────────────────────────

macro_rules! handle_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                $name(v)
            }
        }
    };
}

handle_id!(MachineId);
handle_id!(VmId);
handle_id!(TaskId);

/// Opaque host-defined CPU type. Two machines/tasks are compatible iff their
/// `CpuType` compares equal; the scheduler never inspects the contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuType(pub u32);

/// Opaque host-defined VM flavor, selected by a task's resource profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VmType(pub u32);

// ── Enumerations ───────────────────────────────────────────────────────────────

/// Service-level tier. Lower is stricter / higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlaClass {
    Sla0,
    Sla1,
    Sla2,
    Sla3,
}

/// Machine sleep depth. `S0` is fully on; higher indices sleep deeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SState {
    S0 = 0,
    S1 = 1,
    S2 = 2,
    S3 = 3,
    S4 = 4,
    S5 = 5,
}

impl SState {
    /// All states in ascending sleep-depth order.
    const ORDER: [SState; 6] = [
        SState::S0,
        SState::S1,
        SState::S2,
        SState::S3,
        SState::S4,
        SState::S5,
    ];

    fn index(self) -> usize {
        self as u8 as usize
    }

    /// Next deeper sleep state, clamped at `ceiling`.
    ///
    /// The two policies clamp at different ceilings (Policy A at `S4`,
    /// Policy P at `S5`); kept as two distinct call sites rather than
    /// unified, since the clamps are observably different behaviors.
    pub fn next_clamped(self, ceiling: SState) -> SState {
        let next_idx = (self.index() + 1).min(ceiling.index());
        Self::ORDER[next_idx]
    }
}

impl fmt::Display for SState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.index())
    }
}

/// CPU performance (clock) level. `P0` is the highest-performance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PState(pub u8);

impl PState {
    pub const P0: PState = PState(0);
}

impl fmt::Display for PState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// VM scheduling priority, derived from a task's SLA class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Mid,
    Low,
}

/// Verbosity level passed to [`Host::sim_output`]: 0 = always shown,
/// higher = more detail.
pub type Verbosity = u8;

// ── Queried data shapes ───────────────────────────────────────────────────────

/// Snapshot of a physical machine's state, queried fresh from the host on
/// every access — the scheduler never caches this itself (the pending-state
/// map is the only cached view, and it is a scheduler-owned value, not a
/// cached copy of host state).
#[derive(Debug, Clone)]
pub struct MachineInfo {
    pub cpu: CpuType,
    pub memory_size: u64,
    pub memory_used: u64,
    pub num_cpus: u32,
    pub active_vms: u32,
    pub active_tasks: u32,
    pub s_state: SState,
    pub p_state: PState,
    /// Power draw at each P-state index, parallel to `performance`.
    pub p_states: Vec<u32>,
    /// Performance value at each P-state index, parallel to `p_states`.
    pub performance: Vec<u32>,
}

impl MachineInfo {
    /// Memory currently unreserved on this machine.
    pub fn memory_remaining(&self) -> i64 {
        self.memory_size as i64 - self.memory_used as i64
    }
}

/// Snapshot of a task's static scheduling attributes.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub target_completion: u64,
}

/// Snapshot of a VM's live task set.
#[derive(Debug, Clone)]
pub struct VmInfo {
    pub active_tasks: Vec<TaskId>,
}

// ── The Host port ──────────────────────────────────────────────────────────────

/// Everything the scheduling policies may ask of, or request from, the host
/// simulator. Object-safe so a mock (see the demo binary's `MockHost`) or a
/// real FFI-backed implementation can be swapped behind `&mut dyn Host`.
pub trait Host {
    // -- Machines --
    fn machine_total(&self) -> u32;
    fn machine_info(&self, m: MachineId) -> MachineInfo;
    fn machine_set_state(&mut self, m: MachineId, s: SState);
    fn machine_set_core_performance(&mut self, m: MachineId, core: u32, p: PState);
    fn machine_cluster_energy(&self) -> f64;

    // -- VMs --
    fn vm_create(&mut self, vm_type: VmType, cpu_type: CpuType) -> VmId;
    fn vm_attach(&mut self, vm: VmId, m: MachineId);
    fn vm_add_task(&mut self, vm: VmId, task: TaskId, priority: Priority);
    fn vm_shutdown(&mut self, vm: VmId);
    fn vm_info(&self, vm: VmId) -> VmInfo;
    fn vm_migrate(&mut self, vm: VmId, m: MachineId);

    // -- Tasks --
    fn task_info(&self, t: TaskId) -> TaskInfo;
    fn required_sla(&self, t: TaskId) -> SlaClass;
    fn required_vm_type(&self, t: TaskId) -> VmType;
    fn required_cpu_type(&self, t: TaskId) -> CpuType;
    fn task_memory(&self, t: TaskId) -> u64;
    fn is_task_gpu_capable(&self, t: TaskId) -> bool;
    fn num_tasks(&self) -> u64;

    // -- Reporting --
    fn sla_report(&self, class: SlaClass) -> f64;

    // -- Diagnostics --
    fn sim_output(&self, message: &str, verbosity: Verbosity);
}

/// `SLA0` → `HIGH`, `SLA3` → `LOW`, everything else → `MID`.
pub fn priority_for_sla(sla: SlaClass) -> Priority {
    match sla {
        SlaClass::Sla0 => Priority::High,
        SlaClass::Sla3 => Priority::Low,
        _ => Priority::Mid,
    }
}

/// A minimal in-memory [`Host`] used by unit tests across this crate.
///
/// Not part of the published API — gated behind `#[cfg(test)]` and kept
/// deliberately small (just enough state for queue/registry/efficiency/
/// placement tests to drive scenarios), unlike the richer `MockHost` in the
/// demo binary which backs the full CLI harness.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone)]
    struct TaskRecord {
        sla: SlaClass,
        target_completion: u64,
        vm_type: VmType,
        cpu_type: CpuType,
        memory: u64,
        gpu_capable: bool,
    }

    #[derive(Debug, Default)]
    pub struct FixtureHost {
        machines: HashMap<MachineId, MachineInfo>,
        tasks: HashMap<TaskId, TaskRecord>,
        vms: HashMap<VmId, (VmInfo, Option<MachineId>)>,
        next_task: u32,
        next_vm: u32,
    }

    impl FixtureHost {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a machine with the given id, returning the id for
        /// convenience in call sites that build several at once.
        pub fn add_machine(&mut self, id: u32, info: MachineInfo) -> MachineId {
            let mid = MachineId(id);
            self.machines.insert(mid, info);
            mid
        }

        /// Register a task with just the fields the queue/placement tests
        /// care about; unlisted fields take inert defaults.
        pub fn add_task(&mut self, sla: SlaClass, target_completion: u64) -> TaskId {
            self.add_task_full(sla, target_completion, VmType(0), CpuType(0), 0, false)
        }

        #[allow(clippy::too_many_arguments)]
        pub fn add_task_full(
            &mut self,
            sla: SlaClass,
            target_completion: u64,
            vm_type: VmType,
            cpu_type: CpuType,
            memory: u64,
            gpu_capable: bool,
        ) -> TaskId {
            let id = TaskId(self.next_task);
            self.next_task += 1;
            self.tasks.insert(
                id,
                TaskRecord {
                    sla,
                    target_completion,
                    vm_type,
                    cpu_type,
                    memory,
                    gpu_capable,
                },
            );
            id
        }

        pub fn machine_info_mut(&mut self, m: MachineId) -> &mut MachineInfo {
            self.machines.get_mut(&m).expect("unknown machine in fixture")
        }
    }

    impl Host for FixtureHost {
        fn machine_total(&self) -> u32 {
            self.machines.len() as u32
        }

        fn machine_info(&self, m: MachineId) -> MachineInfo {
            self.machines
                .get(&m)
                .cloned()
                .unwrap_or_else(|| panic!("unknown machine {m} in fixture"))
        }

        fn machine_set_state(&mut self, m: MachineId, s: SState) {
            self.machine_info_mut(m).s_state = s;
        }

        fn machine_set_core_performance(&mut self, m: MachineId, _core: u32, p: PState) {
            self.machine_info_mut(m).p_state = p;
        }

        fn machine_cluster_energy(&self) -> f64 {
            0.0
        }

        fn vm_create(&mut self, _vm_type: VmType, _cpu_type: CpuType) -> VmId {
            let id = VmId(self.next_vm);
            self.next_vm += 1;
            self.vms.insert(id, (VmInfo { active_tasks: vec![] }, None));
            id
        }

        fn vm_attach(&mut self, vm: VmId, m: MachineId) {
            if let Some((_, slot)) = self.vms.get_mut(&vm) {
                *slot = Some(m);
            }
        }

        fn vm_add_task(&mut self, vm: VmId, task: TaskId, _priority: Priority) {
            if let Some((info, _)) = self.vms.get_mut(&vm) {
                info.active_tasks.push(task);
            }
        }

        fn vm_shutdown(&mut self, vm: VmId) {
            self.vms.remove(&vm);
        }

        fn vm_info(&self, vm: VmId) -> VmInfo {
            self.vms
                .get(&vm)
                .map(|(info, _)| info.clone())
                .unwrap_or(VmInfo { active_tasks: vec![] })
        }

        fn vm_migrate(&mut self, vm: VmId, m: MachineId) {
            if let Some((_, slot)) = self.vms.get_mut(&vm) {
                *slot = Some(m);
            }
        }

        fn task_info(&self, t: TaskId) -> TaskInfo {
            TaskInfo {
                target_completion: self
                    .tasks
                    .get(&t)
                    .map(|r| r.target_completion)
                    .unwrap_or(0),
            }
        }

        fn required_sla(&self, t: TaskId) -> SlaClass {
            self.tasks
                .get(&t)
                .map(|r| r.sla)
                .unwrap_or(SlaClass::Sla3)
        }

        fn required_vm_type(&self, t: TaskId) -> VmType {
            self.tasks.get(&t).map(|r| r.vm_type).unwrap_or(VmType(0))
        }

        fn required_cpu_type(&self, t: TaskId) -> CpuType {
            self.tasks.get(&t).map(|r| r.cpu_type).unwrap_or(CpuType(0))
        }

        fn task_memory(&self, t: TaskId) -> u64 {
            self.tasks.get(&t).map(|r| r.memory).unwrap_or(0)
        }

        fn is_task_gpu_capable(&self, t: TaskId) -> bool {
            self.tasks.get(&t).map(|r| r.gpu_capable).unwrap_or(false)
        }

        fn num_tasks(&self) -> u64 {
            self.tasks.len() as u64
        }

        fn sla_report(&self, _class: SlaClass) -> f64 {
            1.0
        }

        fn sim_output(&self, _message: &str, _verbosity: Verbosity) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sstate_next_clamped_stops_at_ceiling() {
        assert_eq!(SState::S5.next_clamped(SState::S5), SState::S5);
        assert_eq!(SState::S4.next_clamped(SState::S4), SState::S4);
        assert_eq!(SState::S3.next_clamped(SState::S5), SState::S4);
        assert_eq!(SState::S0.next_clamped(SState::S5), SState::S1);
    }

    #[test]
    fn sstate_ordering_is_by_sleep_depth() {
        assert!(SState::S0 < SState::S1);
        assert!(SState::S4 < SState::S5);
    }

    #[test]
    fn priority_mapping_matches_sla_boundaries() {
        assert_eq!(priority_for_sla(SlaClass::Sla0), Priority::High);
        assert_eq!(priority_for_sla(SlaClass::Sla1), Priority::Mid);
        assert_eq!(priority_for_sla(SlaClass::Sla2), Priority::Mid);
        assert_eq!(priority_for_sla(SlaClass::Sla3), Priority::Low);
    }

    #[test]
    fn machine_info_memory_remaining_handles_overcommit() {
        let info = MachineInfo {
            cpu: CpuType(0),
            memory_size: 100,
            memory_used: 120,
            num_cpus: 4,
            active_vms: 0,
            active_tasks: 0,
            s_state: SState::S0,
            p_state: PState::P0,
            p_states: vec![],
            performance: vec![],
        };
        assert_eq!(info.memory_remaining(), -20);
    }
}
