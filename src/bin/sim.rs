// SPDX-License-Identifier: MIT

//! Demo harness: drives a scheduling policy against an in-memory `MockHost`
//! and a small seeded synthetic workload, so the crate can be exercised
//! end-to-end without the real CloudSim host.
//!
//! This plays the same role as a `pullpiri-sim`/`node-sim`-style manual
//! simulator: a standalone harness for exercising the policy logic, not a
//! product surface.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use ecosched::config::MachineCatalog;
use ecosched::host::{
    CpuType, Host, MachineId, MachineInfo, PState, Priority, SState, SlaClass, TaskId, TaskInfo,
    Verbosity, VmId, VmInfo, VmType,
};
use ecosched::Policy;

#[derive(Parser, Debug)]
#[command(name = "ecosched-sim", about = "Demo driver for the ecosched policies")]
struct Args {
    /// Which scheduling policy to run.
    #[arg(long, value_parser = ["bad-eco", "p-mapper"])]
    policy: String,

    /// Optional YAML machine catalog; falls back to a small built-in fleet.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Number of simulated ticks to run.
    #[arg(long, default_value_t = 200)]
    ticks: u64,

    /// Seed for the synthetic workload generator.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

struct MockMachine {
    cpu: CpuType,
    memory_size: u64,
    memory_used: u64,
    num_cpus: u32,
    active_vms: u32,
    s_state: SState,
    p_state: PState,
    p_states: Vec<u32>,
    performance: Vec<u32>,
}

struct MockVm {
    machine: Option<MachineId>,
    active_tasks: Vec<TaskId>,
}

struct MockTask {
    sla: SlaClass,
    vm_type: VmType,
    cpu_type: CpuType,
    memory: u64,
    gpu_capable: bool,
    target_completion: u64,
}

/// In-memory [`Host`] implementation backing the demo binary. Deliberately
/// small — just enough bookkeeping to drive and observe a policy, not a
/// faithful simulator.
struct MockHost {
    machines: HashMap<u32, MockMachine>,
    vms: HashMap<u32, MockVm>,
    next_vm: u32,
    tasks: HashMap<u32, MockTask>,
    next_task: u32,
    energy_kwh: f64,
    sla_total: HashMap<SlaClass, u64>,
    sla_met: HashMap<SlaClass, u64>,
}

impl MockHost {
    fn new(catalog: &MachineCatalog) -> Self {
        let mut machines = HashMap::new();
        for (idx, spec) in catalog.machines().iter().enumerate() {
            let (performance, power): (Vec<u32>, Vec<u32>) = spec.p_states.iter().copied().unzip();
            machines.insert(
                idx as u32,
                MockMachine {
                    cpu: spec.cpu,
                    memory_size: spec.memory_size_mb,
                    memory_used: 0,
                    num_cpus: spec.num_cpus,
                    active_vms: 0,
                    s_state: SState::S0,
                    p_state: PState::P0,
                    p_states: power,
                    performance,
                },
            );
        }
        Self {
            machines,
            vms: HashMap::new(),
            next_vm: 0,
            tasks: HashMap::new(),
            next_task: 0,
            energy_kwh: 0.0,
            sla_total: HashMap::new(),
            sla_met: HashMap::new(),
        }
    }

    fn spawn_task(
        &mut self,
        sla: SlaClass,
        memory: u64,
        target_completion: u64,
        vm_type: VmType,
        cpu_type: CpuType,
        gpu_capable: bool,
    ) -> TaskId {
        let id = self.next_task;
        self.next_task += 1;
        self.tasks.insert(
            id,
            MockTask {
                sla,
                vm_type,
                cpu_type,
                memory,
                gpu_capable,
                target_completion,
            },
        );
        *self.sla_total.entry(sla).or_insert(0) += 1;
        TaskId(id)
    }

    /// All task ids currently attached to a live VM, for the driver to pick
    /// a random in-flight task to complete.
    fn active_task_ids(&self) -> Vec<TaskId> {
        self.vms.values().flat_map(|vm| vm.active_tasks.iter().copied()).collect()
    }

    /// Record that `task` finished at simulated time `now`, crediting its
    /// SLA class if it finished at or before its target and releasing the
    /// memory it held on whichever machine hosted its VM.
    fn record_completion(&mut self, task: TaskId, now: u64) {
        if let Some(record) = self.tasks.get(&task.0) {
            if now <= record.target_completion {
                *self.sla_met.entry(record.sla).or_insert(0) += 1;
            }
        }
        let task_memory = self.tasks.get(&task.0).map(|r| r.memory).unwrap_or(0);
        for vm in self.vms.values_mut() {
            if vm.active_tasks.contains(&task) {
                if let Some(m) = vm.machine {
                    if let Some(machine) = self.machines.get_mut(&m.0) {
                        machine.memory_used = machine.memory_used.saturating_sub(task_memory);
                    }
                }
            }
            vm.active_tasks.retain(|&t| t != task);
        }
    }

    /// Accrue one tick's worth of power draw across every machine at its
    /// current P-state, converted to an approximate kWh delta. The demo
    /// harness's accounting is illustrative, not calibrated.
    fn tick_energy(&mut self) {
        for machine in self.machines.values() {
            if machine.s_state != SState::S0 {
                continue;
            }
            let watts = machine
                .p_states
                .get(machine.p_state.0 as usize)
                .copied()
                .unwrap_or(0) as f64;
            self.energy_kwh += watts / 1_000_000.0;
        }
    }
}

impl Host for MockHost {
    fn machine_total(&self) -> u32 {
        self.machines.len() as u32
    }

    fn machine_info(&self, m: MachineId) -> MachineInfo {
        let machine = self.machines.get(&m.0).expect("unknown machine");
        MachineInfo {
            cpu: machine.cpu,
            memory_size: machine.memory_size,
            memory_used: machine.memory_used,
            num_cpus: machine.num_cpus,
            active_vms: machine.active_vms,
            active_tasks: self
                .vms
                .values()
                .filter(|vm| vm.machine == Some(m))
                .map(|vm| vm.active_tasks.len() as u32)
                .sum(),
            s_state: machine.s_state,
            p_state: machine.p_state,
            p_states: machine.p_states.clone(),
            performance: machine.performance.clone(),
        }
    }

    fn machine_set_state(&mut self, m: MachineId, s: SState) {
        if let Some(machine) = self.machines.get_mut(&m.0) {
            machine.s_state = s;
        }
    }

    fn machine_set_core_performance(&mut self, m: MachineId, _core: u32, p: PState) {
        if let Some(machine) = self.machines.get_mut(&m.0) {
            machine.p_state = p;
        }
    }

    fn machine_cluster_energy(&self) -> f64 {
        self.energy_kwh
    }

    fn vm_create(&mut self, _vm_type: VmType, _cpu_type: CpuType) -> VmId {
        let id = self.next_vm;
        self.next_vm += 1;
        self.vms.insert(
            id,
            MockVm {
                machine: None,
                active_tasks: Vec::new(),
            },
        );
        VmId(id)
    }

    fn vm_attach(&mut self, vm: VmId, m: MachineId) {
        if let Some(record) = self.vms.get_mut(&vm.0) {
            record.machine = Some(m);
        }
        if let Some(machine) = self.machines.get_mut(&m.0) {
            machine.active_vms += 1;
            machine.memory_used += ecosched::placement::VM_OVERHEAD;
        }
    }

    // Tasks are attached to their VM after `vm_attach`, so the VM's owning
    // machine (if any) is charged for task memory here rather than at
    // attach time.
    fn vm_add_task(&mut self, vm: VmId, task: TaskId, _priority: Priority) {
        let machine = self.vms.get(&vm.0).and_then(|v| v.machine);
        if let Some(record) = self.vms.get_mut(&vm.0) {
            record.active_tasks.push(task);
        }
        let task_memory = self.tasks.get(&task.0).map(|r| r.memory).unwrap_or(0);
        if let Some(m) = machine {
            if let Some(machine) = self.machines.get_mut(&m.0) {
                machine.memory_used += task_memory;
            }
        }
    }

    fn vm_shutdown(&mut self, vm: VmId) {
        if let Some(record) = self.vms.remove(&vm.0) {
            if let Some(m) = record.machine {
                if let Some(machine) = self.machines.get_mut(&m.0) {
                    machine.active_vms = machine.active_vms.saturating_sub(1);
                    machine.memory_used = machine
                        .memory_used
                        .saturating_sub(ecosched::placement::VM_OVERHEAD);
                }
            }
        }
    }

    fn vm_info(&self, vm: VmId) -> VmInfo {
        VmInfo {
            active_tasks: self
                .vms
                .get(&vm.0)
                .map(|v| v.active_tasks.clone())
                .unwrap_or_default(),
        }
    }

    fn vm_migrate(&mut self, vm: VmId, m: MachineId) {
        if let Some(record) = self.vms.get_mut(&vm.0) {
            record.machine = Some(m);
        }
    }

    fn task_info(&self, t: TaskId) -> TaskInfo {
        TaskInfo {
            target_completion: self.tasks.get(&t.0).map(|r| r.target_completion).unwrap_or(0),
        }
    }

    fn required_sla(&self, t: TaskId) -> SlaClass {
        self.tasks.get(&t.0).map(|r| r.sla).unwrap_or(SlaClass::Sla3)
    }

    fn required_vm_type(&self, t: TaskId) -> VmType {
        self.tasks.get(&t.0).map(|r| r.vm_type).unwrap_or(VmType(0))
    }

    fn required_cpu_type(&self, t: TaskId) -> CpuType {
        self.tasks.get(&t.0).map(|r| r.cpu_type).unwrap_or(CpuType(0))
    }

    fn task_memory(&self, t: TaskId) -> u64 {
        self.tasks.get(&t.0).map(|r| r.memory).unwrap_or(0)
    }

    fn is_task_gpu_capable(&self, t: TaskId) -> bool {
        self.tasks.get(&t.0).map(|r| r.gpu_capable).unwrap_or(false)
    }

    fn num_tasks(&self) -> u64 {
        self.tasks.len() as u64
    }

    fn sla_report(&self, class: SlaClass) -> f64 {
        let total = *self.sla_total.get(&class).unwrap_or(&0);
        if total == 0 {
            return 100.0;
        }
        let met = *self.sla_met.get(&class).unwrap_or(&0);
        (met as f64 / total as f64) * 100.0
    }

    fn sim_output(&self, message: &str, verbosity: Verbosity) {
        match verbosity {
            0 => tracing::error!("{message}"),
            1 => tracing::warn!("{message}"),
            2 => tracing::info!("{message}"),
            _ => tracing::debug!("{message}"),
        }
    }
}

fn default_catalog() -> MachineCatalog {
    // Built when no --catalog is given: a small illustrative fleet rather
    // than a single node.
    let yaml = r#"
machines:
  mid-tier-a:
    cpu_type: 0
    num_cpus: 8
    memory_size_mb: 32768
    p_states:
      - [100, 45]
      - [80, 32]
      - [60, 22]
      - [40, 14]
  mid-tier-b:
    cpu_type: 0
    num_cpus: 8
    memory_size_mb: 32768
    p_states:
      - [95, 40]
      - [75, 29]
      - [55, 20]
      - [35, 12]
  efficient-c:
    cpu_type: 0
    num_cpus: 16
    memory_size_mb: 65536
    p_states:
      - [110, 30]
      - [85, 21]
      - [65, 15]
      - [45, 9]
"#;
    let mut catalog = MachineCatalog::new();
    let tmp = tempfile_yaml(yaml);
    catalog.load_from_file(&tmp).expect("built-in catalog must parse");
    let _ = std::fs::remove_file(&tmp);
    catalog
}

fn tempfile_yaml(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("ecosched-default-catalog-{}.yaml", std::process::id()));
    std::fs::write(&path, contents).expect("write built-in catalog fixture");
    path
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let policy = Policy::parse(&args.policy).expect("clap value_parser already validated this");

    let mut catalog = MachineCatalog::new();
    match &args.catalog {
        Some(path) => {
            catalog.load_from_file(path)?;
            info!(path = %path.display(), "loaded machine catalog");
        }
        None => {
            catalog = default_catalog();
            info!("using built-in demo machine catalog");
        }
    }

    let mut host = MockHost::new(&catalog);
    let mut scheduler = policy.build();
    scheduler.init(&mut host);

    let mut rng = StdRng::seed_from_u64(args.seed);
    let sla_choices = [SlaClass::Sla0, SlaClass::Sla1, SlaClass::Sla2, SlaClass::Sla3];

    for tick in 0..args.ticks {
        if rng.gen_bool(0.35) {
            let sla = sla_choices[rng.gen_range(0..sla_choices.len())];
            let memory = rng.gen_range(100..4000);
            let target_completion = tick + rng.gen_range(5..50);
            let task = host.spawn_task(sla, memory, target_completion, VmType(0), CpuType(0), false);
            scheduler.new_task(&mut host, tick, task);
        }

        if rng.gen_bool(0.2) {
            let active = host.active_task_ids();
            if !active.is_empty() {
                let victim = active[rng.gen_range(0..active.len())];
                host.record_completion(victim, tick);
                scheduler.task_complete(&mut host, tick, victim);
            }
        }

        if tick % 5 == 0 {
            scheduler.periodic_check(&mut host, tick);
        }

        host.tick_energy();
    }

    scheduler.shutdown(&mut host, args.ticks);
    Ok(())
}
