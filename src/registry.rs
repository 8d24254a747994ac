// SPDX-License-Identifier: MIT

//! The machine registry: the ordered handle list, the pending-state shadow
//! map, and Policy A's tier lists.
//!
//! Owns an ordered collection of handles plus derived views; queried
//! fresh state comes from elsewhere. The registry tracks opaque
//! [`MachineId`]s handed out by the simulator rather than a config file,
//! so there is no YAML loading in this module (that lives in `config.rs`
//! for the demo harness's machine catalog).

use std::collections::HashMap;

use crate::host::{Host, MachineId, SState};

/// Which tier a machine currently occupies under Policy A.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Running,
    Intermediate,
    Off,
}

/// Ordered machine handles plus the scheduler's authoritative view of each
/// machine's requested S-state.
///
/// The pending-state map is the scheduler's own bookkeeping, not a cache of
/// host-observed state: once a state change is requested it is recorded here
/// immediately, before the host's `StateChangeComplete` callback confirms it.
#[derive(Debug, Default)]
pub struct MachineRegistry {
    machines: Vec<MachineId>,
    pending_state: HashMap<MachineId, SState>,
}

impl MachineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the registry with every machine the host currently knows
    /// about, in ascending id order, and mark every pending state `S0`.
    pub fn init(&mut self, host: &dyn Host) {
        self.machines.clear();
        self.pending_state.clear();
        let total = host.machine_total();
        for idx in 0..total {
            let m = MachineId(idx);
            self.machines.push(m);
            self.pending_state.insert(m, SState::S0);
        }
    }

    pub fn machines(&self) -> &[MachineId] {
        &self.machines
    }

    pub fn pending(&self, m: MachineId) -> SState {
        *self.pending_state.get(&m).unwrap_or(&SState::S0)
    }

    pub fn set_pending(&mut self, m: MachineId, s: SState) {
        self.pending_state.insert(m, s);
    }

    /// Request `target` on `m` via the host, skipping the call entirely if
    /// the pending state already matches — the idempotence rule in the
    /// concurrency model (re-issuing an equal request is harmless but
    /// wasteful).
    pub fn request_state(&mut self, host: &mut dyn Host, m: MachineId, target: SState) {
        if self.pending(m) == target {
            return;
        }
        host.machine_set_state(m, target);
        self.set_pending(m, target);
    }
}

/// Policy A's three disjoint, union-complete machine lists: `running`,
/// `intermediate`, `off`. A machine always belongs to exactly one.
#[derive(Debug, Default)]
pub struct TierLists {
    running: Vec<MachineId>,
    intermediate: Vec<MachineId>,
    off: Vec<MachineId>,
}

impl TierLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition `machines` with a counter-increment-and-reset pattern: a
    /// counter starts at 0, increments per machine; counter value 1 routes
    /// to `running`, value 2 routes to `intermediate`, and any other value
    /// (i.e. the counter having just been reset to 0) leaves the machine in
    /// `off` and resets the counter back to 0. This produces a repeating
    /// running/intermediate/off cycle of period 3, deliberately not the
    /// same as `index % 3` — the two diverge at small registry sizes (see
    /// `DESIGN.md`).
    pub fn partition_round_robin(&mut self, machines: &[MachineId]) {
        self.running.clear();
        self.intermediate.clear();
        self.off.clear();

        let mut counter: u32 = 0;
        for &m in machines {
            counter += 1;
            match counter {
                1 => self.running.push(m),
                2 => self.intermediate.push(m),
                _ => {
                    self.off.push(m);
                    counter = 0;
                }
            }
        }
    }

    pub fn running(&self) -> &[MachineId] {
        &self.running
    }

    pub fn intermediate(&self) -> &[MachineId] {
        &self.intermediate
    }

    pub fn off(&self) -> &[MachineId] {
        &self.off
    }

    #[cfg(test)]
    fn tier_of(&self, m: MachineId) -> Option<Tier> {
        if self.running.contains(&m) {
            Some(Tier::Running)
        } else if self.intermediate.contains(&m) {
            Some(Tier::Intermediate)
        } else if self.off.contains(&m) {
            Some(Tier::Off)
        } else {
            None
        }
    }

    /// Move `m` from `intermediate` to the back of `running`. No-op if `m`
    /// is not currently in `intermediate`.
    #[cfg(test)]
    fn promote_to_running(&mut self, m: MachineId) {
        if let Some(pos) = self.intermediate.iter().position(|&x| x == m) {
            self.intermediate.remove(pos);
            self.running.push(m);
        }
    }

    /// Move `m` from `running` to the back of `intermediate`. No-op if `m`
    /// is not currently in `running`.
    pub fn demote_to_intermediate(&mut self, m: MachineId) {
        if let Some(pos) = self.running.iter().position(|&x| x == m) {
            self.running.remove(pos);
            self.intermediate.push(m);
        }
    }

    /// Drain every machine out of `intermediate`, appending them to
    /// `running` in order. Used by scale-up, which empties `intermediate`
    /// entirely.
    pub fn drain_intermediate_to_running(&mut self) -> usize {
        let moved = self.intermediate.len();
        self.running.append(&mut self.intermediate);
        moved
    }
}
