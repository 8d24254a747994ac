// SPDX-License-Identifier: MIT

//! YAML machine catalog for the demo harness.
//!
//! A private `*File`/`*Entry` deserialization shape, `#[serde(default =
//! "...")]` for optional numeric fields, a fallback single default machine
//! when the file declares none, and a `loaded` gate. Scheduling nodes
//! become physical machines with a P-state ladder instead of a flat CPU
//! count.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::host::CpuType;

fn default_num_cpus() -> u32 {
    4
}

fn default_memory_size() -> u64 {
    16_384
}

fn default_gpu_capable() -> bool {
    false
}

fn default_p_states() -> Vec<(u32, u32)> {
    vec![(100, 20), (80, 14), (60, 9), (40, 5)]
}

/// One `(performance, power)` pair at a given P-state index.
pub type PStateRung = (u32, u32);

#[derive(Debug, Deserialize)]
struct MachineCatalogFile {
    #[serde(default)]
    machines: BTreeMap<String, MachineCatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct MachineCatalogEntry {
    #[serde(default)]
    cpu_type: u32,
    #[serde(default = "default_num_cpus")]
    num_cpus: u32,
    #[serde(default = "default_memory_size")]
    memory_size_mb: u64,
    #[serde(default = "default_gpu_capable")]
    gpu_capable: bool,
    #[serde(default = "default_p_states")]
    p_states: Vec<PStateRung>,
}

/// One entry in the resolved machine catalog, ready to seed a `MockHost`.
#[derive(Debug, Clone)]
pub struct MachineSpec {
    pub name: String,
    pub cpu: CpuType,
    pub num_cpus: u32,
    pub memory_size_mb: u64,
    pub gpu_capable: bool,
    /// Parallel `(performance, power)` tables indexed by P-state; index 0
    /// is P0.
    pub p_states: Vec<PStateRung>,
}

impl MachineSpec {
    fn default_named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cpu: CpuType(0),
            num_cpus: default_num_cpus(),
            memory_size_mb: default_memory_size(),
            gpu_capable: default_gpu_capable(),
            p_states: default_p_states(),
        }
    }
}

/// Loaded machine catalog: an ordered set of machine specs plus whether a
/// file was actually read (vs. the built-in fallback).
#[derive(Debug, Default)]
pub struct MachineCatalog {
    machines: Vec<MachineSpec>,
    loaded: bool,
}

impl MachineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the catalog from `path`. If the file parses but declares no
    /// machines, falls back to a single default machine named
    /// `"default-machine"`.
    pub fn load_from_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: MachineCatalogFile =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        self.machines.clear();
        if file.machines.is_empty() {
            self.machines.push(MachineSpec::default_named("default-machine"));
        } else {
            for (name, entry) in file.machines {
                if entry.p_states.is_empty() {
                    return Err(ConfigError::EmptyPStateLadder {
                        path: path.to_path_buf(),
                        machine: name,
                    });
                }
                self.machines.push(MachineSpec {
                    name,
                    cpu: CpuType(entry.cpu_type),
                    num_cpus: entry.num_cpus,
                    memory_size_mb: entry.memory_size_mb,
                    gpu_capable: entry.gpu_capable,
                    p_states: entry.p_states,
                });
            }
        }
        self.loaded = true;
        Ok(())
    }

    pub fn machines(&self) -> &[MachineSpec] {
        &self.machines
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}
