// SPDX-License-Identifier: MIT

//! Structured errors for the demo harness's config loader.
//!
//! A top-level `thiserror`-derived enum for "what went wrong", with
//! `#[source]`-chained variants for the underlying I/O or parse failure.
//! The policy callback surface itself never produces a `Result` — this
//! type exists purely for the config/CLI boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Failures loading or interpreting the demo harness's machine catalog.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read machine catalog at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse machine catalog at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("machine catalog at {path} declares zero P-states for machine '{machine}'")]
    EmptyPStateLadder { path: PathBuf, machine: String },
}
