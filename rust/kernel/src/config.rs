// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numeric tolerances used by the consistency engine.

use serde::{Deserialize, Serialize};

/// Kernel configuration. Missing fields fall back to their defaults when
/// deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Newell vectors shorter than this mark a face as degenerate.
    pub normal_epsilon: f64,
    /// Dot products below this count as "opposite" when comparing the winding
    /// of a hole loop with its boundary.
    pub hole_alignment_epsilon: f64,
    /// Coordinate tolerance for vertex lookups.
    pub tolerance: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            normal_epsilon: 1e-15,
            hole_alignment_epsilon: 1e-12,
            tolerance: 1e-9,
        }
    }
}

impl KernelConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
