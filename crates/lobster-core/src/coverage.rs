//! Coverage per level

use crate::config::Config;
use crate::item::{ItemMap, TracingStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Coverage of a single level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coverage {
    /// Number of items assigned to the level
    pub items: usize,

    /// Items whose status is OK or JUSTIFIED
    pub ok: usize,
}

impl Coverage {
    /// Count one item with the given status.
    pub fn record(&mut self, status: Option<TracingStatus>) {
        self.items += 1;
        if status.is_some_and(|s| s.is_covered()) {
            self.ok += 1;
        }
    }

    /// Coverage percentage (0.0 - 100.0); 0.0 for a level without items.
    pub fn percentage(&self) -> f64 {
        if self.items == 0 {
            return 0.0;
        }
        (self.ok * 100) as f64 / self.items as f64
    }

    /// Whether the coverage is at or above `threshold` percent
    pub fn is_passing(&self, threshold: f64) -> bool {
        self.percentage() >= threshold
    }
}

/// Coverage of every level of `config`. Items on levels outside the
/// policy are not counted.
pub fn compute_coverage(config: &Config, items: &ItemMap) -> BTreeMap<String, Coverage> {
    let mut coverage: BTreeMap<String, Coverage> = config
        .names()
        .map(|name| (name.to_string(), Coverage::default()))
        .collect();

    for item in items.values() {
        if let Some(level) = coverage.get_mut(&item.level) {
            level.record(item.tracing_status);
        }
    }

    for (level, c) in &coverage {
        debug!(%level, items = c.items, ok = c.ok, percentage = c.percentage(), "coverage");
    }
    coverage
}
