//! Throughput Report Records
//!
//! One table per workload: a row per thread count, a column per engine,
//! cells in operations per second (un-scaled). Rows are filled from
//! `workload::run_mix` results, one cell per engine and thread count.
//!
//! ```json
//! {
//!   "label": "Zipf (s=0.3)",
//!   "engines": ["RCU", "MV-RLU"],
//!   "rows": [{ "Threads": 1, "RCU": 1200000.0, "MV-RLU": 980000.0 }]
//! }
//! ```

use indexmap::IndexMap;
use mvrlu::{MvrluError, Result};
use serde::{Deserialize, Serialize};

/// Throughput of every engine at one thread count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputRow {
    #[serde(rename = "Threads")]
    pub threads: usize,
    #[serde(flatten)]
    pub ops_per_sec: IndexMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputTable {
    pub label: String,
    pub engines: Vec<String>,
    pub rows: Vec<ThroughputRow>,
}

impl ThroughputTable {
    pub fn new<I, S>(label: impl Into<String>, engines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            engines: engines.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Record `ops_per_sec` of `engine` at `threads`
    ///
    /// Rows stay sorted by thread count; cells keep the engine column order.
    pub fn record(&mut self, threads: usize, engine: &str, ops_per_sec: f64) -> Result<()> {
        if !self.engines.iter().any(|e| e == engine) {
            return Err(MvrluError::InvalidArgument(format!(
                "unknown engine '{}' for table '{}'",
                engine, self.label
            )));
        }

        let index = match self.rows.binary_search_by_key(&threads, |r| r.threads) {
            Ok(index) => index,
            Err(index) => {
                self.rows.insert(index, ThroughputRow {
                    threads,
                    ops_per_sec: IndexMap::new(),
                });
                index
            },
        };

        let row = &mut self.rows[index];
        row.ops_per_sec.insert(engine.to_string(), ops_per_sec);
        let engines = &self.engines;
        row.ops_per_sec.sort_by(|a, _, b, _| {
            let pos = |name: &String| engines.iter().position(|e| e == name);
            pos(a).cmp(&pos(b))
        });
        Ok(())
    }

    pub fn get(&self, threads: usize, engine: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.threads == threads)
            .and_then(|r| r.ops_per_sec.get(engine).copied())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MvrluError::Internal(format!("report serialization failed: {}", e)))
    }
}
