//! Scripted toolbox for functional tests.
//!
//! [`MockToolbox`] stands in for the pod-exec transport: each command is
//! matched against scripted prefixes (longest match wins) and answered from
//! a queue of canned outputs. The last queued output repeats, so a test can
//! script a transition once and keep polling. Every command is recorded for
//! assertion.

use std::sync::Mutex;

use rook_ceph_harness::{CommandRunner, Error, Result};

/// Opt-in log output: `RUST_LOG=debug cargo test --test functional -- --nocapture`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Output of `ceph status` with a rebalance still in flight.
pub const STATUS_REBALANCING: &str = r#"{
  "health": {"status": "HEALTH_WARN"},
  "pgmap": {
    "num_pgs": 192,
    "pgs_by_state": [
      {"state_name": "active+clean", "count": 120},
      {"state_name": "active+remapped+backfilling", "count": 72}
    ]
  }
}"#;

/// Output of `ceph status` once every PG is active+clean.
pub const STATUS_CLEAN: &str = r#"{
  "health": {"status": "HEALTH_OK"},
  "pgmap": {
    "num_pgs": 192,
    "pgs_by_state": [
      {"state_name": "active+clean", "count": 192}
    ]
  }
}"#;

/// Output of `ceph df` for a small three-OSD cluster.
pub const CEPH_DF: &str = r#"{
  "stats": {"total_bytes": 1649267441664}
}"#;

/// Output of `ceph osd df` with one slightly hot OSD.
pub const OSD_DF: &str = r#"{
  "nodes": [
    {"name": "osd.0", "utilization": 52.1, "pgs": 98},
    {"name": "osd.1", "utilization": 55.7, "pgs": 101},
    {"name": "osd.2", "utilization": 54.3, "pgs": 103}
  ]
}"#;

pub struct MockToolbox {
    scripts: Mutex<Vec<(String, Vec<String>)>>,
    commands: Mutex<Vec<String>>,
}

impl MockToolbox {
    /// Script a set of command prefixes, each with a queue of outputs.
    pub fn new(entries: &[(&str, &[&str])]) -> Self {
        let scripts = entries
            .iter()
            .map(|(prefix, outputs)| {
                (
                    prefix.to_string(),
                    outputs.iter().map(|o| o.to_string()).collect(),
                )
            })
            .collect();
        Self {
            scripts: Mutex::new(scripts),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Every command the surface has issued, in order.
    pub fn issued(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl CommandRunner for MockToolbox {
    async fn run(&self, command: &str) -> Result<String> {
        self.commands.lock().unwrap().push(command.to_string());

        let mut scripts = self.scripts.lock().unwrap();
        let best = scripts
            .iter_mut()
            .filter(|(prefix, _)| command.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        match best {
            Some((_, queue)) => Ok(if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue.first().cloned().unwrap_or_default()
            }),
            None => Err(Error::Exec(format!("unscripted command: {command}"))),
        }
    }
}
