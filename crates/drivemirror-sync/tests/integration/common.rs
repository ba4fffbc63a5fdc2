//! Shared test helpers: an in-memory mirroring tool
//!
//! [`FakeMirrorTool`] keeps a source folder and a destination bucket as
//! name → size maps. `transfer` copies files the destination lacks or holds
//! at a different size, `purge` empties the bucket, and every call is logged
//! so tests can assert on ordering.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use drivemirror_core::{
    config::{Config, ConfigBuilder},
    domain::{Remote, RemoteSize},
    ports::{IMirrorTool, ToolOutput},
};
use drivemirror_sync::{
    jobs::{JobRunner, TaskId, TaskState},
    orchestrator::SyncOrchestrator,
};

#[derive(Debug, Default)]
struct FakeState {
    source: BTreeMap<String, u64>,
    destination: BTreeMap<String, u64>,
    source_reachable: bool,
    destination_reachable: bool,
    setup_error: Option<String>,
    probe_error: bool,
    purge_error: Option<String>,
    list_error: bool,
    transfer_exit: Option<i32>,
    spawn_error: Option<String>,
    transfer_delay: Option<Duration>,
    skipped_by_filter: Vec<String>,
    calls: Vec<String>,
    transfer_args: Vec<Vec<String>>,
    last_copied: usize,
    active_transfers: usize,
    max_active_transfers: usize,
}

pub struct FakeMirrorTool {
    state: Mutex<FakeState>,
}

impl FakeMirrorTool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                source_reachable: true,
                destination_reachable: true,
                transfer_exit: Some(0),
                ..Default::default()
            }),
        }
    }

    /// Source folder holding `count` files totalling `total_bytes`
    pub fn with_source_files(self, count: usize, total_bytes: u64) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.source.clear();
            if count > 0 {
                let each = total_bytes / count as u64;
                for i in 0..count {
                    let size = if i == count - 1 {
                        total_bytes - each * (count as u64 - 1)
                    } else {
                        each
                    };
                    state.source.insert(file_name(i), size);
                }
            }
        }
        self
    }

    pub fn with_destination_file(self, name: &str, size: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .destination
            .insert(name.to_string(), size);
        self
    }

    pub fn with_unreachable_source(self) -> Self {
        self.state.lock().unwrap().source_reachable = false;
        self
    }

    pub fn with_unreachable_destination(self) -> Self {
        self.state.lock().unwrap().destination_reachable = false;
        self
    }

    pub fn with_setup_error(self, message: &str) -> Self {
        self.state.lock().unwrap().setup_error = Some(message.to_string());
        self
    }

    pub fn with_probe_error(self) -> Self {
        self.state.lock().unwrap().probe_error = true;
        self
    }

    pub fn with_purge_error(self, message: &str) -> Self {
        self.state.lock().unwrap().purge_error = Some(message.to_string());
        self
    }

    pub fn with_list_error(self) -> Self {
        self.state.lock().unwrap().list_error = true;
        self
    }

    pub fn with_transfer_exit(self, code: i32) -> Self {
        self.state.lock().unwrap().transfer_exit = Some(code);
        self
    }

    pub fn with_spawn_error(self, message: &str) -> Self {
        self.state.lock().unwrap().spawn_error = Some(message.to_string());
        self
    }

    pub fn with_transfer_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().transfer_delay = Some(delay);
        self
    }

    /// A file the transfer silently leaves out while still exiting 0
    pub fn with_skipped_file(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .skipped_by_filter
            .push(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn transfer_args(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().transfer_args.clone()
    }

    pub fn last_copied(&self) -> usize {
        self.state.lock().unwrap().last_copied
    }

    pub fn destination_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .destination
            .keys()
            .cloned()
            .collect()
    }

    pub fn max_active_transfers(&self) -> usize {
        self.state.lock().unwrap().max_active_transfers
    }

    fn is_source(remote: &Remote) -> bool {
        remote.name() == "gdrive"
    }

    /// Performs the copy step of a transfer; returns the number of files copied
    fn copy_files(state: &mut FakeState) -> usize {
        let mut copied = 0;
        let files: Vec<(String, u64)> = state
            .source
            .iter()
            .map(|(name, size)| (name.clone(), *size))
            .collect();
        for (name, size) in files {
            if state.skipped_by_filter.contains(&name) {
                continue;
            }
            if state.destination.get(&name) != Some(&size) {
                state.destination.insert(name, size);
                copied += 1;
            }
        }
        copied
    }
}

#[async_trait::async_trait]
impl IMirrorTool for FakeMirrorTool {
    async fn setup(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("setup".into());
        match &state.setup_error {
            Some(message) => anyhow::bail!("{message}"),
            None => Ok(()),
        }
    }

    async fn probe_size(&self, remote: &Remote) -> anyhow::Result<RemoteSize> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("probe:{remote}"));
        if state.probe_error {
            anyhow::bail!("size: unparsable output");
        }
        let files = if Self::is_source(remote) {
            &state.source
        } else {
            &state.destination
        };
        Ok(RemoteSize::new(files.len() as u64, files.values().sum()))
    }

    async fn list_shallow(&self, remote: &Remote) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("lsf:{remote}"));
        let reachable = if Self::is_source(remote) {
            state.source_reachable
        } else {
            state.destination_reachable
        };
        if !reachable {
            anyhow::bail!("rclone lsf failed with exit code 1: couldn't connect");
        }
        Ok(())
    }

    async fn list_files(&self, remote: &Remote) -> anyhow::Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list_files:{remote}"));
        if state.list_error {
            anyhow::bail!("rclone lsf failed with exit code 3: directory not found");
        }
        Ok(state.destination.keys().cloned().collect())
    }

    async fn transfer(&self, args: &[String]) -> anyhow::Result<ToolOutput> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push("transfer".into());
            state.transfer_args.push(args.to_vec());
            if let Some(message) = &state.spawn_error {
                anyhow::bail!("{message}");
            }
            state.active_transfers += 1;
            state.max_active_transfers = state.max_active_transfers.max(state.active_transfers);
            state.transfer_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.active_transfers -= 1;
        let exit_code = state.transfer_exit;
        let dry_run = args.iter().any(|a| a == "--dry-run");

        let copied = if exit_code == Some(0) && !dry_run {
            Self::copy_files(&mut state)
        } else {
            0
        };
        state.last_copied = copied;

        Ok(ToolOutput {
            exit_code,
            stdout: format!("Transferred: {copied}\n"),
            stderr: if exit_code == Some(0) {
                String::new()
            } else {
                "ERROR: transfer failed\n".to_string()
            },
        })
    }

    async fn purge(&self, remote: &Remote) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("purge:{remote}"));
        if let Some(message) = &state.purge_error {
            anyhow::bail!("{message}");
        }
        state.destination.clear();
        Ok(())
    }
}

pub fn file_name(i: usize) -> String {
    format!("file_{i:03}.csv")
}

/// Configuration for the `gdrive:Reports/` → `s3:reports-mirror` pair
pub fn config() -> Config {
    ConfigBuilder::new()
        .source_folder("Reports")
        .destination_bucket("reports-mirror")
        .build()
}

pub fn config_with_critical(names: &[&str]) -> Config {
    let mut config = config();
    config.sync.critical_files = names.iter().map(|n| n.to_string()).collect();
    config
}

pub fn orchestrator(tool: &Arc<FakeMirrorTool>, config: Config) -> Arc<SyncOrchestrator> {
    let tool: Arc<dyn IMirrorTool> = tool.clone();
    Arc::new(SyncOrchestrator::new(Arc::new(config), tool).expect("valid remotes"))
}

pub fn runner(tool: &Arc<FakeMirrorTool>, config: Config) -> JobRunner {
    let limits = config.jobs.clone();
    JobRunner::new(orchestrator(tool, config), limits)
}

/// Polls until `id` is finished, collecting every state observed on the way
pub async fn wait_finished(runner: &JobRunner, id: &TaskId) -> (TaskState, Vec<TaskState>) {
    let mut seen = Vec::new();
    for _ in 0..10_000 {
        let state = runner.status(id);
        if state.is_finished() {
            return (state, seen);
        }
        if seen.last() != Some(&state) {
            seen.push(state);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("task {id} did not finish");
}
