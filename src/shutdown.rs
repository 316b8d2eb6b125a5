//! Shutdown Orchestration
//!
//! Schedules a delayed shutdown on every configured remote host over SSH,
//! waits for all of them to settle, then schedules the local host last.
//!
//! ```text
//! POST /system/shutdown
//!   ├── ssh tv      shutdown +1  ─┐
//!   ├── ssh lights  shutdown +1  ─┼─ settle all (failures recorded, never fatal)
//!   └── ssh nas     shutdown +1  ─┘
//!            │
//!            └── local shutdown +1
//! ```
//!
//! The grace period keeps this process alive long enough to answer; the
//! report means "scheduled", not "powered off".

use crate::error::ExecError;
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Name recorded for the local host in reports
pub const LOCAL_NAME: &str = "local";

/// A remote host to shut down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownTarget {
    pub name: String,
    pub host: String,
    pub user: String,
    /// Private key path; `~` and `$VARS` are expanded
    pub key: String,
}

/// Per-host outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success { output: String },
    Failure { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownResult {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ShutdownResult {
    pub fn from_exec(name: impl Into<String>, result: Result<String, ExecError>) -> Self {
        let outcome = match result {
            Ok(output) => Outcome::Success { output },
            Err(e) => Outcome::Failure {
                message: e.to_string(),
            },
        };

        Self {
            name: name.into(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }
}

/// Outcome of one orchestration call. `remotes` follows configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub remotes: Vec<ShutdownResult>,
    pub local: ShutdownResult,
}

/// Delayed shutdown, identical for remote and local hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownCommand {
    pub grace_minutes: u32,
}

impl Default for ShutdownCommand {
    fn default() -> Self {
        Self { grace_minutes: 1 }
    }
}

impl ShutdownCommand {
    pub fn program(&self) -> &'static str {
        "shutdown"
    }

    pub fn args(&self) -> Vec<String> {
        vec![format!("+{}", self.grace_minutes)]
    }
}

impl std::fmt::Display for ShutdownCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} +{}", self.program(), self.grace_minutes)
    }
}

/// Runs the shutdown command on a host
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run_remote(
        &self,
        target: &ShutdownTarget,
        command: &ShutdownCommand,
    ) -> Result<String, ExecError>;

    async fn run_local(&self, command: &ShutdownCommand) -> Result<String, ExecError>;
}

/// Runs commands through the system `ssh` client, and locally as a child process
#[derive(Debug, Clone)]
pub struct SshRunner {
    ssh_binary: String,
    timeout: Duration,
}

impl Default for SshRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl SshRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            timeout,
        }
    }

    fn remote_command(
        &self,
        target: &ShutdownTarget,
        command: &ShutdownCommand,
    ) -> Result<Command, ExecError> {
        let key = shellexpand::full(&target.key)
            .map_err(|e| ExecError::Spawn(format!("invalid key path {}: {}", target.key, e)))?;

        let mut cmd = Command::new(&self.ssh_binary);
        cmd.arg("-i")
            .arg(&*key)
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.timeout.as_secs().max(1)))
            .arg(format!("{}@{}", target.user, target.host))
            .arg(command.program())
            .args(command.args());
        Ok(cmd)
    }

    fn local_command(&self, command: &ShutdownCommand) -> Command {
        let mut cmd = Command::new(command.program());
        cmd.args(command.args());
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<String, ExecError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ExecError::Timeout(self.timeout))?
            .map_err(|e| ExecError::Spawn(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            // shutdown(8) reports the schedule on stderr
            return Ok(if stdout.is_empty() { stderr } else { stdout });
        }

        let message = if !stderr.is_empty() {
            stderr
        } else {
            match output.status.code() {
                Some(code) => format!("exited with status {}", code),
                None => "terminated by signal".to_string(),
            }
        };
        Err(ExecError::CommandFailed(message))
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run_remote(
        &self,
        target: &ShutdownTarget,
        command: &ShutdownCommand,
    ) -> Result<String, ExecError> {
        let cmd = self.remote_command(target, command)?;
        self.run(cmd).await
    }

    async fn run_local(&self, command: &ShutdownCommand) -> Result<String, ExecError> {
        self.run(self.local_command(command)).await
    }
}

/// Fans a shutdown out to remote hosts, then the local host
#[derive(Clone)]
pub struct ShutdownOrchestrator {
    runner: Arc<dyn CommandRunner>,
    command: ShutdownCommand,
}

impl ShutdownOrchestrator {
    pub fn new(runner: Arc<dyn CommandRunner>, command: ShutdownCommand) -> Self {
        Self { runner, command }
    }

    pub fn command(&self) -> &ShutdownCommand {
        &self.command
    }

    /// Shut down every target, then this host.
    ///
    /// Remote tasks run concurrently and are all awaited whatever their
    /// outcome; the local command is only issued after that.
    pub async fn shutdown(&self, targets: &[ShutdownTarget]) -> ShutdownReport {
        let tasks: Vec<_> = targets
            .iter()
            .cloned()
            .map(|target| {
                let runner = Arc::clone(&self.runner);
                let command = self.command.clone();
                tokio::spawn(async move {
                    info!(system = %target.name, host = %target.host, %command, "shutting down remote system");
                    runner.run_remote(&target, &command).await
                })
            })
            .collect();

        let settled = join_all(tasks).await;

        let remotes: Vec<_> = targets
            .iter()
            .zip(settled)
            .map(|(target, joined)| {
                let result = joined
                    .map_err(|e| ExecError::Join(e.to_string()))
                    .and_then(|r| r);
                if let Err(e) = &result {
                    warn!(system = %target.name, error = %e, "remote shutdown failed");
                }
                ShutdownResult::from_exec(&target.name, result)
            })
            .collect();

        info!(command = %self.command, "shutting down local system");
        let local_result = self.runner.run_local(&self.command).await;
        if let Err(e) = &local_result {
            warn!(error = %e, "local shutdown failed");
        }

        ShutdownReport {
            remotes,
            local: ShutdownResult::from_exec(LOCAL_NAME, local_result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted runner: per-host result and delay, records settle order
    #[derive(Default)]
    struct ScriptedRunner {
        script: HashMap<String, (Duration, Result<String, ExecError>)>,
        settled: AtomicUsize,
        settled_before_local: Mutex<Option<usize>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedRunner {
        fn with(mut self, name: &str, delay_ms: u64, result: Result<&str, &str>) -> Self {
            let result = result
                .map(str::to_string)
                .map_err(|m| ExecError::CommandFailed(m.to_string()));
            self.script
                .insert(name.to_string(), (Duration::from_millis(delay_ms), result));
            self
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run_remote(
            &self,
            target: &ShutdownTarget,
            _command: &ShutdownCommand,
        ) -> Result<String, ExecError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let (delay, result) = self.script.get(&target.name).cloned().unwrap_or((
                Duration::ZERO,
                Err(ExecError::CommandFailed("unknown host".into())),
            ));
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.settled.fetch_add(1, Ordering::SeqCst);

            if target.name == "panics" {
                panic!("runner blew up");
            }
            result
        }

        async fn run_local(&self, command: &ShutdownCommand) -> Result<String, ExecError> {
            *self.settled_before_local.lock() = Some(self.settled.load(Ordering::SeqCst));
            Ok(format!("scheduled {}", command))
        }
    }

    fn target(name: &str) -> ShutdownTarget {
        ShutdownTarget {
            name: name.to_string(),
            host: format!("{}.lan", name),
            user: "root".to_string(),
            key: "~/.ssh/id_ed25519".to_string(),
        }
    }

    #[tokio::test]
    async fn test_partial_failure_recorded_per_target() {
        let runner = Arc::new(
            ScriptedRunner::default()
                .with("tv", 10, Err("connection refused"))
                .with("lights", 10, Ok("ok")),
        );
        let orchestrator = ShutdownOrchestrator::new(runner, ShutdownCommand::default());

        let report = orchestrator.shutdown(&[target("tv"), target("lights")]).await;

        assert_eq!(
            report.remotes,
            vec![
                ShutdownResult {
                    name: "tv".into(),
                    outcome: Outcome::Failure {
                        message: "connection refused".into()
                    },
                },
                ShutdownResult {
                    name: "lights".into(),
                    outcome: Outcome::Success {
                        output: "ok".into()
                    },
                },
            ]
        );
        assert_eq!(report.local.name, LOCAL_NAME);
        assert!(report.local.is_success());
    }

    #[tokio::test]
    async fn test_report_has_every_target_in_order() {
        let names = ["nas", "tv", "lights", "printer", "pi"];
        let mut runner = ScriptedRunner::default();
        for (i, name) in names.iter().enumerate() {
            // Earlier targets finish last
            let delay = (names.len() - i) as u64 * 10;
            let result = if i % 2 == 0 { Err("host unreachable") } else { Ok("ok") };
            runner = runner.with(name, delay, result);
        }
        let orchestrator =
            ShutdownOrchestrator::new(Arc::new(runner), ShutdownCommand::default());

        let targets: Vec<_> = names.iter().map(|n| target(n)).collect();
        let report = orchestrator.shutdown(&targets).await;

        let reported: Vec<_> = report.remotes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(reported, names);
        assert_eq!(report.remotes.iter().filter(|r| r.is_success()).count(), 2);
    }

    #[tokio::test]
    async fn test_all_failures_still_complete() {
        let runner = Arc::new(ScriptedRunner::default());
        let orchestrator = ShutdownOrchestrator::new(runner, ShutdownCommand::default());

        let targets: Vec<_> = (0..4).map(|i| target(&format!("host{}", i))).collect();
        let report = orchestrator.shutdown(&targets).await;

        assert_eq!(report.remotes.len(), 4);
        assert!(report.remotes.iter().all(|r| !r.is_success()));
        assert!(report.local.is_success());
    }

    #[tokio::test]
    async fn test_local_runs_after_remotes_settle() {
        let runner = Arc::new(
            ScriptedRunner::default()
                .with("slow", 80, Ok("ok"))
                .with("fast", 5, Err("permission denied")),
        );
        let orchestrator = ShutdownOrchestrator::new(runner.clone(), ShutdownCommand::default());

        orchestrator.shutdown(&[target("slow"), target("fast")]).await;

        assert_eq!(*runner.settled_before_local.lock(), Some(2));
        assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_task_is_isolated() {
        let runner = Arc::new(ScriptedRunner::default().with("lights", 0, Ok("ok")));
        let orchestrator = ShutdownOrchestrator::new(runner, ShutdownCommand::default());

        let report = orchestrator.shutdown(&[target("panics"), target("lights")]).await;

        assert!(matches!(
            &report.remotes[0].outcome,
            Outcome::Failure { message } if message.starts_with("Shutdown task failed")
        ));
        assert!(report.remotes[1].is_success());
    }

    #[tokio::test]
    async fn test_no_targets_still_shuts_down_local() {
        let runner = Arc::new(ScriptedRunner::default());
        let orchestrator = ShutdownOrchestrator::new(runner, ShutdownCommand::default());

        let report = orchestrator.shutdown(&[]).await;

        assert!(report.remotes.is_empty());
        assert_eq!(report.local.outcome, Outcome::Success {
            output: "scheduled shutdown +1".into()
        });
    }

    #[test]
    fn test_report_json_shape() {
        let report = ShutdownReport {
            remotes: vec![ShutdownResult::from_exec(
                "tv",
                Err(ExecError::CommandFailed("connection refused".into())),
            )],
            local: ShutdownResult::from_exec(LOCAL_NAME, Ok("".into())),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["remotes"][0]["name"], "tv");
        assert_eq!(json["remotes"][0]["status"], "failure");
        assert_eq!(json["remotes"][0]["message"], "connection refused");
        assert_eq!(json["local"]["name"], "local");
        assert_eq!(json["local"]["status"], "success");
    }

    #[test]
    fn test_ssh_command_line() {
        std::env::set_var("CONTROL_TEST_KEYS", "/etc/control/keys");
        let runner = SshRunner::new(Duration::from_secs(10));
        let target = ShutdownTarget {
            name: "nas".into(),
            host: "10.0.0.5".into(),
            user: "admin".into(),
            key: "$CONTROL_TEST_KEYS/nas".into(),
        };

        let cmd = runner
            .remote_command(&target, &ShutdownCommand { grace_minutes: 2 })
            .unwrap();
        let std_cmd = cmd.as_std();
        let args: Vec<_> = std_cmd.get_args().map(|a| a.to_string_lossy()).collect();

        assert_eq!(std_cmd.get_program(), "ssh");
        assert_eq!(
            args,
            vec![
                "-i",
                "/etc/control/keys/nas",
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=10",
                "admin@10.0.0.5",
                "shutdown",
                "+2",
            ]
        );
    }

    #[test]
    fn test_unexpandable_key_is_an_error() {
        let runner = SshRunner::default();
        let target = ShutdownTarget {
            key: "$CONTROL_TEST_UNSET_VARIABLE/key".into(),
            ..target("tv")
        };

        let err = runner
            .remote_command(&target, &ShutdownCommand::default())
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_captures_exit_status() {
        let runner = SshRunner::new(Duration::from_secs(5));

        let mut ok = Command::new("sh");
        ok.args(["-c", "echo scheduled"]);
        assert_eq!(runner.run(ok).await.unwrap(), "scheduled");

        let mut failing = Command::new("sh");
        failing.args(["-c", "echo 'connection refused' >&2; exit 255"]);
        assert_eq!(
            runner.run(failing).await.unwrap_err(),
            ExecError::CommandFailed("connection refused".into())
        );

        let missing = Command::new("definitely-not-a-real-binary");
        assert!(matches!(runner.run(missing).await, Err(ExecError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runner_timeout() {
        let runner = SshRunner::new(Duration::from_millis(100));
        let mut slow = Command::new("sh");
        slow.args(["-c", "sleep 5"]);

        assert_eq!(
            runner.run(slow).await.unwrap_err(),
            ExecError::Timeout(Duration::from_millis(100))
        );
    }
}
