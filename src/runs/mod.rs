//! Script execution and live output fan-out.
//!
//! Every run gets a 12-char hex id and an unbounded event channel. A pump
//! task forwards stdout/stderr lines into the channel, appends the exit
//! marker, and closes with [`RunEvent::Done`]. The SSE handler detaches the
//! channel with [`RunManager::take_stream`]; runs nobody streams are pruned
//! by the janitor after a grace period.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::lifecycle::LifecycleComponent;
use crate::platform::{NativePlatform, Platform};
use crate::store::short_id;

pub const RUN_ID_LEN: usize = 12;
/// Finished runs whose output was never collected are dropped after this.
const FINISHED_RUN_TTL: Duration = Duration::from_secs(600);
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub enum RunEvent {
    Line(String),
    Done,
}

struct RunHandle {
    receiver: Option<UnboundedReceiver<RunEvent>>,
    pid: Option<u32>,
    finished_at: Option<Instant>,
}

#[derive(Clone, Default)]
pub struct RunManager {
    runs: Arc<Mutex<HashMap<String, RunHandle>>>,
}

impl RunManager {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a script and return the id its output is streamed under.
    /// Spawn failures surface as output lines, never as an error here.
    pub async fn start(&self, script_path: PathBuf, input: Option<String>, sudo: bool) -> String {
        let run_id = short_id(RUN_ID_LEN);
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut runs = self.runs.lock().await;
            runs.insert(
                run_id.clone(),
                RunHandle {
                    receiver: Some(rx),
                    pid: None,
                    finished_at: None,
                },
            );
        }
        let manager = self.clone();
        let id = run_id.clone();
        tokio::spawn(async move {
            manager.pump(id, script_path, input, sudo, tx).await;
        });
        run_id
    }

    async fn pump(
        &self,
        run_id: String,
        script_path: PathBuf,
        input: Option<String>,
        sudo: bool,
        tx: UnboundedSender<RunEvent>,
    ) {
        let mut cmd = if sudo {
            NativePlatform::sudo_shell_command_async(&script_path)
        } else {
            NativePlatform::shell_command_async(&script_path)
        };
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so stopping a run also reaps its children.
        #[cfg(unix)]
        cmd.process_group(0);

        if sudo {
            let _ = tx.send(RunEvent::Line(
                "[sudo mode enabled: requires passwordless sudo for this command]\n".to_string(),
            ));
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Run {} could not spawn: {}", run_id, e);
                let _ = tx.send(RunEvent::Line(format!("\n[Error: {}]\n", e)));
                let _ = tx.send(RunEvent::Done);
                self.mark_finished(&run_id).await;
                return;
            }
        };

        if let Some(pid) = child.id() {
            let mut runs = self.runs.lock().await;
            if let Some(handle) = runs.get_mut(&run_id) {
                handle.pid = Some(pid);
            }
        }

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, tx.clone())));
        }

        // Readers must be draining before stdin is written, or a chatty
        // script can fill the pipe and deadlock against the write.
        if let Some(mut stdin) = child.stdin.take() {
            if let Some(text) = input {
                let mut payload = text;
                if !payload.ends_with('\n') {
                    payload.push('\n');
                }
                let _ = stdin.write_all(payload.as_bytes()).await;
            }
            drop(stdin);
        }

        let exit = child.wait().await;
        for reader in readers {
            let _ = reader.await;
        }

        match exit {
            Ok(status) => {
                let code = exit_code(&status);
                tracing::info!("Run {} exited with code {}", run_id, code);
                let _ = tx.send(RunEvent::Line(format!(
                    "\n[Process exited with code {}]\n",
                    code
                )));
            }
            Err(e) => {
                tracing::warn!("Run {} failed: {}", run_id, e);
                let _ = tx.send(RunEvent::Line(format!("\n[Error: {}]\n", e)));
            }
        }
        let _ = tx.send(RunEvent::Done);
        self.mark_finished(&run_id).await;
    }

    async fn mark_finished(&self, run_id: &str) {
        let mut runs = self.runs.lock().await;
        if let Some(handle) = runs.get_mut(run_id) {
            handle.pid = None;
            handle.finished_at = Some(Instant::now());
        }
    }

    /// Detach the output feed for a run. Each run can be streamed once;
    /// unknown and already-streamed ids both come back empty.
    pub async fn take_stream(&self, run_id: &str) -> Option<UnboundedReceiver<RunEvent>> {
        let mut runs = self.runs.lock().await;
        runs.get_mut(run_id).and_then(|handle| handle.receiver.take())
    }

    /// Signal a run's process group to terminate. `false` means the id is unknown.
    pub async fn stop(&self, run_id: &str) -> bool {
        let pid = {
            let runs = self.runs.lock().await;
            match runs.get(run_id) {
                Some(handle) => handle.pid,
                None => return false,
            }
        };
        if let Some(pid) = pid {
            let pid = pid.to_string();
            let group_killed = NativePlatform::kill_process_group(&pid)
                .map(|out| out.status.success())
                .unwrap_or(false);
            if !group_killed {
                let _ = NativePlatform::kill_process(&pid);
            }
        }
        true
    }

    /// Forget a run once its stream has delivered `Done`.
    pub async fn remove(&self, run_id: &str) {
        let mut runs = self.runs.lock().await;
        runs.remove(run_id);
    }

    pub fn spawn_janitor(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                ticker.tick().await;
                manager.prune(FINISHED_RUN_TTL).await;
            }
        })
    }

    async fn prune(&self, ttl: Duration) {
        let mut runs = self.runs.lock().await;
        let before = runs.len();
        runs.retain(|_, handle| match handle.finished_at {
            Some(at) => at.elapsed() < ttl,
            None => true,
        });
        let dropped = before - runs.len();
        if dropped > 0 {
            tracing::debug!("Pruned {} finished runs", dropped);
        }
    }
}

async fn forward_lines<R>(reader: R, tx: UnboundedSender<RunEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(RunEvent::Line(format!("{}\n", line))).is_err() {
            break;
        }
    }
}

/// Unix convention: negative exit codes mark death by signal.
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

/// Periodically drops finished runs nobody ever streamed.
pub struct RunJanitor {
    runs: RunManager,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl RunJanitor {
    pub fn new(runs: RunManager) -> Self {
        Self { runs, task: None }
    }
}

#[async_trait]
impl LifecycleComponent for RunJanitor {
    async fn on_start(&mut self) -> Result<()> {
        self.task = Some(self.runs.spawn_janitor());
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}
