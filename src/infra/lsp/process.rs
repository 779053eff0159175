//! Language server process supervision
//!
//! Spawns the server, drains its output into a [`LogSink`] and reports how
//! it exited. Restarting is left to the session.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::timeout;

use crate::error::SessionError;

/// How long output may keep flowing after the process itself has exited
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Destination for server output and lifecycle banners
pub trait LogSink: Send + Sync {
    /// Append raw text exactly as received
    fn append(&self, text: &str);

    fn append_line(&self, line: &str) {
        self.append(&format!("{line}\n"));
    }
}

/// Forwards server output to `tracing` under the `aya_client::server` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append(&self, text: &str) {
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!(target: "aya_client::server", "{}", line);
        }
    }
}

/// How a supervised process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitEvent {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitEvent {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    /// Non-zero or signaled
    pub fn is_abnormal(&self) -> bool {
        self.code != Some(0) || self.signal.is_some()
    }
}

impl std::fmt::Display for ExitEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: Option<i32>| v.map_or_else(|| "null".to_string(), |v| v.to_string());
        write!(
            f,
            "The language server exited with {} ({})",
            show(self.code),
            show(self.signal)
        )
    }
}

/// What to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Whether the child's stdout carries the protocol or only log text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioRouting {
    /// stdin/stdout are the LSP stream, stderr goes to the sink
    Transport,
    /// stdout and stderr both go to the sink
    Log,
}

pub struct ProcessSupervisor {
    sink: Arc<dyn LogSink>,
}

impl ProcessSupervisor {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    /// Spawn and start supervising a child process
    pub fn spawn(
        &self,
        spec: &ProcessSpec,
        routing: StdioRouting,
    ) -> Result<SupervisedProcess, SessionError> {
        let program = spec.program.display().to_string();
        tracing::info!("Spawning language server: {} {:?}", program, spec.args);

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(match routing {
                StdioRouting::Transport => Stdio::piped(),
                StdioRouting::Log => Stdio::null(),
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| SessionError::spawn(&program, e))?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::spawn(&program, "failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SessionError::spawn(&program, "failed to capture stderr"))?;

        let mut drains = vec![drain(stderr, Arc::clone(&self.sink))];
        let stdio = match routing {
            StdioRouting::Transport => {
                let stdin = child
                    .stdin
                    .take()
                    .ok_or_else(|| SessionError::spawn(&program, "failed to capture stdin"))?;
                Some((stdout, stdin))
            }
            StdioRouting::Log => {
                drains.push(drain(stdout, Arc::clone(&self.sink)));
                None
            }
        };
        let drain_aborts: Vec<AbortHandle> = drains.iter().map(|d| d.abort_handle()).collect();

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = watch::channel(None);
        let sink = Arc::clone(&self.sink);

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                // Fires on explicit kill and when the handle is dropped
                _ = kill_rx => {
                    let _ = child.start_kill();
                    child.wait().await
                }
            };

            let event = match status {
                Ok(status) => ExitEvent::from_status(status),
                Err(e) => {
                    tracing::warn!("Failed to reap language server: {}", e);
                    ExitEvent {
                        code: None,
                        signal: None,
                    }
                }
            };

            let mut drains = drains;
            if timeout(DRAIN_GRACE, join_all(drains.iter_mut())).await.is_err() {
                for handle in &drains {
                    handle.abort();
                }
            }

            if event.is_abnormal() {
                tracing::warn!("{}", event);
            } else {
                tracing::debug!("{}", event);
            }
            sink.append_line(&event.to_string());
            exit_tx.send_replace(Some(event));
        });

        Ok(SupervisedProcess {
            pid,
            stdio,
            kill: Some(kill_tx),
            exit_rx,
            drain_aborts,
        })
    }
}

fn drain<R>(mut stream: R, sink: Arc<dyn LogSink>) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8192];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => sink.append(&String::from_utf8_lossy(&buf[..n])),
                Err(e) => {
                    tracing::debug!("Language server output closed: {}", e);
                    break;
                }
            }
        }
    })
}

/// Handle to a running (or exited) language server process
///
/// Dropping the handle kills the process.
pub struct SupervisedProcess {
    pid: Option<u32>,
    stdio: Option<(ChildStdout, ChildStdin)>,
    kill: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<Option<ExitEvent>>,
    drain_aborts: Vec<AbortHandle>,
}

impl SupervisedProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the protocol stream (only present for [`StdioRouting::Transport`])
    pub fn take_stdio(&mut self) -> Option<(ChildStdout, ChildStdin)> {
        self.stdio.take()
    }

    /// Watch channel that turns `Some` once the process has exited
    pub fn exit_events(&self) -> watch::Receiver<Option<ExitEvent>> {
        self.exit_rx.clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    /// Wait for the process to exit on its own
    pub async fn wait(&self) -> Option<ExitEvent> {
        let mut rx = self.exit_rx.clone();
        rx.wait_for(Option::is_some).await.ok().and_then(|e| *e)
    }

    /// Kill the process and wait until it is reaped and its output drained
    ///
    /// Nothing from this process reaches the sink after this returns.
    pub async fn kill_and_wait(&mut self) -> Option<ExitEvent> {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
        let event = self.wait().await;
        for abort in &self.drain_aborts {
            abort.abort();
        }
        event
    }
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
        for abort in &self.drain_aborts {
            abort.abort();
        }
    }
}

/// In-memory sink, shared by tests across the crate
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    buffer: std::sync::Mutex<String>,
}

#[cfg(test)]
impl MemorySink {
    pub fn contents(&self) -> String {
        self.buffer.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl LogSink for MemorySink {
    fn append(&self, text: &str) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push_str(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_event_display() {
        let clean = ExitEvent {
            code: Some(0),
            signal: None,
        };
        assert!(!clean.is_abnormal());
        assert_eq!(
            clean.to_string(),
            "The language server exited with 0 (null)"
        );

        let killed = ExitEvent {
            code: None,
            signal: Some(9),
        };
        assert!(killed.is_abnormal());
        assert_eq!(
            killed.to_string(),
            "The language server exited with null (9)"
        );
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let supervisor = ProcessSupervisor::new(Arc::new(MemorySink::default()));
        let spec = ProcessSpec::new("/definitely/not/here/aya-lsp");
        let err = supervisor.spawn(&spec, StdioRouting::Log).err().unwrap();
        assert!(matches!(err, SessionError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_and_exit_reach_sink() {
        let sink = Arc::new(MemorySink::default());
        let supervisor = ProcessSupervisor::new(sink.clone());
        let spec = ProcessSpec::new("sh").args(["-c", "echo checking; echo oops >&2; exit 3"]);

        let process = supervisor.spawn(&spec, StdioRouting::Log).unwrap();
        let event = process.wait().await.unwrap();

        assert_eq!(event.code, Some(3));
        let log = sink.contents();
        assert!(log.contains("checking"));
        assert!(log.contains("oops"));
        assert!(log.ends_with("The language server exited with 3 (null)\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_and_wait_silences_process() {
        let sink = Arc::new(MemorySink::default());
        let supervisor = ProcessSupervisor::new(sink.clone());
        let spec = ProcessSpec::new("sh").args(["-c", "while true; do echo tick; sleep 0.05; done"]);

        let mut process = supervisor.spawn(&spec, StdioRouting::Log).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        let event = process.kill_and_wait().await.unwrap();
        assert!(event.is_abnormal());

        let after_kill = sink.contents();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sink.contents(), after_kill);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transport_routing_hands_out_stdio() {
        let supervisor = ProcessSupervisor::new(Arc::new(MemorySink::default()));
        let spec = ProcessSpec::new("cat");
        let mut process = supervisor.spawn(&spec, StdioRouting::Transport).unwrap();
        assert!(process.take_stdio().is_some());
        assert!(process.take_stdio().is_none());
        process.kill_and_wait().await;
        assert!(process.has_exited());
    }
}
