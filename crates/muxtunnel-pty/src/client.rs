//! One PTY client: a child process on its own pseudo-terminal.

use std::io::{Read, Write};
use std::sync::Arc;

use portable_pty::{Child, CommandBuilder, MasterPty, NativePtySystem, PtySize, PtySystem};
use tokio::sync::{mpsc, Mutex};

use crate::error::PtyError;

/// Read buffer size for the blocking PTY reader.
const READ_BUF_SIZE: usize = 8192;

/// Outbound event channel depth. Deep enough to absorb bursts without the
/// reader thread stalling on a slow WebSocket.
const EVENT_CHANNEL_DEPTH: usize = 64;

/// Events emitted by the PTY reader, delivered in read order.
#[derive(Debug)]
pub enum PtyEvent {
    /// Raw bytes exactly as read; never re-chunked.
    Data(Vec<u8>),
    /// The child exited (EOF on the PTY).
    Exit { code: Option<u32> },
    /// A read error; the stream ends after this.
    Error(String),
}

/// Handle to one attached PTY child.
///
/// The reader runs on the blocking pool and feeds the event receiver
/// returned by [`PtyClient::open`]. Dropping the receiver ends the reader;
/// [`PtyClient::close`] ends the child.
pub struct PtyClient {
    target: String,
    child_pid: Option<u32>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    child: Arc<std::sync::Mutex<Box<dyn Child + Send + Sync>>>,
}

impl PtyClient {
    /// Attach to a tmux pane target at the given terminal size.
    pub async fn open(
        target: &str,
        cols: u16,
        rows: u16,
    ) -> Result<(Self, mpsc::Receiver<PtyEvent>), PtyError> {
        let mut cmd = CommandBuilder::new("tmux");
        cmd.args(["attach-session", "-t", target]);
        Self::spawn(target, cmd, cols, rows).await
    }

    /// Spawn an arbitrary command on a fresh PTY. Split out from
    /// [`open`](Self::open) so tests can run without a tmux server.
    pub async fn spawn(
        target: &str,
        mut cmd: CommandBuilder,
        cols: u16,
        rows: u16,
    ) -> Result<(Self, mpsc::Receiver<PtyEvent>), PtyError> {
        apply_terminal_env(&mut cmd);

        let target = target.to_string();
        let (tx, rx) = mpsc::channel::<PtyEvent>(EVENT_CHANNEL_DEPTH);

        let client = tokio::task::spawn_blocking(move || {
            let pty_system = NativePtySystem::default();
            let pair = pty_system
                .openpty(PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .map_err(|e| PtyError::Open(e.to_string()))?;

            let child = pair
                .slave
                .spawn_command(cmd)
                .map_err(|e| PtyError::Spawn(e.to_string()))?;

            // Communication happens exclusively through the master side.
            drop(pair.slave);

            let child_pid = child.process_id();
            let writer = pair
                .master
                .take_writer()
                .map_err(|e| PtyError::Open(e.to_string()))?;
            let reader = pair
                .master
                .try_clone_reader()
                .map_err(|e| PtyError::Open(e.to_string()))?;

            let client = PtyClient {
                target,
                child_pid,
                writer: Arc::new(Mutex::new(writer)),
                master: Arc::new(Mutex::new(pair.master)),
                child: Arc::new(std::sync::Mutex::new(child)),
            };

            let child_handle = Arc::clone(&client.child);
            std::thread::Builder::new()
                .name(format!("pty-read-{}", client.target))
                .spawn(move || read_loop(reader, tx, child_handle))
                .map_err(PtyError::Io)?;

            Ok::<_, PtyError>(client)
        })
        .await??;

        Ok((client, rx))
    }

    /// PID of the attached child, used as the hook-endpoint lookup key.
    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Write raw bytes to the child's stdin. Writes are applied in call
    /// order; bytes are never transformed.
    pub async fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    /// Resize the PTY. Best-effort and idempotent.
    pub async fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        let master = self.master.lock().await;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Resize(e.to_string()))
    }

    /// Signal the child and reap it. Always completes; errors on the way
    /// out are logged, not returned.
    pub async fn close(&self) {
        let child = Arc::clone(&self.child);
        let target = self.target.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut child = child.lock().unwrap();
            if let Err(e) = child.kill() {
                // Usually already exited.
                tracing::debug!(target = %target, error = %e, "pty child kill failed");
            }
            if let Err(e) = child.wait() {
                tracing::debug!(target = %target, error = %e, "pty child wait failed");
            }
        })
        .await;

        if let Err(e) = result {
            tracing::warn!(target = %self.target, error = %e, "pty close task failed");
        }
    }
}

/// Force a sane terminal environment for the child.
fn apply_terminal_env(cmd: &mut CommandBuilder) {
    cmd.env("TERM", "xterm-256color");
    cmd.env("COLORTERM", "truecolor");
    for var in ["LANG", "LC_ALL"] {
        match std::env::var(var) {
            Ok(val) if !val.is_empty() => cmd.env(var, val),
            _ => cmd.env(var, "en_US.UTF-8"),
        }
    }
}

/// Blocking read loop: every successful read is forwarded unchanged.
fn read_loop(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<PtyEvent>,
    child: Arc<std::sync::Mutex<Box<dyn Child + Send + Sync>>>,
) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                // EOF: child exited (or the master was closed).
                let code = child
                    .lock()
                    .ok()
                    .and_then(|mut c| c.try_wait().ok().flatten())
                    .map(|status| status.exit_code());
                let _ = tx.blocking_send(PtyEvent::Exit { code });
                return;
            }
            Ok(n) => {
                if tx.blocking_send(PtyEvent::Data(buf[..n].to_vec())).is_err() {
                    // Receiver gone: the client disconnected.
                    return;
                }
            }
            Err(e) => {
                // On Linux the master read fails with EIO once the child
                // side is closed; treat that as a normal exit.
                if e.raw_os_error() == Some(EIO) {
                    let code = child
                        .lock()
                        .ok()
                        .and_then(|mut c| c.try_wait().ok().flatten())
                        .map(|status| status.exit_code());
                    let _ = tx.blocking_send(PtyEvent::Exit { code });
                } else {
                    let _ = tx.blocking_send(PtyEvent::Error(e.to_string()));
                }
                return;
            }
        }
    }
}

/// `EIO`, returned by a master-side read after the slave side closes.
const EIO: i32 = 5;
