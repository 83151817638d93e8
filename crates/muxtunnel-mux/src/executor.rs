//! TmuxCommandRunner trait and the real subprocess executor.

use crate::error::MuxError;

/// Trait for executing tmux commands. Enables mock injection for testing.
pub trait TmuxCommandRunner: Send + Sync {
    /// Run a tmux command and return stdout on success.
    fn run(&self, args: &[&str]) -> Result<String, MuxError>;

    /// Run a tmux command and report only whether it exited successfully.
    /// Used for probes like `has-session` where failure is an answer, not
    /// an error.
    fn succeeds(&self, args: &[&str]) -> bool {
        self.run(args).is_ok()
    }
}

impl<T: TmuxCommandRunner + ?Sized> TmuxCommandRunner for &T {
    fn run(&self, args: &[&str]) -> Result<String, MuxError> {
        (**self).run(args)
    }

    fn succeeds(&self, args: &[&str]) -> bool {
        (**self).succeeds(args)
    }
}

/// Real tmux executor using `std::process::Command`.
///
/// Each call spawns a new `tmux` process, so the executor is `Send + Sync`
/// with no interior mutability.
pub struct TmuxExecutor {
    tmux_bin: String,
}

impl TmuxExecutor {
    pub fn new() -> Self {
        Self {
            tmux_bin: "tmux".into(),
        }
    }

    pub fn with_bin(bin: impl Into<String>) -> Self {
        Self {
            tmux_bin: bin.into(),
        }
    }
}

impl Default for TmuxExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxCommandRunner for TmuxExecutor {
    fn run(&self, args: &[&str]) -> Result<String, MuxError> {
        let output = std::process::Command::new(&self.tmux_bin)
            .args(args)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MuxError::NotFound
                } else {
                    MuxError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MuxError::command_failed(
                args.first().copied().unwrap_or("tmux"),
                output.status.code().unwrap_or(-1),
                &stderr,
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
