use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// A single external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turns a non-zero exit into [`Error::ToolFailed`].
    pub fn check(self, tool: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::ToolFailed {
                tool: tool.to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs external programs. A non-zero exit is reported through
/// [`ToolOutput::code`], not as an error; only launch failures and
/// cancellation are errors.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput>;
}

/// Spawns real subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tracing::debug!(command = %invocation, "Running external tool");

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ToolMissing {
                    tool: invocation.program.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        // Dropping the wait future on cancellation kills the child.
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            output = child.wait_with_output() => output?,
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_reports_exit_code_and_stderr() {
        let output = ToolOutput {
            code: Some(2),
            stdout: Vec::new(),
            stderr: "  no such track \n".to_string(),
        };
        match output.check("mkvextract") {
            Err(Error::ToolFailed { tool, code, stderr }) => {
                assert_eq!(tool, "mkvextract");
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "no such track");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_invocation_display() {
        let invocation = ToolInvocation::new("ffprobe").args(["-v", "quiet"]);
        assert_eq!(invocation.to_string(), "ffprobe -v quiet");
    }

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let invocation = ToolInvocation::new("tvrename-definitely-not-installed");
        let result = ProcessRunner
            .run(&invocation, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::ToolMissing { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_launch() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = ProcessRunner
            .run(&ToolInvocation::new("ffprobe"), &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_stops_running_process() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = ProcessRunner
            .run(&ToolInvocation::new("sleep").arg("10"), &cancel)
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
