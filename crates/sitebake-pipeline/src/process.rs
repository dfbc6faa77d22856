//! Spawning and stopping external processes.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

/// Where a process's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Share our stdout/stderr
    Inherit,

    /// Capture it and forward each line to debug logs
    Logged,
}

/// A command to run.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Short name used in logs
    pub label: String,

    /// Executable
    pub program: OsString,

    /// Arguments
    pub args: Vec<OsString>,

    /// Output handling
    pub output: OutputMode,
}

impl ProcessSpec {
    /// Run `program` directly.
    pub fn new(label: impl Into<String>, program: impl Into<OsString>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            output: OutputMode::Inherit,
        }
    }

    /// Run a command line through the platform shell.
    pub fn shell(label: impl Into<String>, command_line: &str) -> Self {
        if cfg!(windows) {
            Self::new(label, "cmd").args(["/C", command_line])
        } else {
            Self::new(label, "sh").args(["-c", command_line])
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set output handling.
    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        match self.output {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Logged => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }
        cmd
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl ProcessExit {
    /// Exit with `code`.
    pub fn code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "code {}", code),
            None => f.write_str("no exit code (terminated by signal)"),
        }
    }
}

/// Starts external processes.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Handle type for background processes.
    type Process: BackgroundProcess;

    /// Run `spec` to completion.
    async fn run(&self, spec: &ProcessSpec) -> io::Result<ProcessExit>;

    /// Start `spec` in the background.
    async fn spawn(&self, spec: &ProcessSpec) -> io::Result<Self::Process>;
}

/// A process running in the background.
#[async_trait]
pub trait BackgroundProcess: Send {
    /// Stop the process. Consumes the handle, so it happens at most once.
    async fn terminate(self) -> io::Result<()>;
}

/// Launches real operating system processes.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    /// How long a terminated process gets to exit before it is killed
    pub grace: Duration,
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl Launcher for SystemLauncher {
    type Process = ChildProcess;

    async fn run(&self, spec: &ProcessSpec) -> io::Result<ProcessExit> {
        tracing::debug!("Running {}", spec);

        let mut child = spec.command().kill_on_drop(true).spawn()?;
        forward_output(&spec.label, &mut child);

        let status = child.wait().await?;
        Ok(ProcessExit {
            code: status.code(),
        })
    }

    async fn spawn(&self, spec: &ProcessSpec) -> io::Result<ChildProcess> {
        tracing::debug!("Spawning {}", spec);

        let mut cmd = spec.command();
        cmd.kill_on_drop(true);

        // Own process group, so the whole tree (e.g. npm and the server it starts)
        // can be signalled at once.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn()?;
        forward_output(&spec.label, &mut child);

        Ok(ChildProcess {
            child,
            label: spec.label.clone(),
            grace: self.grace,
        })
    }
}

/// A background child process. Killed on drop if not terminated first.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    label: String,
    grace: Duration,
}

impl ChildProcess {
    /// OS process id, if the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        if let Some(pid) = self.child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
                tracing::debug!("Failed to signal {} ({}): {}", self.label, pid, e);
            }
        }
    }
}

#[async_trait]
impl BackgroundProcess for ChildProcess {
    async fn terminate(mut self) -> io::Result<()> {
        tracing::debug!("Stopping {} (pid: {:?})", self.label, self.child.id());

        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGTERM);
        #[cfg(not(unix))]
        self.child.start_kill()?;

        match tokio::time::timeout(self.grace, self.child.wait()).await {
            Ok(status) => {
                status?;
            }
            Err(_) => {
                tracing::warn!("{} did not stop within {:?}, killing it", self.label, self.grace);
                #[cfg(unix)]
                self.signal_group(nix::sys::signal::Signal::SIGKILL);
                self.child.kill().await?;
            }
        }

        Ok(())
    }
}

/// Forward captured stdout/stderr lines to debug logs.
fn forward_output(label: &str, child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        spawn_line_logger(label.to_string(), stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_logger(label.to_string(), stderr);
    }
}

fn spawn_line_logger<R>(label: String, reader: R)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!("[{}] {}", label, line);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_spec_wraps_command_line() {
        let spec = ProcessSpec::shell("build", "npm run build");

        if cfg!(windows) {
            assert_eq!(spec.to_string(), "cmd /C npm run build");
        } else {
            assert_eq!(spec.to_string(), "sh -c npm run build");
        }
        assert_eq!(spec.output, OutputMode::Inherit);
    }

    #[test]
    fn describes_exits() {
        assert!(ProcessExit::code(0).success());
        assert!(!ProcessExit::code(1).success());
        assert!(!ProcessExit { code: None }.success());
        assert_eq!(ProcessExit::code(2).to_string(), "code 2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_to_completion_with_exit_code() {
        let launcher = SystemLauncher::default();

        let exit = launcher
            .run(&ProcessSpec::shell("fail", "exit 3"))
            .await
            .unwrap();
        assert_eq!(exit, ProcessExit::code(3));

        let exit = launcher
            .run(&ProcessSpec::shell("ok", "true").output(OutputMode::Logged))
            .await
            .unwrap();
        assert!(exit.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_errors_for_missing_program() {
        let launcher = SystemLauncher::default();

        let result = launcher
            .run(&ProcessSpec::new("missing", "/nonexistent/sitebake-test"))
            .await;

        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminates_background_process_promptly() {
        let launcher = SystemLauncher {
            grace: Duration::from_secs(5),
        };

        let process = launcher
            .spawn(&ProcessSpec::shell("sleeper", "sleep 30").output(OutputMode::Logged))
            .await
            .unwrap();
        assert!(process.id().is_some());

        let start = std::time::Instant::now();
        process.terminate().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kills_process_ignoring_sigterm_after_grace() {
        let launcher = SystemLauncher {
            grace: Duration::from_millis(200),
        };

        let process = launcher
            .spawn(
                &ProcessSpec::shell("stubborn", "trap '' TERM; sleep 30")
                    .output(OutputMode::Logged),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let start = std::time::Instant::now();
        process.terminate().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
