//! External command execution.
//!
//! Every OS step of the volume workflows (`mount`, `tune2fs`, `mkfs`, `chown`,
//! ...) goes through a [`ProcessRunner`], so the workflows can be tested
//! against [`mock::ScriptedRunner`] without touching real devices.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::ProcessError;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute, looked up on `PATH`.
    pub program: String,
    /// Arguments, passed without shell interpretation.
    pub args: Vec<String>,
}

impl Invocation {
    /// Start building an invocation of `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Run through `sudo -n` when `privileged` is set.
    #[must_use]
    pub fn with_sudo(self, privileged: bool) -> Self {
        if !privileged {
            return self;
        }
        let mut args = vec!["-n".to_string(), self.program];
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// A successful run with no output.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    /// A successful run printing `stdout`.
    #[must_use]
    pub fn with_stdout(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A run that exited with `code` after printing `stderr`.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the process exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Every output line, standard output first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().chain(self.stderr.lines())
    }
}

/// Which output stream to read line by line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

type PipeLines = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

enum LinesSource {
    Child {
        command: String,
        child: Child,
        lines: PipeLines,
    },
    Buffered(std::vec::IntoIter<String>),
    Finished,
}

/// Lines of one output stream, read lazily.
///
/// The sequence is finite and can be read once. When the last line has been
/// read the child process is reaped; dropping the reader early kills it.
pub struct OutputLines {
    source: LinesSource,
}

impl OutputLines {
    /// Serve already captured lines.
    #[must_use]
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            source: LinesSource::Buffered(lines.into_iter()),
        }
    }

    /// Read the next line, or `None` once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Io` if reading the pipe or reaping the child fails.
    pub async fn next_line(&mut self) -> Result<Option<String>, ProcessError> {
        match &mut self.source {
            LinesSource::Finished => Ok(None),
            LinesSource::Buffered(lines) => Ok(lines.next()),
            LinesSource::Child {
                command,
                child,
                lines,
            } => {
                let line = lines.next_line().await.map_err(|source| ProcessError::Io {
                    command: command.clone(),
                    source,
                })?;
                if line.is_some() {
                    return Ok(line);
                }
                let status = child.wait().await.map_err(|source| ProcessError::Io {
                    command: command.clone(),
                    source,
                })?;
                debug!(command = %command, status = ?status.code(), "Process finished");
                self.source = LinesSource::Finished;
                Ok(None)
            }
        }
    }

    /// Read every remaining line.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Io` if reading fails.
    pub async fn collect(mut self) -> Result<Vec<String>, ProcessError> {
        let mut all = Vec::new();
        while let Some(line) = self.next_line().await? {
            all.push(line);
        }
        Ok(all)
    }
}

/// Trait for executing external commands.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion and capture the exit code and both output streams.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Spawn` if the process cannot be started.
    async fn output(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError>;

    /// Start the process and read one of its output streams lazily.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Spawn` if the process cannot be started.
    async fn stream(
        &self,
        invocation: &Invocation,
        stream: OutputStream,
    ) -> Result<OutputLines, ProcessError>;

    /// Run to completion and return only the exit code.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Spawn` if the process cannot be started.
    async fn run(&self, invocation: &Invocation) -> Result<Option<i32>, ProcessError> {
        Ok(self.output(invocation).await?.code)
    }
}

/// Runs commands on the local host with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    /// Create a new runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null());
        command
    }
}

#[async_trait]
impl ProcessRunner for ShellRunner {
    async fn output(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
        debug!(command = %invocation, "Running");
        let output = Self::command(invocation)
            .output()
            .await
            .map_err(|source| ProcessError::Spawn {
                command: invocation.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn stream(
        &self,
        invocation: &Invocation,
        stream: OutputStream,
    ) -> Result<OutputLines, ProcessError> {
        debug!(command = %invocation, ?stream, "Streaming");
        let mut command = Self::command(invocation);
        command.kill_on_drop(true);
        match stream {
            OutputStream::Stdout => command.stdout(Stdio::piped()).stderr(Stdio::null()),
            OutputStream::Stderr => command.stdout(Stdio::null()).stderr(Stdio::piped()),
        };

        let spawn_error = |source| ProcessError::Spawn {
            command: invocation.to_string(),
            source,
        };
        let mut child = command.spawn().map_err(spawn_error)?;

        let pipe: Option<Box<dyn AsyncRead + Send + Unpin>> = match stream {
            OutputStream::Stdout => child
                .stdout
                .take()
                .map(|out| Box::new(out) as Box<dyn AsyncRead + Send + Unpin>),
            OutputStream::Stderr => child
                .stderr
                .take()
                .map(|err| Box::new(err) as Box<dyn AsyncRead + Send + Unpin>),
        };
        let pipe = pipe.ok_or_else(|| {
            spawn_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "output pipe was not captured",
            ))
        })?;

        Ok(OutputLines {
            source: LinesSource::Child {
                command: invocation.to_string(),
                child,
                lines: BufReader::new(pipe).lines(),
            },
        })
    }
}

/// A scripted runner for testing without executing anything.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Clone)]
    enum Reply {
        Output(CommandOutput),
        SpawnError,
    }

    /// A runner that answers from rules matched on the command-line prefix.
    ///
    /// The most recently added matching rule wins. Commands with no matching
    /// rule succeed with empty output. Every invocation is recorded.
    #[derive(Default)]
    pub struct ScriptedRunner {
        rules: Mutex<Vec<(String, Reply)>>,
        invocations: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        /// Create a runner with no rules.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer commands starting with `prefix` with `output`.
        #[must_use]
        pub fn on(self, prefix: impl Into<String>, output: CommandOutput) -> Self {
            self.rules.lock().push((prefix.into(), Reply::Output(output)));
            self
        }

        /// Fail to spawn commands starting with `prefix`.
        #[must_use]
        pub fn on_spawn_error(self, prefix: impl Into<String>) -> Self {
            self.rules.lock().push((prefix.into(), Reply::SpawnError));
            self
        }

        /// Every command line run so far, in order.
        #[must_use]
        pub fn invocations(&self) -> Vec<String> {
            self.invocations.lock().clone()
        }

        /// Number of command lines run that start with `prefix`.
        #[must_use]
        pub fn count(&self, prefix: &str) -> usize {
            self.invocations
                .lock()
                .iter()
                .filter(|line| line.starts_with(prefix))
                .count()
        }

        /// Returns true if any command line starting with `prefix` was run.
        #[must_use]
        pub fn ran(&self, prefix: &str) -> bool {
            self.count(prefix) > 0
        }

        fn reply(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
            let line = invocation.to_string();
            self.invocations.lock().push(line.clone());
            let reply = self
                .rules
                .lock()
                .iter()
                .rev()
                .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, reply)| reply.clone());

            match reply {
                None => Ok(CommandOutput::ok()),
                Some(Reply::Output(output)) => Ok(output),
                Some(Reply::SpawnError) => Err(ProcessError::Spawn {
                    command: line,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                }),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        async fn output(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
            self.reply(invocation)
        }

        async fn stream(
            &self,
            invocation: &Invocation,
            stream: OutputStream,
        ) -> Result<OutputLines, ProcessError> {
            let output = self.reply(invocation)?;
            let text = match stream {
                OutputStream::Stdout => output.stdout,
                OutputStream::Stderr => output.stderr,
            };
            Ok(OutputLines::from_lines(
                text.lines().map(ToString::to_string).collect(),
            ))
        }
    }
}
