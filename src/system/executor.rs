// src/system/executor.rs

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{command}' exited with a non-zero status ({code:?}).")]
    NonZeroExitStatus {
        command: String,
        code: Option<i32>,
    },
    #[error("'{0}' was interrupted.")]
    Interrupted(String),
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// A fully prepared process invocation: program, arguments and extra environment.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl ProcessSpec {
    /// Builds a spec by shell-splitting a command line.
    pub fn from_command_line(command_line: &str) -> Result<Self, ExecutionError> {
        let parts = shlex::split(command_line.trim())
            .ok_or_else(|| ExecutionError::CommandParse(command_line.to_string()))?;
        let mut parts = parts.into_iter();
        let program = parts.next().ok_or(ExecutionError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
            env: HashMap::new(),
        })
    }

    /// The spec rendered back as a single display string.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|p| shlex::try_quote(p).map(|q| q.into_owned()).unwrap_or_else(|_| p.to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self, cwd: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(dunce::simplified(cwd))
            .envs(&self.env);
        command
    }

    /// The Windows fallback for shell built-ins: `cmd /C <line>`.
    fn cmd_fallback(&self, cwd: &Path) -> Command {
        let mut command = Command::new("cmd");
        command
            .arg("/C")
            .arg(self.display())
            .current_dir(dunce::simplified(cwd))
            .envs(&self.env);
        command
    }
}

/// Runs a process with inherited stdio and waits for it.
///
/// On Windows, a program that cannot be found is retried through `cmd /C` so
/// built-ins such as `echo` work.
pub async fn execute(spec: &ProcessSpec, cwd: &Path) -> Result<(), ExecutionError> {
    let display = spec.display();
    log::debug!("Executing '{}' in '{}'", display, cwd.display());

    let mut command = spec.command(cwd);
    command.stdout(Stdio::inherit()).stderr(Stdio::inherit());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", spec.program);
            let mut fallback = spec.cmd_fallback(cwd);
            fallback.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            fallback
                .spawn()
                .map_err(|e| ExecutionError::CommandFailed(display.clone(), e))?
        }
        Err(e) => return Err(ExecutionError::CommandFailed(display, e)),
    };

    let status = child
        .wait()
        .await
        .map_err(|e| ExecutionError::CommandFailed(display.clone(), e))?;

    if !status.success() {
        return Err(ExecutionError::NonZeroExitStatus {
            command: display,
            code: status.code(),
        });
    }
    Ok(())
}

/// Runs a process and captures its standard output. Stderr is passed through.
pub async fn execute_and_capture_output(
    spec: &ProcessSpec,
    cwd: &Path,
) -> Result<String, ExecutionError> {
    let display = spec.display();
    log::trace!("Capturing output of '{}'", display);

    let output = spec
        .command(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .await
        .map_err(|e| ExecutionError::CommandFailed(display.clone(), e))?;

    if !output.status.success() {
        return Err(ExecutionError::NonZeroExitStatus {
            command: display,
            code: output.status.code(),
        });
    }

    String::from_utf8(output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
        command: display,
        source: e,
    })
}
