//! External process invocation behind a small trait.
//!
//! Everything the pipeline shells out to (the COBOL parser, `javac`, `java`)
//! goes through [`ProcessRunner`], so callers can swap the real
//! [`SystemProcessRunner`] for a scripted fake in tests.

use log::debug;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// A single command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            current_dir: None,
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

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Arguments as lossy strings, handy for assertions and log lines.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code for reporting, `-1` when killed by a signal.
    pub fn code_or_signal(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }
}

/// Capability to run an external command to completion.
///
/// An `Err` means the process could not be started; a non-zero exit is
/// reported through [`ProcessOutput::exit_code`].
pub trait ProcessRunner: Send + Sync {
    fn invoke(&self, spec: &CommandSpec) -> io::Result<ProcessOutput>;
}

/// Runs commands with `std::process::Command`, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn invoke(&self, spec: &CommandSpec) -> io::Result<ProcessOutput> {
        debug!("Spawning: {}", spec);

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let output = command.output()?;
        let result = ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        debug!(
            "{} exited with {:?} ({} bytes stdout, {} bytes stderr)",
            spec.program.to_string_lossy(),
            result.exit_code,
            result.stdout.len(),
            result.stderr.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("java")
            .arg("-cp")
            .arg("out")
            .arg("HelloWorld");
        assert_eq!(spec.to_string(), "java -cp out HelloWorld");
        assert_eq!(spec.args_lossy(), vec!["-cp", "out", "HelloWorld"]);
    }

    #[test]
    fn test_process_output_success() {
        let ok = ProcessOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        let failed = ProcessOutput {
            exit_code: Some(1),
            ..Default::default()
        };
        let killed = ProcessOutput::default();

        assert!(ok.success());
        assert!(!failed.success());
        assert!(!killed.success());
        assert_eq!(killed.code_or_signal(), -1);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let spec = CommandSpec::new("definitely-not-a-real-binary-3f9a1c");
        let err = SystemProcessRunner.invoke(&spec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_streams() {
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");
        let output = SystemProcessRunner.invoke(&spec).unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_honours_current_dir() {
        let dir = std::env::temp_dir();
        let spec = CommandSpec::new("pwd").current_dir(&dir);
        let output = SystemProcessRunner.invoke(&spec).unwrap();
        let reported = PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.canonicalize().unwrap()
        );
    }
}
