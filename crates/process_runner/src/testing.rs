//! Scripted runner for tests
//!
//! Replays queued outputs in FIFO order and records every command it was
//! asked to run. Never spawns anything.

use crate::{CommandSpec, ProcessOutput, ProcessRunner};
use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;

pub enum Scripted {
    Output(ProcessOutput),
    SpawnError(io::ErrorKind),
}

#[derive(Default)]
pub struct ScriptedRunner {
    queue: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a process that exits with `code` and the given streams.
    pub fn exits(self, code: i32, stdout: &str, stderr: &str) -> Self {
        self.push(Scripted::Output(ProcessOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code: Some(code),
        }))
    }

    /// Queue a process that cannot be started.
    pub fn fails_to_spawn(self, kind: io::ErrorKind) -> Self {
        self.push(Scripted::SpawnError(kind))
    }

    fn push(self, item: Scripted) -> Self {
        self.queue.lock().unwrap().push_back(item);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn invoke(&self, spec: &CommandSpec) -> io::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        match self.queue.lock().unwrap().pop_front() {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::SpawnError(kind)) => Err(io::Error::new(kind, "scripted spawn failure")),
            None => Err(io::Error::other(format!(
                "ScriptedRunner has no output queued for `{}`",
                spec
            ))),
        }
    }
}
