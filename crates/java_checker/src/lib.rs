use log::{error, info, warn};
use process_runner::{CommandSpec, ProcessRunner};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JavaCheckError {
    #[error("Command execution error: `{command}`: {source}")]
    CommandError {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Not a runnable class path: {0}")]
    InvalidBinaryPath(PathBuf),
}

/// Names of the JDK executables, resolved through `PATH` unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaConfig {
    pub javac: String,
    pub java: String,
}

impl Default for JavaConfig {
    fn default() -> Self {
        Self {
            javac: "javac".to_string(),
            java: "java".to_string(),
        }
    }
}

/// A `.class` file produced by `javac`, addressed without its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub binary_path: PathBuf,
}

impl CompiledArtifact {
    pub fn class_name(&self) -> Option<&str> {
        self.binary_path.file_name().and_then(|name| name.to_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Compiled(CompiledArtifact),
    Failed { exit_code: i32, diagnostics: String },
}

/// Captured result of running a compiled class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct JavaToolchain {
    runner: Arc<dyn ProcessRunner>,
    config: JavaConfig,
}

impl JavaToolchain {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: JavaConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &JavaConfig {
        &self.config
    }

    /// Compile a single source file, keeping the diagnostics on failure.
    pub fn check_compile(&self, java_file: impl AsRef<Path>) -> Result<CompileOutcome, JavaCheckError> {
        let java_file = java_file.as_ref();
        info!("Compiling Java file: {:?}", java_file);

        let spec = CommandSpec::new(&self.config.javac).arg(java_file);
        let output = self.invoke(&spec)?;

        if output.success() {
            info!("Compilation succeeded");
            return Ok(CompileOutcome::Compiled(CompiledArtifact {
                binary_path: java_file.with_extension(""),
            }));
        }

        let mut diagnostics = output.stderr.trim().to_string();
        if diagnostics.is_empty() {
            diagnostics = output.stdout.trim().to_string();
        }
        Ok(CompileOutcome::Failed {
            exit_code: output.code_or_signal(),
            diagnostics,
        })
    }

    /// `javac <file>`; a compiler rejection is a warning, not an error.
    pub fn compile(&self, java_file: impl AsRef<Path>) -> Result<Option<CompiledArtifact>, JavaCheckError> {
        match self.check_compile(java_file)? {
            CompileOutcome::Compiled(artifact) => Ok(Some(artifact)),
            CompileOutcome::Failed {
                exit_code,
                diagnostics,
            } => {
                warn!(
                    "Compilation failed with status {}:\n{}",
                    exit_code,
                    extract_key_errors(&diagnostics)
                );
                Ok(None)
            }
        }
    }

    /// `java -cp <dir> <ClassName>` for a path like `out_dir/HelloWorld`.
    pub fn run(&self, binary_path: impl AsRef<Path>) -> Result<ExecutionResult, JavaCheckError> {
        let binary_path = binary_path.as_ref();
        let class_name = binary_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| JavaCheckError::InvalidBinaryPath(binary_path.to_path_buf()))?;
        let class_dir = match binary_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        info!("Running {} from {:?}", class_name, class_dir);
        let spec = CommandSpec::new(&self.config.java)
            .arg("-cp")
            .arg(class_dir)
            .arg(class_name);
        let output = self.invoke(&spec)?;

        let result = ExecutionResult {
            exit_code: output.code_or_signal(),
            stdout: output.stdout,
            stderr: output.stderr,
        };
        if result.success() {
            info!("Program exited successfully");
        } else {
            warn!("Program exited with status {}", result.exit_code);
        }
        Ok(result)
    }

    /// First line of `javac -version`.
    pub fn javac_version(&self) -> Result<String, JavaCheckError> {
        self.tool_version(&self.config.javac)
    }

    /// First line of `java -version`.
    pub fn java_version(&self) -> Result<String, JavaCheckError> {
        self.tool_version(&self.config.java)
    }

    fn tool_version(&self, program: &str) -> Result<String, JavaCheckError> {
        let spec = CommandSpec::new(program).arg("-version");
        let output = self.invoke(&spec)?;
        // Older JDKs print the version on stderr.
        let text = if output.stdout.trim().is_empty() {
            &output.stderr
        } else {
            &output.stdout
        };
        let first_line = text.lines().next().unwrap_or_default().trim().to_string();
        if output.success() {
            Ok(first_line)
        } else {
            Err(JavaCheckError::CommandError {
                command: spec.to_string(),
                source: std::io::Error::other(format!(
                    "exited with status {}: {}",
                    output.code_or_signal(),
                    first_line
                )),
            })
        }
    }

    fn invoke(&self, spec: &CommandSpec) -> Result<process_runner::ProcessOutput, JavaCheckError> {
        self.runner.invoke(spec).map_err(|e| {
            error!("Failed to execute command `{}`: {}", spec, e);
            JavaCheckError::CommandError {
                command: spec.to_string(),
                source: e,
            }
        })
    }
}

/// Keep `File.java:N: error:` lines plus their source and caret context.
///
/// Returns the input unchanged when nothing matches.
pub fn extract_key_errors(error_output: &str) -> String {
    let mut key_errors = Vec::new();
    let mut in_error = false;

    for line in error_output.lines() {
        if line.contains(".java:") && line.contains(": error:") {
            in_error = true;
            key_errors.push(line);
        } else if line.contains(": warning:") || is_error_summary(line) {
            in_error = false;
        } else if in_error && !line.trim().is_empty() {
            key_errors.push(line);
        }
    }

    if key_errors.is_empty() {
        error_output.to_string()
    } else {
        key_errors.join("\n")
    }
}

fn is_error_summary(line: &str) -> bool {
    let mut parts = line.split_whitespace();
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(count), Some("error" | "errors" | "warning" | "warnings"), None)
            if count.chars().all(|c| c.is_ascii_digit())
    )
}
