use log::{error, info, warn};
use process_runner::{CommandSpec, ProcessRunner};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// How much of the raw parser output is quoted in decode errors.
const RAW_OUTPUT_EXCERPT: usize = 200;

#[derive(Debug, Error)]
pub enum AstError {
    #[error("COBOL file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Failed to start COBOL parser `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("COBOL parser failed with return code {code}\nStderr: {stderr}\nStdout: {stdout}")]
    ProcessFailed {
        code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("Failed to parse JSON output from: {excerpt}...")]
    Decode {
        excerpt: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to stage COBOL source in a temporary file: {0}")]
    TempFile(#[source] std::io::Error),
}

/// Source format hint forwarded to the parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AstFormat {
    #[default]
    Fixed,
    Variable,
    Tandem,
}

impl AstFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AstFormat::Fixed => "fixed",
            AstFormat::Variable => "variable",
            AstFormat::Tandem => "tandem",
        }
    }
}

impl fmt::Display for AstFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AstFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "fixed" => Ok(AstFormat::Fixed),
            "variable" => Ok(AstFormat::Variable),
            "tandem" => Ok(AstFormat::Tandem),
            other => Err(format!(
                "unknown COBOL source format `{}` (expected fixed, variable or tandem)",
                other
            )),
        }
    }
}

/// Parse tree as emitted by the external parser. Opaque beyond being valid JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AstTree(serde_json::Value);

impl AstTree {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    /// Pretty JSON, the form embedded into prompts.
    pub fn to_prompt_text(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

impl fmt::Display for AstTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_prompt_text())
    }
}

/// Where the external parser lives and how to call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub java_bin: String,
    pub classpath: String,
    pub main_class: String,
    pub format: AstFormat,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            java_bin: "java".to_string(),
            classpath: "CobolAstExporter.jar:proleap-cobol.jar:antlr-4.13.1-complete.jar:gson-2.10.1.jar"
                .to_string(),
            main_class: "CobolAstExporter".to_string(),
            format: AstFormat::Fixed,
        }
    }
}

impl ParserConfig {
    /// Classpath entries split on the platform separator.
    pub fn classpath_entries(&self) -> Vec<String> {
        let separator = if cfg!(windows) { ';' } else { ':' };
        self.classpath
            .split(separator)
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub struct CobolAstParser {
    runner: Arc<dyn ProcessRunner>,
    config: ParserConfig,
}

impl CobolAstParser {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: ParserConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a COBOL file into its AST using the configured format.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<AstTree, AstError> {
        self.parse_file_with_format(path, self.config.format)
    }

    pub fn parse_file_with_format(
        &self,
        path: impl AsRef<Path>,
        format: AstFormat,
    ) -> Result<AstTree, AstError> {
        let path = path.as_ref();
        info!("Parsing COBOL file: {:?} ({})", path, format);

        if !path.exists() {
            error!("COBOL file not found: {:?}", path);
            return Err(AstError::FileNotFound(path.to_path_buf()));
        }

        let spec = CommandSpec::new(&self.config.java_bin)
            .arg("-cp")
            .arg(&self.config.classpath)
            .arg(&self.config.main_class)
            .arg(path)
            .arg(format.as_str());

        let output = self.runner.invoke(&spec).map_err(|e| {
            error!("Failed to execute COBOL parser: {}", e);
            AstError::Spawn {
                command: spec.to_string(),
                source: e,
            }
        })?;

        if !output.success() {
            let code = output.code_or_signal();
            error!("COBOL parser failed with status {}:\n{}", code, output.stderr);
            return Err(AstError::ProcessFailed {
                code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        match serde_json::from_str::<serde_json::Value>(&output.stdout) {
            Ok(value) => {
                info!("AST parsed successfully ({} bytes of JSON)", output.stdout.len());
                Ok(AstTree::new(value))
            }
            Err(e) => {
                let excerpt: String = output.stdout.chars().take(RAW_OUTPUT_EXCERPT).collect();
                error!("COBOL parser produced invalid JSON: {}", e);
                Err(AstError::Decode { excerpt, source: e })
            }
        }
    }

    /// Parse COBOL source text by staging it in a temporary `.cbl` file.
    ///
    /// The temporary file is removed whether parsing succeeds or not.
    pub fn parse_source(&self, cobol_code: &str, format: AstFormat) -> Result<AstTree, AstError> {
        let mut staged = tempfile::Builder::new()
            .prefix("cobol_source_")
            .suffix(".cbl")
            .tempfile()
            .map_err(AstError::TempFile)?;
        staged
            .write_all(cobol_code.as_bytes())
            .and_then(|_| staged.flush())
            .map_err(AstError::TempFile)?;

        let result = self.parse_file_with_format(staged.path(), format);
        if let Err(e) = staged.close() {
            warn!("Failed to remove temporary COBOL file: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use process_runner::testing::ScriptedRunner;
    use std::fs;
    use tempfile::TempDir;

    const HELLO_AST: &str = r#"{
        "type": "rule",
        "rule": "startRule",
        "text": "IDENTIFICATIONDIVISION.",
        "children": [{"type": "terminal", "text": "IDENTIFICATION", "symbol": 231}]
    }"#;

    fn write_cobol(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("hello.cbl");
        fs::write(
            &path,
            "       IDENTIFICATION DIVISION.\n       PROGRAM-ID. HELLO-WORLD.\n",
        )
        .unwrap();
        path
    }

    fn parser_with(runner: Arc<ScriptedRunner>) -> CobolAstParser {
        CobolAstParser::new(runner, ParserConfig::default())
    }

    #[test]
    fn test_parse_file_decodes_tree() {
        let dir = TempDir::new().unwrap();
        let path = write_cobol(&dir);
        let runner = Arc::new(ScriptedRunner::new().exits(0, HELLO_AST, ""));

        let ast = parser_with(runner.clone()).parse_file(&path).unwrap();

        assert_eq!(ast.as_value()["rule"], "startRule");
        assert_eq!(ast.as_value()["children"][0]["text"], "IDENTIFICATION");

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let args = calls[0].args_lossy();
        assert_eq!(calls[0].program, "java");
        assert_eq!(args[0], "-cp");
        assert_eq!(args[2], "CobolAstExporter");
        assert_eq!(args[3], path.to_string_lossy());
        assert_eq!(args[4], "fixed");
    }

    #[test]
    fn test_missing_file_spawns_nothing() {
        let runner = Arc::new(ScriptedRunner::new());
        let err = parser_with(runner.clone())
            .parse_file("/non/existent/program.cbl")
            .unwrap_err();

        assert!(matches!(err, AstError::FileNotFound(_)));
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_nonzero_exit_reports_streams() {
        let dir = TempDir::new().unwrap();
        let path = write_cobol(&dir);
        let runner = Arc::new(ScriptedRunner::new().exits(1, "partial", "syntax error"));

        let err = parser_with(runner).parse_file(&path).unwrap_err();

        match &err {
            AstError::ProcessFailed { code, stdout, stderr } => {
                assert_eq!(*code, 1);
                assert_eq!(stdout, "partial");
                assert_eq!(stderr, "syntax error");
            }
            other => panic!("Expected ProcessFailed, got {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("syntax error"));
        assert!(message.contains("partial"));
    }

    #[test]
    fn test_invalid_json_quotes_prefix() {
        let dir = TempDir::new().unwrap();
        let path = write_cobol(&dir);
        let garbage = format!("Exception in thread main {}", "x".repeat(500));
        let runner = Arc::new(ScriptedRunner::new().exits(0, &garbage, ""));

        let err = parser_with(runner).parse_file(&path).unwrap_err();

        match err {
            AstError::Decode { excerpt, .. } => {
                assert!(excerpt.starts_with("Exception in thread main"));
                assert_eq!(excerpt.chars().count(), RAW_OUTPUT_EXCERPT);
            }
            other => panic!("Expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn test_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_cobol(&dir);
        let runner =
            Arc::new(ScriptedRunner::new().fails_to_spawn(std::io::ErrorKind::NotFound));

        let err = parser_with(runner).parse_file(&path).unwrap_err();
        assert!(matches!(err, AstError::Spawn { .. }));
        assert!(err.to_string().contains("CobolAstExporter"));
    }

    #[test]
    fn test_parse_source_cleans_up_temp_file() {
        let runner = Arc::new(ScriptedRunner::new().exits(0, HELLO_AST, ""));
        let parser = parser_with(runner.clone());

        let ast = parser
            .parse_source("       PROGRAM-ID. HELLO.", AstFormat::Variable)
            .unwrap();
        assert_eq!(ast.as_value()["type"], "rule");

        let calls = runner.calls();
        let args = calls[0].args_lossy();
        let staged = PathBuf::from(&args[3]);
        assert!(staged.extension().is_some_and(|ext| ext == "cbl"));
        assert!(!staged.exists());
        assert_eq!(args[4], "variable");
    }

    #[test]
    fn test_parse_source_cleans_up_on_failure() {
        let runner = Arc::new(ScriptedRunner::new().exits(2, "", "boom"));
        let parser = parser_with(runner.clone());

        assert!(parser.parse_source("BAD", AstFormat::Fixed).is_err());
        let staged = PathBuf::from(&runner.calls()[0].args_lossy()[3]);
        assert!(!staged.exists());
    }

    #[test]
    fn test_format_round_trip_through_str() {
        assert_eq!("FIXED".parse::<AstFormat>().unwrap(), AstFormat::Fixed);
        assert_eq!(" tandem ".parse::<AstFormat>().unwrap(), AstFormat::Tandem);
        assert!("free".parse::<AstFormat>().is_err());
    }

    #[test]
    fn test_prompt_text_is_pretty_json() {
        let ast = AstTree::new(serde_json::json!({"type": "terminal", "text": "STOP"}));
        let text = ast.to_prompt_text();
        assert!(text.contains('\n'));
        assert!(text.contains("\"text\": \"STOP\""));
    }

    #[cfg(unix)]
    #[test]
    fn test_classpath_entries() {
        let config = ParserConfig {
            classpath: ".:lib/*: :parser.jar".to_string(),
            ..ParserConfig::default()
        };
        assert_eq!(config.classpath_entries(), vec![".", "lib/*", "parser.jar"]);
    }
}
