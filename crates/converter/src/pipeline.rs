use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use java_checker::{
    CompileOutcome, CompiledArtifact, ExecutionResult, JavaConfig, JavaToolchain, extract_key_errors,
};
use llm_requester::CompletionModel;
use process_runner::ProcessRunner;
use prompt_builder::{ConversionMode, conversion_prompt, system_prompt};

use crate::class_name::extract_public_class;
use crate::source::SourceProgram;
use crate::{ConversionRequest, ConvertError, GeneratedArtifact, PipelineOutcome};

pub const DEFAULT_OUTPUT_DIR: &str = "out_dir";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub output_dir: PathBuf,
    pub java: JavaConfig,
    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            java: JavaConfig::default(),
            system_prompt: None,
        }
    }
}

/// Sequences prompting, generation, persistence, compilation and execution.
pub struct Converter {
    model: Arc<dyn CompletionModel>,
    toolchain: JavaToolchain,
    output_dir: PathBuf,
    system_prompt: String,
}

impl Converter {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        runner: Arc<dyn ProcessRunner>,
        config: ConverterConfig,
    ) -> Self {
        let system_prompt = config
            .system_prompt
            .unwrap_or_else(|| system_prompt().to_string());
        Self {
            model,
            toolchain: JavaToolchain::new(runner, config.java),
            output_dir: config.output_dir,
            system_prompt,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn toolchain(&self) -> &JavaToolchain {
        &self.toolchain
    }

    /// Translate one COBOL program and write `{output_dir}/{ClassName}.java`.
    pub async fn translate(&self, request: &ConversionRequest) -> Result<GeneratedArtifact, ConvertError> {
        if request.mode == ConversionMode::WithAst && request.ast.is_none() {
            error!("Conversion mode `ast` selected without an AST");
            return Err(ConvertError::MissingAst);
        }

        let source = SourceProgram::resolve(&request.source)?;
        match source.path() {
            Some(path) => info!("Translating {:?} ({} mode)", path, request.mode),
            None => info!(
                "Translating inline COBOL source, {} chars ({} mode)",
                source.text().len(),
                request.mode
            ),
        }

        let ast_text = request.ast.as_ref().map(|ast| ast.to_prompt_text());
        let prompt = conversion_prompt(source.text(), request.mode, ast_text.as_deref())
            .map_err(|_| ConvertError::MissingAst)?;
        debug!("Conversion prompt is {} chars", prompt.len());

        let java_source = self.model.complete(&self.system_prompt, &prompt).await?;
        info!("Conversion cob2java complete");

        let class_name = extract_public_class(&java_source)?;
        let java_path = persist_artifact(&self.output_dir, &class_name, &java_source)?;

        Ok(GeneratedArtifact {
            java_path,
            class_name,
            java_source,
        })
    }

    /// Compile a generated file; `None` when `javac` rejects it.
    pub fn compile(&self, java_file: impl AsRef<Path>) -> Result<Option<CompiledArtifact>, ConvertError> {
        Ok(self.toolchain.compile(java_file)?)
    }

    pub fn run(&self, binary_path: impl AsRef<Path>) -> Result<ExecutionResult, ConvertError> {
        Ok(self.toolchain.run(binary_path)?)
    }

    /// Translate, compile and run. A compile failure stops the pipeline.
    pub async fn translate_compile_run(
        &self,
        request: &ConversionRequest,
    ) -> Result<PipelineOutcome, ConvertError> {
        let artifact = self.translate(request).await?;

        let compiled = match self.toolchain.check_compile(&artifact.java_path)? {
            CompileOutcome::Compiled(compiled) => compiled,
            CompileOutcome::Failed {
                exit_code,
                diagnostics,
            } => {
                let diagnostics = extract_key_errors(&diagnostics);
                warn!(
                    "Compilation of {:?} failed with status {}:\n{}",
                    artifact.java_path, exit_code, diagnostics
                );
                return Err(ConvertError::CompilationFailed {
                    java_path: artifact.java_path,
                    diagnostics,
                });
            }
        };

        let execution = self.run(&compiled.binary_path)?;
        Ok(PipelineOutcome {
            artifact,
            compiled,
            execution,
        })
    }
}

/// Write `java_source` to `{output_dir}/{class_name}.java`, replacing any
/// existing file, and check that something non-trivial landed on disk.
pub fn persist_artifact(
    output_dir: &Path,
    class_name: &str,
    java_source: &str,
) -> Result<PathBuf, ConvertError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ConvertError::Io { path, source }
    };

    fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;
    let java_path = output_dir.join(format!("{class_name}.java"));
    info!("Saving the generated java code to: {:?}", java_path);

    if java_path.exists() {
        info!("File {:?} already exists. Overwriting...", java_path);
        fs::remove_file(&java_path).map_err(io_err(&java_path))?;
    }
    fs::write(&java_path, java_source).map_err(io_err(&java_path))?;

    let size = fs::metadata(&java_path).map(|meta| meta.len()).unwrap_or(0);
    if size <= 1 {
        error!("Generated java file {:?} is missing or empty", java_path);
        return Err(ConvertError::EmptyArtifact(java_path));
    }

    info!("Successfully written generated java code to {:?}", java_path);
    Ok(java_path)
}
