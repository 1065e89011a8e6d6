use std::path::PathBuf;
use thiserror::Error;

pub mod class_name;
pub mod pipeline;
pub mod source;

pub use class_name::extract_public_class;
pub use pipeline::{Converter, ConverterConfig, persist_artifact};
pub use source::SourceProgram;

use cobol_ast::AstTree;
use java_checker::{CompiledArtifact, ExecutionResult, JavaCheckError};
use llm_requester::ModelError;
use prompt_builder::ConversionMode;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("An AST is required when the conversion mode is `ast`")]
    MissingAst,
    #[error("No Java code was generated, could not extract class name")]
    EmptyGeneration,
    #[error("No public class found in generated code: {excerpt}")]
    NoPublicClass { excerpt: String },
    #[error("Generated code declares more than one top-level public class: {}", .0.join(", "))]
    MultiplePublicClasses(Vec<String>),
    #[error("Generated java file {0} could not be found or was empty")]
    EmptyArtifact(PathBuf),
    #[error("Compilation of {java_path} failed:\n{diagnostics}")]
    CompilationFailed {
        java_path: PathBuf,
        diagnostics: String,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Java(#[from] JavaCheckError),
}

/// One translation job.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// A path to a COBOL file, or the COBOL text itself.
    pub source: String,
    pub mode: ConversionMode,
    pub ast: Option<AstTree>,
}

impl ConversionRequest {
    pub fn base(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            mode: ConversionMode::Base,
            ast: None,
        }
    }

    pub fn with_ast(source: impl Into<String>, ast: AstTree) -> Self {
        Self {
            source: source.into(),
            mode: ConversionMode::WithAst,
            ast: Some(ast),
        }
    }
}

/// A Java source file written by [`Converter::translate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub java_path: PathBuf,
    pub class_name: String,
    pub java_source: String,
}

/// Everything produced by [`Converter::translate_compile_run`].
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub artifact: GeneratedArtifact,
    pub compiled: CompiledArtifact,
    pub execution: ExecutionResult,
}
