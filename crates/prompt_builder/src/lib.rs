//! Prompt Builder - prompts for COBOL to Java conversion
//!
//! Pure string assembly. The system instruction is fixed; the task prompt wraps
//! the COBOL program in delimiters and, in AST mode, appends the parse tree.

pub mod prompt_loader;

pub use prompt_loader::PromptLoader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const COBOL_BEGIN: &str = "BEGIN COBOL CODE:";
pub const COBOL_END: &str = "END COBOL CODE";
pub const AST_BEGIN: &str = "BEGIN AST:";
pub const AST_END: &str = "END AST";

const SYSTEM_PROMPT: &str = "\
You are a code conversion assistant.
Your task is to convert COBOL code (compilable by the GnuCOBOL compiler) into Java.

REQUIREMENTS:
- The Java program MUST be functionally equivalent to the COBOL program.
- The same inputs MUST produce the same outputs.
- The output MUST be ONLY one complete, compilable Java source file.
- Do NOT include explanations, comments or any other text outside of the code.
- Do NOT wrap the code in markdown fences (```) or add language tags.
- Respond with the CONTENT of the Java file and nothing else.

If you produced markdown fences or any extra text, remove them before answering.
";

const AST_GUIDANCE: &str = "Additionally, here is the abstract syntax tree of this COBOL program. \
Use it to guide the conversion to Java:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("An AST is required when the conversion mode is `ast`")]
    MissingAst,
}

/// Whether translation guidance includes the parse tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    #[default]
    Base,
    #[serde(rename = "ast")]
    WithAst,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMode::Base => f.write_str("base"),
            ConversionMode::WithAst => f.write_str("ast"),
        }
    }
}

impl FromStr for ConversionMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "base" => Ok(ConversionMode::Base),
            "ast" | "with_ast" | "with-ast" => Ok(ConversionMode::WithAst),
            other => Err(format!("unknown conversion mode `{}` (expected base or ast)", other)),
        }
    }
}

/// The fixed system instruction sent with every conversion request.
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// Task prompt for the plain conversion: the COBOL program between delimiters.
pub fn convert_prompt_base(cobol_code: &str) -> String {
    format!("{COBOL_BEGIN}\n{cobol_code}\n{COBOL_END}\n")
}

/// Task prompt carrying both the COBOL program and its parse tree.
pub fn convert_prompt_with_ast(cobol_code: &str, ast: &str) -> String {
    format!(
        "{}\n{AST_GUIDANCE}\n\n{AST_BEGIN}\n{ast}\n{AST_END}\n",
        convert_prompt_base(cobol_code)
    )
}

/// Select the task prompt for `mode`.
pub fn conversion_prompt(
    cobol_code: &str,
    mode: ConversionMode,
    ast: Option<&str>,
) -> Result<String, PromptError> {
    match mode {
        ConversionMode::Base => Ok(convert_prompt_base(cobol_code)),
        ConversionMode::WithAst => {
            let ast = ast.ok_or(PromptError::MissingAst)?;
            Ok(convert_prompt_with_ast(cobol_code, ast))
        }
    }
}
