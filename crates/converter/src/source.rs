use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ConvertError;

/// COBOL input as handed to the converter: a file on disk or literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceProgram {
    File { path: PathBuf, text: String },
    Inline(String),
}

impl SourceProgram {
    /// An existing file path is read; anything else is taken as source text.
    pub fn resolve(input: &str) -> Result<Self, ConvertError> {
        let candidate = Path::new(input);
        if !input.contains('\n') && candidate.is_file() {
            debug!("Reading COBOL source from {:?}", candidate);
            let text = fs::read_to_string(candidate).map_err(|e| ConvertError::Io {
                path: candidate.to_path_buf(),
                source: e,
            })?;
            return Ok(SourceProgram::File {
                path: candidate.to_path_buf(),
                text,
            });
        }
        Ok(SourceProgram::Inline(input.to_string()))
    }

    pub fn text(&self) -> &str {
        match self {
            SourceProgram::File { text, .. } => text,
            SourceProgram::Inline(text) => text,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            SourceProgram::File { path, .. } => Some(path),
            SourceProgram::Inline(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_file_is_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prog.cbl");
        fs::write(&path, "       PROGRAM-ID. PROG.\n").unwrap();

        let source = SourceProgram::resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(source.text(), "       PROGRAM-ID. PROG.\n");
        assert_eq!(source.path(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_path_is_literal_text() {
        let source = SourceProgram::resolve("/no/such/file.cbl").unwrap();
        assert_eq!(source, SourceProgram::Inline("/no/such/file.cbl".to_string()));
    }

    #[test]
    fn test_multiline_text_is_literal() {
        let code = "       IDENTIFICATION DIVISION.\n       PROGRAM-ID. X.\n";
        let source = SourceProgram::resolve(code).unwrap();
        assert_eq!(source.text(), code);
        assert!(source.path().is_none());
    }
}
