//! Prompt override loader
//!
//! Plain file reads from a prompts directory. A file that exists replaces the
//! built-in text; a missing file falls back to it.

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const SYSTEM_PROMPT_FILE: &str = "system.md";

pub struct PromptLoader {
    prompts_dir: PathBuf,
}

impl PromptLoader {
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Result<Self> {
        let prompts_dir = prompts_dir.into();
        if !prompts_dir.is_dir() {
            anyhow::bail!(
                "Prompts directory not found: {}. Create it or remove `prompts.dir` from the config.",
                prompts_dir.display()
            );
        }
        Ok(Self { prompts_dir })
    }

    pub fn prompts_dir(&self) -> &Path {
        &self.prompts_dir
    }

    /// System instruction, overridden by `system.md` when present.
    pub async fn load_system_prompt(&self) -> Result<String> {
        match self.load_optional(SYSTEM_PROMPT_FILE).await? {
            Some(content) => {
                info!("Using system prompt override from {}", self.prompts_dir.display());
                Ok(content)
            }
            None => Ok(crate::system_prompt().to_string()),
        }
    }

    /// Read a prompt file if it exists; blank files count as absent.
    pub async fn load_optional(&self, filename: &str) -> Result<Option<String>> {
        let path = self.prompts_dir.join(filename);
        if !path.exists() {
            debug!("No prompt override at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

        if content.trim().is_empty() {
            debug!("Prompt override {} is blank, ignoring", path.display());
            return Ok(None);
        }
        Ok(Some(content))
    }
}
