use anyhow::{Context, Result, anyhow, bail};
use config::{Config, File};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use cobol_ast::ParserConfig;
use dataset_loader::DatasetConfig;
use java_checker::JavaConfig;
use llm_requester::{ModelConfig, ProviderKind};

pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config/config.toml",
    "../config/config.toml",
    "../../config/config.toml",
];

pub const DEFAULT_OUTPUT_DIR: &str = "out_dir";

/// Environment variables that override file settings.
pub const ENV_OVERRIDES: &[&str] = &[
    "MODEL_NAME",
    "LLM_PROVIDER",
    "LLM_BASE_URL",
    "LLM_API_KEY",
    "LLM_MAX_NEW_TOKENS",
    "DATASET_URL",
    "TEST_CASE_OUTPUT",
    "COBOL_PARSER_CLASSPATH",
    "COBOL_OUTPUT_DIR",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory holding prompt overrides such as `system.md`.
    pub dir: Option<PathBuf>,
}

/// Everything the CLI needs, merged from `config.toml` and the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: ModelConfig,
    pub parser: ParserConfig,
    pub java: JavaConfig,
    pub output: OutputConfig,
    pub dataset: DatasetConfig,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// The file the settings came from; `None` when running on defaults.
    pub source: Option<PathBuf>,
}

/// Load `.env`, then `config.toml` (explicit path or search paths), then apply
/// environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => return Err(e).context("failed to read .env file"),
    }
    load_config_from(explicit, CONFIG_SEARCH_PATHS, |key| std::env::var(key).ok())
}

pub fn load_config_from<P>(
    explicit: Option<&Path>,
    search_paths: impl IntoIterator<Item = P>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig>
where
    P: AsRef<Path>,
{
    let source = match explicit {
        Some(path) if path.exists() => Some(path.to_path_buf()),
        Some(path) => bail!("config file not found: {}", path.display()),
        None => search_paths
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .find(|candidate| candidate.exists()),
    };

    let mut config = match &source {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            read_config_file(path)?
        }
        None => {
            info!("No config.toml found, using defaults");
            AppConfig::default()
        }
    };

    apply_env_overrides(&mut config, lookup)?;
    Ok(LoadedConfig { config, source })
}

fn read_config_file(path: &Path) -> Result<AppConfig> {
    Config::builder()
        .add_source(File::from(path.to_path_buf()))
        .build()
        .with_context(|| format!("failed to load config from {}", path.display()))?
        .try_deserialize()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))
}

/// Apply the variables in [`ENV_OVERRIDES`]; blank values are ignored.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(model) = get("MODEL_NAME") {
        config.llm.model = model;
    }
    if let Some(provider) = get("LLM_PROVIDER") {
        config.llm.provider = provider
            .parse::<ProviderKind>()
            .map_err(|e| anyhow!("LLM_PROVIDER: {}", e))?;
    }
    if let Some(base_url) = get("LLM_BASE_URL") {
        config.llm.base_url = base_url;
    }
    if let Some(api_key) = get("LLM_API_KEY") {
        config.llm.api_key = Some(api_key);
    }
    if let Some(tokens) = get("LLM_MAX_NEW_TOKENS") {
        config.llm.max_new_tokens = tokens
            .parse()
            .with_context(|| format!("LLM_MAX_NEW_TOKENS must be a positive integer, got `{}`", tokens))?;
    }
    if let Some(location) = get("DATASET_URL") {
        config.dataset.location = Some(location);
    }
    if let Some(output) = get("TEST_CASE_OUTPUT") {
        config.dataset.test_case_output = Some(PathBuf::from(output));
    }
    if let Some(classpath) = get("COBOL_PARSER_CLASSPATH") {
        config.parser.classpath = classpath;
    }
    if let Some(dir) = get("COBOL_OUTPUT_DIR") {
        config.output.dir = PathBuf::from(dir);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueLevel {
    Error,
    Warning,
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueLevel::Error => write!(f, "ERROR"),
            IssueLevel::Warning => write!(f, "WARN"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub level: IssueLevel,
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.field, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigCheckReport {
    pub path: Option<PathBuf>,
    pub issues: Vec<ConfigIssue>,
}

impl ConfigCheckReport {
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.level == IssueLevel::Error)
    }
}

pub fn check_config(loaded: &LoadedConfig) -> ConfigCheckReport {
    fn is_blank(value: &str) -> bool {
        value.trim().is_empty()
    }

    let config = &loaded.config;
    let mut issues = Vec::new();

    if is_blank(&config.llm.model) {
        issues.push(ConfigIssue::error("llm.model", "missing `llm.model`"));
    }
    let base_url = config.llm.base_url.trim().to_lowercase();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        issues.push(ConfigIssue::error(
            "llm.base_url",
            format!(
                "`llm.base_url` must start with http:// or https://, got `{}`",
                config.llm.base_url
            ),
        ));
    }
    if config.llm.max_new_tokens == 0 {
        issues.push(ConfigIssue::error(
            "llm.max_new_tokens",
            "`llm.max_new_tokens` must be greater than zero",
        ));
    }

    if is_blank(&config.parser.classpath) {
        issues.push(ConfigIssue::error("parser.classpath", "missing `parser.classpath`"));
    }
    if is_blank(&config.parser.main_class) {
        issues.push(ConfigIssue::error("parser.main_class", "missing `parser.main_class`"));
    }

    if is_blank(&config.java.javac) {
        issues.push(ConfigIssue::error("java.javac", "missing `java.javac`"));
    }
    if is_blank(&config.java.java) {
        issues.push(ConfigIssue::error("java.java", "missing `java.java`"));
    }

    if config.output.dir.as_os_str().is_empty() {
        issues.push(ConfigIssue::error("output.dir", "missing `output.dir`"));
    }

    if config
        .dataset
        .location
        .as_deref()
        .is_none_or(is_blank)
    {
        issues.push(ConfigIssue::warning(
            "dataset.location",
            "no dataset configured; set DATASET_URL to use the `dataset` command",
        ));
    }
    if is_blank(&config.dataset.column) {
        issues.push(ConfigIssue::error("dataset.column", "missing `dataset.column`"));
    }

    if let Some(dir) = &config.prompts.dir {
        if !dir.is_dir() {
            issues.push(ConfigIssue::warning(
                "prompts.dir",
                format!("prompts directory does not exist: {}", dir.display()),
            ));
        }
    }

    ConfigCheckReport {
        path: loaded.source.clone(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let config_dir = dir.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join("config.toml");
        fs::write(&config_path, contents).unwrap();
        config_path
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_without_file() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("config/config.toml");

        let loaded = load_config_from(None, [missing.as_path()], no_env).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.config, AppConfig::default());
        assert_eq!(loaded.config.output.dir, PathBuf::from("out_dir"));
        assert_eq!(loaded.config.dataset.until, 4);
    }

    #[test]
    fn file_sections_are_read() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = write_config(
            temp.path(),
            concat!(
                "[llm]\n",
                "provider = \"ollama\"\n",
                "base_url = \"http://localhost:11434\"\n",
                "model = \"qwen2.5-coder:7b\"\n\n",
                "[parser]\n",
                "format = \"variable\"\n\n",
                "[output]\n",
                "dir = \"generated\"\n\n",
                "[dataset]\n",
                "location = \"data/cobol.csv\"\n",
                "until = 2\n"
            ),
        );

        let loaded = load_config_from(None, [config_path.as_path()], no_env).unwrap();
        let config = loaded.config;
        assert_eq!(loaded.source, Some(config_path));
        assert_eq!(config.llm.provider, ProviderKind::Ollama);
        assert_eq!(config.llm.model, "qwen2.5-coder:7b");
        assert_eq!(config.llm.max_new_tokens, 2048);
        assert_eq!(config.parser.format, cobol_ast::AstFormat::Variable);
        assert_eq!(config.parser.main_class, "CobolAstExporter");
        assert_eq!(config.output.dir, PathBuf::from("generated"));
        assert_eq!(config.dataset.location.as_deref(), Some("data/cobol.csv"));
        assert_eq!(config.dataset.until, 2);
        assert_eq!(config.dataset.column, "source");
    }

    #[test]
    fn example_config_matches_defaults() {
        let example = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/config.example.toml");
        let loaded = load_config_from(Some(&example), CONFIG_SEARCH_PATHS, no_env).unwrap();
        assert_eq!(loaded.config, AppConfig::default());
    }

    #[test]
    fn explicit_missing_path_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope.toml");
        let err = load_config_from(Some(&missing), CONFIG_SEARCH_PATHS, no_env).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = write_config(temp.path(), "[llm]\nmodel = \"from-file\"\n");
        let env: HashMap<&str, &str> = HashMap::from([
            ("MODEL_NAME", "from-env"),
            ("LLM_PROVIDER", "ollama"),
            ("LLM_MAX_NEW_TOKENS", "512"),
            ("DATASET_URL", "https://example.com/cobol.csv"),
            ("TEST_CASE_OUTPUT", "cases.json"),
            ("COBOL_OUTPUT_DIR", "java_out"),
            ("LLM_API_KEY", "   "),
        ]);

        let loaded = load_config_from(None, [config_path.as_path()], |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();
        let config = loaded.config;
        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.llm.provider, ProviderKind::Ollama);
        assert_eq!(config.llm.max_new_tokens, 512);
        assert_eq!(config.llm.api_key, None);
        assert_eq!(
            config.dataset.location.as_deref(),
            Some("https://example.com/cobol.csv")
        );
        assert_eq!(config.dataset.test_case_output, Some(PathBuf::from("cases.json")));
        assert_eq!(config.output.dir, PathBuf::from("java_out"));
    }

    #[test]
    fn invalid_env_values_are_errors() {
        let mut config = AppConfig::default();
        assert!(
            apply_env_overrides(&mut config, |key| {
                (key == "LLM_PROVIDER").then(|| "deepseek".to_string())
            })
            .is_err()
        );
        assert!(
            apply_env_overrides(&mut config, |key| {
                (key == "LLM_MAX_NEW_TOKENS").then(|| "lots".to_string())
            })
            .is_err()
        );
    }

    #[test]
    fn default_config_only_warns_about_dataset() {
        let loaded = LoadedConfig {
            config: AppConfig::default(),
            source: None,
        };
        let report = check_config(&loaded);
        assert!(!report.has_errors(), "unexpected errors: {:?}", report.issues);
        assert!(
            report
                .issues
                .iter()
                .any(|issue| issue.level == IssueLevel::Warning && issue.field == "dataset.location")
        );
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut config = AppConfig::default();
        config.llm.model = " ".to_string();
        config.llm.base_url = "localhost:8000".to_string();
        config.llm.max_new_tokens = 0;
        config.parser.classpath = String::new();

        let report = check_config(&LoadedConfig {
            config,
            source: None,
        });
        assert!(report.has_errors());
        let fields: Vec<&str> = report.issues.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"llm.model"));
        assert!(fields.contains(&"llm.base_url"));
        assert!(fields.contains(&"llm.max_new_tokens"));
        assert!(fields.contains(&"parser.classpath"));
    }
}
