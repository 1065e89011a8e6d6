use log::{info, warn};
use process_runner::ProcessRunner;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use java_checker::JavaToolchain;
use llm_requester::ModelClient;

use crate::cfg_checker::AppConfig;

/// Outcome of a single environment probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl CheckItem {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn failed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for CheckItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.ok { "ok" } else { "FAILED" };
        write!(f, "[{}] {}: {}", mark, self.name, self.detail)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentReport {
    pub items: Vec<CheckItem>,
}

impl EnvironmentReport {
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|item| !item.ok)
    }

    fn record(&mut self, item: CheckItem) {
        if item.ok {
            info!("{}", item);
        } else {
            warn!("{}", item);
        }
        self.items.push(item);
    }
}

/// A `dir/*` entry names every jar in `dir`; anything else must exist as is.
fn check_classpath_entry(entry: &str) -> Result<String, String> {
    let Some(prefix) = entry.strip_suffix('*') else {
        return if Path::new(entry).exists() {
            Ok("found".to_string())
        } else {
            Err("file does not exist".to_string())
        };
    };

    let dir = if prefix.is_empty() { Path::new(".") } else { Path::new(prefix) };
    let listing = std::fs::read_dir(dir)
        .map_err(|e| format!("directory {} is not readable: {}", dir.display(), e))?;
    let jars = listing
        .filter_map(Result::ok)
        .filter(|item| {
            item.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"))
        })
        .count();
    if jars == 0 {
        Err(format!("no .jar files in {}", dir.display()))
    } else {
        Ok(format!("{} jar(s) found", jars))
    }
}

/// Probe the JDK, the parser classpath and the model backend.
pub async fn check_environment(
    config: &AppConfig,
    runner: Arc<dyn ProcessRunner>,
) -> EnvironmentReport {
    info!("Starting environment check...");
    let mut report = EnvironmentReport::default();
    let toolchain = JavaToolchain::new(runner, config.java.clone());

    report.record(match toolchain.javac_version() {
        Ok(version) => CheckItem::ok("javac", version),
        Err(e) => CheckItem::failed("javac", e.to_string()),
    });
    report.record(match toolchain.java_version() {
        Ok(version) => CheckItem::ok("java", version),
        Err(e) => CheckItem::failed("java", e.to_string()),
    });

    let entries = config.parser.classpath_entries();
    if entries.is_empty() {
        report.record(CheckItem::failed("parser classpath", "classpath is empty"));
    }
    for entry in entries {
        let name = format!("parser classpath {}", entry);
        report.record(match check_classpath_entry(&entry) {
            Ok(detail) => CheckItem::ok(name, detail),
            Err(detail) => CheckItem::failed(name, detail),
        });
    }

    let client = ModelClient::new(config.llm.clone());
    let model_name = format!("model {} ({})", config.llm.model, client.provider_name());
    report.record(match client.health_check().await {
        Ok(()) => CheckItem::ok(model_name, format!("reachable at {}", config.llm.base_url)),
        Err(e) => CheckItem::failed(model_name, e.to_string()),
    });

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use process_runner::testing::ScriptedRunner;
    use std::fs;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn all_checks_pass() {
        let temp = tempfile::tempdir().unwrap();
        let jar = temp.path().join("CobolAstExporter.jar");
        fs::write(&jar, b"PK").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\":[]}"))
            .mount(&server)
            .await;

        let mut config = AppConfig::default();
        config.parser.classpath = jar.to_string_lossy().to_string();
        config.llm.base_url = format!("{}/v1", server.uri());

        let runner = Arc::new(
            ScriptedRunner::new()
                .exits(0, "", "javac 17.0.2\n")
                .exits(0, "", "openjdk version \"17.0.2\"\n"),
        );
        let report = check_environment(&config, runner).await;
        assert!(!report.has_errors(), "unexpected failures: {:?}", report.items);
        assert_eq!(report.items.len(), 4);
        assert_eq!(report.items[0].detail, "javac 17.0.2");
    }

    #[tokio::test]
    async fn missing_tools_are_reported() {
        let mut config = AppConfig::default();
        config.parser.classpath = "/no/such/parser.jar".to_string();
        config.llm.base_url = "http://127.0.0.1:9/v1".to_string();

        let runner = Arc::new(
            ScriptedRunner::new()
                .fails_to_spawn(std::io::ErrorKind::NotFound)
                .fails_to_spawn(std::io::ErrorKind::NotFound),
        );
        let report = check_environment(&config, runner).await;
        assert!(report.has_errors());
        assert!(report.items.iter().all(|item| !item.ok));
    }

    #[test]
    fn wildcard_classpath_entry_counts_jars() {
        let temp = tempfile::tempdir().unwrap();
        let lib = temp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("proleap-cobol.jar"), b"PK").unwrap();
        fs::write(lib.join("README.txt"), b"notes").unwrap();

        let entry = format!("{}/*", lib.display());
        assert_eq!(check_classpath_entry(&entry).unwrap(), "1 jar(s) found");
    }

    #[test]
    fn wildcard_classpath_entry_without_jars_fails() {
        let temp = tempfile::tempdir().unwrap();
        let entry = format!("{}/*", temp.path().display());
        let detail = check_classpath_entry(&entry).unwrap_err();
        assert!(detail.contains("no .jar files"), "{}", detail);

        let missing = format!("{}/*", temp.path().join("absent").display());
        let detail = check_classpath_entry(&missing).unwrap_err();
        assert!(detail.contains("not readable"), "{}", detail);
    }

    #[tokio::test]
    async fn wildcard_classpath_passes_environment_check() {
        let temp = tempfile::tempdir().unwrap();
        let lib = temp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("proleap-cobol.jar"), b"PK").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\":[]}"))
            .mount(&server)
            .await;

        let mut config = AppConfig::default();
        config.parser.classpath = format!("{}/*", lib.display());
        config.llm.base_url = format!("{}/v1", server.uri());

        let runner = Arc::new(
            ScriptedRunner::new()
                .exits(0, "", "javac 17.0.2\n")
                .exits(0, "", "openjdk version \"17.0.2\"\n"),
        );
        let report = check_environment(&config, runner).await;
        assert!(!report.has_errors(), "unexpected failures: {:?}", report.items);
        assert_eq!(report.items[2].detail, "1 jar(s) found");
    }
}
