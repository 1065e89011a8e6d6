use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{DEFAULT_UNTIL, DatasetError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectedCase {
    pub index: usize,
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// The snippet at the bound, if the dataset is long enough.
    pub inspected: Option<InspectedCase>,
    /// Number of records visited, the bound included.
    pub visited: usize,
    pub written_to: Option<PathBuf>,
}

/// Walks a dataset up to a bound and surfaces the snippet at that index.
#[derive(Debug, Clone)]
pub struct BatchDriver {
    until: usize,
    test_case_output: Option<PathBuf>,
}

impl Default for BatchDriver {
    fn default() -> Self {
        Self::new(DEFAULT_UNTIL)
    }
}

impl BatchDriver {
    pub fn new(until: usize) -> Self {
        Self {
            until,
            test_case_output: None,
        }
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_case_output = Some(path.into());
        self
    }

    pub fn until(&self) -> usize {
        self.until
    }

    /// Print `sources[until]` to `out`. Nothing after the bound is touched.
    pub fn run(&self, sources: &[String], out: &mut impl Write) -> Result<BatchReport, DatasetError> {
        let prefix: Vec<InspectedCase> = sources
            .iter()
            .take(self.until.saturating_add(1))
            .enumerate()
            .map(|(index, source)| InspectedCase {
                index,
                source: source.clone(),
            })
            .collect();

        let inspected = prefix.get(self.until).cloned();
        match &inspected {
            Some(case) => {
                info!("Inspecting dataset entry {}", case.index);
                writeln!(out, "{}", case.source).map_err(|e| DatasetError::Output {
                    path: PathBuf::from("<stdout>"),
                    source: e,
                })?;
            }
            None => warn!(
                "Dataset has {} entries, nothing at index {}",
                sources.len(),
                self.until
            ),
        }

        let written_to = match &self.test_case_output {
            Some(path) => {
                write_cases(path, &prefix)?;
                Some(path.clone())
            }
            None => None,
        };

        Ok(BatchReport {
            inspected,
            visited: prefix.len(),
            written_to,
        })
    }
}

fn write_cases(path: &Path, cases: &[InspectedCase]) -> Result<(), DatasetError> {
    let output_err = |e: std::io::Error| DatasetError::Output {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(output_err)?;
    }
    let json = serde_json::to_string_pretty(cases)
        .map_err(|e| output_err(std::io::Error::other(e)))?;
    fs::write(path, json).map_err(output_err)?;
    info!("Wrote {} test cases to {:?}", cases.len(), path);
    Ok(())
}
