//! Per-build values that end up in the generated header

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub version: String,
    pub branch: String,
    pub output_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    /// Relative paths of the modules in the bundle, in emission order
    pub source_files: Vec<String>,
    pub update_url: Option<String>,
    pub download_url: Option<String>,
}

impl BuildContext {
    pub fn new(version: impl Into<String>, branch: impl Into<String>, output_path: PathBuf) -> Self {
        Self {
            version: version.into(),
            branch: branch.into(),
            output_path,
            timestamp: Utc::now(),
            source_files: Vec::new(),
            update_url: None,
            download_url: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut context = Self::new(&config.version, &config.branch, config.output.clone());
        if let Some(base) = &config.release_url {
            let url = release_url(base, &config.branch, &config.output);
            context.update_url = Some(url.clone());
            context.download_url = Some(url);
        }
        context
    }

    #[must_use]
    pub fn with_source_files(mut self, source_files: Vec<String>) -> Self {
        self.source_files = source_files;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Placeholder substitutions for metadata values
    pub fn template_values(&self) -> Vec<(&'static str, String)> {
        vec![
            ("{{VERSION}}", self.version.clone()),
            ("{{BRANCH}}", self.branch.clone()),
            ("{{UPDATE_URL}}", self.update_url.clone().unwrap_or_default()),
            (
                "{{DOWNLOAD_URL}}",
                self.download_url.clone().unwrap_or_default(),
            ),
            (
                "{{BUILD_DATE}}",
                self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ]
    }
}

fn release_url(base: &str, branch: &str, output: &Path) -> String {
    let file_name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}/{branch}/{file_name}", base.trim_end_matches('/'))
}
