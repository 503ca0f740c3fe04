//! Project configuration
//!
//! Configuration is read from TOML. Every key is optional; missing keys take
//! the defaults below. Lookup order for [`Config::load`] without an explicit
//! path: `scriptweld.toml` in the working directory, then
//! `scriptweld/config.toml` in the user configuration directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use etcetera::{BaseStrategy, choose_base_strategy};
use log::debug;
use serde::Deserialize;

pub const PROJECT_CONFIG_FILE: &str = "scriptweld.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Source root scanned for modules
    pub src: PathBuf,
    /// Default source file extension, without the dot
    pub extension: String,
    /// Relative path of the metadata-declaration module inside `src`
    pub metadata_module: String,
    /// Where the bundled userscript is written
    pub output: PathBuf,
    pub version: String,
    pub branch: String,
    /// Base URL the bundle is published under; update and download URLs are
    /// `<release-url>/<branch>/<output file name>`
    pub release_url: Option<String>,
    /// Directory names skipped during discovery
    pub exclude: Vec<String>,
    pub indent_width: usize,
    /// Size policy: maximum number of lines per module
    pub max_module_lines: Option<usize>,
    /// External lint command run before bundling, as argv
    pub lint_command: Option<Vec<String>>,
    /// Directory of the file this configuration was read from; external
    /// commands run there
    #[serde(skip)]
    pub project_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src: PathBuf::from("src"),
            extension: "js".to_owned(),
            metadata_module: "meta.js".to_owned(),
            output: PathBuf::from("dist/script.user.js"),
            version: "0.0.0".to_owned(),
            branch: "main".to_owned(),
            release_url: None,
            exclude: vec!["node_modules".to_owned()],
            indent_width: 4,
            max_module_lines: None,
            lint_command: None,
            project_dir: None,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file or the default locations
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }

        let project = PathBuf::from(PROJECT_CONFIG_FILE);
        if project.is_file() {
            return Self::read(&project);
        }

        if let Some(user) = Self::user_config_path()
            && user.is_file()
        {
            return Self::read(&user);
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn read(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config =
            Self::from_toml(&text).with_context(|| format!("in {}", path.display()))?;
        config.project_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);
        Ok(config)
    }

    /// `scriptweld/config.toml` under the platform configuration directory
    pub fn user_config_path() -> Option<PathBuf> {
        choose_base_strategy()
            .ok()
            .map(|strategy| strategy.config_dir().join("scriptweld").join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.extension.is_empty() || self.extension.starts_with('.') {
            bail!(
                "extension must be a bare extension such as \"js\", got {:?}",
                self.extension
            );
        }
        if self.metadata_module.is_empty() {
            bail!("metadata-module must not be empty");
        }
        if self.lint_command.as_ref().is_some_and(Vec::is_empty) {
            bail!("lint-command must name a program");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(Config::from_toml("").expect("empty config"), Config::default());
    }

    #[test]
    fn test_kebab_case_keys() {
        let config = Config::from_toml(
            r#"
src = "userscript"
metadata-module = "header/meta.js"
release-url = "https://example.com/releases"
indent-width = 2
max-module-lines = 400
lint-command = ["eslint", "userscript"]
"#,
        )
        .expect("config should parse");

        assert_eq!(config.src, PathBuf::from("userscript"));
        assert_eq!(config.metadata_module, "header/meta.js");
        assert_eq!(
            config.release_url.as_deref(),
            Some("https://example.com/releases")
        );
        assert_eq!(config.indent_width, 2);
        assert_eq!(config.max_module_lines, Some(400));
        assert_eq!(config.extension, "js");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Config::from_toml("sorce = \"src\"").is_err());
    }

    #[test]
    fn test_dotted_extension_is_rejected() {
        let err = Config::from_toml("extension = \".js\"").unwrap_err();
        assert!(format!("{err:#}").contains("bare extension"));
    }

    #[test]
    fn test_loaded_config_remembers_its_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scriptweld.toml");
        fs::write(&path, "lint-command = [\"eslint\", \"src\"]\n").expect("write config");

        let config = Config::load(Some(path.as_path())).expect("config should load");
        assert_eq!(config.project_dir.as_deref(), Some(dir.path()));
        assert_eq!(Config::from_toml("").expect("empty").project_dir, None);
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(Config::load(Some(dir.path().join("missing.toml").as_path())).is_err());
    }
}
